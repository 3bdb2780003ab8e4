/// Outgoing HTML email
use crate::{
    account::Role,
    config::EmailConfig,
    error::{AppError, AppResult},
};
use lettre::{
    message::{header::ContentType, Message},
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};

/// Connection URL handed to lettre
///
/// Accepts `smtp://` and `smtps://` with percent-encoded credentials. A plain
/// `smtp://` URL without a `tls` parameter requires STARTTLS.
fn connection_url(smtp_url: &str) -> String {
    let smtp_url = smtp_url.trim();
    if !smtp_url.starts_with("smtp://") || smtp_url.contains("tls=") {
        return smtp_url.to_string();
    }

    let separator = if smtp_url.contains('?') { '&' } else { '?' };
    format!("{}{}tls=required", smtp_url, separator)
}

fn smtp_transport(smtp_url: &str) -> AppResult<AsyncSmtpTransport<Tokio1Executor>> {
    let transport = AsyncSmtpTransport::<Tokio1Executor>::from_url(&connection_url(smtp_url))
        .map_err(|e| AppError::Misconfigured(format!("Invalid SMTP URL: {}", e)))?
        .build();

    Ok(transport)
}

/// Email mailer service
#[derive(Clone)]
pub struct Mailer {
    config: Option<EmailConfig>,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl Mailer {
    /// Create a new mailer; `None` yields a mailer that logs and skips
    pub fn new(config: Option<EmailConfig>) -> AppResult<Self> {
        let transport = match &config {
            Some(email_config) => Some(smtp_transport(&email_config.smtp_url)?),
            None => None,
        };

        Ok(Self { config, transport })
    }

    /// Send a password reset code, worded for the account's role
    pub async fn send_password_reset_otp(
        &self,
        to_email: &str,
        code: &str,
        role: Role,
        ttl_minutes: i64,
    ) -> AppResult<()> {
        let body = password_reset_body(code, role, ttl_minutes);
        self.send_email(to_email, "🔐 Password Reset OTP", &body).await
    }

    /// Send the free playlist link with the premium upsell
    pub async fn send_guest_playlist_ready(
        &self,
        to_email: &str,
        playlist_link: &str,
    ) -> AppResult<()> {
        let body = guest_playlist_body(playlist_link);
        self.send_email(
            to_email,
            "🎧 Your Free Soundtrack My Night Playlist Is Ready",
            &body,
        )
        .await
    }

    async fn send_email(&self, to: &str, subject: &str, html: &str) -> AppResult<()> {
        let (config, transport) = match (&self.config, &self.transport) {
            (Some(config), Some(transport)) => (config, transport),
            _ => {
                tracing::warn!("Email not configured, skipping \"{}\" to {}", subject, to);
                return Ok(());
            }
        };

        let email = Message::builder()
            .from(
                config
                    .from_address
                    .parse()
                    .map_err(|e| AppError::Misconfigured(format!("Invalid from address: {}", e)))?,
            )
            .to(to
                .parse()
                .map_err(|e| AppError::Mail(format!("Invalid to address: {}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| AppError::Mail(format!("Failed to build email: {}", e)))?;

        transport
            .send(email)
            .await
            .map_err(|e| AppError::Mail(format!("Failed to send email: {}", e)))?;

        tracing::info!("Sent email to {}: {}", to, subject);
        Ok(())
    }

    /// Check if email is configured
    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }
}

fn password_reset_body(code: &str, role: Role, ttl_minutes: i64) -> String {
    let (title, greeting, message, warning, footer) = match role {
        Role::Admin => (
            "Admin Password Reset Request",
            "Hello Admin,",
            "We received a request to reset your admin password. Please use the OTP below to continue.",
            "If you did not request this, please contact the system administrator immediately.",
            "Soundtrack My Night Admin Security Team",
        ),
        _ => (
            "Password Reset Request",
            "Hello,",
            "We received a request to reset your password. Please use the OTP below to continue.",
            "If you did not request this, you can safely ignore this email.",
            "Soundtrack My Night Security Team",
        ),
    };

    format!(
        r#"<div style="font-family:Arial, sans-serif; max-width:500px; margin:auto; padding:20px; color:#111;">
  <h2 style="text-align:center;">{title}</h2>
  <p>{greeting}</p>
  <p>{message}</p>
  <div style="text-align:center; margin:30px 0;">
    <span style="font-size:28px; letter-spacing:6px; font-weight:bold; background:#f3f4f6; padding:12px 24px; border-radius:8px; display:inline-block;">{code}</span>
  </div>
  <p>This OTP will expire in <strong>{ttl_minutes} minutes</strong>. {warning}</p>
  <hr style="margin:30px 0;" />
  <p style="font-size:13px; color:#555;">{footer}</p>
</div>"#
    )
}

fn guest_playlist_body(playlist_link: &str) -> String {
    format!(
        r#"<div style="font-family:'Segoe UI',Arial,sans-serif;max-width:600px;margin:0 auto;background:#ffffff;border-radius:12px;border:1px solid #e5e7eb;">
  <div style="background:linear-gradient(135deg,#1e1b4b 0%,#4f46e5 100%);padding:40px 30px;text-align:center;">
    <h1 style="color:#ffffff;font-size:22px;margin:0 0 8px;">🎧 Soundtrack My Night</h1>
    <p style="color:#c7d2fe;font-size:14px;margin:0;">Your personalised playlist is ready</p>
  </div>
  <div style="padding:32px 30px;">
    <h2 style="color:#111827;font-size:20px;margin:0 0 12px;">Your free playlist has arrived!</h2>
    <p style="color:#4b5563;font-size:15px;line-height:1.6;margin:0 0 24px;">This is a preview of your chosen vibe. Hit the button below to start listening.</p>
    <div style="text-align:center;margin:0 0 32px;">
      <a href="{playlist_link}" style="display:inline-block;background:#16a34a;color:#ffffff;font-size:16px;font-weight:700;text-decoration:none;padding:14px 36px;border-radius:50px;">▶&nbsp; Listen to Your Playlist</a>
    </div>
    <div style="background:#f9fafb;border-radius:10px;padding:24px;border:1px solid #e5e7eb;">
      <h3 style="color:#111827;font-size:17px;margin:0 0 10px;">🔥 Want the full experience?</h3>
      <p style="color:#4b5563;font-size:14px;line-height:1.6;margin:0 0 16px;">Upgrade to the <strong>3-hour, 50-track Premium Playlist</strong>, designed to keep the energy high all night.</p>
      <div style="text-align:center;">
        <a href="{playlist_link}" style="display:inline-block;background:#7c3aed;color:#ffffff;font-size:15px;font-weight:700;text-decoration:none;padding:12px 32px;border-radius:50px;">⚡&nbsp; Upgrade to Premium</a>
      </div>
    </div>
    <p style="color:#6b7280;font-size:12px;text-align:center;margin:28px 0 0;">Soundtrack My Night</p>
  </div>
</div>"#
    )
}
