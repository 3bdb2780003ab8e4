/// Request credential helpers
use axum::http::{header, HeaderMap};

/// Cookie carrying a user session token
pub const USER_COOKIE: &str = "token";
/// Cookie carrying an admin session token
pub const ADMIN_COOKIE: &str = "adminToken";

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Extract a named cookie value
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty())
}

/// Bearer token, falling back to the named cookie
pub fn extract_token(headers: &HeaderMap, cookie: &str) -> Option<String> {
    extract_bearer_token(headers).or_else(|| extract_cookie(headers, cookie))
}

/// `Set-Cookie` value for a session token
pub fn session_cookie(name: &str, token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
        name, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
