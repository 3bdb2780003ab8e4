/// Quiz submission endpoints
use crate::{
    account::required,
    api::{ApiJson, ApiResponse},
    auth::AuthContext,
    context::AppContext,
    error::{AppError, AppResult},
    quiz::{required_answers, GuestQuizRequest, GuestQuizResult, QuizOutcome, SubmitQuizRequest},
};
use axum::{extract::State, routing::post, Json, Router};

/// Build quiz routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", post(submit_quiz))
        .route("/guest", post(submit_guest_quiz))
}

/// Guest submission; the playlist link is emailed and also returned
async fn submit_guest_quiz(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<GuestQuizRequest>,
) -> AppResult<Json<GuestQuizResult>> {
    let email = required(&req.email, "Email is required")?;
    let answers = required_answers(&req.answers)?;

    let result = ctx.quiz_service.process_guest_quiz(email, answers).await?;

    Ok(Json(result))
}

/// Authenticated submission: free generates now, paid opens checkout
async fn submit_quiz(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    ApiJson(req): ApiJson<SubmitQuizRequest>,
) -> AppResult<ApiResponse<QuizOutcome>> {
    let answers = required_answers(&req.answers)?;
    let tier = req
        .user_type
        .ok_or_else(|| AppError::Validation("userType must be free or paid".to_string()))?;

    let outcome = ctx
        .quiz_service
        .process_user_quiz(&auth.account.id, answers, tier)
        .await?;

    let message = match outcome {
        QuizOutcome::Default { .. } => "Playlist generated successfully",
        QuizOutcome::PremiumPayment { .. } => "Checkout session created successfully",
    };

    Ok(ApiResponse::ok(message, outcome))
}
