use crate::{ApiError, AppState};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use recipe_core::security::parse_authorization;
use recipe_core::{SecurityEvent, SecurityLogger, User};

/// The user resolved from the request's token, available to handlers
/// behind [`auth_middleware`] as `Extension<AuthUser>`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned);

    let Some(header_value) = header_value else {
        return Err(ApiError::Unauthorized(
            "Authentication credentials were not provided.".into(),
        ));
    };

    let Some(key) = parse_authorization(&header_value).map(str::to_owned) else {
        SecurityLogger::log_event(SecurityEvent::InvalidToken {
            reason: "malformed authorization header".into(),
        });
        return Err(ApiError::Unauthorized("Invalid token header.".into()));
    };

    let user = state.db(move |store| store.user_for_token(&key)).await?;
    let Some(user) = user else {
        SecurityLogger::log_event(SecurityEvent::InvalidToken {
            reason: "unknown key or inactive user".into(),
        });
        return Err(ApiError::Unauthorized("Invalid token.".into()));
    };

    req.extensions_mut().insert(AuthUser(user));
    Ok(next.run(req).await)
}
