use crate::{ApiError, AppState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

/// Global request budget; over-limit requests get a 429.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.rate_limiter.check().is_err() {
        warn!(path = %req.uri().path(), "Rate limit exceeded");
        return Err(ApiError::TooManyRequests);
    }
    Ok(next.run(req).await)
}
