use crate::{
    app_state::AppState,
    error::{ApiError, Result},
    models::common::CallerContext,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;

/// Optional caller authentication
///
/// Requests without an Authorization header run as an anonymous caller.
/// A header that is present must carry a valid `Bearer <token>`, otherwise
/// the request is rejected as unauthenticated.
pub async fn caller_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let caller = match request.headers().get(AUTHORIZATION) {
        None => CallerContext::anonymous(),
        Some(value) => {
            let token = value
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or_else(|| {
                    tracing::warn!("Rejected malformed Authorization header");
                    ApiError::Unauthenticated(
                        "Invalid Authorization format, expected 'Bearer <token>'".to_string(),
                    )
                })?;

            let claims = state.jwt_service.validate_token(token).inspect_err(|e| {
                tracing::warn!("Rejected caller token: {}", e);
            })?;
            CallerContext::authenticated(claims.sub)
        }
    };

    request.extensions_mut().insert(caller);

    Ok(next.run(request).await)
}

/// Axum extractor for the caller context
///
/// Falls back to an anonymous caller on routes without `caller_auth_middleware`.
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CallerContext>()
            .cloned()
            .unwrap_or_default())
    }
}
