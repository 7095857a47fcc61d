use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// Header carrying the authenticated user id, set by the fronting gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity of the user issuing the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| CallerId(value.to_owned()))
            .ok_or_else(|| AppError::Unauthorized {
                code: "UNAUTHORIZED",
                message: "missing user id header `X-User-Id`".into(),
            })
    }
}
