use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::AppError;

use super::{Claims, Identity, TokenSigner};

/// Verified claims of the request's `Authorization: Bearer` token.
#[derive(Debug, Clone)]
pub struct Bearer(pub Claims);

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AppError::Unauthenticated("Authorization header missing".to_owned()))?;

    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthenticated("Invalid or expired token".to_owned()))
}

impl<S> FromRequestParts<S> for Bearer
where
    TokenSigner: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = TokenSigner::from_ref(state).claims(token)?;
        Ok(Bearer(claims))
    }
}

impl<S> FromRequestParts<S> for Identity
where
    TokenSigner: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Bearer(claims) = Bearer::from_request_parts(parts, state).await?;
        claims.identity()
    }
}
