//! Extract the current user from request extensions.

use crate::identity::ApiUser;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Extractor for the caller identity placed in the extensions by the
/// authentication layer. Falls back to the anonymous user.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub ApiUser);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<ApiUser>()
            .cloned()
            .unwrap_or_else(ApiUser::anonymous);
        Ok(CurrentUser(user))
    }
}
