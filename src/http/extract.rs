//! Request extractors.
//!
//! Identity is asserted by the gateway in front of this service through the
//! `x-user-id` and `x-user-role` headers and is trusted as-is.

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::application::{Principal, Role};
use crate::CommerceError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = CommerceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER).ok_or_else(|| CommerceError::forbidden("missing caller identity"))?;
        let role = match header(parts, USER_ROLE_HEADER) {
            Some(r) if r.eq_ignore_ascii_case("customer") => Role::Customer,
            Some(r) if r.eq_ignore_ascii_case("staff") => Role::Staff,
            Some(r) if r.eq_ignore_ascii_case("admin") => Role::Admin,
            Some(other) => {
                tracing::warn!(role = other, uri = %parts.uri, "rejected unknown caller role");
                return Err(CommerceError::forbidden(format!("unknown role {other}")));
            }
            None => return Err(CommerceError::forbidden("missing caller role")),
        };
        Ok(Principal::new(user_id, role))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
}

/// JSON body that has passed its `validator` rules.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = CommerceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}
