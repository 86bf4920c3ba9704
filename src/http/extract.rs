//! Handler access to the active span.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

use crate::propagation::ActiveSpanContext;

/// The active span of the current request, if the tracing middleware ran.
///
/// Never rejects: handlers on untraced routes get `CurrentSpan(None)`.
#[derive(Debug, Clone)]
pub struct CurrentSpan(pub Option<ActiveSpanContext>);

impl<S> FromRequestParts<S> for CurrentSpan
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<ActiveSpanContext>().cloned()))
    }
}
