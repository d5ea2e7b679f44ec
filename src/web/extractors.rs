use crate::utils::error::DetectError;
use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

/// JSON extractor that runs [`Validate`] and rejects with [`DetectError`]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = DetectError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|err| {
                DetectError::InvalidInput(format!("JSON parse error: {}", err.body_text()))
            })?;

        value
            .validate()
            .map_err(|err| DetectError::InvalidInput(format!("Validation error: {}", err)))?;

        Ok(ValidatedJson(value))
    }
}

pub trait Validate {
    type Error: std::fmt::Display;

    fn validate(&self) -> Result<(), Self::Error>;
}

/// Request ID taken from `X-Request-ID`, generated when absent
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get("X-Request-ID")
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(RequestId(request_id))
    }
}
