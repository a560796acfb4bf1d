//! Intake credential extractor.

use analysis_core::error::CoreError;
use analysis_core::intake::verify_credential;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// The secret from `Authorization: Bearer <secret>`, if any.
///
/// Extraction never fails; handlers decide when to verify so the intake
/// gateway can apply its checks in order.
#[derive(Debug, Clone, Default)]
pub struct IntakeCredential(pub Option<String>);

impl IntakeCredential {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Compare against the configured intake secret.
    pub fn verify(&self, secret: &str) -> Result<(), CoreError> {
        verify_credential(self.as_deref(), secret)
    }
}

impl FromRequestParts<AppState> for IntakeCredential {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string());
        Ok(IntakeCredential(token))
    }
}
