use crate::{config::ModelPath, request::PredictRequest, response::PredictResponse};

/// Carries a prediction request to the hosted model and returns its reply.
///
/// Implementations own authentication, timeouts and retries; the engine only
/// sees the parsed response or an error.
pub trait PredictTransport {
    /// The error type returned when the round-trip fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends `request` to the model at `model_path`.
    fn predict(
        &mut self,
        model_path: &ModelPath,
        request: &PredictRequest,
    ) -> Result<PredictResponse, Self::Error>;
}
