//! Client-side codec for a hosted image style transfer model.
//!
//! [`encode_request`] turns a captured RGB image and a style index into the
//! JSON body expected by the prediction endpoint, and [`decode_response`]
//! pulls the stylized JPEG back out of the reply. Both are pure functions.
//! [`overlay`] composites the result over the source photo, and
//! [`StylizerEngine`] drives the whole round-trip on a worker thread through
//! a caller-supplied [`PredictTransport`].

mod blend;
mod config;
mod engine;
mod error;
mod request;
mod response;
mod transport;
mod weights;

pub use blend::{BLEND_ALPHA, blend, overlay};
pub use config::{ModelPath, StylizerConfig};
pub use engine::{
    StylizeRequest, StylizerEngine, StylizerEngineResponse, StylizerEngineResult,
    StylizerEngineState, stylize,
};
pub use error::{Result, StylizerError};
pub use request::{
    DEFAULT_JPEG_QUALITY, ImageBytes, Instance, PredictRequest, encode_jpeg, encode_request,
    encode_request_with_weights,
};
pub use response::{
    PredictResponse, Prediction, decode_image, decode_response, decode_response_str,
};
pub use transport::PredictTransport;
pub use weights::{NUM_STYLES, StyleWeights};
