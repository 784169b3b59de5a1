use argh::FromArgs;
use axum::{
    Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose};
use kornia_image::Image;
use serde_json::json;
use stylizer::{
    DEFAULT_JPEG_QUALITY, PredictRequest, PredictResponse, Prediction, StylizerError,
    decode_image, encode_jpeg,
};

// defaults for the server
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

#[derive(FromArgs)]
/// A local stand-in for the prediction service that inverts the colors of each instance.
struct MockServiceArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,
}

fn invert(b64: &str) -> Result<String, StylizerError> {
    let jpeg = general_purpose::STANDARD.decode(b64)?;
    let source = decode_image(&jpeg)?;

    let data = source.as_slice().iter().map(|v| 255 - v).collect();
    let inverted = Image::new(source.size(), data, kornia_image::allocator::CpuAllocator)?;

    Ok(general_purpose::URL_SAFE.encode(encode_jpeg(&inverted, DEFAULT_JPEG_QUALITY)?))
}

async fn post_predict(
    Path((project, model)): Path<(String, String)>,
    Json(payload): Json<PredictRequest>,
) -> impl IntoResponse {
    // the model segment carries the `:predict` verb
    let model = model.trim_end_matches(":predict");
    log::info!(
        "Predict on projects/{}/models/{} with {} instances",
        project,
        model,
        payload.instances.len()
    );

    let mut predictions = Vec::with_capacity(payload.instances.len());
    for instance in &payload.instances {
        match invert(&instance.image_bytes.b64) {
            Ok(output_image) => predictions.push(Prediction {
                output_image: Some(output_image),
            }),
            Err(e) => {
                log::warn!("Rejecting instance: {}", e);
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": e.to_string() })),
                );
            }
        }
    }

    let response = PredictResponse {
        error: None,
        predictions: Some(predictions),
    };
    (StatusCode::OK, Json(json!(response)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: MockServiceArgs = argh::from_env();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    let app = Router::new()
        .route("/", get(|| async { "Mock stylizer prediction service" }))
        .route("/v1/projects/{project}/models/{model}", post(post_predict));

    log::info!("Listening on: {}", addr);
    log::info!("Run the client with --endpoint http://{}/v1", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
