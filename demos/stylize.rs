use argh::FromArgs;
use kornia_image::{Image, allocator::CpuAllocator};
use std::{
    error::Error,
    ffi::OsStr,
    path::{Path, PathBuf},
    time::Duration,
};
use stylizer::{
    ModelPath, PredictRequest, PredictResponse, PredictTransport, StylizeRequest,
    StylizerConfig, StylizerEngine, StylizerEngineResult, StylizerError,
};

// defaults for the client
const DEFAULT_ENDPOINT: &str = "https://ml.googleapis.com/v1";
const TOKEN_ENV: &str = "STYLIZER_ACCESS_TOKEN";

#[derive(FromArgs)]
/// Stylize an image with a model hosted on a prediction service.
struct StylizeArgs {
    /// the path to the source image (jpeg or png)
    #[argh(option, short = 'i')]
    image_path: PathBuf,

    /// the style to apply, in [0, 32)
    #[argh(option, short = 's')]
    style: i64,

    /// the project hosting the model
    #[argh(option)]
    project: String,

    /// the model name
    #[argh(option)]
    model: String,

    /// the base url of the prediction service
    #[argh(option, default = "DEFAULT_ENDPOINT.to_string()")]
    endpoint: String,

    /// where to write the blended result
    #[argh(option, short = 'o', default = "PathBuf::from(\"stylized.png\")")]
    output: PathBuf,

    /// also write the request body to this file
    #[argh(option)]
    debug_dump: Option<PathBuf>,
}

/// Posts requests to `<endpoint>/<model path>:predict`.
struct HttpTransport {
    client: reqwest::blocking::Client,
    endpoint: String,
    token: Option<String>,
}

impl PredictTransport for HttpTransport {
    type Error = reqwest::Error;

    fn predict(
        &mut self,
        model_path: &ModelPath,
        request: &PredictRequest,
    ) -> Result<PredictResponse, Self::Error> {
        let url = format!("{}/{}:predict", self.endpoint, model_path);
        log::debug!("POST {}", url);

        let mut builder = self.client.post(url).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        // error bodies carry the `error` key, so parse regardless of status
        builder.send()?.json::<PredictResponse>()
    }
}

/// Loads the source photo, picking the decoder from the file extension.
fn load_source_image(path: &Path) -> Result<Image<u8, 3, CpuAllocator>, Box<dyn Error>> {
    let image = match path.extension().and_then(OsStr::to_str) {
        Some("jpg" | "jpeg") => kornia_io::jpeg::read_image_jpeg_rgb8(path)?,
        Some("png") => kornia_io::png::read_image_png_rgb8(path)?,
        other => {
            return Err(StylizerError::Config(format!(
                "unsupported image extension {:?} for {}",
                other,
                path.display()
            ))
            .into());
        }
    };
    log::debug!("Loaded {}x{} source image", image.width(), image.height());
    Ok(image)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args: StylizeArgs = argh::from_env();

    let image = load_source_image(&args.image_path)?;

    let mut config = StylizerConfig::new(args.project, args.model);
    config.debug_dump = args.debug_dump;

    let transport = HttpTransport {
        client: reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?,
        endpoint: args.endpoint,
        token: std::env::var(TOKEN_ENV).ok(),
    };

    let mut engine = StylizerEngine::new(transport, config);
    engine.schedule(StylizeRequest {
        image,
        style_index: args.style,
    });
    log::info!("Scheduled style {}", args.style);

    let response = loop {
        match engine.try_poll_response() {
            StylizerEngineResult::Success(response) => break response,
            StylizerEngineResult::Empty(state) => {
                log::debug!("Engine is {}", state.as_str());
                std::thread::sleep(Duration::from_millis(100));
            }
            StylizerEngineResult::Error(e) => return Err(e.into()),
        }
    };
    engine.stop();

    let blended = response.result?;
    log::info!("Stylized in {:?}", response.duration);

    image::save_buffer(
        &args.output,
        blended.as_slice(),
        blended.width() as u32,
        blended.height() as u32,
        image::ExtendedColorType::Rgb8,
    )?;
    println!("Wrote {}", args.output.display());

    Ok(())
}
