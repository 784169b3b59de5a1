use serde::Deserialize;
use std::{fmt, path::PathBuf, str::FromStr};

use crate::{
    blend::BLEND_ALPHA,
    error::{Result, StylizerError},
    request::DEFAULT_JPEG_QUALITY,
};

/// Identifies a deployed model as `projects/<project>/models/<model>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelPath {
    pub project: String,
    pub model: String,
}

impl ModelPath {
    /// Creates a path for `model` deployed in `project`.
    pub fn new(project: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for ModelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}/models/{}", self.project, self.model)
    }
}

impl FromStr for ModelPath {
    type Err = StylizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split('/').collect::<Vec<_>>().as_slice() {
            ["projects", project, "models", model] if !project.is_empty() && !model.is_empty() => {
                Ok(Self::new(*project, *model))
            }
            _ => Err(StylizerError::Config(format!(
                "`{s}` is not of the form projects/<project>/models/<model>"
            ))),
        }
    }
}

/// Settings for a stylizer client.
///
/// Only `project` and `model` are required when loading from JSON.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct StylizerConfig {
    pub project: String,
    pub model: String,
    /// Quality of the JPEG sent to the service, in `[1, 100]`.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Opacity of the source photo over the stylized result.
    #[serde(default = "default_blend_alpha")]
    pub blend_alpha: u8,
    /// When set, every outgoing request is also written to this file.
    #[serde(default)]
    pub debug_dump: Option<PathBuf>,
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

fn default_blend_alpha() -> u8 {
    BLEND_ALPHA
}

impl StylizerConfig {
    /// Creates a config with default quality and blend opacity and no debug dump.
    pub fn new(project: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            model: model.into(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            blend_alpha: BLEND_ALPHA,
            debug_dump: None,
        }
    }

    /// Loads a config from JSON, rejecting a JPEG quality outside `[1, 100]`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if !(1..=100).contains(&config.jpeg_quality) {
            return Err(StylizerError::Config(format!(
                "jpeg_quality {} is outside [1, 100]",
                config.jpeg_quality
            )));
        }
        Ok(config)
    }

    /// Returns the path of the configured model.
    pub fn model_path(&self) -> ModelPath {
        ModelPath::new(&self.project, &self.model)
    }
}
