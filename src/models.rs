//! Data models and structures
//!
//! Request-scoped operation inputs and results, plus environment-driven
//! configuration for the provider proxy.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

/// The remote operations this crate knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Analyze,
    Recognize,
    Fuse,
    Generate,
}

impl OperationKind {
    /// Image synthesis is the only operation allowed the long deadline.
    pub fn is_image_synthesis(self) -> bool {
        matches!(self, OperationKind::Generate)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Analyze => "analyze",
            OperationKind::Recognize => "recognize",
            OperationKind::Fuse => "fuse",
            OperationKind::Generate => "generate",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionMode {
    #[default]
    Simple,
    Detailed,
}

impl FromStr for RecognitionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(RecognitionMode::Simple),
            "detailed" => Ok(RecognitionMode::Detailed),
            other => Err(format!(
                "Invalid recognition mode '{}'. Expected simple or detailed",
                other
            )),
        }
    }
}

/// Output resolution token accepted by the image model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::OneK => "1K",
            Resolution::TwoK => "2K",
            Resolution::FourK => "4K",
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1K" => Ok(Resolution::OneK),
            "2K" => Ok(Resolution::TwoK),
            "4K" => Ok(Resolution::FourK),
            other => Err(format!(
                "Invalid resolution '{}'. Expected one of 1K, 2K, 4K",
                other
            )),
        }
    }
}

/// Inputs of the generate operation.
///
/// A missing or blank `reference_image` selects text-to-image mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub reference_image: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
}

impl GenerateRequest {
    /// Request with the default `1:1` aspect ratio and `1K` resolution.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            reference_image: None,
            aspect_ratio: Some(DEFAULT_ASPECT_RATIO.to_string()),
            resolution: Some(Resolution::default()),
        }
    }

    pub fn with_reference_image(mut self, image_base64: impl Into<String>) -> Self {
        self.reference_image = Some(image_base64.into());
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: Option<String>) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_resolution(mut self, resolution: Option<Resolution>) -> Self {
        self.resolution = resolution;
        self
    }

    /// The reference image, if one was actually supplied.
    pub fn reference(&self) -> Option<&str> {
        self.reference_image
            .as_deref()
            .filter(|image| !image.trim().is_empty())
    }

    pub fn is_image_to_image(&self) -> bool {
        self.reference().is_some()
    }
}

/// A fully-assembled request for one remote operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationRequest {
    Analyze {
        image: String,
        system_instruction: String,
    },
    Recognize {
        image: String,
        system_instruction: String,
    },
    Fuse {
        analysis: String,
        product_info: String,
        system_instruction: String,
    },
    Generate(GenerateRequest),
}

impl OperationRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationRequest::Analyze { .. } => OperationKind::Analyze,
            OperationRequest::Recognize { .. } => OperationKind::Recognize,
            OperationRequest::Fuse { .. } => OperationKind::Fuse,
            OperationRequest::Generate(_) => OperationKind::Generate,
        }
    }
}

/// Parsed outcome of a provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    Text(String),
    /// Base64-encoded image bytes, exactly as the provider sent them.
    Image(String),
}

/// Key convention used for the generate payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldNaming {
    #[default]
    CamelCase,
    SnakeCase,
}

impl FromStr for FieldNaming {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "camel" | "camelcase" => Ok(FieldNaming::CamelCase),
            "snake" | "snake_case" => Ok(FieldNaming::SnakeCase),
            other => Err(format!(
                "Invalid field naming '{}'. Expected camel or snake",
                other
            )),
        }
    }
}

/// Model selection and payload conventions shared by every builder.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub analyze_model: String,
    pub image_model: String,
    pub field_naming: FieldNaming,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            analyze_model: "gemini-2.5-pro".to_string(),
            image_model: "gemini-3-pro-image-preview".to_string(),
            field_naming: FieldNaming::CamelCase,
        }
    }
}

/// Per-operation deadlines for the remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub text: Duration,
    pub image: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            text: Duration::from_secs(60),
            image: Duration::from_secs(120),
        }
    }
}

impl Timeouts {
    pub fn for_operation(&self, kind: OperationKind) -> Duration {
        if kind.is_image_synthesis() {
            self.image
        } else {
            self.text
        }
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub models: ModelSettings,
    pub timeouts: Timeouts,
    pub template_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ModelSettings::default();
        let default_timeouts = Timeouts::default();

        let secs = |name: &str, default: Duration| match lookup(name) {
            Some(value) => parse_secs(name, &value),
            None => Ok(default),
        };

        Ok(Self {
            api_key: lookup("PROXY_API_KEY")
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| Error::Config("PROXY_API_KEY not set".to_string()))?,
            base_url: lookup("PROXY_BASE_URL")
                .unwrap_or_else(|| "https://yunwu.zeabur.app".to_string()),
            models: ModelSettings {
                analyze_model: lookup("ANALYZE_MODEL").unwrap_or(defaults.analyze_model),
                image_model: lookup("IMAGE_MODEL").unwrap_or(defaults.image_model),
                field_naming: match lookup("PAYLOAD_FIELD_NAMING") {
                    Some(value) => value.parse().map_err(Error::Config)?,
                    None => defaults.field_naming,
                },
            },
            timeouts: Timeouts {
                text: secs("TEXT_TIMEOUT_SECS", default_timeouts.text)?,
                image: secs("IMAGE_TIMEOUT_SECS", default_timeouts.image)?,
            },
            template_dir: lookup("TEMPLATE_DIR").unwrap_or_else(|| "Guidance".to_string()),
        })
    }
}

fn parse_secs(name: &str, value: &str) -> Result<Duration> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(Error::Config(format!(
            "{} must be a positive number of seconds (got '{}')",
            name, value
        ))),
    }
}
