//! Request orchestration for the analyze, recognize, fuse and generate operations.
//!
//! Every operation runs the same pipeline: validate inputs, build the wire
//! payload, call the provider (the only suspension point), parse the
//! response. Nothing is shared between calls, so one [`Generator`] can serve
//! any number of concurrent requests.

use crate::ai::{payload, response, HttpTransport, ProviderTransport};
use crate::models::{
    Config, GenerateRequest, ModelSettings, OperationRequest, OperationResult, RecognitionMode,
    Timeouts,
};
use crate::prompts::{FallbackTemplates, FileTemplateProvider, TemplateKind, TemplateProvider};
use crate::validation;
use crate::{Error, Result};
use tracing::{debug, info, warn};

pub const MIN_PROMPT_CHARS: usize = 10;
pub const MIN_ANALYSIS_CHARS: usize = 10;
pub const MIN_PRODUCT_INFO_CHARS: usize = 2;

/// Coordinates validation, payload construction, the provider call and parsing.
pub struct Generator {
    transport: Box<dyn ProviderTransport>,
    templates: Box<dyn TemplateProvider>,
    models: ModelSettings,
    timeouts: Timeouts,
}

/// Injectable collaborators used to construct [`Generator`] in tests/harnesses.
pub struct GeneratorServices {
    pub transport: Box<dyn ProviderTransport>,
    pub templates: Box<dyn TemplateProvider>,
}

impl Generator {
    /// Build a generator from concrete collaborators.
    pub fn with_services(services: GeneratorServices, models: ModelSettings, timeouts: Timeouts) -> Self {
        Self {
            transport: services.transport,
            templates: services.templates,
            models,
            timeouts,
        }
    }

    /// Construct a generator talking to the configured proxy over HTTP.
    pub fn from_config(config: &Config) -> Self {
        info!(
            "Provider: {} (text model: {}, image model: {})",
            config.base_url, config.models.analyze_model, config.models.image_model
        );

        Self::with_services(
            GeneratorServices {
                transport: Box::new(HttpTransport::new(
                    config.api_key.clone(),
                    config.base_url.clone(),
                )),
                templates: Box::new(FallbackTemplates::new(FileTemplateProvider::new(
                    &config.template_dir,
                ))),
            },
            config.models.clone(),
            config.timeouts,
        )
    }

    /// Turn a competitor image into a composition prompt.
    pub async fn analyze(&self, image_base64: &str) -> Result<String> {
        let request = OperationRequest::Analyze {
            image: image_base64.to_string(),
            system_instruction: String::new(),
        };
        expect_text(self.execute_templated(request, TemplateKind::Analysis).await?)
    }

    /// Describe the product shown in an image.
    pub async fn recognize_product(&self, image_base64: &str, mode: RecognitionMode) -> Result<String> {
        let request = OperationRequest::Recognize {
            image: image_base64.to_string(),
            system_instruction: String::new(),
        };
        expect_text(
            self.execute_templated(request, TemplateKind::Recognition(mode))
                .await?,
        )
    }

    /// Merge a prior analysis with the target product description.
    pub async fn fuse_prompt(&self, analysis: &str, product_info: &str) -> Result<String> {
        let request = OperationRequest::Fuse {
            analysis: analysis.to_string(),
            product_info: product_info.to_string(),
            system_instruction: String::new(),
        };
        expect_text(self.execute_templated(request, TemplateKind::Fusion).await?)
    }

    /// Synthesize an image; returns the provider's base64 image data.
    ///
    /// Fails with [`Error::IncompleteGeneration`] when the model only produced
    /// thought signatures, which callers may retry with the same or a simpler prompt.
    pub async fn generate(&self, request: GenerateRequest) -> Result<String> {
        match self.execute(OperationRequest::Generate(request)).await? {
            OperationResult::Image(data) => Ok(data),
            OperationResult::Text(_) => Err(Error::MalformedResponse(
                "expected image data, got text".to_string(),
            )),
        }
    }

    /// Run a request whose system instruction is already filled in.
    pub async fn execute(&self, request: OperationRequest) -> Result<OperationResult> {
        check_request(&request)?;
        self.dispatch(request).await
    }

    /// Validate first, then load the instruction template, then dispatch.
    async fn execute_templated(
        &self,
        mut request: OperationRequest,
        template: TemplateKind,
    ) -> Result<OperationResult> {
        check_request(&request)?;

        let loaded = self.templates.load_template(template)?;
        match &mut request {
            OperationRequest::Analyze {
                system_instruction, ..
            }
            | OperationRequest::Recognize {
                system_instruction, ..
            }
            | OperationRequest::Fuse {
                system_instruction, ..
            } => *system_instruction = loaded,
            OperationRequest::Generate(_) => {}
        }

        self.dispatch(request).await
    }

    /// Build the payload, call the provider and parse the reply for a checked request.
    #[tracing::instrument(name = "operation", skip_all, fields(kind = %request.kind()))]
    async fn dispatch(&self, request: OperationRequest) -> Result<OperationResult> {
        let kind = request.kind();

        debug!("Building payload");
        let built = payload::build(&request, &self.models)?;

        let timeout = self.timeouts.for_operation(kind);
        if let OperationRequest::Generate(generate) = &request {
            info!(
                "Requesting image ({}, aspect ratio {:?}, resolution {:?})",
                if generate.is_image_to_image() {
                    "image-to-image"
                } else {
                    "text-to-image"
                },
                generate.aspect_ratio,
                generate.resolution.map(|r| r.as_str()),
            );
        } else {
            info!("Calling provider");
        }

        let raw = self.transport.call(&built.endpoint, &built.body, timeout).await?;

        debug!("Parsing response");
        let result = response::parse(&raw, kind);
        match &result {
            Ok(OperationResult::Text(text)) => info!("Received {} characters of text", text.len()),
            Ok(OperationResult::Image(data)) => info!("Received image ({} base64 characters)", data.len()),
            Err(Error::IncompleteGeneration) => warn!("Model has not produced an image yet"),
            Err(_) => {}
        }
        result
    }
}

/// Image and request-shape checks; nothing reaches the provider unless these pass.
fn check_request(request: &OperationRequest) -> Result<()> {
    debug!("Validating request");
    match request {
        OperationRequest::Analyze { image, .. } | OperationRequest::Recognize { image, .. } => {
            validation::validate(image)?;
        }
        OperationRequest::Fuse {
            analysis,
            product_info,
            ..
        } => {
            require_min_chars("analysis result", analysis, MIN_ANALYSIS_CHARS)?;
            require_min_chars("product information", product_info, MIN_PRODUCT_INFO_CHARS)?;
        }
        OperationRequest::Generate(generate) => {
            if let Some(reference) = generate.reference() {
                validation::validate(reference)?;
            }
            require_min_chars("prompt", &generate.prompt, MIN_PROMPT_CHARS)?;
        }
    }
    Ok(())
}

fn require_min_chars(field: &str, value: &str, min: usize) -> Result<()> {
    let count = value.trim().chars().count();
    if count < min {
        return Err(Error::InvalidArgument(format!(
            "{} is too short ({} characters, minimum {})",
            field, count, min
        )));
    }
    Ok(())
}

fn expect_text(result: OperationResult) -> Result<String> {
    match result {
        OperationResult::Text(text) => Ok(text),
        OperationResult::Image(_) => Err(Error::MalformedResponse(
            "expected text, got image data".to_string(),
        )),
    }
}
