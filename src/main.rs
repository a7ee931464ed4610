use anyhow::Result;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use competitor_shot::models::{Config, GenerateRequest, RecognitionMode, Resolution};
use competitor_shot::{Error, Generator};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "competitor-shot")]
#[command(about = "Turn competitor product shots into prompts and generated images")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze a competitor image and print a composition prompt.
    Analyze {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
    },
    /// Identify the product shown in an image.
    Recognize {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
        /// simple or detailed
        #[arg(long, default_value = "simple", value_parser = parse_mode_arg)]
        mode: RecognitionMode,
    },
    /// Merge an analysis prompt with target product information.
    Fuse {
        /// Analysis text, or @FILE to read it from a file.
        #[arg(long, value_parser = parse_text_arg)]
        analysis: String,
        /// Product description, or @FILE to read it from a file.
        #[arg(long, value_parser = parse_text_arg)]
        product: String,
    },
    /// Generate an image, optionally guided by a reference image.
    Generate {
        /// Composition prompt, or @FILE to read it from a file.
        #[arg(long, value_parser = parse_text_arg)]
        prompt: String,
        /// Reference image; omit for text-to-image mode.
        #[arg(long, value_name = "IMAGE")]
        reference: Option<PathBuf>,
        #[arg(long, default_value = "1:1")]
        aspect_ratio: String,
        /// 1K, 2K or 4K
        #[arg(long, default_value = "1K", value_parser = parse_resolution_arg)]
        resolution: Resolution,
        /// Output file; defaults to generated_<uuid>.<ext> in the current directory.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn parse_mode_arg(input: &str) -> std::result::Result<RecognitionMode, String> {
    input.parse()
}

fn parse_resolution_arg(input: &str) -> std::result::Result<Resolution, String> {
    input.parse()
}

/// Inline text, or the contents of a file when prefixed with `@`.
fn parse_text_arg(input: &str) -> std::result::Result<String, String> {
    match input.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read '{}': {}", path, e)),
        None => Ok(input.to_string()),
    }
}

fn read_image_base64(path: &Path) -> competitor_shot::Result<String> {
    let bytes = std::fs::read(path)?;
    info!("Read {} ({} bytes)", path.display(), bytes.len());
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn write_generated_image(data: &str, output: Option<PathBuf>) -> competitor_shot::Result<PathBuf> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| {
            Error::MalformedResponse(format!("Generated image is not valid base64: {}", e))
        })?;

    let path = output.unwrap_or_else(|| {
        let extension = image::guess_format(&bytes)
            .ok()
            .and_then(|format| format.extensions_str().first().copied())
            .unwrap_or("png");
        PathBuf::from(format!("generated_{}.{}", Uuid::new_v4(), extension))
    });

    std::fs::write(&path, &bytes)?;
    Ok(path)
}

async fn run(generator: &Generator, command: Command) -> competitor_shot::Result<()> {
    match command {
        Command::Analyze { image } => {
            let prompt = generator.analyze(&read_image_base64(&image)?).await?;
            println!("{}", prompt.trim());
        }
        Command::Recognize { image, mode } => {
            let product_info = generator
                .recognize_product(&read_image_base64(&image)?, mode)
                .await?;
            println!("{}", product_info.trim());
        }
        Command::Fuse { analysis, product } => {
            let fused = generator.fuse_prompt(&analysis, &product).await?;
            println!("{}", fused.trim());
        }
        Command::Generate {
            prompt,
            reference,
            aspect_ratio,
            resolution,
            output,
        } => {
            let mut request = GenerateRequest::new(prompt)
                .with_aspect_ratio(Some(aspect_ratio))
                .with_resolution(Some(resolution));
            if let Some(path) = reference {
                request = request.with_reference_image(read_image_base64(&path)?);
            }

            let data = generator.generate(request).await?;
            let path = write_generated_image(&data, output)?;
            info!("Saved generated image to {}", path.display());
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn exit_code(err: &Error) -> i32 {
    if err.is_retryable() {
        2
    } else {
        1
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "competitor_shot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    let generator = Generator::from_config(&config);

    match run(&generator, args.command).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if e.is_retryable() {
                warn!("{} ({})", e, e.kind());
            } else {
                error!("{} ({})", e, e.kind());
            }
            std::process::exit(exit_code(&e));
        }
    }
}
