//! tesseract-capi - Recognize text in an image through the Tesseract C API
//!
//! Fetches an image (or takes a local file), prepares it for the engine and
//! prints the recognized text.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tesseract_capi::config::{self, AppConfig};
use tesseract_capi::engine::{Engine, EngineError, EngineOptions};
use tesseract_capi::source::{self, FetchOptions, ImageSource};
use tesseract_capi::vision::{VisionConfig, VisionPipeline, VisionResult, MAX_WIDTH};

/// tesseract-capi - Tesseract OCR through the C API
#[derive(Parser, Debug)]
#[command(name = "tesseract-capi")]
#[command(about = "Recognize text in an image with the Tesseract C API")]
struct Args {
    /// The target language (e.g. "eng", "chi_sim")
    #[arg(short, long)]
    lang: Option<String>,

    /// Directory holding the tesseract library (repeatable)
    #[arg(short = 'b', long = "lib-path")]
    lib_path: Vec<PathBuf>,

    /// Folder containing the language packs
    #[arg(short = 'd', long = "tessdata-folder")]
    tessdata: Option<PathBuf>,

    /// URL of the image to recognize
    #[arg(short = 'i', long = "image-url", conflicts_with = "image_file")]
    image_url: Option<String>,

    /// Local image file to recognize (read by the engine directly)
    #[arg(short = 'f', long = "image-file")]
    image_file: Option<PathBuf>,

    /// Images narrower than this are resized to it before recognition [default: 150]
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=MAX_WIDTH as i64))]
    min_width: Option<u32>,

    /// Library base name
    #[arg(long)]
    library_name: Option<String>,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Download timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Run parameters after merging flags and config file
#[derive(Debug)]
struct Invocation {
    engine: EngineOptions,
    vision: VisionConfig,
    fetch: FetchOptions,
    source: ImageSource,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match load_or_create_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let invocation = match resolve(args, config) {
        Ok(invocation) => invocation,
        Err(e) => e.exit(),
    };

    match run(invocation) {
        Ok(result) => {
            info!("Recognized in {} ms", result.processing_time_ms);
            println!("Result: {}", result.text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Logs go to stderr; stdout only carries the result
fn init_logging(verbose: bool) {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {}", e);
    }
}

/// Load configuration from file or create default
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_path) = config::default_config_path() {
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring {:?}: {:#}", config_path, e),
            }
        }
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

/// Merge flags over the config file; missing essentials are usage errors
fn resolve(args: Args, config: AppConfig) -> std::result::Result<Invocation, clap::Error> {
    let mut cmd = Args::command();
    let mut missing = |what: &str| {
        cmd.error(ErrorKind::MissingRequiredArgument, format!("{} not given", what))
    };

    let mut engine = config.engine;
    if let Some(name) = args.library_name {
        engine.library_name = name;
    }
    if !args.lib_path.is_empty() {
        engine.search_paths = args.lib_path;
    }

    let language = match args.lang.or(engine.language.take()) {
        Some(language) => language,
        None => return Err(missing("lang")),
    };
    if engine.search_paths.is_empty() {
        return Err(missing("lib-path"));
    }
    let tessdata = match args.tessdata.or(engine.tessdata.take()) {
        Some(tessdata) => tessdata,
        None => return Err(missing("tessdata")),
    };
    let source = match (args.image_url, args.image_file) {
        (Some(url), _) => ImageSource::Url(url),
        (None, Some(path)) => ImageSource::File(path),
        (None, None) => return Err(missing("image-url")),
    };

    let mut fetch = config.fetch.fetch_options();
    if let Some(secs) = args.timeout {
        fetch.timeout = Duration::from_secs(secs);
    }

    let mut vision = config.image.vision_config();
    if let Some(min_width) = args.min_width {
        vision.min_width = min_width;
    }

    Ok(Invocation {
        engine: EngineOptions {
            search: engine.library_search(),
            language,
            tessdata,
        },
        vision,
        fetch,
        source,
    })
}

fn run(invocation: Invocation) -> Result<VisionResult> {
    let engine = Engine::open(&invocation.engine)?;
    let mut pipeline = VisionPipeline::new(engine, invocation.vision);

    let result = match &invocation.source {
        ImageSource::File(path) => pipeline.process_file(path)?,
        ImageSource::Url(url) => {
            let image = source::fetch_image(url, &invocation.fetch)?;
            pipeline.process_image(&image)?
        }
    };

    pipeline.shutdown();
    Ok(result)
}

/// Distinct codes for each fatal engine error, 1 for everything else
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<EngineError>()
        .map(|e| e.exit_code())
        .unwrap_or(1) as u8
}
