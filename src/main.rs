use anyhow::Result;
use clap::{Parser, ValueEnum};
use cloud_run_image::action::{self, ActionInputs, IMAGE_OUTPUT};
use cloud_run_image::config::Environment;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Print the container image a Cloud Run service is running
#[derive(Parser, Debug)]
#[command(name = "cloud-run-image", version = cloud_run_image::VERSION, about, long_about = None)]
struct Args {
    /// Region the service is deployed in
    #[arg(short, long, env = "INPUT_REGION", default_value = "")]
    region: String,

    /// Name of the Cloud Run service
    #[arg(short, long, env = "INPUT_NAME", default_value = "")]
    name: String,

    /// GCP project to use
    #[arg(short, long, env = "INPUT_PROJECT_ID")]
    project_id: Option<String>,

    /// Service account key, raw JSON or base64-encoded
    #[arg(long, env = "INPUT_CREDENTIALS", hide_env_values = true)]
    credentials: Option<String>,

    /// Override the Cloud Run API root
    #[arg(long, env = "CLOUD_RUN_ENDPOINT")]
    endpoint: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, env = "CLOUD_RUN_IMAGE_LOG_LEVEL", default_value = "info")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// Log to stderr; stdout carries workflow commands and outputs.
/// `RUST_LOG` overrides `--log-level` when set.
fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::default().add_directive(LevelFilter::from_level(level.to_tracing_level()?).into()),
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .init();

    tracing::debug!("cloud-run-image {} started with log level: {:?}", cloud_run_image::VERSION, level);

    Some(guard)
}

async fn run(args: &Args) -> Result<()> {
    let inputs = ActionInputs {
        region: args.region.clone(),
        name: args.name.clone(),
        project_id: args.project_id.clone(),
        credentials: args.credentials.clone(),
        endpoint: args.endpoint.clone(),
    };

    let image = action::run(&inputs, &Environment::from_process()).await?;
    action::set_output(IMAGE_OUTPUT, image.as_deref().unwrap_or_default())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_guard = setup_logging(args.log_level);

    let result = run(&args).await;
    if let Err(err) = &result {
        tracing::error!("{:#}", err);
    }
    // Flush pending log lines before the final status goes to stdout
    drop(log_guard);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            println!("{}", action::error_command(&err));
            ExitCode::FAILURE
        }
    }
}
