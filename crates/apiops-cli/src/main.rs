use std::path::PathBuf;
use std::process::ExitCode;

use apiops::config::settings::{
    ENV_API_VERSION, ENV_COMMIT_ID, ENV_CONFIGURATION_FILE, ENV_SERVICE_DIRECTORY, ENV_SERVICE_URL,
};
use apiops::config::DEFAULT_TOKEN_ENV_VAR;
use apiops::{cancel_pair, publish, PublisherSettings, RunOutcome, SecretSource};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Exit status when the run was interrupted (128 + SIGINT).
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// apiops-publish - apply an API Management artifact tree to a live service
#[derive(Parser, Debug)]
#[command(name = "apiops-publish")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Service URI [env: API_MANAGEMENT_SERVICE_URL]
    #[arg(long)]
    service_url: Option<String>,

    /// Artifact tree to publish [env: API_MANAGEMENT_SERVICE_OUTPUT_FOLDER_PATH]
    #[arg(long)]
    service_directory: Option<PathBuf>,

    /// Override document [env: CONFIGURATION_YAML_PATH]
    #[arg(long)]
    configuration_file: Option<PathBuf>,

    /// Publish only the files changed by this commit [env: COMMIT_ID]
    #[arg(long)]
    commit_id: Option<String>,

    /// Management API version [env: API_VERSION]
    #[arg(long)]
    api_version: Option<String>,

    /// Bearer token value
    #[arg(long)]
    token: Option<String>,

    /// File containing the bearer token
    #[arg(long)]
    token_file: Option<String>,

    /// Environment variable containing the bearer token
    #[arg(long, default_value = DEFAULT_TOKEN_ENV_VAR)]
    token_env: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

impl Cli {
    /// The command-line value standing in for an environment variable.
    fn flag(&self, env_var: &str) -> Option<String> {
        match env_var {
            ENV_SERVICE_URL => self.service_url.clone(),
            ENV_SERVICE_DIRECTORY => self
                .service_directory
                .as_ref()
                .map(|path| path.display().to_string()),
            ENV_CONFIGURATION_FILE => self
                .configuration_file
                .as_ref()
                .map(|path| path.display().to_string()),
            ENV_COMMIT_ID => self.commit_id.clone(),
            ENV_API_VERSION => self.api_version.clone(),
            _ => None,
        }
    }

    /// Flags take precedence over environment variables.
    fn settings(&self) -> Result<PublisherSettings, apiops::ConfigError> {
        let mut settings = PublisherSettings::from_lookup(|name| {
            self.flag(name).or_else(|| std::env::var(name).ok())
        })?;
        settings.token = SecretSource {
            value: self.token.clone(),
            file: self.token_file.clone(),
            env_var: Some(self.token_env.clone()),
        };
        Ok(settings)
    }
}

fn init_logging(format: LogFormat) {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to bridge log records: {}", e);
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with((format == LogFormat::Json).then(|| tracing_subscriber::fmt::layer().json()))
        .with((format == LogFormat::Text).then(|| tracing_subscriber::fmt::layer().with_target(false)));

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install tracing subscriber: {}", e);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    info!("Starting apiops-publish v{}", env!("CARGO_PKG_VERSION"));

    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after in-flight requests");
            handle.cancel();
        }
    });

    match publish(&settings, signal).await {
        Ok(RunOutcome::Completed) => ExitCode::SUCCESS,
        Ok(RunOutcome::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
        Err(e) => {
            error!("Publish failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "apiops-publish",
            "--service-url",
            "https://example.test/service/apim",
            "--service-directory",
            "/artifacts",
            "--commit-id",
            "abc123",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.token_env, DEFAULT_TOKEN_ENV_VAR);
        assert_eq!(cli.flag(ENV_COMMIT_ID).as_deref(), Some("abc123"));
        assert_eq!(cli.flag(ENV_SERVICE_DIRECTORY).as_deref(), Some("/artifacts"));
    }

    #[test]
    fn test_flags_build_settings() {
        let cli = Cli::try_parse_from([
            "apiops-publish",
            "--service-url",
            "https://example.test/service/apim",
            "--service-directory",
            "/artifacts",
            "--api-version",
            "2023-03-01-preview",
            "--token-file",
            "/run/secrets/token",
        ])
        .unwrap();

        let settings = cli.settings().unwrap();
        assert_eq!(settings.service_url, "https://example.test/service/apim");
        assert_eq!(settings.api_version, "2023-03-01-preview");
        assert_eq!(settings.token.file.as_deref(), Some("/run/secrets/token"));
    }
}
