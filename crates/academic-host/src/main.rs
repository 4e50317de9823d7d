//! Academic host binary: initializes the database at process start and
//! holds it until SIGTERM/SIGINT.

use academic_host::config;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (String, &'static str) {
    if let Ok(path) = std::env::var("ACADEMIC_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (path, "env-var");
        }
    }

    ("config.toml".to_string(), "default")
}

#[tokio::main]
async fn main() -> ExitCode {
    let (config_path, config_source) = resolve_config_path();

    let config = match config::load_config(Some(config_path.as_str())) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration from {config_path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = %config_path,
        mode = %config.deployment_mode(),
        "resolved startup configuration"
    );

    match academic_host::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "academic host failed");
            ExitCode::FAILURE
        }
    }
}
