//! omni-callback: Main Binary
//!
//! Answers Twilio voice calls with a hang-up and sends the caller a
//! WhatsApp template through OmniChat.
//!
//! Usage:
//!   omni-callback                  - Start the webhook server
//!   omni-callback --config <path>  - Start with a TOML config file
//!   omni-callback --help           - Show help

use std::sync::Arc;

use oc_core::Config;
use oc_voice::{CallWorkflow, SignatureValidator, WebhookState};
use tracing_subscriber::EnvFilter;

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Webhook server, optionally with an explicit config file
    Server { config_path: Option<String> },
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let mode = parse_args(std::env::args().skip(1))?;

    let config_path = match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("omni-callback {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server { config_path } => config_path,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse()?)
        )
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = match &config_path {
        Some(path) => Config::from_toml_file(path),
        None => Config::load(),
    }
    .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting omni-callback...");
    tracing::info!("OmniChat endpoint: {}", config.omni.base_url);

    run_server(config).await
}

/// Parse command line arguments
fn parse_args<I>(args: I) -> anyhow::Result<RunMode>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut config_path = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("{} requires a path", arg))?;
                config_path = Some(path);
            }
            other => anyhow::bail!("Unknown argument: {} (see --help)", other),
        }
    }

    Ok(RunMode::Server { config_path })
}

/// Print help message
fn print_help() {
    println!("omni-callback - Missed-call to WhatsApp callback");
    println!();
    println!("Usage:");
    println!("  omni-callback                   Start the webhook server");
    println!("  omni-callback --config <path>   Load settings from a TOML file");
    println!("  omni-callback --help            Show this help message");
    println!("  omni-callback --version         Show version");
    println!();
    println!("Environment Variables:");
    println!("  PORT                       Webhook port (default: 3000)");
    println!("  OMNI_USERNAME              OmniChat username (required)");
    println!("  OMNI_PASSWORD              OmniChat password (required)");
    println!("  OMNI_APP_NAME              Calling application name (required)");
    println!("  OMNI_API_ACCOUNT_ID        OmniChat account id (required)");
    println!("  OMNI_TEMPLATE_ID           Template to send (required)");
    println!("  OMNI_BASE_URL              API endpoint (default: https://api.omnichat.co.uk)");
    println!("  OMNI_TIMEOUT_SECS          Request timeout (default: 30)");
    println!("  TWILIO_AUTH_TOKEN          Twilio auth token");
    println!("  TWILIO_VALIDATE_SIGNATURE  Verify X-Twilio-Signature (default: false)");
    println!("  TWILIO_WEBHOOK_URL         Public webhook URL used for signatures");
    println!("  RUST_LOG                   Log filter (default: info)");
}

/// Run the webhook server until Ctrl+C
async fn run_server(config: Config) -> anyhow::Result<()> {
    let workflow = CallWorkflow::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create OmniChat client: {}", e))?;

    let validator = SignatureValidator::from_config(&config.twilio)
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;
    if validator.is_some() {
        tracing::info!("Twilio signature validation enabled");
    } else {
        tracing::info!("Twilio signature validation disabled");
    }

    let state = WebhookState::new(Arc::new(workflow), validator);

    tracing::info!("Press Ctrl+C to exit");

    oc_voice::start_server(state, config.server.port, shutdown_signal()).await?;

    tracing::info!("omni-callback stopped");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        return;
    }
    tracing::info!("Shutting down...");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_default() {
        let mode = parse_args(args(&[])).unwrap();
        assert_eq!(mode, RunMode::Server { config_path: None });
    }

    #[test]
    fn test_parse_args_help_and_version() {
        assert_eq!(parse_args(args(&["--help"])).unwrap(), RunMode::Help);
        assert_eq!(parse_args(args(&["-h"])).unwrap(), RunMode::Help);
        assert_eq!(parse_args(args(&["--version"])).unwrap(), RunMode::Version);
        assert_eq!(parse_args(args(&["-v"])).unwrap(), RunMode::Version);
    }

    #[test]
    fn test_parse_args_config_path() {
        let mode = parse_args(args(&["--config", "/etc/omni-callback.toml"])).unwrap();
        assert_eq!(
            mode,
            RunMode::Server {
                config_path: Some("/etc/omni-callback.toml".to_string())
            }
        );

        let mode = parse_args(args(&["-c", "local.toml"])).unwrap();
        assert_eq!(
            mode,
            RunMode::Server {
                config_path: Some("local.toml".to_string())
            }
        );
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(args(&["--config"])).is_err());
        assert!(parse_args(args(&["--cli"])).is_err());
    }
}
