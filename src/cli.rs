//! Command-line interface definitions for the news backend.
//!
//! This module defines the CLI arguments and options using the `clap`
//! crate. API keys can be provided via command-line flags or environment
//! variables; the YAML config file supplies everything else.

use clap::Parser;

/// Command-line arguments for the newsdesk server.
///
/// # Examples
///
/// ```sh
/// # Defaults only, seeded with demo content
/// newsdesk --seed-demo
///
/// # With a config file and a news provider key
/// newsdesk -c ./config.yaml --news-api-key YOUR_KEY
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Bind address override
    #[arg(long)]
    pub bind_addr: Option<String>,

    /// Port override
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Primary news provider API key
    #[arg(long, env = "NEWS_API_KEY")]
    pub news_api_key: Option<String>,

    /// Weather provider API key (required by the open_weather provider)
    #[arg(long, env = "WEATHER_API_KEY")]
    pub weather_api_key: Option<String>,

    /// Seed demo categories and articles at startup
    #[arg(long)]
    pub seed_demo: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(&[
            "newsdesk",
            "--config",
            "./config.yaml",
            "--port",
            "8080",
            "--seed-demo",
        ]);

        assert_eq!(cli.config.as_deref(), Some("./config.yaml"));
        assert_eq!(cli.port, Some(8080));
        assert!(cli.seed_demo);
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(&["newsdesk"]);
        assert!(cli.config.is_none());
        assert!(cli.port.is_none());
        assert!(!cli.seed_demo);
    }
}
