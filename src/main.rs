//! mcp-weather CLI
//!
//! Ask a local MCP weather server a question, or call its weather tool
//! directly for a city.

use std::path::PathBuf;

use clap::{CommandFactory, Parser};

use mcp_weather_client::config::resolve_config;
use mcp_weather_client::logging::init_tracing;
use mcp_weather_client::McpClient;

#[derive(Parser)]
#[command(name = "mcp-weather")]
#[command(about = "Query weather through a local MCP server")]
#[command(version)]
struct Cli {
    /// Weather question to ask
    #[arg(short, long)]
    query: Option<String>,

    /// Show detailed logs
    #[arg(short, long)]
    verbose: bool,

    /// Request timeout in seconds (default 30, or the config file value)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Call the weather tool directly instead of holding a conversation
    #[arg(short, long)]
    direct: bool,

    /// City name; implies --direct
    #[arg(short, long)]
    city: Option<String>,

    /// Config file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "MCP_WEATHER_LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();

    if let Some(city) = cli.city.take() {
        cli.query = Some(city);
        cli.direct = true;
    }

    let Some(query) = cli.query.take() else {
        Cli::command().print_help()?;
        println!();
        std::process::exit(1);
    };

    init_tracing(cli.verbose, cli.log_file.as_deref())?;

    let mut config = resolve_config(cli.config.as_deref())?;
    if let Some(secs) = cli.timeout {
        config.request_timeout_secs = secs;
    }
    config.validate()?;

    tracing::debug!(
        server = %config.server.display_command(),
        timeout_secs = config.request_timeout_secs,
        direct = cli.direct,
        "configuration resolved"
    );

    let mut client = McpClient::new(config);

    let result = if cli.direct {
        client.direct_query_weather(&query).await
    } else {
        client.query_weather(&query).await
    };

    println!("{result}");
    Ok(())
}
