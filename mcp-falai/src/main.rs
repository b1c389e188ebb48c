//! fal.ai MCP Server
//!
//! MCP server for image generation, upscaling and inpainting using fal.ai.

use anyhow::Result;
use clap::Parser;
use mcp_falai::FalServer;
use mcp_falai_common::{Config, McpServerBuilder, TransportArgs};

/// Command-line arguments for the fal.ai server.
#[derive(Parser, Debug)]
#[command(name = "mcp-falai")]
#[command(about = "MCP server for image generation, upscaling and inpainting using fal.ai")]
struct Args {
    /// Transport configuration
    #[command(flatten)]
    transport: TransportArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    mcp_falai_common::tracing::init_tracing();

    tracing::info!("mcp-falai server starting...");

    let args = Args::parse();

    // A missing API key is fatal before anything is served
    let config = Config::from_env()?;
    tracing::info!(
        api_base = %config.api_base,
        timeout_secs = config.timeout_secs,
        embed_images = config.embed_images,
        "Configuration loaded"
    );

    let server = FalServer::new(config)?;

    let transport = args.transport.into_transport();
    tracing::info!(transport = %transport, "Starting MCP server");

    McpServerBuilder::new(server)
        .with_transport(transport)
        .run()
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
