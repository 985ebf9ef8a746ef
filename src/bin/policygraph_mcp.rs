use policygraph::mcp::run_server;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the MCP protocol
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("policygraph=warn".parse()?)
                .add_directive("policygraph::mcp=info".parse()?),
        )
        .init();

    run_server().await
}
