use clap::Parser;
use devmesh_mcp_server::config::ServerConfig;
use devmesh_mcp_server::store::Stores;
use devmesh_mcp_server::{logging, Server};

#[derive(Parser, Debug)]
#[command(name = "devmesh-mcp-server", version, about = "Multi-tenant MCP protocol server")]
struct Cli {
    /// Path to a config file layered over the built-in defaults.
    #[arg(long)]
    config: Option<String>,

    /// Pepper mixed into every credential hash before the key-store lookup.
    #[arg(long, env = "DEVMESH_MCP_CREDENTIAL_SALT", default_value = "")]
    credential_salt: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::load(cli.config.as_deref())?;
    logging::init(&config.logging);

    tracing::info!(listen_addr = %config.listen_addr, "starting devmesh-mcp-server");

    let server = Server::new(config, Stores::in_memory(), cli.credential_salt);
    server.run().await?;
    Ok(())
}
