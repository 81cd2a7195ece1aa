use clap::Parser;
use settle_server::{ServerOptions, Store};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "settle-server", about = "In-memory fake of the key-manager and networking APIs")]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 9311)]
    port: u16,

    /// Base URL used in returned resource references.
    #[arg(long)]
    public_url: Option<String>,

    /// Reads a new secret or container answers PENDING before turning ACTIVE.
    #[arg(long, default_value_t = 1)]
    pending_reads: u32,

    /// DELETEs of an IPSec policy answered with 409 before it is removed.
    #[arg(long, default_value_t = 0)]
    ipsec_delete_conflicts: u32,

    /// Reads a deleted port forwarding answers DOWN before 404.
    #[arg(long, default_value_t = 1)]
    port_forwarding_down_reads: u32,

    /// Require this value in X-Auth-Token.
    #[arg(long)]
    auth_token: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let addr = format!("0.0.0.0:{}", cli.port);
    let public_url = cli
        .public_url
        .unwrap_or_else(|| format!("http://localhost:{}", cli.port));
    let options = ServerOptions {
        pending_reads: cli.pending_reads,
        ipsec_delete_conflicts: cli.ipsec_delete_conflicts,
        port_forwarding_down_reads: cli.port_forwarding_down_reads,
        auth_token: cli.auth_token,
    };
    info!("starting settle-server on {addr}");
    info!("resource references use {public_url}");

    let store = Store::new(public_url, options);
    if let Err(e) = settle_server::run_server(&store, &addr) {
        error!("server failed: {e}");
        std::process::exit(1);
    }
}
