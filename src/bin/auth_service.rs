use api_gateway::services::auth::{router, AuthState};
use api_gateway::services::run_service;
use clap::Parser;
use std::net::SocketAddr;

/// Simple auth service: a user directory behind the API gateway.
#[derive(Debug, Parser)]
#[command(name = "auth-service", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    run_service("Auth service", args.bind, &args.log_level, router(AuthState::in_memory())).await
}
