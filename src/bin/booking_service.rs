use api_gateway::services::booking::{router, BookingState};
use api_gateway::services::run_service;
use clap::Parser;
use std::net::SocketAddr;

/// Booking service: flight reservations behind the API gateway.
#[derive(Debug, Parser)]
#[command(name = "booking-service", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8001")]
    bind: SocketAddr,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    run_service(
        "Booking service",
        args.bind,
        &args.log_level,
        router(BookingState::in_memory()),
    )
    .await
}
