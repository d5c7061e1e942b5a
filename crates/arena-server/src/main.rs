//! Arena server binary.
//!
//! # Usage
//!
//! ```bash
//! # Five members race into a two-seat room
//! arena-server
//!
//! # Larger drill with verbose admission logs
//! arena-server --contenders 20 --capacity 6 --log-level debug
//! ```

use arena_server::{CoordinatorConfig, DrillConfig, Server, ServerRuntimeConfig};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Arena room membership server
#[derive(Parser, Debug)]
#[command(name = "arena-server")]
#[command(about = "Arena competition room membership coordinator")]
#[command(version)]
struct Args {
    /// Members racing to join the drill room
    #[arg(long, default_value = "5")]
    contenders: usize,

    /// Drill room capacity (2, 4 or 6)
    #[arg(long, default_value = "2")]
    capacity: u8,

    /// Attempts per join when storage reports a transient conflict
    #[arg(long, default_value = "3")]
    max_admission_attempts: u32,

    /// Invite codes drawn before room creation gives up
    #[arg(long, default_value = "8")]
    invite_code_attempts: u32,

    /// Rankers shown on the leaderboard
    #[arg(long, default_value = "5")]
    leaderboard_size: usize,

    /// Events buffered per room channel
    #[arg(long, default_value = "64")]
    channel_capacity: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Arena server starting");

    let config = ServerRuntimeConfig {
        coordinator: CoordinatorConfig {
            max_admission_attempts: args.max_admission_attempts,
            invite_code_attempts: args.invite_code_attempts,
        },
        leaderboard_size: args.leaderboard_size,
        channel_capacity: args.channel_capacity,
        drill: DrillConfig { contenders: args.contenders, capacity: args.capacity },
    };

    let server = Server::new(config)?;
    let report = server.run_drill().await?;

    tracing::info!(
        admitted = report.admitted,
        rejected = report.rejected_full + report.rejected_other,
        "Arena server done"
    );

    Ok(())
}
