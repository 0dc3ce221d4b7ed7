use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ratewarden::config::{LimiterConfig, StrategyConfig};
use ratewarden::ratelimit::{Clocked, Limiter, MonotonicClock, RateLimiter, TimeSource};

/// Replay a stream of messages from several users through a rate limiter.
#[derive(Debug, Parser)]
#[command(name = "ratewarden", version, about)]
struct Args {
    /// Strategy to use when no configuration file is given
    #[arg(long, value_enum, default_value_t = Strategy::SlidingWindow)]
    strategy: Strategy,

    /// Limiter configuration file (YAML, TOML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Messages per series
    #[arg(long, default_value_t = 10)]
    messages: u32,

    /// Number of distinct users
    #[arg(long, default_value_t = 5)]
    users: u32,

    /// Pause between the two series in seconds (defaults to 4 for the
    /// sliding window and 10 for the throttle)
    #[arg(long)]
    pause_secs: Option<f64>,

    /// Seed for the random delays between messages
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Strategy {
    SlidingWindow,
    Throttle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    anyhow::ensure!(args.users > 0, "--users must be greater than zero");

    let config = match &args.config {
        Some(path) => LimiterConfig::from_file(path)?,
        None => LimiterConfig {
            strategy: match args.strategy {
                Strategy::SlidingWindow => StrategyConfig::sliding_window(),
                Strategy::Throttle => StrategyConfig::throttle(),
            },
        },
    };

    let limiter = Clocked::new(Limiter::<String>::from_config(&config)?, MonotonicClock::new());
    let pause = args.pause_secs.unwrap_or(match config.strategy {
        StrategyConfig::SlidingWindow { .. } => 4.0,
        StrategyConfig::Throttle { .. } => 10.0,
    });
    anyhow::ensure!(
        pause.is_finite() && pause >= 0.0,
        "--pause-secs must be a non-negative number"
    );

    let mut rng = StdRng::seed_from_u64(args.seed);

    info!(strategy = limiter.limiter().strategy_name(), "Simulating message stream");
    run_series(&limiter, &mut rng, 1..=args.messages, args.users).await;

    info!(pause_secs = pause, "Waiting before the next series");
    tokio::time::sleep(Duration::from_secs_f64(pause)).await;

    info!("New message series after waiting");
    run_series(
        &limiter,
        &mut rng,
        args.messages + 1..=args.messages * 2,
        args.users,
    )
    .await;

    info!(
        tracked_users = limiter.limiter().tracked_keys(),
        "Simulation finished"
    );
    Ok(())
}

async fn run_series<C: TimeSource>(
    limiter: &Clocked<Limiter<String>, C>,
    rng: &mut StdRng,
    message_ids: std::ops::RangeInclusive<u32>,
    users: u32,
) {
    for message_id in message_ids {
        let user_id = (message_id % users + 1).to_string();

        if limiter.record_act(user_id.as_str()) {
            info!(message = message_id, user = %user_id, "Message accepted");
        } else {
            let wait = limiter.time_until_allowed(user_id.as_str());
            warn!(
                message = message_id,
                user = %user_id,
                retry_after = %format!("{:.1}s", wait),
                "Message rejected"
            );
        }

        let delay = rng.gen_range(0.1..=1.0);
        tokio::time::sleep(Duration::from_secs_f64(delay)).await;
    }
}
