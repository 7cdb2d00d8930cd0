//! CLI administration tool for telehealth-gateway.
//!
//! Inspects and resets rate-limit counters in the shared Redis store
//! without going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Show the general limiter counter for a client IP
//! cargo run --bin admin -- ratelimit show 203.0.113.7
//!
//! # Show the login limiter counter for the same client
//! cargo run --bin admin -- ratelimit show 203.0.113.7 --prefix rl:auth
//!
//! # Reset a locked-out user (asks for confirmation)
//! cargo run --bin admin -- ratelimit reset email:jane@example.com --prefix rl:password-reset
//!
//! # Check Redis connection
//! cargo run --bin admin -- redis check
//! ```
//!
//! # Environment Variables
//!
//! - `REDIS_URL` or `REDIS_HOST`/`REDIS_PORT`/`REDIS_PASSWORD`/`REDIS_DB` (required)
//! - `RATE_LIMIT_PREFIX`: default prefix for `--prefix`

use telehealth_gateway::application::services::{
    RateLimitConfig, RateLimiter, StructuredLogger, TracingSink,
};
use telehealth_gateway::config::{Config, mask_connection_string};
use telehealth_gateway::infrastructure::counter_store::{CounterStore, RedisCounterStore};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use std::sync::Arc;

/// CLI tool for managing telehealth-gateway.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Inspect or reset rate-limit counters
    Ratelimit {
        #[command(subcommand)]
        action: RateLimitAction,
    },

    /// Redis operations
    Redis {
        #[command(subcommand)]
        action: RedisAction,
    },
}

/// Rate-limit subcommands.
#[derive(Subcommand)]
enum RateLimitAction {
    /// Show the current window for a client key
    Show {
        /// Client key (IP, `user:<id>` or `email:<address>`)
        key: String,

        /// Limiter prefix (defaults to `RATE_LIMIT_PREFIX`)
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Clear the counter for a client key
    Reset {
        /// Client key (IP, `user:<id>` or `email:<address>`)
        key: String,

        /// Limiter prefix (defaults to `RATE_LIMIT_PREFIX`)
        #[arg(short, long)]
        prefix: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Redis subcommands.
#[derive(Subcommand)]
enum RedisAction {
    /// Check Redis connection
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    let redis_url = config
        .redis_url
        .clone()
        .context("REDIS_URL or REDIS_HOST must be set")?;

    match cli.command {
        Commands::Ratelimit { action } => {
            let store = connect(&redis_url).await?;
            handle_ratelimit_action(action, &config, store).await?
        }
        Commands::Redis { action } => handle_redis_action(action, &redis_url).await?,
    }

    Ok(())
}

async fn connect(redis_url: &str) -> Result<Arc<dyn CounterStore>> {
    let store = RedisCounterStore::connect(redis_url)
        .await
        .context("Failed to connect to Redis")?;
    Ok(Arc::new(store))
}

/// Limiter over `store` whose keys use `prefix`.
fn limiter_for(config: &Config, prefix: Option<String>, store: Arc<dyn CounterStore>) -> RateLimiter {
    let prefix = prefix.unwrap_or_else(|| config.rate_limit_prefix.clone());
    let limit: RateLimitConfig = config.general_rate_limit().with_prefix(prefix);
    RateLimiter::new(limit, store, StructuredLogger::new(Arc::new(TracingSink), vec![]))
}

/// Dispatches rate-limit commands.
async fn handle_ratelimit_action(
    action: RateLimitAction,
    config: &Config,
    store: Arc<dyn CounterStore>,
) -> Result<()> {
    match action {
        RateLimitAction::Show { key, prefix } => {
            let limiter = limiter_for(config, prefix, store.clone());
            show_counter(&limiter, store, &key).await
        }
        RateLimitAction::Reset { key, prefix, yes } => {
            let limiter = limiter_for(config, prefix, store);
            reset_counter(&limiter, &key, yes).await
        }
    }
}

/// Displays hit count and time to reset for one key.
async fn show_counter(limiter: &RateLimiter, store: Arc<dyn CounterStore>, key: &str) -> Result<()> {
    let storage_key = limiter.storage_key(key);

    println!("{}", "📊 Rate limit window".bright_blue().bold());
    println!();
    println!("  Key:   {}", storage_key.cyan());

    let hit = store
        .get(&storage_key)
        .await
        .map_err(|e| anyhow::anyhow!("Redis error: {}", e))?;

    match hit {
        Some(hit) => {
            let limit = limiter.config().max_requests;
            let hits = if hit.total_hits > limit {
                hit.total_hits.to_string().red().bold()
            } else {
                hit.total_hits.to_string().bright_green().bold()
            };
            println!("  Hits:  {} / {}", hits, limit);
            println!(
                "  Reset: in {}s",
                hit.seconds_until_reset(Utc::now()).to_string().bright_white()
            );
        }
        None => println!("  {}", "No active window".bright_black()),
    }
    println!();

    Ok(())
}

/// Deletes the counter for one key.
///
/// # Safety
///
/// - Requires confirmation (default: No) unless `--yes` is given
async fn reset_counter(limiter: &RateLimiter, key: &str, yes: bool) -> Result<()> {
    let storage_key = limiter.storage_key(key);

    println!("{}", "🔓 Reset rate limit".bright_blue().bold());
    println!();
    println!("  Key: {}", storage_key.cyan());
    println!();

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt("Reset this counter?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    limiter
        .reset_key(key)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to reset counter: {}", e))?;

    println!("{}", "✅ Counter reset".green().bold());
    println!();

    Ok(())
}

/// Handles Redis diagnostic commands.
async fn handle_redis_action(action: RedisAction, redis_url: &str) -> Result<()> {
    match action {
        RedisAction::Check => {
            println!(
                "{} {}",
                "🔍 Checking Redis connection...".bright_blue(),
                mask_connection_string(redis_url).bright_black()
            );

            let store = connect(redis_url).await?;
            if !store.health_check().await {
                anyhow::bail!("Redis PING failed");
            }

            println!("{}", "✅ Redis connection OK".green().bold());
        }
    }

    Ok(())
}
