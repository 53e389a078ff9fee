use anyhow::Context;
use clap::{Parser, Subcommand};
use komoditas_core::generator::{fallback_assessment, fallback_predictions, DEFAULT_HORIZON_DAYS};
use komoditas_core::{Generated, RecommendationGenerator};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod input;

const OFFLINE_REASON: &str = "offline mode";

#[derive(Debug, Parser)]
#[command(name = "komoditas", about = "Commodity price commentary from the command line")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Skip the model and print the deterministic heuristic result.
    #[arg(long, global = true)]
    offline: bool,

    /// Exit with an error when the result is a fallback rather than model output.
    #[arg(long, global = true, conflicts_with = "offline")]
    require_ai: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Buy/sell/hold recommendations for a list of observations.
    Recommend {
        /// JSON file with observations (`-` for stdin).
        #[arg(long)]
        input: PathBuf,
    },
    /// Price predictions over a horizon of days.
    Predict {
        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value_t = DEFAULT_HORIZON_DAYS, value_parser = clap::value_parser!(u32).range(1..))]
        days: u32,
    },
    /// Pull commodity prices out of free text (news, chat messages, ...).
    Extract {
        /// Text file (`-` for stdin).
        #[arg(long)]
        input: PathBuf,

        /// Location to attribute prices to. Defaults to DEFAULT_LOCATION.
        #[arg(long)]
        location: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = komoditas_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let generator = if args.offline {
        None
    } else {
        match RecommendationGenerator::from_settings(&settings) {
            Ok(generator) => Some(generator),
            Err(e) => {
                let err = anyhow::Error::new(e).context("use --offline to run without the model");
                sentry_anyhow::capture_anyhow(&err);
                return Err(err);
            }
        }
    };

    let fallback_used = match args.command {
        Command::Recommend { input } => {
            let observations = input::load_observations(&input)?;
            let result = match &generator {
                Some(g) => g.generate_recommendations(&observations).await,
                None => Generated::fallback(fallback_assessment(&observations), OFFLINE_REASON),
            };
            print_json(&result)?
        }
        Command::Predict { input, days } => {
            let observations = input::load_observations(&input)?;
            let result = match &generator {
                Some(g) => g.generate_price_predictions(&observations, days).await,
                None => Generated::fallback(fallback_predictions(&observations), OFFLINE_REASON),
            };
            print_json(&result)?
        }
        Command::Extract { input, location } => {
            let text = input::read_input(&input)?;
            let result = match &generator {
                Some(g) => g.extract_observations(&text, location.as_deref()).await,
                None => Generated::fallback(Vec::new(), OFFLINE_REASON),
            };
            print_json(&result)?
        }
    };

    if args.require_ai && fallback_used {
        anyhow::bail!("model output unavailable; printed fallback result");
    }
    Ok(())
}

/// Prints the result to stdout and reports whether it was a fallback.
fn print_json<T: Serialize>(result: &Generated<T>) -> anyhow::Result<bool> {
    let out = serde_json::to_string_pretty(result).context("failed to serialize result")?;
    println!("{out}");

    if let Some(reason) = result.fallback_reason() {
        tracing::warn!(%reason, "printed fallback result");
    }
    Ok(result.is_fallback())
}

fn init_sentry(settings: &komoditas_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
