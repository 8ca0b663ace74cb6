//! Vantage session runner
//!
//! Loads a JSON session (layer, handler, content and a timeline of input
//! events) and replays it through a draw layer, logging the camera as it
//! moves.

mod session;

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use session::{Session, SessionConfig};

/// Vantage - replay interaction sessions against a draw layer
#[derive(Parser, Debug)]
#[command(name = "vantage")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the session JSON file
    #[arg(short, long)]
    session: PathBuf,

    /// Frames per second the layer clock is stepped at
    #[arg(short, long, default_value_t = 60.0)]
    frame_rate: f64,
}

fn init_tracing() {
    #[cfg(feature = "tracy")]
    {
        use tracing_subscriber::Layer;
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;
        tracing_subscriber::registry()
            .with(tracing_tracy::TracyLayer::default())
            .with(
                tracing_subscriber::fmt::layer().with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "info".into()),
                ),
            )
            .init();
    }

    #[cfg(not(feature = "tracy"))]
    {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    info!(session = %args.session.display(), frame_rate = args.frame_rate, "loading session");
    let config = SessionConfig::load(&args.session)?;
    let mut session = Session::new(&config)?;
    let report = session.replay(args.frame_rate)?;

    println!(
        "{} events ({} consumed) over {} frames",
        report.events, report.consumed, report.frames
    );
    println!("final cam_from_world: {:?}", report.cam_from_world.to_cols_array_2d());
    Ok(())
}
