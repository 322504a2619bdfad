//! # VectorMate Replay
//!
//! Replays a scripted editor session and prints the engine call log.

use std::io::Write;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vectormate_replay::{resolve_options, CliArgs, ReplayConfig, ReplayRunner, ReplayScript};

/// Initialize tracing on stderr.
///
/// Set `RUST_LOG_FORMAT=json` for JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vectormate_replay=debug,vectormate_core=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ReplayConfig::from(CliArgs::parse());
    tracing::info!("Replaying {} (engine: {:?})", config.script.display(), config.engine);

    let script = ReplayScript::load(&config.script)?;
    let options = resolve_options(&config, &script)?;

    let mut runner = ReplayRunner::new(&config, options);
    runner.run(&script).await;
    runner.run_frames(config.trailing_frames);
    let report = runner.finish();

    tracing::info!(
        "Replay finished: {} steps, {} engine calls, {} frames, {} rejected",
        script.steps.len(),
        report.calls.len(),
        report.status.frames,
        report.rejected.len()
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if config.full_report {
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        for call in &report.calls {
            serde_json::to_writer(&mut out, call)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
