use clap::Parser;
use miette::{IntoDiagnostic, Result};
use wayfinder_replay::{run, Cli, VERSION};

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .format_timestamp_millis()
        .init();

    log::debug!("wayfinder-replay {}", VERSION);
    let summary = run(&cli).into_diagnostic()?;
    log::info!(
        "Replayed {} step(s): {} record(s), {} focus gained, {} haptic pulse(s)",
        summary.steps,
        summary.records,
        summary.focus_gained,
        summary.haptic_pulses
    );
    Ok(())
}
