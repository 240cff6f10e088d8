use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Installs the global subscriber. Diagnostics go to stderr; stdout is
/// reserved for the report.
pub fn init(level: Level) -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
