use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Picks the effective level: `-v` flags win over the configured level.
pub fn resolve_level(verbosity: u8, configured: Option<&str>) -> Level {
    match verbosity {
        0 => configured
            .and_then(|lvl| lvl.parse::<Level>().ok())
            .unwrap_or(Level::INFO),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

pub fn setup_trace_logging(level: Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_overrides_config() {
        assert_eq!(resolve_level(0, None), Level::INFO);
        assert_eq!(resolve_level(0, Some("warn")), Level::WARN);
        assert_eq!(resolve_level(0, Some("nonsense")), Level::INFO);
        assert_eq!(resolve_level(1, Some("warn")), Level::DEBUG);
        assert_eq!(resolve_level(3, None), Level::TRACE);
    }
}
