//! Log setup for the command line binary
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to whoever embeds it.

use tracing_subscriber::EnvFilter;

/// Pick a filter level from the CLI flags, falling back to the configured one.
pub fn level_for(verbose: u8, quiet: bool, configured: &str) -> String {
    if quiet {
        return "error".to_string();
    }
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install a stderr subscriber. `RUST_LOG` overrides `level`.
///
/// Returns false if a subscriber was already installed.
pub fn init(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for() {
        assert_eq!(level_for(0, false, "warn"), "warn");
        assert_eq!(level_for(1, false, "warn"), "debug");
        assert_eq!(level_for(3, false, "warn"), "trace");
        assert_eq!(level_for(2, true, "info"), "error");
    }

    #[test]
    fn test_init_twice() {
        init("info");
        assert!(!init("debug"));
    }
}
