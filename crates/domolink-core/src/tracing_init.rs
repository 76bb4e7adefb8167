//! Tracing/logging initialization for hub hosts.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default directives covering all Domolink crates.
pub const DEFAULT_FILTER: &str = "domolink_core=info,domolink_client=info,domolink_hub=info";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies (see
/// [`DEFAULT_FILTER`]). With `log_json` the output is structured JSON
/// lines instead of the human-readable format.
///
/// Returns `false` when a global subscriber is already installed, in
/// which case this call changes nothing.
pub fn init_tracing(default_filter: &str, log_json: bool) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_init_wins_and_reinit_is_rejected() {
        assert!(init_tracing(DEFAULT_FILTER, false));
        // The global subscriber is already set; a second install (even
        // with different options) must be refused, not panic.
        assert!(!init_tracing(DEFAULT_FILTER, true));
    }
}
