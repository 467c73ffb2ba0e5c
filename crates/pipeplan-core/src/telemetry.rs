//! Tracing setup shared by the pipeplan binaries.
//!
//! Without `RUST_LOG`, only pipeplan's own crates log at the requested
//! level; dependencies are held at `warn`. Output always goes to stderr so
//! plans and reports printed on stdout stay machine-readable.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Log targets scoped to the requested level by default.
pub const PIPEPLAN_TARGETS: &[&str] = &["pipeplan_core", "pipeplan_exec", "pipeplan"];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(PIPEPLAN_TARGETS.iter().map(|t| format!("{}={}", t, level)))
        .collect::<Vec<_>>()
        .join(",")
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Install the global subscriber. Only the first call in a process has an
/// effect.
///
/// JSON lines keep the event target so aggregated logs can be split by
/// crate; the human format drops it.
pub fn init_tracing(json: bool, level: Level) {
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(json);
    let layer = if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(layer)
        .try_init()
        .ok();
}
