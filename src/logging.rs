//! Logging setup.
//!
//! The library only emits through the `log` facade. Embedders that want the
//! output on stderr call [`init`] once; `RUST_LOG` overrides the level.

use log::LevelFilter;

/// Install an `env_logger` with `level` as the default filter.
///
/// Returns `false` if a logger was already installed.
pub fn init(level: LevelFilter) -> bool {
    let default_filter = level.to_string().to_lowercase();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .try_init()
        .is_ok()
}
