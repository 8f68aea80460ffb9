//! Core infrastructure module for anomalyze.
//!
//! - [`types`]: shared type aliases and small enumerations
//! - [`constants`]: defaults and numeric constants
//! - [`error`]: the error taxonomy

pub mod constants;
pub mod error;
pub mod types;

pub use constants::*;
pub use error::{AnomalyzeError, Result};
pub use types::*;

use std::sync::Once;

static CORE_INIT: Once = Once::new();

/// Initialize the library: sets up the `env_logger` backend for the `log` facade.
///
/// Safe to call more than once; only the first call has an effect. `RUST_LOG`
/// defaults to `info` when it is not set.
pub fn initialize_core() -> Result<()> {
    CORE_INIT.call_once(|| {
        let env = env_logger::Env::default().default_filter_or("info");
        // Another logger may already be installed by the host application.
        let _ = env_logger::Builder::from_env(env).try_init();
        log::debug!("anomalyze {} initialized", ANOMALYZE_VERSION);
    });
    Ok(())
}

/// Check if the library has been initialized.
pub fn is_core_initialized() -> bool {
    CORE_INIT.is_completed()
}
