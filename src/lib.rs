//! Proximatch realtime client - Main Library
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, settings,
//!   logging, runners, shutdown)
//! - **livesocket**: Realtime connection manager (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use proximatch_client::bin_common::{load_config_from_env, ClientSettings, ConfigType};
//! use proximatch_client::livesocket::ConnectionManager;
//! ```

// Re-export workspace libraries for convenience
pub use livesocket;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod logging;
    pub mod runner;
    pub mod settings;
    pub mod shutdown;

    pub use cli::{load_config_from_env, parse_args, CliArgs, CliError, ConfigType, USAGE};
    pub use logging::init_tracing;
    pub use runner::{BinaryRunner, RunConfig};
    pub use settings::{ClientSettings, ConfigError};
    pub use shutdown::ShutdownManager;
}
