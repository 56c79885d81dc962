//! Configuration defaults
//!
//! Constants shared by the loader and the simulation binaries.

/// Environment variable prefix, as in `DES__MODEL__SEED=42`
pub const ENV_PREFIX: &str = "DES";

/// Separator between prefix and nested keys in environment variables
pub const ENV_SEPARATOR: &str = "__";

/// Overlay directory, relative to the base config file
pub const ENVIRONMENTS_DIR: &str = "environments";

/// Logging defaults
pub mod logging {
    /// Default `EnvFilter` level
    pub const LEVEL: &str = "info";
}

/// Shipped config files
pub mod files {
    /// Base config of the M/M/1 model
    pub const MM1: &str = "config/mm1.toml";
}
