//! # Simulation Configuration
//!
//! Layered configuration for simulation binaries built on `des-actors`.
//!
//! ## Features
//!
//! - **Kernel settings**: mailbox, scheduler and timeout configuration
//! - **Logging settings**: level or full filter directive, JSON output
//! - **Model section**: any `serde` type, supplied by the model crate
//!
//! ## Usage
//!
//! ```rust,no_run
//! use des_config::SimulationConfig;
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Deserialize)]
//! struct Model {
//!     seed: u64,
//! }
//!
//! let config: SimulationConfig<Model> =
//!     SimulationConfig::load(Path::new("config/mm1.toml"), Some("ci")).unwrap();
//! println!("seed = {}", config.model.seed);
//! ```

pub mod defaults;
pub mod simulation;

pub use simulation::{expand_path, ConfigLoader, LoggingConfig, SimulationConfig};
