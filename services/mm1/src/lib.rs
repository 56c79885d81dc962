//! M/M/1 Queueing Model
//!
//! A single-server queue with exponential inter-arrival and service times,
//! expressed as four actors on the simulation kernel:
//!
//! ```text
//!  arrivals ──entity──▶ queue ──entity──▶ server
//!                         ▲                 │
//!                         └──server-ready───┘
//!        queue-depth / wait-time / service-time ──▶ stats
//! ```
//!
//! The generator schedules every arrival up front; the server schedules its
//! own completion. With fixed seeds a run is fully reproducible.
//!
//! ```no_run
//! use des_actors::KernelConfig;
//! use mm1::{simulate, Mm1Settings};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let outcome = simulate(&Mm1Settings::default(), KernelConfig::default()).await?;
//! println!("mean wait {:.3}", outcome.summary.mean_wait);
//! # Ok(())
//! # }
//! ```

pub mod generator;
pub mod messages;
pub mod model;
pub mod queue;
pub mod random;
pub mod server;
pub mod settings;
pub mod stats;

pub use generator::ArrivalGenerator;
pub use model::{simulate, Mm1Model, Mm1Outcome};
pub use queue::FifoQueue;
pub use random::Exponential;
pub use server::Server;
pub use settings::Mm1Settings;
pub use stats::{Mm1Summary, StatsCollector, SummarySlot};

/// Configuration file shape for the `mm1` binary
pub type Mm1Config = des_config::SimulationConfig<Mm1Settings>;
