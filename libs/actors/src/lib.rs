//! Discrete-Event Simulation Actor Kernel
//!
//! Actors exchange timestamped messages through a single scheduler that
//! owns the simulation clock. Every interaction, including a same-tick
//! notification, is an event in the scheduler's time-ordered queue, so a
//! run is reproducible for a fixed input and seed.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐      ┌──────────────────────────┐
//! │          Scheduler           │      │        Actor tasks       │
//! │                              │      │                          │
//! │  clock T (sole writer)       │      │  ┌────────────────────┐  │
//! │  min-heap (time, seq)  ──────┼──────┼─▶│ Mailbox (FIFO)     │  │
//! │        ▲                     │ recv │  │   ▼                │  │
//! │        │ schedule_at /       │      │  │ ActorBehavior      │  │
//! │        │ schedule_after /    │      │  │   ::process        │  │
//! │        │ dispatch            │      │  └─────────┬──────────┘  │
//! └────────┼─────────────────────┘      └────────────┼─────────────┘
//!          └─────────────── ActorContext ────────────┘
//! ```
//!
//! The scheduler pops the earliest event, advances T, stamps the delivery
//! time, resolves the recipient through the `ActorRegistry` and, by
//! default, waits for the recipient to finish processing before popping
//! again.
//!
//! # Examples
//!
//! ```no_run
//! use async_trait::async_trait;
//! use des_actors::{ActorBehavior, ActorContext, ActorSystem, Message, Result, SimTime};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl ActorBehavior for Echo {
//!     async fn process(&mut self, msg: &Message, ctx: &ActorContext) -> Result<()> {
//!         if msg.message_type().as_str() == "ping" {
//!             ctx.request_shutdown("pinged");
//!         }
//!         Ok(())
//!     }
//! }
//!
//! # async fn demo() -> Result<()> {
//! let system = ActorSystem::new();
//! system.register_actor("echo", Echo).await?;
//! system
//!     .schedule_event(SimTime::new(1.0)?, Message::signal("ping", "driver", "echo"))
//!     .await?;
//! let report = system.run().await?;
//! assert_eq!(report.final_clock, SimTime::new(1.0)?);
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod config;
pub mod error;
pub mod event;
pub mod mailbox;
pub mod message;
pub mod registry;
pub mod scheduler;
pub mod shutdown;
pub mod system;
pub mod telemetry;
pub mod time;

pub use actor::{
    Accepts, ActorBehavior, ActorContext, ActorRef, ActorState, Disposition, SupervisorDirective,
};
pub use config::{DispatchMode, KernelConfig, SchedulerConfig};
pub use error::{KernelError, Result};
pub use event::{Event, EventId};
pub use mailbox::{BackpressurePolicy, Capacity, Delivery, Mailbox, MailboxConfig, MailboxReceiver};
pub use message::{Message, MessageType};
pub use registry::{ActorId, ActorRegistry};
pub use scheduler::{Scheduled, Scheduler};
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
pub use system::{ActorSystem, RunReport, SystemHandle};
pub use telemetry::{
    KernelEvent, KernelMetrics, MetricsSnapshot, NullObserver, RecordingObserver, Telemetry,
    TelemetryObserver,
};
pub use time::SimTime;
