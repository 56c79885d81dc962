//! Actor System Core
//!
//! Wires the registry, the scheduler and the actor loops together and runs
//! a simulation to completion.
//!
//! # Run model
//!
//! One tokio task runs the scheduler loop and one task runs each actor.
//! `ActorSystem::run` joins all of them; the first fatal failure in any loop
//! requests shutdown of the rest, and the whole shutdown is bounded by the
//! configured timeout, after which stragglers are aborted.
//!
//! # Ownership
//!
//! Actors never see the registry or another actor's mailbox. Their only
//! route to the rest of the system is a `SystemHandle`, which forwards to
//! the scheduler and the shutdown trigger.

use crate::actor::{ActorBehavior, ActorContext, ActorRef, ActorTask};
use crate::config::KernelConfig;
use crate::error::{KernelError, Result};
use crate::mailbox::{Mailbox, MailboxConfig};
use crate::message::Message;
use crate::registry::{ActorId, ActorRegistry};
use crate::scheduler::{Scheduled, Scheduler};
use crate::shutdown::{shutdown_channel, ShutdownTrigger};
use crate::telemetry::{KernelEvent, MetricsSnapshot, NullObserver, Telemetry, TelemetryObserver};
use crate::time::SimTime;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub system_id: String,
    pub final_clock: SimTime,
    /// Events still queued when the scheduler stopped
    pub pending_events: usize,
    pub shutdown_reason: Option<String>,
    pub metrics: MetricsSnapshot,
}

/// Route from an actor (or an external driver) into the system
#[derive(Clone)]
pub struct SystemHandle {
    system_id: Arc<str>,
    scheduler: Scheduler,
    shutdown: ShutdownTrigger,
    telemetry: Telemetry,
}

impl SystemHandle {
    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    pub async fn schedule_event(&self, time: SimTime, msg: Message) -> Result<Scheduled> {
        self.scheduler.schedule_at(time, msg).await
    }

    pub async fn schedule_after(&self, delta: f64, msg: Message) -> Result<Scheduled> {
        self.scheduler.schedule_after(delta, msg).await
    }

    pub async fn dispatch_message(&self, msg: Message) -> Result<Scheduled> {
        self.scheduler.dispatch_immediately(msg).await
    }

    /// Returns `true` if this was the first request
    pub fn request_shutdown(&self, reason: impl Into<String>) -> bool {
        self.shutdown.request(reason, &self.telemetry)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_triggered()
    }
}

impl fmt::Debug for SystemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemHandle")
            .field("system_id", &self.system_id)
            .finish_non_exhaustive()
    }
}

struct ActorLoop {
    id: ActorId,
    handle: JoinHandle<Result<()>>,
}

enum LoopKind {
    Scheduler,
    Actor(ActorId),
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopKind::Scheduler => f.write_str("scheduler"),
            LoopKind::Actor(id) => write!(f, "actor '{id}'"),
        }
    }
}

type Joined = (LoopKind, std::result::Result<Result<()>, JoinError>);

async fn join_loop(kind: LoopKind, handle: JoinHandle<Result<()>>) -> Joined {
    (kind, handle.await)
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

struct SystemShared {
    system_id: String,
    config: KernelConfig,
    registry: Arc<ActorRegistry>,
    scheduler: Scheduler,
    telemetry: Telemetry,
    shutdown: ShutdownTrigger,
    /// Actor loops spawned by registration, collected by `run`
    loops_tx: mpsc::UnboundedSender<ActorLoop>,
    loops_rx: Mutex<Option<mpsc::UnboundedReceiver<ActorLoop>>>,
}

/// Core actor system managing actor lifecycles and the simulation run
#[derive(Clone)]
pub struct ActorSystem {
    shared: Arc<SystemShared>,
}

impl ActorSystem {
    /// Actor system with default configuration
    pub fn new() -> Self {
        Self::build(KernelConfig::default(), Arc::new(NullObserver))
    }

    pub fn with_config(config: KernelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, Arc::new(NullObserver)))
    }

    pub fn with_observer(
        config: KernelConfig,
        observer: Arc<dyn TelemetryObserver>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, observer))
    }

    fn build(config: KernelConfig, observer: Arc<dyn TelemetryObserver>) -> Self {
        let system_id = format!("system-{}", Uuid::new_v4());
        info!(
            system_id = %system_id,
            dispatch = ?config.scheduler.dispatch,
            "Creating new actor system"
        );

        let telemetry = Telemetry::new(observer);
        let scheduler = Scheduler::new(config.scheduler, telemetry.clone());
        let (shutdown, _signal) = shutdown_channel();
        let (loops_tx, loops_rx) = mpsc::unbounded_channel();

        Self {
            shared: Arc::new(SystemShared {
                system_id,
                config,
                registry: Arc::new(ActorRegistry::new()),
                scheduler,
                telemetry,
                shutdown,
                loops_tx,
                loops_rx: Mutex::new(Some(loops_rx)),
            }),
        }
    }

    pub fn system_id(&self) -> &str {
        &self.shared.system_id
    }

    pub fn config(&self) -> &KernelConfig {
        &self.shared.config
    }

    /// Handle for injecting events from outside any actor
    pub fn handle(&self) -> SystemHandle {
        SystemHandle {
            system_id: Arc::from(self.shared.system_id.as_str()),
            scheduler: self.shared.scheduler.clone(),
            shutdown: self.shared.shutdown.clone(),
            telemetry: self.shared.telemetry.clone(),
        }
    }

    /// Register an actor with the default mailbox configuration
    pub async fn register_actor<A: ActorBehavior>(
        &self,
        id: impl Into<ActorId>,
        actor: A,
    ) -> Result<ActorRef> {
        self.register_actor_with_mailbox(id, actor, self.shared.config.mailbox)
            .await
    }

    /// Build the actor from its identity, then register it
    pub async fn register_with<A, F>(&self, id: impl Into<ActorId>, factory: F) -> Result<ActorRef>
    where
        A: ActorBehavior,
        F: FnOnce(&ActorId) -> A,
    {
        let id = id.into();
        let actor = factory(&id);
        self.register_actor(id, actor).await
    }

    /// Register an actor and start its loop
    ///
    /// Returns once the actor has run `on_start` and accepts messages. A
    /// duplicate identity leaves the registry untouched; a failed start
    /// removes the entry again.
    pub async fn register_actor_with_mailbox<A: ActorBehavior>(
        &self,
        id: impl Into<ActorId>,
        actor: A,
        mailbox: MailboxConfig,
    ) -> Result<ActorRef> {
        let id = id.into();
        let start_time = Instant::now();
        let actor_type = std::any::type_name::<A>();

        if self.shared.shutdown.is_triggered() {
            return Err(KernelError::StartupFailed {
                actor: id,
                message: "actor system is shutting down".into(),
            });
        }

        mailbox.validate()?;
        let (sender, receiver) = Mailbox::new(id.clone(), mailbox)?;
        let actor_ref = ActorRef::new(id.clone(), sender, actor.accepts(), actor_type);
        self.shared.registry.register(actor_ref.clone())?;

        debug!(
            actor_id = %id,
            system_id = %self.shared.system_id,
            actor_type,
            "Spawning new actor in system"
        );

        let ctx = ActorContext::new(id.clone(), self.handle());
        let task = ActorTask::new(
            actor_ref.clone(),
            Box::new(actor),
            receiver,
            ctx,
            self.shared.telemetry.clone(),
            self.shared.shutdown.subscribe(),
        );
        let (started_tx, started_rx) = oneshot::channel();
        let mut handle = tokio::spawn(task.run(started_tx));

        let startup = tokio::time::timeout(self.shared.config.startup_timeout(), started_rx);
        let failure = match startup.await {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(e))) => {
                let _ = (&mut handle).await;
                Some(e.to_string())
            }
            Ok(Err(_)) => {
                let _ = (&mut handle).await;
                Some("actor loop exited during start-up".to_string())
            }
            Err(_) => {
                handle.abort();
                Some(format!(
                    "start-up exceeded {} ms",
                    self.shared.config.startup_timeout_ms
                ))
            }
        };

        if let Some(message) = failure {
            self.shared.registry.remove(&id);
            warn!(actor_id = %id, error = %message, "Actor registration failed");
            return Err(KernelError::StartupFailed { actor: id, message });
        }

        self.shared.telemetry.emit(KernelEvent::ActorRegistered {
            actor: id.clone(),
            actor_type,
        });
        if self
            .shared
            .loops_tx
            .send(ActorLoop {
                id: id.clone(),
                handle,
            })
            .is_err()
        {
            debug!(actor_id = %id, "Registered after the run finished; loop is not joined");
        }

        info!(
            actor_id = %id,
            actor_type,
            spawn_duration_us = start_time.elapsed().as_micros() as u64,
            total_actors = self.shared.registry.len(),
            "Actor registered"
        );
        Ok(actor_ref)
    }

    pub fn lookup(&self, id: &ActorId) -> Option<ActorRef> {
        self.shared.registry.lookup(id)
    }

    /// Registered actors in registration order
    pub fn actors(&self) -> Vec<ActorRef> {
        self.shared.registry.actors()
    }

    pub async fn schedule_event(&self, time: SimTime, msg: Message) -> Result<Scheduled> {
        self.shared.scheduler.schedule_at(time, msg).await
    }

    pub async fn schedule_after(&self, delta: f64, msg: Message) -> Result<Scheduled> {
        self.shared.scheduler.schedule_after(delta, msg).await
    }

    pub async fn dispatch_message(&self, msg: Message) -> Result<Scheduled> {
        self.shared.scheduler.dispatch_immediately(msg).await
    }

    pub fn now(&self) -> SimTime {
        self.shared.scheduler.now()
    }

    pub fn pending_events(&self) -> usize {
        self.shared.scheduler.pending()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.telemetry.metrics().snapshot()
    }

    /// Request an orderly stop of a running simulation
    pub fn shutdown(&self, reason: impl Into<String>) -> bool {
        self.shared.shutdown.request(reason, &self.shared.telemetry)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutdown.is_triggered()
    }

    /// Run the simulation until shutdown
    ///
    /// Joins the scheduler loop and every actor loop, including actors
    /// registered while running. Returns the first fatal failure, if any.
    /// May be called once per system.
    pub async fn run(&self) -> Result<RunReport> {
        let mut new_loops = self.shared.loops_rx.lock().take().ok_or_else(|| {
            KernelError::configuration("run may only be called once per actor system", None)
        })?;
        let run_start = Instant::now();
        let telemetry = &self.shared.telemetry;
        info!(
            system_id = %self.shared.system_id,
            actors = self.shared.registry.len(),
            pending = self.pending_events(),
            "Starting simulation run"
        );

        let scheduler_loop = {
            let scheduler = self.shared.scheduler.clone();
            let registry = Arc::clone(&self.shared.registry);
            let shutdown = self.shared.shutdown.clone();
            tokio::spawn(async move { scheduler.run(registry, shutdown).await })
        };

        let mut aborts = vec![scheduler_loop.abort_handle()];
        let mut running = FuturesUnordered::new();
        running.push(join_loop(LoopKind::Scheduler, scheduler_loop));

        let mut signal = self.shared.shutdown.subscribe();
        let mut deadline = None;
        let mut aborted = false;
        let mut failure: Option<KernelError> = None;

        loop {
            tokio::select! {
                biased;
                Some(actor_loop) = new_loops.recv() => {
                    aborts.push(actor_loop.handle.abort_handle());
                    running.push(join_loop(LoopKind::Actor(actor_loop.id), actor_loop.handle));
                }
                _ = signal.wait(), if deadline.is_none() => {
                    let timeout = self.shared.config.shutdown_timeout();
                    deadline = Some(tokio::time::Instant::now() + timeout);
                }
                _ = sleep_until(deadline), if deadline.is_some() && !aborted => {
                    warn!(
                        remaining = running.len(),
                        timeout_ms = self.shared.config.shutdown_timeout_ms,
                        "Shutdown timeout elapsed, aborting remaining loops"
                    );
                    for handle in &aborts {
                        handle.abort();
                    }
                    aborted = true;
                }
                finished = running.next() => match finished {
                    Some((kind, joined)) => {
                        if let Some(error) = self.loop_finished(kind, joined) {
                            let reason = format!("fatal failure: {error}");
                            self.shared.shutdown.request(reason, telemetry);
                            if failure.is_none() {
                                failure = Some(error);
                            }
                        }
                    }
                    None => break,
                },
            }
        }

        if let Some(error) = failure {
            error!(
                system_id = %self.shared.system_id,
                error = %error,
                clock = %self.now(),
                "Simulation run failed"
            );
            return Err(error);
        }

        let report = RunReport {
            system_id: self.shared.system_id.clone(),
            final_clock: self.now(),
            pending_events: self.pending_events(),
            shutdown_reason: self.shared.shutdown.reason(),
            metrics: telemetry.metrics().snapshot(),
        };
        info!(
            system_id = %report.system_id,
            final_clock = %report.final_clock,
            pending_events = report.pending_events,
            events_dispatched = report.metrics.events_dispatched,
            elapsed_ms = run_start.elapsed().as_millis() as u64,
            "Simulation run complete"
        );
        Ok(report)
    }

    /// Fatal error carried by a finished loop, if any
    fn loop_finished(
        &self,
        kind: LoopKind,
        joined: std::result::Result<Result<()>, JoinError>,
    ) -> Option<KernelError> {
        match joined {
            Ok(Ok(())) => {
                debug!(task = %kind, "Loop finished");
                None
            }
            Ok(Err(error)) => {
                error!(task = %kind, error = %error, "Loop failed");
                Some(error)
            }
            Err(e) if e.is_cancelled() => {
                warn!(task = %kind, "Loop aborted during shutdown");
                None
            }
            Err(e) => {
                let error = match kind {
                    LoopKind::Scheduler => {
                        KernelError::scheduler_failed(format!("scheduler loop panicked: {e}"))
                    }
                    LoopKind::Actor(id) => {
                        KernelError::actor_failed(id, format!("actor loop panicked: {e}"))
                    }
                };
                error!(error = %error, "Loop panicked");
                self.shared.telemetry.emit(KernelEvent::ActorFailed {
                    error: error.clone(),
                });
                Some(error)
            }
        }
    }
}

impl Default for ActorSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("system_id", &self.shared.system_id)
            .field("actors", &self.shared.registry.len())
            .field("scheduler", &self.shared.scheduler)
            .finish()
    }
}
