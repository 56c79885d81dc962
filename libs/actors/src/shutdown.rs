//! Shutdown signalling
//!
//! A single `watch` channel broadcasts the stop request to the scheduler
//! loop and every actor loop; each of them observes it at its suspension
//! point. The first reason given wins.

use crate::telemetry::{KernelEvent, Telemetry};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Requests shutdown; cheap to clone
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<bool>>,
    reason: Arc<Mutex<Option<String>>>,
}

/// Observes shutdown
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    let trigger = ShutdownTrigger {
        tx: Arc::new(tx),
        reason: Arc::new(Mutex::new(None)),
    };
    (trigger, ShutdownSignal { rx })
}

impl ShutdownTrigger {
    /// Request shutdown; returns `true` for the first request only
    pub(crate) fn trigger(&self, reason: impl Into<String>) -> bool {
        let mut slot = self.reason.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason.into());
        self.tx.send_replace(true);
        true
    }

    /// `trigger` plus a `ShutdownRequested` report for the first request
    pub(crate) fn request(&self, reason: impl Into<String>, telemetry: &Telemetry) -> bool {
        let reason = reason.into();
        if !self.trigger(reason.clone()) {
            return false;
        }
        info!(reason = %reason, "Shutdown requested");
        telemetry.emit(KernelEvent::ShutdownRequested { reason });
        true
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested (or the trigger is gone)
    pub async fn wait(&mut self) {
        // wait_for errors only when the sender is dropped; treat that as a stop.
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::RecordingObserver;
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_reason_wins() {
        let (trigger, signal) = shutdown_channel();
        assert!(!signal.is_triggered());

        assert!(trigger.trigger("idle"));
        assert!(!trigger.trigger("horizon"));
        assert_eq!(trigger.reason().as_deref(), Some("idle"));
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_wait_wakes_all_subscribers() {
        let (trigger, signal) = shutdown_channel();
        let mut waiters = Vec::new();
        for _ in 0..3 {
            let mut signal = signal.clone();
            waiters.push(tokio::spawn(async move { signal.wait().await }));
        }

        trigger.trigger("test");
        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_request_reports_first_reason_only() {
        let recorder = Arc::new(RecordingObserver::new());
        let telemetry = Telemetry::new(recorder.clone());
        let (trigger, _signal) = shutdown_channel();

        assert!(trigger.request("idle", &telemetry));
        assert!(!trigger.request("horizon", &telemetry));
        assert_eq!(
            recorder.events(),
            vec![KernelEvent::ShutdownRequested {
                reason: "idle".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_request() {
        let (trigger, _signal) = shutdown_channel();
        trigger.trigger("done");
        let mut late = trigger.subscribe();
        late.wait().await;
        assert!(late.is_triggered());
    }
}
