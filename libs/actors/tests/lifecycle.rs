//! Actor Lifecycle and Backpressure Tests
//!
//! Registration, delivery validation, mailbox policies, supervision
//! directives and shutdown behaviour.

mod common;

use common::*;
use des_actors::{
    ActorId, ActorState, ActorSystem, BackpressurePolicy, Delivery, KernelError, MailboxConfig,
    Message, SupervisorDirective,
};
use std::time::Duration;

#[tokio::test]
async fn test_duplicate_identity_rejected() {
    let system = ActorSystem::new();
    let journal = Journal::new();
    system.register_actor("A", Recorder::new(&journal)).await.unwrap();

    let err = system
        .register_actor("A", Recorder::new(&journal))
        .await
        .unwrap_err();
    assert_eq!(err, KernelError::DuplicateIdentity(ActorId::from("A")));
    assert_eq!(system.actors().len(), 1);
    assert_eq!(err.category(), "registration");
}

#[tokio::test]
async fn test_unknown_message_type_rejected_at_receive() {
    let system = ActorSystem::new();
    let journal = Journal::new();
    let actor = system
        .register_actor("q", Recorder::new(&journal).accepting(&["arrival"]))
        .await
        .unwrap();

    let err = actor
        .receive(Message::signal("bogus", "driver", "q"))
        .await
        .unwrap_err();
    assert!(matches!(err, KernelError::UnknownMessageType { .. }));
    assert_eq!(actor.mailbox_depth(), 0);
}

#[tokio::test]
async fn test_unknown_message_type_counted_during_run() {
    let system = ActorSystem::with_config(idle_config(50)).unwrap();
    let journal = Journal::new();
    system
        .register_actor("q", Recorder::new(&journal).accepting(&["arrival"]))
        .await
        .unwrap();

    system.schedule_event(at(1.0), tagged("bogus", "q", "x")).await.unwrap();
    system.schedule_event(at(2.0), tagged("arrival", "q", "y")).await.unwrap();

    let report = run_bounded(&system).await.unwrap();
    assert_eq!(report.metrics.messages_rejected, 1);
    assert_eq!(journal.tags(), vec!["y"]);
}

async fn gated(
    policy: BackpressurePolicy,
    block_timeout_ms: u64,
) -> (ActorSystem, des_actors::ActorRef, Gate) {
    let system = ActorSystem::new();
    let gate = Gate::new();
    let handles = Gate {
        entered: gate.entered.clone(),
        release: gate.release.clone(),
    };
    let mut config = MailboxConfig::bounded(1, policy);
    config.block_timeout_ms = block_timeout_ms;
    let actor = system
        .register_actor_with_mailbox("g", gate, config)
        .await
        .unwrap();

    // First message is taken and parked inside process; the mailbox is empty again.
    actor
        .receive(Message::signal("tick", "driver", "g"))
        .await
        .unwrap();
    handles.entered.notified().await;
    (system, actor, handles)
}

#[tokio::test]
async fn test_full_mailbox_reject() {
    let (_system, actor, gate) = gated(BackpressurePolicy::Reject, 50).await;

    let first = actor.receive(Message::signal("tick", "driver", "g")).await.unwrap();
    assert_eq!(first, Delivery::Enqueued);
    assert_eq!(actor.mailbox_depth(), 1);

    let err = actor
        .receive(Message::signal("tick", "driver", "g"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        KernelError::MailboxFull {
            actor: ActorId::from("g"),
            capacity: 1
        }
    );
    assert_eq!(actor.mailbox_depth(), 1);
    gate.release.notify_one();
}

#[tokio::test]
async fn test_full_mailbox_drop_newest() {
    let (_system, actor, gate) = gated(BackpressurePolicy::DropNewest, 50).await;

    actor.receive(Message::signal("tick", "driver", "g")).await.unwrap();
    let outcome = actor.receive(Message::signal("tick", "driver", "g")).await.unwrap();
    assert_eq!(outcome, Delivery::Dropped);
    assert_eq!(actor.mailbox_depth(), 1);
    gate.release.notify_one();
}

#[tokio::test]
async fn test_full_mailbox_block_times_out() {
    let (_system, actor, gate) = gated(BackpressurePolicy::Block, 50).await;

    actor.receive(Message::signal("tick", "driver", "g")).await.unwrap();
    let err = actor
        .receive(Message::signal("tick", "driver", "g"))
        .await
        .unwrap_err();
    assert!(matches!(err, KernelError::MailboxFull { .. }));
    gate.release.notify_one();
}

#[tokio::test]
async fn test_full_mailbox_block_succeeds_when_space_frees() {
    let (_system, actor, gate) = gated(BackpressurePolicy::Block, 2_000).await;
    actor.receive(Message::signal("tick", "driver", "g")).await.unwrap();

    let sender = {
        let actor = actor.clone();
        tokio::spawn(async move { actor.receive(Message::signal("tick", "driver", "g")).await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    gate.release.notify_one();

    let outcome = sender.await.unwrap().unwrap();
    assert_eq!(outcome, Delivery::Enqueued);
    assert_eq!(actor.mailbox_depth(), 1);
}

#[tokio::test]
async fn test_escalate_fails_the_run() {
    let system = ActorSystem::with_config(idle_config(500)).unwrap();
    let journal = Journal::new();
    system
        .register_actor(
            "bad",
            Faulty {
                directive: SupervisorDirective::Escalate,
                journal: journal.clone(),
            },
        )
        .await
        .unwrap();
    system.schedule_event(at(1.0), tagged("tick", "bad", "x")).await.unwrap();

    let err = run_bounded(&system).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, KernelError::ActorFailed { ref actor, .. } if actor.as_str() == "bad"));
    assert_eq!(journal.len(), 1);
}

#[tokio::test]
async fn test_resume_keeps_processing() {
    let system = ActorSystem::with_config(idle_config(50)).unwrap();
    let journal = Journal::new();
    system
        .register_actor(
            "flaky",
            Faulty {
                directive: SupervisorDirective::Resume,
                journal: journal.clone(),
            },
        )
        .await
        .unwrap();
    for time in [1.0, 2.0, 3.0] {
        system.schedule_event(at(time), tagged("tick", "flaky", "x")).await.unwrap();
    }

    let report = run_bounded(&system).await.unwrap();
    assert_eq!(journal.len(), 3);
    assert_eq!(report.metrics.processing_failures, 3);
}

#[tokio::test]
async fn test_stop_directive_stops_only_that_actor() {
    let system = ActorSystem::with_config(idle_config(50)).unwrap();
    let faulty_journal = Journal::new();
    let journal = Journal::new();
    let faulty = system
        .register_actor(
            "quitter",
            Faulty {
                directive: SupervisorDirective::Stop,
                journal: faulty_journal.clone(),
            },
        )
        .await
        .unwrap();
    system.register_actor("steady", Recorder::new(&journal)).await.unwrap();

    system.schedule_event(at(1.0), tagged("tick", "quitter", "x")).await.unwrap();
    system.schedule_event(at(2.0), tagged("tick", "quitter", "y")).await.unwrap();
    system.schedule_event(at(3.0), tagged("tick", "steady", "z")).await.unwrap();

    let report = run_bounded(&system).await.unwrap();
    assert_eq!(faulty_journal.len(), 1);
    assert_eq!(faulty.state(), ActorState::Stopped);
    assert_eq!(journal.tags(), vec!["z"]);
    assert_eq!(report.metrics.messages_rejected, 1);
}

#[tokio::test]
async fn test_all_actors_stopped_after_run() {
    let system = ActorSystem::with_config(idle_config(20)).unwrap();
    let journal = Journal::new();
    let mut actors = Vec::new();
    for id in ["a", "b", "c"] {
        actors.push(system.register_actor(id, Recorder::new(&journal)).await.unwrap());
    }

    let report = run_bounded(&system).await.unwrap();
    assert!(actors.iter().all(|a| a.state() == ActorState::Stopped));
    assert_eq!(report.metrics.actors_registered, 3);
    assert_eq!(report.metrics.actors_stopped, 3);

    let err = system
        .register_actor("late", Recorder::new(&journal))
        .await
        .unwrap_err();
    assert!(matches!(err, KernelError::StartupFailed { .. }));
}

#[tokio::test]
async fn test_registration_order_preserved() {
    let system = ActorSystem::new();
    let journal = Journal::new();
    for id in ["gen", "queue", "server", "stats"] {
        system.register_actor(id, Recorder::new(&journal)).await.unwrap();
    }
    let ids: Vec<String> = system.actors().iter().map(|a| a.id().to_string()).collect();
    assert_eq!(ids, vec!["gen", "queue", "server", "stats"]);
}
