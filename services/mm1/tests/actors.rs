//! Queue and server behaviour against probe neighbours

mod common;

use common::*;
use des_actors::{ActorSystem, KernelError, Message};
use mm1::messages::{self, ServiceTime, WaitTime};
use mm1::{Exponential, FifoQueue, Server};
use serde_json::json;
use std::time::Duration;

const ENTITY: &str = "customer";

fn entity(to: &str, id: &str) -> Message {
    Message::new(ENTITY, "arrivals", to, json!(id))
}

#[tokio::test]
async fn test_queue_serves_in_arrival_order_and_reports_waits() {
    let system = ActorSystem::with_config(idle_config(100)).unwrap();
    let server = Probe::new();
    let stats = Probe::new();
    system.register_actor("server", server.clone()).await.unwrap();
    system.register_actor("stats", stats.clone()).await.unwrap();
    system
        .register_actor("queue", FifoQueue::new("server", "stats", ENTITY))
        .await
        .unwrap();

    system
        .schedule_event(at(0.0), Message::signal(messages::SERVER_READY, "mm1", "queue"))
        .await
        .unwrap();
    system.schedule_event(at(1.0), entity("queue", "c0")).await.unwrap();
    system.schedule_event(at(2.0), entity("queue", "c1")).await.unwrap();
    system
        .schedule_event(
            at(5.0),
            Message::new(messages::SERVER_READY, "server", "queue", json!("c0")),
        )
        .await
        .unwrap();

    let report = tokio::time::timeout(Duration::from_secs(10), system.run())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.metrics.messages_rejected, 0);

    // Idle server takes c0 on arrival; c1 waits for the next server-ready.
    let handed: Vec<(String, f64)> = server
        .seen()
        .iter()
        .map(|s| (s.content.as_str().unwrap().to_string(), s.at))
        .collect();
    assert_eq!(handed, vec![("c0".to_string(), 1.0), ("c1".to_string(), 5.0)]);

    let waits: Vec<WaitTime> = stats
        .of_type(messages::WAIT_TIME)
        .into_iter()
        .map(|s| serde_json::from_value(s.content).unwrap())
        .collect();
    assert_eq!(
        waits,
        vec![
            WaitTime { entity: "c0".into(), wait: 0.0 },
            WaitTime { entity: "c1".into(), wait: 3.0 },
        ]
    );

    let depths: Vec<(u64, f64)> = stats
        .of_type(messages::QUEUE_DEPTH)
        .iter()
        .map(|s| (s.content["depth"].as_u64().unwrap(), s.at))
        .collect();
    assert_eq!(depths, vec![(0, 1.0), (1, 2.0), (0, 5.0)]);
    assert_eq!(stats.of_type(messages::ENTITY_ARRIVED).len(), 2);
}

#[tokio::test]
async fn test_queue_rejects_unknown_message_type() {
    let system = ActorSystem::new();
    let queue = system
        .register_actor("queue", FifoQueue::new("server", "stats", ENTITY))
        .await
        .unwrap();

    let err = queue
        .receive(Message::signal("get-state", "mm1", "queue"))
        .await
        .unwrap_err();
    assert!(matches!(err, KernelError::UnknownMessageType { .. }));
}

#[tokio::test]
async fn test_server_replies_to_sender_at_completion() {
    let system = ActorSystem::with_config(idle_config(100)).unwrap();
    let queue = Probe::new();
    let stats = Probe::new();
    system.register_actor("queue", queue.clone()).await.unwrap();
    system.register_actor("stats", stats.clone()).await.unwrap();
    system
        .register_actor(
            "server",
            Server::new(Exponential::new(2.0, 222).unwrap(), "stats", ENTITY),
        )
        .await
        .unwrap();

    system
        .schedule_event(at(1.0), Message::new(ENTITY, "queue", "server", json!("c0")))
        .await
        .unwrap();
    let report = tokio::time::timeout(Duration::from_secs(10), system.run())
        .await
        .unwrap()
        .unwrap();

    let ready = queue.of_type(messages::SERVER_READY);
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].content, json!("c0"));
    assert!(ready[0].at >= 1.0);

    let services = stats.of_type(messages::SERVICE_TIME);
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].at, ready[0].at);
    let ServiceTime { entity, service } =
        serde_json::from_value(services[0].content.clone()).unwrap();
    assert_eq!(entity, "c0");
    assert!((ready[0].at - 1.0 - service).abs() < 1e-9);
    assert_eq!(report.final_clock.as_f64(), ready[0].at);
}

#[tokio::test]
async fn test_server_refuses_second_entity_while_busy() {
    let system = ActorSystem::with_config(idle_config(100)).unwrap();
    let queue = Probe::new();
    system.register_actor("queue", queue.clone()).await.unwrap();
    system.register_actor("stats", Probe::new()).await.unwrap();
    system
        .register_actor(
            "server",
            Server::new(Exponential::new(1.0, 5).unwrap(), "stats", ENTITY),
        )
        .await
        .unwrap();

    system
        .schedule_event(at(1.0), Message::new(ENTITY, "queue", "server", json!("c0")))
        .await
        .unwrap();
    system
        .schedule_event(at(1.0), Message::new(ENTITY, "queue", "server", json!("c1")))
        .await
        .unwrap();

    let report = tokio::time::timeout(Duration::from_secs(10), system.run())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.metrics.processing_failures, 1);
    assert_eq!(queue.of_type(messages::SERVER_READY).len(), 1);
}
