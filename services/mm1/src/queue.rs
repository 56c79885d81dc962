//! FIFO Queue
//!
//! Holds arriving entities until the single server is free. The queue
//! tracks whether the server is idle so that an arrival meeting an idle
//! server is handed over at the same tick instead of waiting for the next
//! `server-ready`.

use crate::messages::{self, delivered_at, entity_of, QueueDepth, WaitTime};
use async_trait::async_trait;
use des_actors::{
    Accepts, ActorBehavior, ActorContext, ActorId, KernelError, Message, Result, SimTime,
};
use serde_json::json;
use std::collections::VecDeque;
use tracing::debug;

pub struct FifoQueue {
    server: ActorId,
    stats: ActorId,
    entity_name: String,
    waiting: VecDeque<(SimTime, String)>,
    server_idle: bool,
}

impl FifoQueue {
    /// The server starts busy; the first `server-ready` marks it idle
    pub fn new(
        server: impl Into<ActorId>,
        stats: impl Into<ActorId>,
        entity_name: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            stats: stats.into(),
            entity_name: entity_name.into(),
            waiting: VecDeque::new(),
            server_idle: false,
        }
    }

    pub fn depth(&self) -> usize {
        self.waiting.len()
    }

    async fn on_arrival(&mut self, now: SimTime, entity: String, ctx: &ActorContext) -> Result<()> {
        ctx.dispatch(ctx.message(messages::ENTITY_ARRIVED, &self.stats, json!(entity)))
            .await?;

        if self.server_idle {
            debug!(entity = %entity, "Server idle, serving immediately");
            self.serve(now, now, entity, ctx).await?;
        } else {
            self.waiting.push_back((now, entity));
        }
        self.report_depth(ctx).await
    }

    async fn on_server_ready(&mut self, now: SimTime, ctx: &ActorContext) -> Result<()> {
        match self.waiting.pop_front() {
            Some((arrived, entity)) => {
                self.serve(arrived, now, entity, ctx).await?;
                self.report_depth(ctx).await
            }
            None => {
                self.server_idle = true;
                Ok(())
            }
        }
    }

    /// Hand `entity` to the server at `now` and report how long it waited
    async fn serve(
        &mut self,
        arrived: SimTime,
        now: SimTime,
        entity: String,
        ctx: &ActorContext,
    ) -> Result<()> {
        let wait = now.duration_since(arrived).ok_or_else(|| {
            KernelError::processing(format!("'{entity}' left the queue before it arrived"))
        })?;

        self.server_idle = false;
        ctx.dispatch(ctx.message(self.entity_name.as_str(), &self.server, json!(entity)))
            .await?;

        let report = Message::with_payload(
            messages::WAIT_TIME,
            ctx.id(),
            &self.stats,
            &WaitTime { entity, wait },
        )?;
        ctx.dispatch(report).await?;
        Ok(())
    }

    async fn report_depth(&self, ctx: &ActorContext) -> Result<()> {
        let report = Message::with_payload(
            messages::QUEUE_DEPTH,
            ctx.id(),
            &self.stats,
            &QueueDepth { depth: self.depth() },
        )?;
        ctx.dispatch(report).await?;
        Ok(())
    }
}

#[async_trait]
impl ActorBehavior for FifoQueue {
    fn accepts(&self) -> Accepts {
        Accepts::only([self.entity_name.as_str(), messages::SERVER_READY])
    }

    async fn process(&mut self, msg: &Message, ctx: &ActorContext) -> Result<()> {
        let now = delivered_at(msg)?;
        if msg.message_type().as_str() == messages::SERVER_READY {
            self.on_server_ready(now, ctx).await
        } else {
            let entity = entity_of(msg)?;
            self.on_arrival(now, entity, ctx).await
        }
    }
}
