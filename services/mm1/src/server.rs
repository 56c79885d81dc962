//! Single Server
//!
//! Serves one entity at a time. Service is instantaneous in wall-clock
//! terms: the server draws a service time and schedules both its
//! `server-ready` reply and the service-time report at the completion time.

use crate::messages::{self, delivered_at, entity_of, ServiceTime};
use crate::random::Exponential;
use async_trait::async_trait;
use des_actors::{
    Accepts, ActorBehavior, ActorContext, ActorId, KernelError, Message, Result, SimTime,
};
use serde_json::json;
use tracing::debug;

pub struct Server {
    service: Exponential,
    stats: ActorId,
    entity_name: String,
    busy_until: Option<SimTime>,
}

impl Server {
    pub fn new(
        service: Exponential,
        stats: impl Into<ActorId>,
        entity_name: impl Into<String>,
    ) -> Self {
        Self {
            service,
            stats: stats.into(),
            entity_name: entity_name.into(),
            busy_until: None,
        }
    }
}

#[async_trait]
impl ActorBehavior for Server {
    fn accepts(&self) -> Accepts {
        Accepts::only([self.entity_name.as_str()])
    }

    async fn process(&mut self, msg: &Message, ctx: &ActorContext) -> Result<()> {
        let now = delivered_at(msg)?;
        let entity = entity_of(msg)?;

        if let Some(until) = self.busy_until {
            if now.is_before(until) {
                return Err(KernelError::processing(format!(
                    "'{entity}' arrived at {now} while the server is busy until {until}"
                )));
            }
        }

        let service = self.service.sample();
        let done = now.plus(service)?;
        self.busy_until = Some(done);
        debug!(entity = %entity, service, done = %done, "Serving");

        // The reply goes to whoever handed the entity over.
        let ready = ctx.message(messages::SERVER_READY, msg.sender(), json!(entity));
        ctx.schedule_at(done, ready).await?;

        let report = Message::with_payload(
            messages::SERVICE_TIME,
            ctx.id(),
            &self.stats,
            &ServiceTime { entity, service },
        )?;
        ctx.schedule_at(done, report).await?;
        Ok(())
    }
}
