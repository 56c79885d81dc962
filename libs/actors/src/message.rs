//! Messages
//!
//! The envelope actors exchange. The payload is an opaque JSON value the
//! kernel never inspects; routing uses only the type discriminator and the
//! sender/recipient identities. Delivery time is written by the scheduler
//! at dispatch and nowhere else.

use crate::error::{KernelError, Result};
use crate::registry::ActorId;
use crate::time::SimTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Message type discriminator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageType(Arc<str>);

impl MessageType {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for MessageType {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&MessageType> for MessageType {
    fn from(name: &MessageType) -> Self {
        name.clone()
    }
}

impl Borrow<str> for MessageType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Timestamped envelope from a sender to a recipient
pub struct Message {
    message_type: MessageType,
    content: serde_json::Value,
    sender: ActorId,
    recipient: ActorId,
    delivery_time: Option<SimTime>,
    processed: bool,
    /// Resolved once processing ends; lets the dispatcher wait without polling
    completion: Option<oneshot::Sender<()>>,
}

impl Message {
    pub fn new(
        message_type: impl Into<MessageType>,
        sender: impl Into<ActorId>,
        recipient: impl Into<ActorId>,
        content: serde_json::Value,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            content,
            sender: sender.into(),
            recipient: recipient.into(),
            delivery_time: None,
            processed: false,
            completion: None,
        }
    }

    /// Message without payload
    pub fn signal(
        message_type: impl Into<MessageType>,
        sender: impl Into<ActorId>,
        recipient: impl Into<ActorId>,
    ) -> Self {
        Self::new(message_type, sender, recipient, serde_json::Value::Null)
    }

    /// Message carrying any serialisable payload
    pub fn with_payload<T: Serialize>(
        message_type: impl Into<MessageType>,
        sender: impl Into<ActorId>,
        recipient: impl Into<ActorId>,
        payload: &T,
    ) -> Result<Self> {
        let content = serde_json::to_value(payload).map_err(|e| {
            KernelError::processing(format!("failed to encode message payload: {e}"))
        })?;
        Ok(Self::new(message_type, sender, recipient, content))
    }

    pub fn message_type(&self) -> &MessageType {
        &self.message_type
    }

    pub fn content(&self) -> &serde_json::Value {
        &self.content
    }

    /// Decode the payload as a specific type
    pub fn content_as<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.content).map_err(|e| {
            KernelError::processing(format!(
                "payload of '{}' does not decode: {e}",
                self.message_type
            ))
        })
    }

    pub fn sender(&self) -> &ActorId {
        &self.sender
    }

    pub fn recipient(&self) -> &ActorId {
        &self.recipient
    }

    /// Simulation time stamped at dispatch, `None` before dispatch
    pub fn delivery_time(&self) -> Option<SimTime> {
        self.delivery_time
    }

    pub fn is_processed(&self) -> bool {
        self.processed
    }

    pub(crate) fn stamp_delivery(&mut self, time: SimTime) {
        self.delivery_time = Some(time);
    }

    /// Arm the completion signal and hand back the waiting half
    pub(crate) fn attach_completion(&mut self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.completion = Some(tx);
        rx
    }

    /// Flip `processed` to true and resolve the completion signal
    ///
    /// Fails with `AlreadyProcessed` on any call after the first.
    pub(crate) fn mark_processed(&mut self) -> Result<()> {
        if self.processed {
            return Err(KernelError::AlreadyProcessed {
                message_type: self.message_type.clone(),
                sender: self.sender.clone(),
            });
        }
        self.processed = true;
        if let Some(completion) = self.completion.take() {
            // The dispatcher may have timed out and dropped its half.
            let _ = completion.send(());
        }
        Ok(())
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("message_type", &self.message_type)
            .field("sender", &self.sender)
            .field("recipient", &self.recipient)
            .field("delivery_time", &self.delivery_time)
            .field("processed", &self.processed)
            .field("content", &self.content)
            .finish()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.message_type, self.sender, self.recipient)
    }
}
