//! Event emitter implementations
//!
//! [`ChannelEmitter`] hands events to a bounded channel drained by whatever
//! delivers them to the collector (the daemon logs them as JSON). When the
//! channel is full the event is dropped with a warning; the caller is never
//! blocked.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::traits::{AlertPayload, EmitOptions, EventEmitter};

/// An event as handed to the collector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmittedEvent {
    pub event_type: String,
    pub payload: AlertPayload,
    pub options: EmitOptions,
}

/// Bounded-channel emitter
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    tx: mpsc::Sender<EmittedEvent>,
}

impl ChannelEmitter {
    /// Create an emitter and the receiver that drains it
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<EmittedEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl EventEmitter for ChannelEmitter {
    fn send_async(&self, event_type: &str, payload: AlertPayload, options: EmitOptions) {
        let event = EmittedEvent {
            event_type: event_type.to_string(),
            payload,
            options,
        };

        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    "Event channel full, dropping {} for domain {}. Consider increasing event_channel_capacity.",
                    event.event_type, event.payload.domain_id
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                warn!(
                    "Event channel closed, dropping {} for domain {}",
                    event.event_type, event.payload.domain_id
                );
            }
        }
    }
}
