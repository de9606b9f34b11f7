//! Message dispatch
//!
//! Messages carry an integer id and an opaque payload. The core never
//! inspects payloads; systems downcast the ones whose id they recognize.
//! Application message ids start at [`FIRST_USER_ID`]; lower values are
//! reserved for the engine.

use std::any::Any;
use std::collections::VecDeque;

/// Identifies what kind of payload a message carries.
pub type MessageId = i32;

/// Reserved id for engine-internal notifications.
pub const SYSTEM_MESSAGE_ID: MessageId = 0;

/// First id available to application-defined messages.
pub const FIRST_USER_ID: MessageId = 1;

/// A tagged, opaque payload broadcast to systems.
pub struct Message {
    id: MessageId,
    payload: Box<dyn Any + Send>,
}

impl Message {
    pub fn new<T: Send + 'static>(id: MessageId, payload: T) -> Self {
        Self {
            id,
            payload: Box::new(payload),
        }
    }

    #[inline]
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Typed view of the payload; `None` when `T` is not what the sender
    /// packed. Receivers should check [`Message::id`] first.
    pub fn data<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }
}

/// FIFO queue of pending messages, drained once per scene update.
#[derive(Default)]
pub struct MessageBus {
    queue: VecDeque<Message>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Queue a payload for the next dispatch.
    pub fn post<T: Send + 'static>(&mut self, id: MessageId, payload: T) {
        self.queue.push_back(Message::new(id, payload));
    }

    pub fn post_message(&mut self, message: Message) {
        self.queue.push_back(message);
    }

    pub fn poll(&mut self) -> Option<Message> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
