use serde::{Deserialize, Serialize};

/// Identifies one logical sub-protocol multiplexed over a peer connection.
pub type StreamId = u8;

pub const DEFAULT_PRIORITY: i32 = 1;
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 1;
/// Largest message read from a stream unless its descriptor says otherwise (1 MiB).
pub const DEFAULT_RECV_MESSAGE_CAPACITY: usize = 1024 * 1024;

/// Declares a stream and how the transport should treat it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub id: StreamId,
    /// Human readable label, used in logs.
    pub name: String,
    /// Higher priority streams are polled first.
    pub priority: i32,
    pub send_queue_capacity: usize,
    /// Upper bound on the size of a single inbound message.
    pub recv_message_capacity: usize,
}

impl StreamDescriptor {
    pub fn new(id: StreamId, name: &str) -> Self {
        StreamDescriptor {
            id,
            name: name.to_owned(),
            priority: DEFAULT_PRIORITY,
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
            recv_message_capacity: DEFAULT_RECV_MESSAGE_CAPACITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_send_queue_capacity(mut self, capacity: usize) -> Self {
        self.send_queue_capacity = capacity;
        self
    }

    pub fn with_recv_message_capacity(mut self, capacity: usize) -> Self {
        self.recv_message_capacity = capacity;
        self
    }
}
