//! RTP transceiver direction and its transitions
//!
//! A direction is the pair of (sending, receiving) flags. Local intents
//! (`set_send`/`set_recv`) flip exactly one of the flags and leave the other
//! one as the transceiver currently has it.

use serde::{Deserialize, Serialize};

/// Preferred send/receive mode of a transceiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    /// Neither sends nor receives
    Inactive,
    /// Only sends
    SendOnly,
    /// Only receives
    RecvOnly,
    /// Sends and receives
    SendRecv,
}

impl Direction {
    /// All directions, in no meaningful order
    pub const ALL: [Direction; 4] = [
        Direction::Inactive,
        Direction::SendOnly,
        Direction::RecvOnly,
        Direction::SendRecv,
    ];

    /// Build a direction out of its two flags
    pub fn from_flags(send: bool, recv: bool) -> Self {
        match (send, recv) {
            (false, false) => Direction::Inactive,
            (true, false) => Direction::SendOnly,
            (false, true) => Direction::RecvOnly,
            (true, true) => Direction::SendRecv,
        }
    }

    /// Whether media flows out
    pub fn is_sending(self) -> bool {
        matches!(self, Direction::SendOnly | Direction::SendRecv)
    }

    /// Whether media flows in
    pub fn is_receiving(self) -> bool {
        matches!(self, Direction::RecvOnly | Direction::SendRecv)
    }

    /// Direction reached by applying a `set_send(want_send)` intent
    pub fn with_send(self, want_send: bool) -> Self {
        Direction::from_flags(want_send, self.is_receiving())
    }

    /// Direction reached by applying a `set_recv(want_recv)` intent
    pub fn with_recv(self, want_recv: bool) -> Self {
        Direction::from_flags(self.is_sending(), want_recv)
    }

    /// Get the direction as a string
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inactive => "inactive",
            Direction::SendOnly => "sendonly",
            Direction::RecvOnly => "recvonly",
            Direction::SendRecv => "sendrecv",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Next direction after a `set_send(want_send)` intent
pub fn next_direction_for_send(current: Direction, want_send: bool) -> Direction {
    current.with_send(want_send)
}

/// Next direction after a `set_recv(want_recv)` intent
pub fn next_direction_for_recv(current: Direction, want_recv: bool) -> Direction {
    current.with_recv(want_recv)
}
