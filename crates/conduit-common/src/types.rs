use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, crate::error::TranslateError>;

/// Phase of a connection. Each state has its own packet-id namespace in both
/// directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Handshake,
    Status,
    Login,
    Configuration,
    Play,
}

/// Which endpoint a packet is travelling towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Client → server.
    Serverbound,
    /// Server → client.
    Clientbound,
}

impl Direction {
    pub fn flip(self) -> Direction {
        match self {
            Direction::Serverbound => Direction::Clientbound,
            Direction::Clientbound => Direction::Serverbound,
        }
    }
}
