//! Message protocol between the tracking agent and its consumers.
//!
//! Consumers drive the agent with [`ConsumerMessage`]s; the agent's only
//! outbound message is a position request broadcast to every connected
//! consumer. There is no correlation id: a late or duplicate position
//! reply is handled as a fresh, independent event.

use serde::{Deserialize, Serialize};

use crate::ping::Ping;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsumerMessage {
    StartTracking { route_id: String },
    StopTracking,
    UpdateRoute { route_id: String },
    UpdateToken { token: String },
    PositionReply { location: Ping },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    PositionRequest { route_id: String },
}
