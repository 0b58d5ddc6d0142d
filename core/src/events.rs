use serde::Serialize;

use crate::types::{Color, Side, Vec2};

/// Notifications for the presentation layer, drained once per frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GameEvent {
    Status { text: String },
    ScoreChanged { local: u32, remote: u32 },
    /// A collectible was picked up. `penalty` is set when it cost a point.
    Collected { position: Vec2, color: Color, by: Side, penalty: bool },
    Jumped { count: u8 },
    GameOver { winner: Side },
    RematchOffered,
    GameReset,
}
