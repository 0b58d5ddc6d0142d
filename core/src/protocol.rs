//! Wire protocol between the two peers.
//!
//! Every message is a JSON object `{ "type": ..., ...fields }` with camelCase
//! field names. There is no version field: both peers run the same build.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CollectibleSpec, Color, Millis, PlatformSpec, Seed, Side, Vec2};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode {kind} message: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Snapshot of the sender's own body, broadcast at most once per send interval.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub angle: f64,
    pub angular_velocity: f64,
    pub is_jumping: bool,
    pub timestamp: Millis,
}

impl PositionUpdate {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn velocity(&self) -> Vec2 {
        Vec2::new(self.vx, self.vy)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Message {
    // ── Handshake ──
    /// Client → host once its channel is open.
    RequestInitialState,
    /// Host → client: "get ready". Client → host: "I'm ready".
    PrepareForInitialState,
    /// Host → client. `local*` fields describe the receiver's own player.
    InitialState {
        local_color: Color,
        remote_color: Color,
        local_position: Vec2,
        remote_position: Vec2,
    },
    /// Host → client. Receiver rebuilds its whole platform set verbatim.
    SetExactPlatforms {
        seed: Seed,
        timestamp: Millis,
        platforms: Vec<PlatformSpec>,
    },
    /// Client → host acknowledgement of a layout.
    PlatformsReady {
        seed: Seed,
        timestamp: Millis,
        count: usize,
    },
    /// Client → host, diagnostic only.
    InitComplete { platforms_count: usize },

    // ── Steady state ──
    Position(PositionUpdate),
    CollectibleCreated { collectible: CollectibleSpec },
    /// `score` is the collector's score after the collect; receivers overwrite.
    CollectibleCollected { timestamp: Millis, score: u32 },
    CollectibleRemoved { timestamp: Millis },
    /// `winner` is from the sender's point of view.
    GameOver { winner: Side },
    RematchRequest,
    RematchAccepted,
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::RequestInitialState => "requestInitialState",
            Message::PrepareForInitialState => "prepareForInitialState",
            Message::InitialState { .. } => "initialState",
            Message::SetExactPlatforms { .. } => "setExactPlatforms",
            Message::PlatformsReady { .. } => "platformsReady",
            Message::InitComplete { .. } => "initComplete",
            Message::Position(_) => "position",
            Message::CollectibleCreated { .. } => "collectibleCreated",
            Message::CollectibleCollected { .. } => "collectibleCollected",
            Message::CollectibleRemoved { .. } => "collectibleRemoved",
            Message::GameOver { .. } => "gameOver",
            Message::RematchRequest => "rematchRequest",
            Message::RematchAccepted => "rematchAccepted",
        }
    }
}

pub fn encode(msg: &Message) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|source| ProtocolError::Encode {
        kind: msg.kind(),
        source,
    })
}

pub fn decode(json: &str) -> Result<Message, ProtocolError> {
    serde_json::from_str(json).map_err(ProtocolError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CollectibleKind;
    use serde_json::{json, Value};

    fn wire(msg: &Message) -> Value {
        serde_json::from_str(&encode(msg).unwrap()).unwrap()
    }

    #[test]
    fn unit_variants_carry_only_type() {
        assert_eq!(wire(&Message::PrepareForInitialState), json!({"type": "prepareForInitialState"}));
        assert_eq!(wire(&Message::RematchRequest), json!({"type": "rematchRequest"}));
    }

    #[test]
    fn position_fields_are_inlined() {
        let msg = Message::Position(PositionUpdate {
            x: 1.0,
            y: 2.0,
            vx: 0.5,
            vy: -1.0,
            angle: 0.0,
            angular_velocity: 0.0,
            is_jumping: true,
            timestamp: 77,
        });
        let v = wire(&msg);
        assert_eq!(v["type"], "position");
        assert_eq!(v["angularVelocity"], 0.0);
        assert_eq!(v["isJumping"], true);
        assert_eq!(v["timestamp"], 77);
    }

    #[test]
    fn decodes_host_platform_message() {
        let raw = r#"{"type":"setExactPlatforms","seed":5,"timestamp":1700000000000,
                      "platforms":[{"x":100,"y":200,"width":120}]}"#;
        match decode(raw).unwrap() {
            Message::SetExactPlatforms { seed, timestamp, platforms } => {
                assert_eq!(seed, 5);
                assert_eq!(timestamp, 1_700_000_000_000);
                assert_eq!(platforms, vec![PlatformSpec { x: 100.0, y: 200.0, width: 120.0 }]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn decodes_collectible_created() {
        let raw = r##"{"type":"collectibleCreated","collectible":
                       {"type":"circle","color":"#FF6B6B","x":200,"y":0,"timestamp":1000}}"##;
        let msg = decode(raw).unwrap();
        assert_eq!(
            msg,
            Message::CollectibleCreated {
                collectible: CollectibleSpec {
                    kind: CollectibleKind::Circle,
                    color: Color::Coral,
                    x: 200.0,
                    y: 0.0,
                    timestamp: 1000,
                }
            }
        );
    }

    #[test]
    fn initial_state_field_names() {
        let v = wire(&Message::InitialState {
            local_color: Color::Teal,
            remote_color: Color::Coral,
            local_position: Vec2::new(300.0, 300.0),
            remote_position: Vec2::new(100.0, 300.0),
        });
        assert_eq!(v["localColor"], "#4ECDC4");
        assert_eq!(v["remotePosition"]["x"], 100.0);
        assert_eq!(wire(&Message::InitComplete { platforms_count: 3 })["platformsCount"], 3);
        assert_eq!(wire(&Message::GameOver { winner: Side::Local })["winner"], "local");
    }

    #[test]
    fn layout_coordinates_survive_the_wire_exactly() {
        let platforms = vec![
            PlatformSpec { x: 100.0, y: 200.0, width: 122.60531270876527 },
            PlatformSpec { x: 0.1 + 0.2, y: 1.0 / 3.0, width: 60.000000000000014 },
        ];
        let msg = Message::SetExactPlatforms { seed: 9, timestamp: 1, platforms };
        assert_eq!(decode(&encode(&msg).unwrap()).unwrap(), msg);

        let spawn = Message::CollectibleCreated {
            collectible: CollectibleSpec {
                kind: CollectibleKind::Triangle,
                color: Color::Teal,
                x: 287.39468729123473,
                y: 0.0,
                timestamp: 2,
            },
        };
        assert_eq!(decode(&encode(&spawn).unwrap()).unwrap(), spawn);
    }

    #[test]
    fn unknown_type_is_a_decode_error() {
        assert!(matches!(decode(r#"{"type":"teleport"}"#), Err(ProtocolError::Decode(_))));
        assert!(matches!(decode("{"), Err(ProtocolError::Decode(_))));
    }
}
