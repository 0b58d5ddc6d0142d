use serde::{Deserialize, Serialize};

// ── Primitives ──────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    /// Linear blend toward `target` by `t` in [0, 1].
    pub fn lerp(self, target: Vec2, t: f64) -> Vec2 {
        Vec2 {
            x: self.x + (target.x - self.x) * t,
            y: self.y + (target.y - self.y) * t,
        }
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub type Millis = u64;
pub type Seed = u32;

// ── Identity ────────────────────────────────────────────────

/// Player color. Doubles as the scoring discriminator: a collectible
/// matching the collector's color is worth +1, any other color -1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "#FF6B6B")]
    Coral,
    #[serde(rename = "#4ECDC4")]
    Teal,
}

impl Color {
    pub fn hex(self) -> &'static str {
        match self {
            Color::Coral => "#FF6B6B",
            Color::Teal => "#4ECDC4",
        }
    }
}

/// Which player, from the point of view of the peer holding the value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    pub fn flip(self) -> Side {
        match self {
            Side::Local => Side::Remote,
            Side::Remote => Side::Local,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Client,
}

// ── Input ───────────────────────────────────────────────────

/// Button bitmask constants.
pub mod button {
    pub const LEFT: u8 = 1;
    pub const RIGHT: u8 = 2;
    /// Edge-triggered: set only on the frame the jump key went down.
    pub const JUMP: u8 = 4;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInput {
    pub buttons: u8,
}

impl PlayerInput {
    pub const fn new(buttons: u8) -> Self {
        PlayerInput { buttons }
    }

    pub fn left(self) -> bool {
        self.buttons & button::LEFT != 0
    }

    pub fn right(self) -> bool {
        self.buttons & button::RIGHT != 0
    }

    pub fn jump_pressed(self) -> bool {
        self.buttons & button::JUMP != 0
    }
}

pub const NULL_INPUT: PlayerInput = PlayerInput { buttons: 0 };

// ── World objects as transmitted ────────────────────────────

/// A static platform. `x`/`y` is the center; height is fixed by config.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlatformSpec {
    pub x: f64,
    pub y: f64,
    pub width: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectibleKind {
    Circle,
    Triangle,
    Rectangle,
}

/// A collectible as created by the host. `timestamp` is the identity used
/// to correlate created/collected/removed events across peers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectibleSpec {
    #[serde(rename = "type")]
    pub kind: CollectibleKind,
    pub color: Color,
    pub x: f64,
    pub y: f64,
    pub timestamp: Millis,
}
