use crate::types::{CollectibleKind, Color, Vec2};

// Time values are wall-clock milliseconds; per-frame values assume 60 Hz.

// Arena
pub const ARENA_WIDTH: f64 = 400.0;
pub const ARENA_HEIGHT: f64 = 400.0;
pub const FRAME_MS: f64 = 1000.0 / 60.0;
/// Longest physics step taken for a single tick after a stall.
pub const MAX_STEP_MS: f64 = FRAME_MS * 3.0;

// Match rules
pub const WIN_SCORE: u32 = 20;

// Network cadence
pub const POSITION_SEND_INTERVAL_MS: u64 = 16;
pub const INTERPOLATION_WINDOW_MS: u64 = 16;
pub const STALE_SNAP_THRESHOLD_MS: u64 = 200;
pub const PLATFORM_REGEN_INTERVAL_MS: u64 = 5000;
pub const PLATFORM_RESEND_LIMIT: u32 = 3;
pub const PLATFORM_RESEND_BACKOFF_MS: u64 = 100;
/// First wait before a handshake step is repeated; doubles up to the max.
pub const HANDSHAKE_RETRY_MS: u64 = 250;
pub const HANDSHAKE_RETRY_MAX_MS: u64 = 2000;

// Collectibles
pub const COLLECTIBLE_SPAWN_INTERVAL_MS: u64 = 2000;
pub const MAX_COLLECTIBLES: usize = 5;
pub const COLLECTIBLE_SIZE: f64 = 20.0;
pub const COLLECTIBLE_SPAWN_MARGIN: f64 = 40.0;
/// Collectibles appear at the top edge and fall.
pub const COLLECTIBLE_SPAWN_Y: f64 = 0.0;
/// How far below the arena a collectible may fall before it is cleaned up.
pub const CLEANUP_MARGIN: f64 = 50.0;

pub const COLLECTIBLE_KINDS: [CollectibleKind; 3] = [
    CollectibleKind::Circle,
    CollectibleKind::Triangle,
    CollectibleKind::Rectangle,
];

// Platforms
pub const PLATFORM_HEIGHT: f64 = 10.0;
pub const PLATFORM_MIN_WIDTH: f64 = 60.0;
pub const PLATFORM_MAX_WIDTH: f64 = 180.0;
pub const DEFAULT_PLATFORM_WIDTH: f64 = 120.0;
pub const PLATFORM_ANCHORS: [Vec2; 3] = [
    Vec2 { x: 100.0, y: 200.0 },
    Vec2 { x: 300.0, y: 250.0 },
    Vec2 { x: 200.0, y: 300.0 },
];

// Players
pub const PLAYER_SIZE: f64 = 30.0;
pub const INITIAL_LOCAL_POSITION: Vec2 = Vec2 { x: 100.0, y: 300.0 };
pub const INITIAL_REMOTE_POSITION: Vec2 = Vec2 { x: 300.0, y: 300.0 };
pub const HOST_COLOR: Color = Color::Coral;
pub const CLIENT_COLOR: Color = Color::Teal;

// Movement
pub const MAX_JUMPS: u8 = 2;
pub const FIRST_JUMP_VELOCITY: f64 = -9.0;
pub const SECOND_JUMP_VELOCITY: f64 = -7.0;
pub const JUMP_COOLDOWN_FRAMES: u32 = 5;
pub const MOVE_GAIN: f64 = 0.5;
pub const MAX_HORIZONTAL_SPEED: f64 = 3.0;
pub const IDLE_DECAY: f64 = 0.92;
pub const IDLE_DECAY_FLOOR: f64 = 0.1;

// Reference physics
pub const GRAVITY: f64 = 0.4;
pub const MAX_FALL_SPEED: f64 = 12.0;
/// Collectibles drift down slowly compared to players.
pub const COLLECTIBLE_GRAVITY: f64 = 0.05;
pub const COLLECTIBLE_MAX_FALL_SPEED: f64 = 4.0;

pub const DEFAULT_SEED: u32 = 0x5eed;
