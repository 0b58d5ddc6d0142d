use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::*;
use crate::types::{Seed, Vec2};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for one game instance. Missing JSON fields fall back to the
/// defaults in `constants`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameConfig {
    pub seed: Seed,
    pub arena_width: f64,
    pub arena_height: f64,
    pub win_score: u32,

    pub position_send_interval_ms: u64,
    pub interpolation_window_ms: u64,
    pub stale_snap_threshold_ms: u64,

    pub collectible_spawn_interval_ms: u64,
    pub max_collectibles: usize,
    pub collectible_size: f64,
    pub cleanup_margin: f64,

    pub platform_regen_interval_ms: u64,
    pub platform_height: f64,
    pub platform_min_width: f64,
    pub platform_max_width: f64,
    pub default_platform_width: f64,
    pub platform_anchors: Vec<Vec2>,
    pub platform_resend_limit: u32,
    pub platform_resend_backoff_ms: u64,
    pub handshake_retry_ms: u64,
    pub handshake_retry_max_ms: u64,

    pub player_size: f64,
    pub initial_local_position: Vec2,
    pub initial_remote_position: Vec2,
    pub max_jumps: u8,
    pub first_jump_velocity: f64,
    pub second_jump_velocity: f64,
    pub jump_cooldown_frames: u32,
    pub move_gain: f64,
    pub max_horizontal_speed: f64,
    pub idle_decay: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            seed: DEFAULT_SEED,
            arena_width: ARENA_WIDTH,
            arena_height: ARENA_HEIGHT,
            win_score: WIN_SCORE,
            position_send_interval_ms: POSITION_SEND_INTERVAL_MS,
            interpolation_window_ms: INTERPOLATION_WINDOW_MS,
            stale_snap_threshold_ms: STALE_SNAP_THRESHOLD_MS,
            collectible_spawn_interval_ms: COLLECTIBLE_SPAWN_INTERVAL_MS,
            max_collectibles: MAX_COLLECTIBLES,
            collectible_size: COLLECTIBLE_SIZE,
            cleanup_margin: CLEANUP_MARGIN,
            platform_regen_interval_ms: PLATFORM_REGEN_INTERVAL_MS,
            platform_height: PLATFORM_HEIGHT,
            platform_min_width: PLATFORM_MIN_WIDTH,
            platform_max_width: PLATFORM_MAX_WIDTH,
            default_platform_width: DEFAULT_PLATFORM_WIDTH,
            platform_anchors: PLATFORM_ANCHORS.to_vec(),
            platform_resend_limit: PLATFORM_RESEND_LIMIT,
            platform_resend_backoff_ms: PLATFORM_RESEND_BACKOFF_MS,
            handshake_retry_ms: HANDSHAKE_RETRY_MS,
            handshake_retry_max_ms: HANDSHAKE_RETRY_MAX_MS,
            player_size: PLAYER_SIZE,
            initial_local_position: INITIAL_LOCAL_POSITION,
            initial_remote_position: INITIAL_REMOTE_POSITION,
            max_jumps: MAX_JUMPS,
            first_jump_velocity: FIRST_JUMP_VELOCITY,
            second_jump_velocity: SECOND_JUMP_VELOCITY,
            jump_cooldown_frames: JUMP_COOLDOWN_FRAMES,
            move_gain: MOVE_GAIN,
            max_horizontal_speed: MAX_HORIZONTAL_SPEED,
            idle_decay: IDLE_DECAY,
        }
    }
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.arena_width <= 2.0 * COLLECTIBLE_SPAWN_MARGIN || self.arena_height <= 0.0 {
            return invalid("arena too small");
        }
        if self.win_score == 0 {
            return invalid("win score must be positive");
        }
        if self.max_collectibles == 0 {
            return invalid("max collectibles must be positive");
        }
        if self.platform_min_width > self.platform_max_width {
            return invalid("platform min width exceeds max width");
        }
        if self.platform_anchors.is_empty() {
            return invalid("at least one platform anchor is required");
        }
        if self.interpolation_window_ms == 0 || self.platform_regen_interval_ms == 0 {
            return invalid("intervals must be positive");
        }
        if self.handshake_retry_ms == 0 || self.handshake_retry_max_ms < self.handshake_retry_ms {
            return invalid("handshake retry must be positive and not exceed its max");
        }
        if !(0.0..=1.0).contains(&self.idle_decay) {
            return invalid("idle decay must be within [0, 1]");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = GameConfig::default();
        config.validate().unwrap();
        assert_eq!(config.win_score, 20);
        assert_eq!(config.max_collectibles, 5);
        assert_eq!(config.platform_anchors.len(), 3);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = GameConfig::from_json(r#"{"winScore": 3, "seed": 9}"#).unwrap();
        assert_eq!(config.win_score, 3);
        assert_eq!(config.seed, 9);
        assert_eq!(config.platform_regen_interval_ms, PLATFORM_REGEN_INTERVAL_MS);
    }

    #[test]
    fn rejects_inverted_width_range() {
        let err = GameConfig::from_json(r#"{"platformMinWidth": 200, "platformMaxWidth": 100}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_handshake_retry() {
        let err = GameConfig::from_json(r#"{"handshakeRetryMs": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = GameConfig::from_json(r#"{"handshakeRetryMs": 500, "handshakeRetryMaxMs": 100}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            GameConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
