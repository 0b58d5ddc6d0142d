use std::collections::VecDeque;

use crate::config::GameConfig;
use crate::constants::{CLIENT_COLOR, HOST_COLOR};
use crate::physics::BodyRef;
use crate::types::*;

/// How many resolved collectible ids are remembered to reject late echoes.
pub const RETIRED_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq)]
pub struct PlayerState {
    pub color: Color,
    pub body: Option<BodyRef>,
    pub score: u32,
    pub has_won: bool,
    pub jump_count: u8,
    pub jump_cooldown: u32,
    pub is_jumping: bool,
    pub is_ready: bool,
}

impl PlayerState {
    pub fn new(color: Color) -> Self {
        PlayerState {
            color,
            body: None,
            score: 0,
            has_won: false,
            jump_count: 0,
            jump_cooldown: 0,
            is_jumping: false,
            is_ready: false,
        }
    }

    /// +1 for a matching color, -1 otherwise, never below zero.
    pub fn score_collect(&mut self, collectible: Color) -> u32 {
        if collectible == self.color {
            self.score += 1;
        } else {
            self.score = self.score.saturating_sub(1);
        }
        self.score
    }

    pub fn reset_round(&mut self) {
        self.score = 0;
        self.has_won = false;
        self.jump_count = 0;
        self.jump_cooldown = 0;
        self.is_jumping = false;
    }
}

/// Last state received for the remote body; the interpolation target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RemoteTarget {
    pub position: Vec2,
    pub velocity: Vec2,
    pub angle: f64,
    pub angular_velocity: f64,
    pub received_at: Millis,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LivePlatform {
    pub spec: PlatformSpec,
    pub body: BodyRef,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LiveCollectible {
    pub spec: CollectibleSpec,
    pub body: BodyRef,
}

/// The layout currently in the world, keyed the way it was transmitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutKey {
    pub seed: Seed,
    pub timestamp: Millis,
}

/// Everything one peer knows about the match.
#[derive(Clone, Debug)]
pub struct GameSession {
    pub config: GameConfig,
    /// Assigned once: first inbound connection makes us host, first dial-out client.
    pub role: Option<Role>,
    pub local: PlayerState,
    pub remote: PlayerState,
    pub remote_target: Option<RemoteTarget>,
    pub platforms: Vec<LivePlatform>,
    pub collectibles: Vec<LiveCollectible>,
    pub retired: VecDeque<Millis>,
    pub layout: Option<LayoutKey>,

    pub is_connected: bool,
    pub game_started: bool,
    pub game_over: bool,
    pub winner: Option<Side>,
    /// We asked for a rematch and are waiting.
    pub rematch_requested: bool,
    /// The peer asked for a rematch.
    pub rematch_offered: bool,

    pub last_tick: Option<Millis>,
    pub last_position_sent: Option<Millis>,
    pub last_collectible_spawn: Millis,
    pub last_platform_regen: Millis,
    pub rng_state: u32,
}

impl GameSession {
    pub fn new(config: GameConfig) -> Self {
        let rng_state = config.seed;
        GameSession {
            config,
            role: None,
            local: PlayerState::new(HOST_COLOR),
            remote: PlayerState::new(CLIENT_COLOR),
            remote_target: None,
            platforms: Vec::new(),
            collectibles: Vec::new(),
            retired: VecDeque::new(),
            layout: None,
            is_connected: false,
            game_started: false,
            game_over: false,
            winner: None,
            rematch_requested: false,
            rematch_offered: false,
            last_tick: None,
            last_position_sent: None,
            last_collectible_spawn: 0,
            last_platform_regen: 0,
            rng_state,
        }
    }

    pub fn is_host(&self) -> bool {
        self.role == Some(Role::Host)
    }

    pub fn is_client(&self) -> bool {
        self.role == Some(Role::Client)
    }

    pub fn collectible_index(&self, timestamp: Millis) -> Option<usize> {
        self.collectibles.iter().position(|c| c.spec.timestamp == timestamp)
    }

    pub fn collectible_by_body(&self, body: BodyRef) -> Option<usize> {
        self.collectibles.iter().position(|c| c.body == body)
    }

    pub fn is_retired(&self, timestamp: Millis) -> bool {
        self.retired.contains(&timestamp)
    }

    pub fn retire(&mut self, timestamp: Millis) {
        if self.is_retired(timestamp) {
            return;
        }
        if self.retired.len() == RETIRED_CAPACITY {
            self.retired.pop_front();
        }
        self.retired.push_back(timestamp);
    }

    /// Spawn positions for (host, client) players.
    pub fn spawn_positions(&self) -> (Vec2, Vec2) {
        (self.config.initial_local_position, self.config.initial_remote_position)
    }

    /// Where this peer's own player starts.
    pub fn own_spawn(&self) -> Vec2 {
        let (host, client) = self.spawn_positions();
        if self.is_client() { client } else { host }
    }

    pub fn peer_spawn(&self) -> Vec2 {
        let (host, client) = self.spawn_positions();
        if self.is_client() { host } else { client }
    }
}
