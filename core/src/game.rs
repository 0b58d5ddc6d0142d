//! `Game` owns one peer's match: the session aggregate, the physics world
//! and the transport. Protocol handlers live in `sync`, the frame loop in
//! `controller`; this module holds construction, world-building helpers and
//! read-only views.

use serde::Serialize;

use crate::config::GameConfig;
use crate::constants::{
    CLIENT_COLOR, COLLECTIBLE_KINDS, COLLECTIBLE_SPAWN_MARGIN, COLLECTIBLE_SPAWN_Y, HOST_COLOR,
};
use crate::events::GameEvent;
use crate::physics::{BodyRef, CollisionCategory, PhysicsAdapter, Shape};
use crate::prng::{prng_pick, prng_range, prng_seed};
use crate::protocol::Message;
use crate::session::Session;
use crate::state::{GameSession, LiveCollectible, LivePlatform, PlayerState};
use crate::sync::{SyncPhase, SyncState};
use crate::types::*;

pub struct Game<P: PhysicsAdapter, S: Session> {
    pub(crate) state: GameSession,
    pub(crate) sync: SyncState,
    pub(crate) physics: P,
    pub(crate) session: S,
    pub(crate) events: Vec<GameEvent>,
}

impl<P: PhysicsAdapter, S: Session> Game<P, S> {
    pub fn new(config: GameConfig, physics: P, session: S) -> Self {
        Game {
            state: GameSession::new(config),
            sync: SyncState::default(),
            physics,
            session,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> &GameSession {
        &self.state
    }

    pub fn config(&self) -> &GameConfig {
        &self.state.config
    }

    pub fn phase(&self) -> SyncPhase {
        self.sync.phase
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Takes all events raised since the last call.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn local_position(&self) -> Option<Vec2> {
        self.body_position(self.state.local.body)
    }

    pub fn remote_position(&self) -> Option<Vec2> {
        self.body_position(self.state.remote.body)
    }

    fn body_position(&self, body: Option<BodyRef>) -> Option<Vec2> {
        body.and_then(|b| self.physics.body_state(b)).map(|s| s.position)
    }

    pub fn snapshot(&self) -> Snapshot {
        let player = |p: &PlayerState| {
            let body = p.body.and_then(|b| self.physics.body_state(b));
            PlayerView {
                color: p.color,
                score: p.score,
                has_won: p.has_won,
                is_ready: p.is_ready,
                position: body.map(|s| s.position),
                angle: body.map(|s| s.angle).unwrap_or(0.0),
            }
        };
        Snapshot {
            phase: self.sync.phase.name(),
            role: self.state.role,
            is_connected: self.state.is_connected,
            local: player(&self.state.local),
            remote: player(&self.state.remote),
            platforms: self.state.platforms.iter().map(|p| p.spec).collect(),
            collectibles: self
                .state
                .collectibles
                .iter()
                .filter_map(|c| {
                    let s = self.physics.body_state(c.body)?;
                    Some(CollectibleView {
                        kind: c.spec.kind,
                        color: c.spec.color,
                        timestamp: c.spec.timestamp,
                        position: s.position,
                        angle: s.angle,
                    })
                })
                .collect(),
            game_over: self.state.game_over,
            winner: self.state.winner,
            rematch_requested: self.state.rematch_requested,
            rematch_offered: self.state.rematch_offered,
        }
    }

    // ── Outbound ────────────────────────────────────────────

    /// Best-effort send; failures are logged and the message is dropped.
    pub(crate) fn send(&mut self, msg: Message) {
        if let Err(e) = self.session.send(&msg) {
            log::warn!("dropping {} message: {}", msg.kind(), e);
        }
    }

    pub(crate) fn status(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::info!("{}", text);
        self.events.push(GameEvent::Status { text });
    }

    pub(crate) fn emit_scores(&mut self) {
        self.events.push(GameEvent::ScoreChanged {
            local: self.state.local.score,
            remote: self.state.remote.score,
        });
    }

    // ── World building ──────────────────────────────────────

    fn player_shape(&self) -> Shape {
        let size = self.state.config.player_size;
        Shape::Rectangle { width: size, height: size }
    }

    /// Replaces the body for `side` with a fresh one at `position`.
    pub(crate) fn respawn_player(&mut self, side: Side, position: Vec2) -> BodyRef {
        self.remove_player(side);
        let shape = self.player_shape();
        let body = self.physics.create_body(position, shape, CollisionCategory::Player);
        self.player_mut(side).body = Some(body);
        body
    }

    /// Creates a body for `side` at `position` unless one already exists.
    pub(crate) fn ensure_player(&mut self, side: Side, position: Vec2) -> BodyRef {
        match self.player_mut(side).body {
            Some(body) => body,
            None => self.respawn_player(side, position),
        }
    }

    pub(crate) fn remove_player(&mut self, side: Side) {
        if let Some(body) = self.player_mut(side).body.take() {
            self.physics.remove_body(body);
        }
    }

    pub(crate) fn player_mut(&mut self, side: Side) -> &mut PlayerState {
        match side {
            Side::Local => &mut self.state.local,
            Side::Remote => &mut self.state.remote,
        }
    }

    pub(crate) fn assign_colors(&mut self, local: Color, remote: Color) {
        self.state.local.color = local;
        self.state.remote.color = remote;
    }

    pub(crate) fn assign_host_colors(&mut self) {
        self.assign_colors(HOST_COLOR, CLIENT_COLOR);
    }

    /// Destroys every platform and builds exactly `specs`.
    pub(crate) fn rebuild_platforms(&mut self, specs: &[PlatformSpec]) {
        for platform in self.state.platforms.drain(..) {
            self.physics.remove_body(platform.body);
        }
        let height = self.state.config.platform_height;
        for spec in specs {
            let body = self.physics.create_body(
                Vec2::new(spec.x, spec.y),
                Shape::Rectangle { width: spec.width, height },
                CollisionCategory::Platform,
            );
            self.state.platforms.push(LivePlatform { spec: *spec, body });
        }
    }

    pub(crate) fn default_layout(&self) -> Vec<PlatformSpec> {
        let width = self.state.config.default_platform_width;
        self.state
            .config
            .platform_anchors
            .iter()
            .map(|a| PlatformSpec { x: a.x, y: a.y, width })
            .collect()
    }

    /// Draws a fresh layout seed from the session stream and expands it.
    pub(crate) fn generate_layout(&mut self) -> (Seed, Vec<PlatformSpec>) {
        let (seed, next) = prng_seed(self.state.rng_state);
        self.state.rng_state = next;
        (seed, layout_from_seed(&self.state.config, seed))
    }

    /// Adds a collectible unless one with the same id exists. Returns whether it was added.
    pub(crate) fn add_collectible(&mut self, spec: CollectibleSpec) -> bool {
        if self.state.collectible_index(spec.timestamp).is_some() {
            return false;
        }
        let radius = self.state.config.collectible_size / 2.0;
        let shape = match spec.kind {
            CollectibleKind::Circle => Shape::Circle { radius },
            CollectibleKind::Triangle => Shape::Triangle { radius },
            CollectibleKind::Rectangle => Shape::Rectangle {
                width: self.state.config.collectible_size,
                height: self.state.config.collectible_size,
            },
        };
        let body = self
            .physics
            .create_body(Vec2::new(spec.x, spec.y), shape, CollisionCategory::Collectible);
        self.state.collectibles.push(LiveCollectible { spec, body });
        true
    }

    /// Removes the collectible with `timestamp` and remembers it as resolved.
    pub(crate) fn remove_collectible(&mut self, timestamp: Millis) -> Option<LiveCollectible> {
        self.state.retire(timestamp);
        let idx = self.state.collectible_index(timestamp)?;
        let removed = self.state.collectibles.remove(idx);
        self.physics.remove_body(removed.body);
        Some(removed)
    }

    pub(crate) fn clear_collectibles(&mut self) {
        for c in self.state.collectibles.drain(..) {
            self.physics.remove_body(c.body);
        }
        self.state.retired.clear();
    }

    /// Rolls a new collectible from the session stream.
    pub(crate) fn roll_collectible(&mut self, now: Millis) -> CollectibleSpec {
        let cfg = &self.state.config;
        let margin = COLLECTIBLE_SPAWN_MARGIN.min(cfg.arena_width / 2.0);
        let (kind, s) = prng_pick(self.state.rng_state, &COLLECTIBLE_KINDS);
        let (color, s) = prng_pick(s, &[HOST_COLOR, CLIENT_COLOR]);
        let (x, s) = prng_range(s, margin, cfg.arena_width - margin);
        self.state.rng_state = s;
        CollectibleSpec { kind, color, x, y: COLLECTIBLE_SPAWN_Y, timestamp: now }
    }
}

/// Expands a layout seed into one platform per anchor with a random width.
pub fn layout_from_seed(config: &GameConfig, seed: Seed) -> Vec<PlatformSpec> {
    let mut state = seed;
    config
        .platform_anchors
        .iter()
        .map(|a| {
            let (width, next) = prng_range(state, config.platform_min_width, config.platform_max_width);
            state = next;
            PlatformSpec { x: a.x, y: a.y, width }
        })
        .collect()
}

// ── Read-only views ─────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub color: Color,
    pub score: u32,
    pub has_won: bool,
    pub is_ready: bool,
    pub position: Option<Vec2>,
    pub angle: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectibleView {
    #[serde(rename = "type")]
    pub kind: CollectibleKind,
    pub color: Color,
    pub timestamp: Millis,
    pub position: Vec2,
    pub angle: f64,
}

/// Everything a renderer needs for one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub phase: &'static str,
    pub role: Option<Role>,
    pub is_connected: bool,
    pub local: PlayerView,
    pub remote: PlayerView,
    pub platforms: Vec<PlatformSpec>,
    pub collectibles: Vec<CollectibleView>,
    pub game_over: bool,
    pub winner: Option<Side>,
    pub rematch_requested: bool,
    pub rematch_offered: bool,
}
