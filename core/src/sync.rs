//! Connection lifecycle and message handling.
//!
//! Roles are decided by who dials whom: the first inbound connection makes
//! this peer the host, a successful `connect` makes it a client. The host is
//! authoritative for platforms and collectible spawns; each side is
//! authoritative for its own body and score.
//!
//! Handshake (host H, client C), each step driven by an acknowledgement:
//!
//! ```text
//! H: incoming/open  ── prepareForInitialState ──▶ C   (C clears its players)
//! H ◀── prepareForInitialState ── C                   (echo: "ready")
//! H: new layout     ── setExactPlatforms ───────▶ C   (C rebuilds verbatim)
//! H ◀── platformsReady{seed, count} ── C
//! H: count matches  ── initialState ────────────▶ C   (C spawns both players)
//! H ◀── initComplete ── C                             (both synchronized)
//! ```
//!
//! The transport may drop any of these. Until the reply it waits for arrives,
//! each side repeats its current step on a doubling delay capped at
//! `handshake_retry_max_ms`. Repeats are idempotent: a client that already
//! applied a layout or the initial state acknowledges it again.
//!
//! A count mismatch makes the host resend the same layout after a backoff,
//! a bounded number of times.

use crate::events::GameEvent;
use crate::game::Game;
use crate::physics::{BodyState, PhysicsAdapter};
use crate::protocol::{self, Message, PositionUpdate};
use crate::session::{LoopbackSession, Session, SessionError, SessionEvent};
use crate::state::{LayoutKey, RemoteTarget};
use crate::types::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeStep {
    /// Host: waiting for the client to echo `prepareForInitialState`.
    AwaitingReady { prepare_sent: bool },
    /// Host: layout sent, waiting for a `platformsReady` with the right count.
    AwaitingPlatformsAck,
    /// Host: initial state sent, waiting for `initComplete`.
    AwaitingInitComplete,
    /// Client: channel open, waiting for the host's prepare.
    AwaitingPrepare,
    /// Client: prepare echoed, waiting for `initialState`.
    AwaitingInitialState,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncPhase {
    #[default]
    Idle,
    /// Peer library ready, not yet discoverable.
    AwaitingRole,
    /// Discoverable, no connection yet. Solo play.
    HostIdle,
    ClientConnecting,
    Handshaking(HandshakeStep),
    Synchronized,
    /// The connection closed; local state is kept.
    Disconnected,
}

impl SyncPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::AwaitingRole => "awaitingRole",
            SyncPhase::HostIdle => "hostIdle",
            SyncPhase::ClientConnecting => "clientConnecting",
            SyncPhase::Handshaking(_) => "handshaking",
            SyncPhase::Synchronized => "synchronized",
            SyncPhase::Disconnected => "disconnected",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncState {
    pub phase: SyncPhase,
    /// When the current layout should be resent after a count mismatch.
    pub resend_due: Option<Millis>,
    pub resend_attempts: u32,
    /// When the current handshake step is repeated if no reply has arrived.
    pub retry_due: Option<Millis>,
    pub retry_attempts: u32,
}

impl<P: PhysicsAdapter, S: Session> Game<P, S> {
    pub fn handle_event(&mut self, event: SessionEvent, now: Millis) {
        match event {
            SessionEvent::Ready { local_id } => self.on_ready(&local_id),
            SessionEvent::Incoming { remote_id } => self.on_incoming(&remote_id, now),
            SessionEvent::Open => self.on_open(now),
            SessionEvent::Data(msg) => self.on_message(msg, now),
            SessionEvent::Close => self.on_close(),
            SessionEvent::Error(err) => log::error!("transport error: {}", err),
        }
    }

    /// Decodes one wire message and handles it. Malformed input is logged and dropped.
    pub fn handle_raw(&mut self, json: &str, now: Millis) {
        match protocol::decode(json) {
            Ok(msg) => self.on_message(msg, now),
            Err(e) => log::warn!("{}", e),
        }
    }

    /// Dials a host. Fails for a peer that is already hosting a match.
    pub fn connect(&mut self, remote_id: &str) -> Result<(), SessionError> {
        if self.state.is_host() {
            return Err(SessionError::RoleConflict);
        }
        if self.state.is_connected {
            return Err(SessionError::AlreadyConnected);
        }
        self.session.connect(remote_id)?;
        self.state.role = Some(Role::Client);
        self.clear_collectibles();
        self.state.local.reset_round();
        self.state.remote.reset_round();
        self.state.game_over = false;
        self.state.winner = None;
        self.state.layout = None;
        self.sync.phase = SyncPhase::ClientConnecting;
        self.sync.retry_due = None;
        log::info!("dialing {}", remote_id);
        Ok(())
    }

    // ── Lifecycle ───────────────────────────────────────────

    fn on_ready(&mut self, local_id: &str) {
        if self.sync.phase != SyncPhase::Idle {
            log::debug!("peer library ready again as {}", local_id);
            return;
        }
        self.sync.phase = SyncPhase::AwaitingRole;

        // Solo play until someone joins
        let spawn = self.state.own_spawn();
        self.ensure_player(Side::Local, spawn);
        if self.state.platforms.is_empty() {
            let layout = self.default_layout();
            self.rebuild_platforms(&layout);
        }

        match self.session.host() {
            Ok(id) => {
                self.sync.phase = SyncPhase::HostIdle;
                self.status(format!("waiting for an opponent, share id {}", id));
            }
            Err(e) => log::warn!("could not become discoverable: {}", e),
        }
    }

    fn on_incoming(&mut self, remote_id: &str, now: Millis) {
        if self.state.is_client() {
            log::warn!("ignoring inbound connection from {} on a client", remote_id);
            return;
        }
        if self.state.is_connected {
            log::warn!("ignoring second connection from {}", remote_id);
            return;
        }
        self.state.role = Some(Role::Host);
        self.state.is_connected = true;
        self.state.game_started = true;

        // A new opponent starts a new match
        self.state.local.reset_round();
        self.state.remote.reset_round();
        self.state.local.is_ready = false;
        self.state.remote.is_ready = false;
        self.state.game_over = false;
        self.state.winner = None;
        self.state.rematch_requested = false;
        self.state.rematch_offered = false;
        self.clear_collectibles();

        self.assign_host_colors();
        let (own, peer) = (self.state.own_spawn(), self.state.peer_spawn());
        self.ensure_player(Side::Local, own);
        self.respawn_player(Side::Remote, peer);
        self.state.remote_target = None;
        self.state.last_platform_regen = now;

        self.sync.phase = SyncPhase::Handshaking(HandshakeStep::AwaitingReady { prepare_sent: false });
        self.arm_retry(now);
        self.status(format!("{} joined", remote_id));
        self.send_prepare();
    }

    fn on_open(&mut self, now: Millis) {
        match self.sync.phase {
            SyncPhase::Handshaking(HandshakeStep::AwaitingReady { prepare_sent: false }) => {
                self.send_prepare();
            }
            SyncPhase::ClientConnecting => {
                self.state.is_connected = true;
                self.state.game_started = true;
                self.state.last_platform_regen = now;
                self.sync.phase = SyncPhase::Handshaking(HandshakeStep::AwaitingPrepare);
                self.arm_retry(now);
                self.status("connected, waiting for the host");
                self.send(Message::RequestInitialState);
            }
            phase => log::debug!("channel open in phase {}", phase.name()),
        }
    }

    fn on_close(&mut self) {
        if self.sync.phase == SyncPhase::Disconnected {
            return;
        }
        self.remove_player(Side::Remote);
        self.state.remote_target = None;
        self.state.remote.is_ready = false;
        self.state.local.is_ready = false;
        self.clear_collectibles();
        self.state.is_connected = false;
        self.state.game_started = false;
        self.state.rematch_requested = false;
        self.state.rematch_offered = false;
        self.sync.phase = SyncPhase::Disconnected;
        self.sync.resend_due = None;
        self.sync.retry_due = None;
        self.status("opponent disconnected");
    }

    // ── Dispatch ────────────────────────────────────────────

    fn on_message(&mut self, msg: Message, now: Millis) {
        if !self.state.is_connected {
            log::debug!("ignoring {} without a connection", msg.kind());
            return;
        }
        log::trace!("received {}", msg.kind());
        match msg {
            Message::RequestInitialState => self.on_request_initial_state(),
            Message::PrepareForInitialState if self.state.is_host() => self.on_client_ready(now),
            Message::PrepareForInitialState => self.on_prepare(now),
            Message::InitialState {
                local_color,
                remote_color,
                local_position,
                remote_position,
            } => self.on_initial_state(local_color, remote_color, local_position, remote_position, now),
            Message::SetExactPlatforms { seed, timestamp, platforms } => {
                self.on_set_exact_platforms(LayoutKey { seed, timestamp }, &platforms, now)
            }
            Message::PlatformsReady { seed, timestamp, count } => {
                self.on_platforms_ready(LayoutKey { seed, timestamp }, count, now)
            }
            Message::InitComplete { platforms_count } => self.on_init_complete(platforms_count),
            Message::Position(update) => self.on_position(update, now),
            Message::CollectibleCreated { collectible } => self.on_collectible_created(collectible),
            Message::CollectibleCollected { timestamp, score } => {
                self.on_collectible_collected(timestamp, score)
            }
            Message::CollectibleRemoved { timestamp } => {
                if self.remove_collectible(timestamp).is_some() {
                    log::debug!("peer cleaned up collectible {}", timestamp);
                }
            }
            Message::GameOver { winner } => self.on_game_over(winner),
            Message::RematchRequest => self.on_rematch_request(),
            Message::RematchAccepted => self.on_rematch_accepted(now),
        }
    }

    // ── Handshake ───────────────────────────────────────────

    fn send_prepare(&mut self) {
        if !self.session.is_open() {
            return;
        }
        if let SyncPhase::Handshaking(HandshakeStep::AwaitingReady { prepare_sent }) = &mut self.sync.phase {
            *prepare_sent = true;
        }
        self.send(Message::PrepareForInitialState);
    }

    fn on_request_initial_state(&mut self) {
        match self.sync.phase {
            SyncPhase::Handshaking(HandshakeStep::AwaitingReady { .. }) => self.send_prepare(),
            phase => log::debug!("initial state requested in phase {}", phase.name()),
        }
    }

    /// Client side of the prepare exchange.
    fn on_prepare(&mut self, now: Millis) {
        match self.sync.phase {
            SyncPhase::Handshaking(
                HandshakeStep::AwaitingPrepare | HandshakeStep::AwaitingInitialState,
            ) => {
                self.remove_player(Side::Local);
                self.remove_player(Side::Remote);
                self.state.remote_target = None;
                self.sync.phase = SyncPhase::Handshaking(HandshakeStep::AwaitingInitialState);
                self.arm_retry(now);
                self.send(Message::PrepareForInitialState);
            }
            phase => log::debug!("ignoring prepare in phase {}", phase.name()),
        }
    }

    /// Host side: the client echoed prepare, so it is ready for a layout.
    fn on_client_ready(&mut self, now: Millis) {
        match self.sync.phase {
            SyncPhase::Handshaking(HandshakeStep::AwaitingReady { .. }) => {
                self.sync.phase = SyncPhase::Handshaking(HandshakeStep::AwaitingPlatformsAck);
                self.arm_retry(now);
                self.broadcast_layout(now);
            }
            phase => log::debug!("duplicate ready in phase {}", phase.name()),
        }
    }

    fn on_set_exact_platforms(&mut self, key: LayoutKey, platforms: &[PlatformSpec], now: Millis) {
        if self.state.is_host() {
            log::warn!("host ignoring a layout from its client");
            return;
        }
        if self.state.layout == Some(key) {
            log::debug!("layout {} already applied", key.seed);
            self.ack_layout(key);
            return;
        }
        self.rebuild_platforms(platforms);
        self.state.layout = Some(key);
        self.state.last_platform_regen = now;
        self.ack_layout(key);
    }

    fn ack_layout(&mut self, key: LayoutKey) {
        let count = self.state.platforms.len();
        self.send(Message::PlatformsReady {
            seed: key.seed,
            timestamp: key.timestamp,
            count,
        });
    }

    fn on_platforms_ready(&mut self, key: LayoutKey, count: usize, now: Millis) {
        if !self.state.is_host() {
            return;
        }
        let Some(current) = self.state.layout else {
            return;
        };
        if current.seed != key.seed {
            log::debug!("ack for stale layout {} (current {})", key.seed, current.seed);
            return;
        }
        let awaiting_ack =
            self.sync.phase == SyncPhase::Handshaking(HandshakeStep::AwaitingPlatformsAck);

        let expected = self.state.platforms.len();
        if count == expected {
            log::debug!("layout {}@{} acknowledged", key.seed, key.timestamp);
            self.sync.resend_due = None;
            if awaiting_ack {
                self.send_initial_state(now);
            }
            return;
        }

        if self.sync.resend_due.is_some() {
            return;
        }
        log::warn!("peer built {} platforms, expected {}", count, expected);
        let attempt = self.sync.resend_attempts;
        if attempt < self.state.config.platform_resend_limit {
            let delay = self
                .state
                .config
                .platform_resend_backoff_ms
                .saturating_mul(1u64 << attempt.min(16));
            self.sync.resend_due = Some(now.saturating_add(delay));
            self.sync.resend_attempts += 1;
        } else {
            log::warn!("giving up on layout {} after {} resends", key.seed, attempt);
            if awaiting_ack {
                self.send_initial_state(now);
            }
        }
    }

    /// Colors and spawns from the client's point of view.
    fn initial_state_message(&self) -> Message {
        Message::InitialState {
            local_color: self.state.remote.color,
            remote_color: self.state.local.color,
            local_position: self.state.peer_spawn(),
            remote_position: self.local_position().unwrap_or_else(|| self.state.own_spawn()),
        }
    }

    fn send_initial_state(&mut self, now: Millis) {
        let msg = self.initial_state_message();
        self.send(msg);
        self.sync.phase = SyncPhase::Handshaking(HandshakeStep::AwaitingInitComplete);
        self.arm_retry(now);
    }

    fn on_initial_state(
        &mut self,
        local_color: Color,
        remote_color: Color,
        local_position: Vec2,
        remote_position: Vec2,
        now: Millis,
    ) {
        if self.state.is_client() && self.sync.phase == SyncPhase::Synchronized {
            // Our initComplete was lost and the host repeated itself
            let platforms_count = self.state.platforms.len();
            self.send(Message::InitComplete { platforms_count });
            return;
        }
        if !self.state.is_client() || !matches!(self.sync.phase, SyncPhase::Handshaking(_)) {
            log::debug!("ignoring initial state in phase {}", self.sync.phase.name());
            return;
        }
        self.assign_colors(local_color, remote_color);
        self.respawn_player(Side::Local, local_position);
        self.respawn_player(Side::Remote, remote_position);
        self.state.remote_target = None;
        self.state.last_platform_regen = now;
        self.state.local.is_ready = true;
        self.state.remote.is_ready = true;

        let platforms_count = self.state.platforms.len();
        self.send(Message::InitComplete { platforms_count });
        self.sync.phase = SyncPhase::Synchronized;
        self.sync.retry_due = None;
        self.status(format!("synchronized, playing as {}", local_color.hex()));
    }

    fn on_init_complete(&mut self, platforms_count: usize) {
        log::info!(
            "client initialized with {} platforms (host has {})",
            platforms_count,
            self.state.platforms.len()
        );
        self.state.remote.is_ready = true;
        if self.sync.phase == SyncPhase::Handshaking(HandshakeStep::AwaitingInitComplete) {
            self.state.local.is_ready = true;
            self.sync.phase = SyncPhase::Synchronized;
            self.sync.retry_due = None;
            self.status("opponent synchronized");
        }
    }

    fn arm_retry(&mut self, now: Millis) {
        self.sync.retry_attempts = 0;
        self.sync.retry_due = Some(now.saturating_add(self.state.config.handshake_retry_ms));
    }

    /// Repeats the current handshake step once its retry is due.
    pub(crate) fn poll_handshake(&mut self, now: Millis) {
        let SyncPhase::Handshaking(step) = self.sync.phase else {
            return;
        };
        let Some(due) = self.sync.retry_due else {
            return;
        };
        if now < due || !self.state.is_connected {
            return;
        }
        self.sync.retry_attempts = self.sync.retry_attempts.saturating_add(1);
        let attempt = self.sync.retry_attempts;
        let cfg = &self.state.config;
        let delay = cfg
            .handshake_retry_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(cfg.handshake_retry_max_ms);
        self.sync.retry_due = Some(now.saturating_add(delay));
        log::info!("no reply in {:?}, repeating (attempt {})", step, attempt);

        match step {
            HandshakeStep::AwaitingReady { .. } => self.send_prepare(),
            HandshakeStep::AwaitingPlatformsAck => self.send_layout(),
            HandshakeStep::AwaitingInitComplete => {
                let msg = self.initial_state_message();
                self.send(msg);
            }
            HandshakeStep::AwaitingPrepare => self.send(Message::RequestInitialState),
            HandshakeStep::AwaitingInitialState => self.send(Message::PrepareForInitialState),
        }
    }

    /// Host: replaces the platform set with a fresh layout and sends it.
    pub(crate) fn broadcast_layout(&mut self, now: Millis) {
        let (seed, platforms) = self.generate_layout();
        self.rebuild_platforms(&platforms);
        self.state.layout = Some(LayoutKey { seed, timestamp: now });
        self.state.last_platform_regen = now;
        self.sync.resend_due = None;
        self.sync.resend_attempts = 0;
        log::debug!("new layout {} with {} platforms", seed, platforms.len());
        self.send(Message::SetExactPlatforms { seed, timestamp: now, platforms });
    }

    /// Host: sends the current layout again once a scheduled resend is due.
    pub(crate) fn poll_platform_resend(&mut self, now: Millis) {
        let Some(due) = self.sync.resend_due else {
            return;
        };
        if now < due {
            return;
        }
        self.sync.resend_due = None;
        let Some(layout) = self.state.layout else {
            return;
        };
        if !self.state.is_host() || !self.state.is_connected {
            return;
        }
        // Fresh timestamp so the client rebuilds instead of re-acking
        self.state.layout = Some(LayoutKey { seed: layout.seed, timestamp: now });
        log::info!("resending layout {} (attempt {})", layout.seed, self.sync.resend_attempts);
        self.send_layout();
    }

    /// Host: sends the current layout under its current key.
    fn send_layout(&mut self) {
        let Some(key) = self.state.layout else {
            return;
        };
        let platforms = self.state.platforms.iter().map(|p| p.spec).collect();
        self.send(Message::SetExactPlatforms { seed: key.seed, timestamp: key.timestamp, platforms });
    }

    // ── Steady state ────────────────────────────────────────

    fn on_position(&mut self, update: PositionUpdate, now: Millis) {
        let body = match self.state.remote.body {
            Some(body) => body,
            None => self.respawn_player(Side::Remote, update.position()),
        };
        self.state.remote.is_jumping = update.is_jumping;
        self.state.remote_target = Some(RemoteTarget {
            position: update.position(),
            velocity: update.velocity(),
            angle: update.angle,
            angular_velocity: update.angular_velocity,
            received_at: now,
        });
        if now.saturating_sub(update.timestamp) > self.state.config.stale_snap_threshold_ms {
            self.physics.set_state(
                body,
                BodyState {
                    position: update.position(),
                    velocity: update.velocity(),
                    angle: update.angle,
                    angular_velocity: update.angular_velocity,
                },
            );
        }
    }

    /// Broadcasts our own body, at most once per send interval.
    pub(crate) fn send_position(&mut self, now: Millis) {
        if !self.state.is_connected || !self.session.is_open() {
            return;
        }
        if let Some(last) = self.state.last_position_sent {
            if now.saturating_sub(last) < self.state.config.position_send_interval_ms {
                return;
            }
        }
        let Some(s) = self.state.local.body.and_then(|b| self.physics.body_state(b)) else {
            return;
        };
        self.state.last_position_sent = Some(now);
        self.send(Message::Position(PositionUpdate {
            x: s.position.x,
            y: s.position.y,
            vx: s.velocity.x,
            vy: s.velocity.y,
            angle: s.angle,
            angular_velocity: s.angular_velocity,
            is_jumping: self.state.local.is_jumping,
            timestamp: now,
        }));
    }

    /// Moves the remote body toward the last received state.
    pub(crate) fn interpolate_remote(&mut self, now: Millis) {
        let (Some(body), Some(target)) = (self.state.remote.body, self.state.remote_target) else {
            return;
        };
        let Some(current) = self.physics.body_state(body) else {
            return;
        };
        let window = self.state.config.interpolation_window_ms.max(1) as f64;
        let alpha = (now.saturating_sub(target.received_at) as f64 / window).min(1.0);
        let lerp = |a: f64, b: f64| a + (b - a) * alpha;
        self.physics.set_state(
            body,
            BodyState {
                position: current.position.lerp(target.position, alpha),
                velocity: current.velocity.lerp(target.velocity, alpha),
                angle: lerp(current.angle, target.angle),
                angular_velocity: lerp(current.angular_velocity, target.angular_velocity),
            },
        );
    }

    fn on_collectible_created(&mut self, spec: CollectibleSpec) {
        if self.state.is_retired(spec.timestamp) {
            log::debug!("collectible {} already resolved", spec.timestamp);
            return;
        }
        if !self.add_collectible(spec) {
            log::debug!("duplicate collectible {}", spec.timestamp);
        }
    }

    fn on_collectible_collected(&mut self, timestamp: Millis, score: u32) {
        let position = self
            .state
            .collectible_index(timestamp)
            .and_then(|i| self.physics.body_state(self.state.collectibles[i].body))
            .map(|s| s.position);
        if let Some(c) = self.remove_collectible(timestamp) {
            self.events.push(GameEvent::Collected {
                position: position.unwrap_or(Vec2::new(c.spec.x, c.spec.y)),
                color: c.spec.color,
                by: Side::Remote,
                penalty: c.spec.color != self.state.remote.color,
            });
        }
        self.state.remote.score = score;
        self.emit_scores();
    }

    /// `winner` is from the sender's point of view.
    fn on_game_over(&mut self, winner: Side) {
        if self.state.game_over {
            log::debug!("game already over");
            return;
        }
        let winner = winner.flip();
        self.state.game_over = true;
        self.state.winner = Some(winner);
        match winner {
            Side::Remote => {
                self.state.remote.has_won = true;
                self.status("opponent wins");
            }
            Side::Local => self.status("you win"),
        }
        self.events.push(GameEvent::GameOver { winner });
    }

    fn on_rematch_request(&mut self) {
        if self.state.rematch_offered {
            return;
        }
        self.state.rematch_offered = true;
        self.events.push(GameEvent::RematchOffered);
        self.status("opponent wants a rematch");
    }

    fn on_rematch_accepted(&mut self, now: Millis) {
        if !self.state.rematch_requested {
            log::debug!("rematch accepted without a pending request");
            return;
        }
        self.reset_match(now);
    }
}

impl<P: PhysicsAdapter> Game<P, LoopbackSession> {
    /// Handles every queued loopback event. Returns how many were handled.
    pub fn pump(&mut self, now: Millis) -> usize {
        let mut handled = 0;
        while let Some(event) = self.session.poll_event() {
            self.handle_event(event, now);
            handled += 1;
        }
        handled
    }
}
