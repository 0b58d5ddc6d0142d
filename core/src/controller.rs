//! Per-frame driver.
//!
//! One `tick` per rendered frame, in this order:
//! 1. jump cooldown
//! 2. input, physics step, collectible pickups
//! 3. position broadcast
//! 4. remote interpolation
//! 5. repeat of an unanswered handshake step
//! 6. (host) pending layout resend, collectible spawn
//! 7. collectible cleanup
//! 8. win check
//! 9. (host) platform regeneration

use crate::constants::{FRAME_MS, IDLE_DECAY_FLOOR, MAX_STEP_MS};
use crate::events::GameEvent;
use crate::game::Game;
use crate::physics::{BodyState, CollisionStart, PhysicsAdapter};
use crate::protocol::Message;
use crate::session::Session;
use crate::sync::{HandshakeStep, SyncPhase};
use crate::types::*;

impl<P: PhysicsAdapter, S: Session> Game<P, S> {
    pub fn tick(&mut self, input: PlayerInput, now: Millis) {
        let dt = match self.state.last_tick {
            Some(last) => (now.saturating_sub(last) as f64).min(MAX_STEP_MS),
            None => FRAME_MS,
        };
        self.state.last_tick = Some(now);

        self.state.local.jump_cooldown = self.state.local.jump_cooldown.saturating_sub(1);
        self.apply_input(input);
        let contacts = self.physics.step(dt);
        self.resolve_contacts(&contacts);

        self.send_position(now);
        self.interpolate_remote(now);
        self.poll_handshake(now);

        if self.state.is_host() {
            self.poll_platform_resend(now);
            self.spawn_collectible(now);
        }
        self.cleanup_collectibles();
        self.check_win();
        if self.state.is_host() {
            self.regenerate_platforms(now);
        }
    }

    fn apply_input(&mut self, input: PlayerInput) {
        let Some(body) = self.state.local.body else {
            return;
        };
        let Some(current) = self.physics.body_state(body) else {
            return;
        };
        let on_ground = self.physics.query_ground_contact(body);
        let cfg = &self.state.config;
        let (max_jumps, cooldown_frames) = (cfg.max_jumps, cfg.jump_cooldown_frames);
        let (first_jump, second_jump) = (cfg.first_jump_velocity, cfg.second_jump_velocity);
        let (gain, max_speed, decay) = (cfg.move_gain, cfg.max_horizontal_speed, cfg.idle_decay);

        let local = &mut self.state.local;
        if on_ground && current.velocity.y >= 0.0 {
            local.jump_count = 0;
            local.is_jumping = false;
        }

        if input.jump_pressed()
            && local.jump_cooldown == 0
            && (on_ground || local.jump_count < max_jumps)
        {
            let vy = if local.jump_count == 0 { first_jump } else { second_jump };
            local.jump_count = local.jump_count.saturating_add(1);
            local.is_jumping = true;
            local.jump_cooldown = cooldown_frames;
            let count = local.jump_count;
            self.physics.set_velocity(body, Vec2::new(current.velocity.x, vy));
            self.events.push(GameEvent::Jumped { count });
        }

        let mut force = 0.0;
        if input.left() {
            force = -gain;
        }
        if input.right() {
            force = gain;
        }
        if force != 0.0 {
            self.physics.apply_force(body, Vec2::new(force, 0.0));
        }

        let Some(s) = self.physics.body_state(body) else {
            return;
        };
        if force != 0.0 {
            if s.velocity.x.abs() > max_speed {
                self.physics
                    .set_velocity(body, Vec2::new(max_speed.copysign(s.velocity.x), s.velocity.y));
            }
        } else if s.velocity.x.abs() > IDLE_DECAY_FLOOR {
            self.physics.set_velocity(body, Vec2::new(s.velocity.x * decay, s.velocity.y));
        }
    }

    fn resolve_contacts(&mut self, contacts: &[CollisionStart]) {
        if self.state.game_over {
            return;
        }
        let Some(me) = self.state.local.body else {
            return;
        };
        for pair in contacts {
            let Some(other) = pair.other(me) else {
                continue;
            };
            if let Some(idx) = self.state.collectible_by_body(other) {
                self.collect(idx);
            }
        }
    }

    /// Our own player touched a collectible.
    fn collect(&mut self, idx: usize) {
        let c = self.state.collectibles[idx];
        let position = self
            .physics
            .body_state(c.body)
            .map(|s| s.position)
            .unwrap_or(Vec2::new(c.spec.x, c.spec.y));
        self.remove_collectible(c.spec.timestamp);

        let penalty = c.spec.color != self.state.local.color;
        let score = self.state.local.score_collect(c.spec.color);
        self.events.push(GameEvent::Collected {
            position,
            color: c.spec.color,
            by: Side::Local,
            penalty,
        });
        self.emit_scores();
        self.send(Message::CollectibleCollected { timestamp: c.spec.timestamp, score });
    }

    fn spawn_collectible(&mut self, now: Millis) {
        let st = &self.state;
        if !st.is_connected || !st.game_started || st.game_over {
            return;
        }
        if now.saturating_sub(st.last_collectible_spawn) < st.config.collectible_spawn_interval_ms {
            return;
        }
        if st.collectibles.len() >= st.config.max_collectibles || st.is_retired(now) {
            return;
        }
        let spec = self.roll_collectible(now);
        if !self.add_collectible(spec) {
            return;
        }
        self.state.last_collectible_spawn = now;
        self.send(Message::CollectibleCreated { collectible: spec });
    }

    /// Drops collectibles that fell out of the arena.
    fn cleanup_collectibles(&mut self) {
        let limit = self.state.config.arena_height + self.state.config.cleanup_margin;
        let gone: Vec<Millis> = self
            .state
            .collectibles
            .iter()
            .filter(|c| self.physics.body_state(c.body).map_or(true, |s| s.position.y > limit))
            .map(|c| c.spec.timestamp)
            .collect();
        for timestamp in gone {
            self.remove_collectible(timestamp);
            if self.state.is_connected {
                self.send(Message::CollectibleRemoved { timestamp });
            }
        }
    }

    fn check_win(&mut self) {
        if self.state.game_over || self.state.local.has_won {
            return;
        }
        if self.state.local.score < self.state.config.win_score {
            return;
        }
        self.state.local.has_won = true;
        self.state.game_over = true;
        self.state.winner = Some(Side::Local);
        self.events.push(GameEvent::GameOver { winner: Side::Local });
        self.status("you win");
        self.send(Message::GameOver { winner: Side::Local });
    }

    fn regenerate_platforms(&mut self, now: Millis) {
        if !self.state.is_connected || self.state.game_over {
            return;
        }
        if matches!(
            self.sync.phase,
            SyncPhase::Handshaking(HandshakeStep::AwaitingReady { .. })
        ) {
            return;
        }
        if now.saturating_sub(self.state.last_platform_regen) < self.state.config.platform_regen_interval_ms {
            return;
        }
        self.broadcast_layout(now);
    }

    // ── Rematch ─────────────────────────────────────────────

    /// Asks the peer for a new round. Only valid once the game is over.
    pub fn request_rematch(&mut self) -> bool {
        if !self.state.game_over || !self.state.is_connected || self.state.rematch_requested {
            return false;
        }
        self.state.rematch_requested = true;
        self.send(Message::RematchRequest);
        self.status("rematch requested");
        true
    }

    /// Accepts the peer's pending rematch request and starts a new round.
    pub fn accept_rematch(&mut self, now: Millis) -> bool {
        if !self.state.rematch_offered || !self.state.is_connected {
            return false;
        }
        self.reset_match(now);
        self.send(Message::RematchAccepted);
        true
    }

    /// Clears scores, win flags and collectibles and puts both players back
    /// on their spawn points. The host also deals a new layout.
    pub(crate) fn reset_match(&mut self, now: Millis) {
        self.state.local.reset_round();
        self.state.remote.reset_round();
        self.state.game_over = false;
        self.state.winner = None;
        self.state.rematch_requested = false;
        self.state.rematch_offered = false;
        self.clear_collectibles();
        self.state.remote_target = None;

        let (own, peer) = (self.state.own_spawn(), self.state.peer_spawn());
        for (body, position) in [(self.state.local.body, own), (self.state.remote.body, peer)] {
            if let Some(body) = body {
                self.physics.set_state(body, BodyState { position, ..BodyState::default() });
            }
        }
        self.state.last_collectible_spawn = now;
        if self.state.is_host() {
            self.broadcast_layout(now);
        }
        self.events.push(GameEvent::GameReset);
        self.emit_scores();
        self.status("new round");
    }
}
