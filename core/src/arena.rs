//! Reference physics: a small kinematic AABB world.
//!
//! Players fall under gravity, land on platform tops (one-way, top surface
//! only) and are clamped to the arena floor, walls and ceiling. Collectibles
//! fall freely through everything so they eventually leave the arena.
//! Positions are body centers.

use std::collections::{BTreeMap, BTreeSet};

use crate::constants::*;
use crate::physics::*;
use crate::types::Vec2;

/// Distance within which a body counts as standing on a surface.
const GROUND_TOLERANCE: f64 = 2.0;

#[derive(Clone, Debug)]
struct Body {
    state: BodyState,
    half: Vec2,
    category: CollisionCategory,
}

impl Body {
    fn bottom(&self) -> f64 {
        self.state.position.y + self.half.y
    }

    fn overlaps(&self, other: &Body) -> bool {
        let d = Vec2::new(
            (self.state.position.x - other.state.position.x).abs(),
            (self.state.position.y - other.state.position.y).abs(),
        );
        d.x < self.half.x + other.half.x && d.y < self.half.y + other.half.y
    }
}

#[derive(Clone, Debug)]
pub struct ArenaWorld {
    width: f64,
    height: f64,
    bodies: BTreeMap<BodyRef, Body>,
    next_id: u32,
    touching: BTreeSet<(BodyRef, BodyRef)>,
}

impl ArenaWorld {
    pub fn new(width: f64, height: f64) -> Self {
        ArenaWorld {
            width,
            height,
            bodies: BTreeMap::new(),
            next_id: 1,
            touching: BTreeSet::new(),
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn count(&self, category: CollisionCategory) -> usize {
        self.bodies.values().filter(|b| b.category == category).count()
    }

    fn step_player(body: &mut Body, platforms: &[(Vec2, Vec2)], width: f64, height: f64, k: f64) {
        let s = &mut body.state;
        s.velocity.y = (s.velocity.y + GRAVITY * k).min(MAX_FALL_SPEED);
        let prev_bottom = s.position.y + body.half.y;
        s.position.x += s.velocity.x * k;
        s.position.y += s.velocity.y * k;
        s.angle += s.angular_velocity * k;

        // One-way platforms: only collide when falling onto the top surface
        if s.velocity.y >= 0.0 {
            let bottom = s.position.y + body.half.y;
            for (center, half) in platforms {
                let top = center.y - half.y;
                if prev_bottom <= top + GROUND_TOLERANCE
                    && bottom >= top
                    && (s.position.x - center.x).abs() < body.half.x + half.x
                {
                    s.position.y = top - body.half.y;
                    s.velocity.y = 0.0;
                }
            }
        }

        // Arena bounds
        if s.position.x - body.half.x < 0.0 {
            s.position.x = body.half.x;
            s.velocity.x = 0.0;
        }
        if s.position.x + body.half.x > width {
            s.position.x = width - body.half.x;
            s.velocity.x = 0.0;
        }
        if s.position.y - body.half.y < 0.0 {
            s.position.y = body.half.y;
            s.velocity.y = s.velocity.y.max(0.0);
        }
        if s.position.y + body.half.y > height {
            s.position.y = height - body.half.y;
            s.velocity.y = 0.0;
        }
    }

    fn step_collectible(body: &mut Body, k: f64) {
        let s = &mut body.state;
        s.velocity.y = (s.velocity.y + COLLECTIBLE_GRAVITY * k).min(COLLECTIBLE_MAX_FALL_SPEED);
        s.position.x += s.velocity.x * k;
        s.position.y += s.velocity.y * k;
        s.angle += s.angular_velocity * k;
    }
}

impl PhysicsAdapter for ArenaWorld {
    fn create_body(&mut self, position: Vec2, shape: Shape, category: CollisionCategory) -> BodyRef {
        let id = BodyRef(self.next_id);
        self.next_id += 1;
        self.bodies.insert(
            id,
            Body {
                state: BodyState { position, ..BodyState::default() },
                half: shape.half_extents(),
                category,
            },
        );
        id
    }

    fn remove_body(&mut self, body: BodyRef) {
        self.bodies.remove(&body);
        self.touching.retain(|(a, b)| *a != body && *b != body);
    }

    fn contains(&self, body: BodyRef) -> bool {
        self.bodies.contains_key(&body)
    }

    fn body_state(&self, body: BodyRef) -> Option<BodyState> {
        self.bodies.get(&body).map(|b| b.state)
    }

    fn set_position(&mut self, body: BodyRef, position: Vec2) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.state.position = position;
        }
    }

    fn set_velocity(&mut self, body: BodyRef, velocity: Vec2) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.state.velocity = velocity;
        }
    }

    fn set_angle(&mut self, body: BodyRef, angle: f64) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.state.angle = angle;
        }
    }

    fn set_angular_velocity(&mut self, body: BodyRef, angular_velocity: f64) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.state.angular_velocity = angular_velocity;
        }
    }

    fn apply_force(&mut self, body: BodyRef, delta: Vec2) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.state.velocity.x += delta.x;
            b.state.velocity.y += delta.y;
        }
    }

    fn query_ground_contact(&self, body: BodyRef) -> bool {
        let Some(b) = self.bodies.get(&body) else {
            return false;
        };
        let bottom = b.bottom();
        if (self.height - bottom).abs() <= GROUND_TOLERANCE {
            return true;
        }
        self.bodies.values().any(|p| {
            p.category == CollisionCategory::Platform
                && (p.state.position.y - p.half.y - bottom).abs() <= GROUND_TOLERANCE
                && (b.state.position.x - p.state.position.x).abs() < b.half.x + p.half.x
        })
    }

    fn step(&mut self, dt_ms: f64) -> Vec<CollisionStart> {
        let k = dt_ms / FRAME_MS;
        let platforms: Vec<(Vec2, Vec2)> = self
            .bodies
            .values()
            .filter(|b| b.category == CollisionCategory::Platform)
            .map(|b| (b.state.position, b.half))
            .collect();

        for body in self.bodies.values_mut() {
            match body.category {
                CollisionCategory::Player => {
                    Self::step_player(body, &platforms, self.width, self.height, k)
                }
                CollisionCategory::Collectible => Self::step_collectible(body, k),
                CollisionCategory::Platform | CollisionCategory::Boundary => {}
            }
        }

        // Contact pairs involving at least one player
        let dynamic: Vec<(BodyRef, &Body)> = self
            .bodies
            .iter()
            .filter(|(_, b)| !b.category.is_static())
            .map(|(id, b)| (*id, b))
            .collect();
        let mut now_touching = BTreeSet::new();
        for i in 0..dynamic.len() {
            for j in (i + 1)..dynamic.len() {
                let (ia, a) = dynamic[i];
                let (ib, b) = dynamic[j];
                let involves_player = a.category == CollisionCategory::Player
                    || b.category == CollisionCategory::Player;
                if involves_player && a.overlaps(b) {
                    now_touching.insert((ia, ib));
                }
            }
        }

        let starts = now_touching
            .difference(&self.touching)
            .map(|&(a, b)| CollisionStart { a, b })
            .collect();
        self.touching = now_touching;
        starts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_shape() -> Shape {
        Shape::Rectangle { width: PLAYER_SIZE, height: PLAYER_SIZE }
    }

    #[test]
    fn player_falls_to_floor() {
        let mut world = ArenaWorld::new(400.0, 400.0);
        let p = world.create_body(Vec2::new(100.0, 100.0), player_shape(), CollisionCategory::Player);
        assert!(!world.query_ground_contact(p));
        for _ in 0..300 {
            world.step(FRAME_MS);
        }
        let s = world.body_state(p).unwrap();
        assert_eq!(s.position.y, 400.0 - PLAYER_SIZE / 2.0);
        assert_eq!(s.velocity.y, 0.0);
        assert!(world.query_ground_contact(p));
    }

    #[test]
    fn player_lands_on_platform_top() {
        let mut world = ArenaWorld::new(400.0, 400.0);
        world.create_body(
            Vec2::new(100.0, 200.0),
            Shape::Rectangle { width: 120.0, height: PLATFORM_HEIGHT },
            CollisionCategory::Platform,
        );
        let p = world.create_body(Vec2::new(100.0, 100.0), player_shape(), CollisionCategory::Player);
        for _ in 0..200 {
            world.step(FRAME_MS);
        }
        let s = world.body_state(p).unwrap();
        assert_eq!(s.position.y, 200.0 - PLATFORM_HEIGHT / 2.0 - PLAYER_SIZE / 2.0);
        assert!(world.query_ground_contact(p));
    }

    #[test]
    fn jumping_through_platform_from_below() {
        let mut world = ArenaWorld::new(400.0, 400.0);
        world.create_body(
            Vec2::new(100.0, 350.0),
            Shape::Rectangle { width: 120.0, height: PLATFORM_HEIGHT },
            CollisionCategory::Platform,
        );
        let p = world.create_body(Vec2::new(100.0, 385.0), player_shape(), CollisionCategory::Player);
        world.set_velocity(p, Vec2::new(0.0, -9.0));
        world.step(FRAME_MS);
        world.step(FRAME_MS);
        // Still rising, platform did not catch it from below
        assert!(world.body_state(p).unwrap().position.y < 370.0);
    }

    #[test]
    fn collectibles_fall_through_platforms() {
        let mut world = ArenaWorld::new(400.0, 400.0);
        world.create_body(
            Vec2::new(200.0, 100.0),
            Shape::Rectangle { width: 180.0, height: PLATFORM_HEIGHT },
            CollisionCategory::Platform,
        );
        let c = world.create_body(
            Vec2::new(200.0, 0.0),
            Shape::Circle { radius: 10.0 },
            CollisionCategory::Collectible,
        );
        for _ in 0..600 {
            world.step(FRAME_MS);
        }
        assert!(world.body_state(c).unwrap().position.y > 450.0);
    }

    #[test]
    fn collision_start_fires_once_per_contact() {
        let mut world = ArenaWorld::new(400.0, 400.0);
        let p = world.create_body(Vec2::new(200.0, 385.0), player_shape(), CollisionCategory::Player);
        let c = world.create_body(
            Vec2::new(200.0, 380.0),
            Shape::Circle { radius: 10.0 },
            CollisionCategory::Collectible,
        );
        let first = world.step(FRAME_MS);
        assert_eq!(first, vec![CollisionStart { a: p, b: c }]);
        let second = world.step(FRAME_MS);
        assert!(second.is_empty());
    }

    #[test]
    fn removed_handles_are_inert() {
        let mut world = ArenaWorld::new(400.0, 400.0);
        let p = world.create_body(Vec2::new(10.0, 10.0), player_shape(), CollisionCategory::Player);
        world.remove_body(p);
        world.set_position(p, Vec2::new(50.0, 50.0));
        assert!(!world.contains(p));
        assert_eq!(world.body_state(p), None);
        assert!(!world.query_ground_contact(p));
        assert_eq!(world.body_count(), 0);
    }
}
