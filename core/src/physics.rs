//! Seam between the game and whatever rigid-body engine simulates it.

use crate::types::Vec2;

/// Weak handle to a body. Operations on a removed handle are no-ops.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyRef(pub u32);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Rectangle { width: f64, height: f64 },
    Circle { radius: f64 },
    /// Regular triangle inscribed in a circle of `radius`.
    Triangle { radius: f64 },
}

impl Shape {
    /// Half extents of the axis-aligned bounding box.
    pub fn half_extents(&self) -> Vec2 {
        match *self {
            Shape::Rectangle { width, height } => Vec2::new(width / 2.0, height / 2.0),
            Shape::Circle { radius } | Shape::Triangle { radius } => Vec2::new(radius, radius),
        }
    }
}

/// Collision filter categories. Bit values match the browser build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CollisionCategory {
    Boundary = 0x0001,
    Player = 0x0002,
    Platform = 0x0004,
    Collectible = 0x0008,
}

impl CollisionCategory {
    pub fn bits(self) -> u32 {
        self as u32
    }

    pub fn is_static(self) -> bool {
        matches!(self, CollisionCategory::Boundary | CollisionCategory::Platform)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BodyState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub angle: f64,
    pub angular_velocity: f64,
}

/// Two bodies started touching during the last step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollisionStart {
    pub a: BodyRef,
    pub b: BodyRef,
}

impl CollisionStart {
    /// If `body` is part of this pair, returns the other body.
    pub fn other(&self, body: BodyRef) -> Option<BodyRef> {
        if self.a == body {
            Some(self.b)
        } else if self.b == body {
            Some(self.a)
        } else {
            None
        }
    }
}

pub trait PhysicsAdapter {
    fn create_body(&mut self, position: Vec2, shape: Shape, category: CollisionCategory) -> BodyRef;
    fn remove_body(&mut self, body: BodyRef);
    fn contains(&self, body: BodyRef) -> bool;
    fn body_state(&self, body: BodyRef) -> Option<BodyState>;

    fn set_position(&mut self, body: BodyRef, position: Vec2);
    fn set_velocity(&mut self, body: BodyRef, velocity: Vec2);
    fn set_angle(&mut self, body: BodyRef, angle: f64);
    fn set_angular_velocity(&mut self, body: BodyRef, angular_velocity: f64);
    /// Adds `delta` to the body's velocity for the coming step.
    fn apply_force(&mut self, body: BodyRef, delta: Vec2);

    /// True when the body is resting on the ground or on a platform.
    fn query_ground_contact(&self, body: BodyRef) -> bool;

    /// Advances the world by `dt_ms` and reports pairs that began touching.
    fn step(&mut self, dt_ms: f64) -> Vec<CollisionStart>;

    fn set_state(&mut self, body: BodyRef, state: BodyState) {
        self.set_position(body, state.position);
        self.set_velocity(body, state.velocity);
        self.set_angle(body, state.angle);
        self.set_angular_velocity(body, state.angular_velocity);
    }
}
