//! Collision broad phase for moving line segments.
//! # Contracts:
//! - Rectangles are half-open: x in [tl.x, br.x) and y in [br.y, tl.y),
//!   with y decreasing downward, so a point on a shared edge belongs to
//!   exactly one of two adjacent regions
//! - The intersection primitive is always invoked with the lower segment
//!   id first
//!
pub mod quadtree;

use std::ops::{Add, AddAssign, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A line segment owned by the simulation world. The tree only ever holds
/// references to these; `id` is the stable identity used to order pairs.
#[derive(Debug, Clone)]
pub struct Segment {
    pub p1: Vec2,
    pub p2: Vec2,
    pub velocity: Vec2,
    pub id: u32,
}

impl Segment {
    pub fn new(p1: Vec2, p2: Vec2, velocity: Vec2, id: u32) -> Self {
        Self {
            p1,
            p2,
            velocity,
            id,
        }
    }

    /// Min and max corners of the current axis-aligned bounding box.
    pub fn aabb(&self) -> (Vec2, Vec2) {
        (
            Vec2::new(self.p1.x.min(self.p2.x), self.p1.y.min(self.p2.y)),
            Vec2::new(self.p1.x.max(self.p2.x), self.p1.y.max(self.p2.y)),
        )
    }
}

/// Half-open axis-aligned rectangle, top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub tl: Vec2,
    pub br: Vec2,
}

impl Rect {
    pub fn new(tl: Vec2, br: Vec2) -> Self {
        debug_assert!(tl.x <= br.x);
        debug_assert!(br.y <= tl.y);
        Self { tl, br }
    }
}

/// How a pair of segments meets within the timestep. The builder only cares
/// that the primitive reported something; the simulation loop consumes the
/// distinction when resolving the hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntersectionKind {
    FirstHitsSecond,
    SecondHitsFirst,
    AlreadyOverlapping,
}

/// The external segment-segment intersection primitive.
///
/// `None` means the pair does not meet within `time_step`. Implementations
/// must accept `first.id < second.id` as given and be callable from many
/// threads at once.
pub trait Intersector: Sync {
    fn intersect(
        &self,
        first: &Segment,
        second: &Segment,
        time_step: f64,
    ) -> Option<IntersectionKind>;
}
