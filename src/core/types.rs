//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Seed identifying one deterministic run
pub type Seed = u32;

/// Simulation tick counter
pub type Tick = u64;

/// Unique identifier for actors and spawned entities
///
/// Ids are allocated from a counter owned by the simulation so that two
/// runs with the same seed assign identical ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Faction / player tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactionId(pub u8);

impl FactionId {
    /// Neutral/hostile creatures introduced by the spawner
    pub const MONSTERS: FactionId = FactionId(0);

    pub fn new(id: u8) -> Self {
        Self(id)
    }
}

/// 2D position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0001 {
            Self { x: self.x / len, y: self.y / len }
        } else {
            Self::default()
        }
    }

    /// Perpendicular vector (rotated 90 degrees counter-clockwise)
    pub fn perpendicular(&self) -> Self {
        Self { x: -self.y, y: self.x }
    }

    /// Step from `self` towards `target` by at most `max_step`
    pub fn step_towards(&self, target: &Self, max_step: f64) -> Self {
        let delta = *target - *self;
        let dist = delta.length();
        if dist <= max_step {
            *target
        } else {
            *self + delta.normalize() * max_step
        }
    }

    /// Average of a set of points; `None` when empty
    pub fn centroid<'a>(points: impl IntoIterator<Item = &'a Vec2>) -> Option<Self> {
        let mut sum = Vec2::default();
        let mut count = 0usize;
        for p in points {
            sum = sum + *p;
            count += 1;
        }
        if count == 0 {
            None
        } else {
            Some(sum * (1.0 / count as f64))
        }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

impl std::ops::Mul<f64> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self { x: self.x * rhs, y: self.y * rhs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_ordering() {
        assert!(EntityId(1) < EntityId(2));
        assert_eq!(EntityId(7).to_string(), "#7");
    }

    #[test]
    fn test_step_towards_stops_at_target() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert_eq!(a.step_towards(&b, 10.0), b);
        let mid = a.step_towards(&b, 2.5);
        assert!((mid.distance(&a) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_centroid() {
        let points = [Vec2::new(0.0, 0.0), Vec2::new(2.0, 4.0)];
        assert_eq!(Vec2::centroid(points.iter()), Some(Vec2::new(1.0, 2.0)));
        assert_eq!(Vec2::centroid(std::iter::empty()), None);
    }

    #[test]
    fn test_perpendicular_is_orthogonal() {
        let v = Vec2::new(3.0, 1.0);
        let p = v.perpendicular();
        assert_eq!(v.x * p.x + v.y * p.y, 0.0);
    }
}
