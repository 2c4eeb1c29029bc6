//! Broad-phase collision detection using Sweep-and-Prune (SAP).
//!
//! The broad phase only reports candidate body pairs; the k-DOP trees and
//! the tetrahedron tests decide whether a pair actually touches.
//!
//! # Algorithm
//!
//! 1. Take each body's world AABB (the box part of its refit k-DOP root)
//! 2. Project the boxes onto the axis along which the box centers spread most
//! 3. Sort intervals by their minimum endpoint
//! 4. Sweep, confirming each interval overlap on all three axes
//!
//! Each unordered pair is reported at most once, as `(lower id, higher id)`,
//! and the output is sorted so the contact order downstream is reproducible.
//! Pairs of bodies that can never be pushed (fixed or scripted) are skipped.
//!
//! # Example
//!
//! ```
//! use prox_core::broad_phase::{Aabb, BroadPhase, BroadPhaseEntry, SweepAndPrune};
//! use prox_core::BodyId;
//! use nalgebra::{Point3, Vector3};
//!
//! let entries = vec![
//!     BroadPhaseEntry::new(BodyId::new(0), Aabb::from_center(Point3::origin(), Vector3::repeat(1.0)), false),
//!     BroadPhaseEntry::new(BodyId::new(1), Aabb::from_center(Point3::new(1.5, 0.0, 0.0), Vector3::repeat(1.0)), true),
//! ];
//!
//! let mut sap = SweepAndPrune::new();
//! assert_eq!(sap.find_potential_pairs(&entries), vec![(BodyId::new(0), BodyId::new(1))]);
//! ```

use nalgebra::{Point3, Vector3};
use prox_types::BodyId;

use crate::geometry::Ray;

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box.
    pub min: Point3<f64>,
    /// Maximum corner of the bounding box.
    pub max: Point3<f64>,
}

impl Aabb {
    /// Create a new AABB from minimum and maximum corners.
    #[must_use]
    pub const fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with the given half-extents.
    #[must_use]
    pub fn from_center(center: Point3<f64>, half_extents: Vector3<f64>) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Check if this AABB overlaps with another AABB.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Expand this AABB by a margin on all sides.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        let m = Vector3::repeat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Center of the box.
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Get the minimum value along a specific axis.
    #[must_use]
    pub fn min_on_axis(&self, axis: Axis) -> f64 {
        self.min[axis.index()]
    }

    /// Get the maximum value along a specific axis.
    #[must_use]
    pub fn max_on_axis(&self, axis: Axis) -> f64 {
        self.max[axis.index()]
    }

    /// Distance along `ray` at which it enters the box, if it does within `max_length`.
    ///
    /// A ray starting inside the box enters at distance 0.
    #[must_use]
    pub fn ray_entry(&self, ray: &Ray, max_length: f64) -> Option<f64> {
        let mut t_min = 0.0_f64;
        let mut t_max = max_length;
        for axis in Axis::all() {
            let i = axis.index();
            let start = ray.origin[i];
            let speed = ray.direction[i];
            if speed.abs() < 1e-15 {
                if !(self.min[i]..=self.max[i]).contains(&start) {
                    return None;
                }
                continue;
            }
            let a = (self.min[i] - start) / speed;
            let b = (self.max[i] - start) / speed;
            t_min = t_min.max(a.min(b));
            t_max = t_max.min(a.max(b));
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new(Point3::origin(), Point3::origin())
    }
}

/// Coordinate axis for sweep direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// X-axis.
    X,
    /// Y-axis.
    Y,
    /// Z-axis.
    Z,
}

impl Axis {
    /// Get all three axes.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::X, Self::Y, Self::Z]
    }

    /// Coordinate index of the axis.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

/// One body as seen by the broad phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadPhaseEntry {
    /// Body the box belongs to.
    pub body: BodyId,
    /// World-space bounds.
    pub aabb: Aabb,
    /// Whether contacts can move the body.
    pub is_free: bool,
}

impl BroadPhaseEntry {
    /// Create an entry.
    #[must_use]
    pub const fn new(body: BodyId, aabb: Aabb, is_free: bool) -> Self {
        Self {
            body,
            aabb,
            is_free,
        }
    }
}

/// Trait for broad-phase collision detection algorithms.
pub trait BroadPhase {
    /// Find all pairs of bodies that potentially collide.
    ///
    /// Returns each unordered pair once, lower id first, sorted.
    fn find_potential_pairs(&mut self, entries: &[BroadPhaseEntry]) -> Vec<(BodyId, BodyId)>;
}

fn ordered(a: BodyId, b: BodyId) -> (BodyId, BodyId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Sweep-and-Prune (Sort-and-Sweep) broad-phase algorithm.
///
/// The interval buffer is kept between calls; for slowly moving scenes the
/// adaptive sort sees nearly sorted input.
#[derive(Debug, Clone)]
pub struct SweepAndPrune {
    intervals: Vec<Interval>,
    sweep_axis: Axis,
    margin: f64,
}

#[derive(Debug, Clone, Copy)]
struct Interval {
    entry: usize,
    min: f64,
    max: f64,
}

impl Default for SweepAndPrune {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepAndPrune {
    /// Create a new sweep-and-prune broad phase.
    #[must_use]
    pub fn new() -> Self {
        Self {
            intervals: Vec::new(),
            sweep_axis: Axis::X,
            margin: 0.0,
        }
    }

    /// Expand every box by `margin` before testing.
    #[must_use]
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Axis used by the last sweep.
    #[must_use]
    pub fn sweep_axis(&self) -> Axis {
        self.sweep_axis
    }

    /// Pick the axis with the largest spread of box centers.
    fn choose_sweep_axis(entries: &[BroadPhaseEntry]) -> Axis {
        if entries.is_empty() {
            return Axis::X;
        }
        let mut lo = Vector3::repeat(f64::INFINITY);
        let mut hi = Vector3::repeat(f64::NEG_INFINITY);
        for entry in entries {
            let c = entry.aabb.center().coords;
            lo = lo.inf(&c);
            hi = hi.sup(&c);
        }
        let extent = hi - lo;
        if extent.x >= extent.y && extent.x >= extent.z {
            Axis::X
        } else if extent.y >= extent.z {
            Axis::Y
        } else {
            Axis::Z
        }
    }
}

impl BroadPhase for SweepAndPrune {
    fn find_potential_pairs(&mut self, entries: &[BroadPhaseEntry]) -> Vec<(BodyId, BodyId)> {
        self.sweep_axis = Self::choose_sweep_axis(entries);

        self.intervals.clear();
        for (index, entry) in entries.iter().enumerate() {
            let aabb = entry.aabb.expanded(self.margin);
            self.intervals.push(Interval {
                entry: index,
                min: aabb.min_on_axis(self.sweep_axis),
                max: aabb.max_on_axis(self.sweep_axis),
            });
        }
        self.intervals.sort_by(|a, b| a.min.total_cmp(&b.min));

        let mut pairs = Vec::new();
        for (i, first) in self.intervals.iter().enumerate() {
            for second in &self.intervals[i + 1..] {
                if second.min > first.max {
                    break;
                }
                let a = &entries[first.entry];
                let b = &entries[second.entry];
                if !a.is_free && !b.is_free {
                    continue;
                }
                if a.aabb
                    .expanded(self.margin)
                    .overlaps(&b.aabb.expanded(self.margin))
                {
                    pairs.push(ordered(a.body, b.body));
                }
            }
        }
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }
}

/// O(n²) broad phase; the reference the sweep is checked against.
#[derive(Debug, Clone, Default)]
pub struct BruteForce {
    margin: f64,
}

impl BruteForce {
    /// Create a new brute-force broad phase.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand every box by `margin` before testing.
    #[must_use]
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }
}

impl BroadPhase for BruteForce {
    fn find_potential_pairs(&mut self, entries: &[BroadPhaseEntry]) -> Vec<(BodyId, BodyId)> {
        let mut pairs = Vec::new();
        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                if !a.is_free && !b.is_free {
                    continue;
                }
                if a.aabb
                    .expanded(self.margin)
                    .overlaps(&b.aabb.expanded(self.margin))
                {
                    pairs.push(ordered(a.body, b.body));
                }
            }
        }
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }
}
