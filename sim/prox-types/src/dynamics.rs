//! External force types: gravity, wrenches and force callbacks.

use std::ops::{Add, AddAssign};

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::body::RigidBody;

/// A force and torque pair acting on a body's center of mass (world frame).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Wrench {
    /// Force (N).
    pub force: Vector3<f64>,
    /// Torque about the center of mass (N·m).
    pub torque: Vector3<f64>,
}

impl Wrench {
    /// Create a wrench from force and torque.
    #[must_use]
    pub const fn new(force: Vector3<f64>, torque: Vector3<f64>) -> Self {
        Self { force, torque }
    }

    /// Zero wrench.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Wrench produced by a force applied at a world point.
    #[must_use]
    pub fn at_point(force: Vector3<f64>, point: &Point3<f64>, center: &Point3<f64>) -> Self {
        Self {
            force,
            torque: (point - center).cross(&force),
        }
    }
}

impl Add for Wrench {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            force: self.force + rhs.force,
            torque: self.torque + rhs.torque,
        }
    }
}

impl AddAssign for Wrench {
    fn add_assign(&mut self, rhs: Self) {
        self.force += rhs.force;
        self.torque += rhs.torque;
    }
}

/// A force source evaluated once per step for every free body it is attached to.
pub trait ForceCallback: Send + Sync + std::fmt::Debug {
    /// Compute the wrench on `body` at simulation time `time`.
    fn wrench(&self, body: &RigidBody, time: f64) -> Wrench;
}

/// A constant world-frame force applied at the center of mass.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstantForce {
    /// Force (N).
    pub force: Vector3<f64>,
}

impl ForceCallback for ConstantForce {
    fn wrench(&self, _body: &RigidBody, _time: f64) -> Wrench {
        Wrench::new(self.force, Vector3::zeros())
    }
}

/// Spring-damper pinning a body-fixed point to a world anchor.
///
/// ```text
/// F = k (anchor - p) - c v_p
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinToPoint {
    /// Attachment point in body coordinates.
    pub local_point: Point3<f64>,
    /// Target point in world coordinates.
    pub anchor: Point3<f64>,
    /// Spring stiffness (N/m).
    pub stiffness: f64,
    /// Damping coefficient (N·s/m).
    pub damping: f64,
}

impl PinToPoint {
    /// Create a pin with the given stiffness and damping.
    #[must_use]
    pub const fn new(
        local_point: Point3<f64>,
        anchor: Point3<f64>,
        stiffness: f64,
        damping: f64,
    ) -> Self {
        Self {
            local_point,
            anchor,
            stiffness,
            damping,
        }
    }
}

impl ForceCallback for PinToPoint {
    fn wrench(&self, body: &RigidBody, _time: f64) -> Wrench {
        let point = body.pose.transform_point(&self.local_point);
        let offset = point - body.pose.position;
        let velocity = body.twist.velocity_at_point(&offset);
        let force = (self.anchor - point) * self.stiffness - velocity * self.damping;
        Wrench::at_point(force, &point, &body.pose.position)
    }
}

/// Gravity configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gravity {
    /// Acceleration due to gravity (m/s²).
    pub acceleration: Vector3<f64>,
}

impl Default for Gravity {
    fn default() -> Self {
        Self::earth()
    }
}

impl Gravity {
    /// Standard Earth gravity (9.81 m/s² in -Z direction).
    #[must_use]
    pub fn earth() -> Self {
        Self {
            acceleration: Vector3::new(0.0, 0.0, -9.81),
        }
    }

    /// Zero gravity.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            acceleration: Vector3::zeros(),
        }
    }

    /// Custom gravity vector.
    #[must_use]
    pub const fn custom(acceleration: Vector3<f64>) -> Self {
        Self { acceleration }
    }

    /// Compute the gravitational force on a body.
    #[must_use]
    pub fn force_on_mass(&self, mass: f64) -> Vector3<f64> {
        self.acceleration * mass
    }
}
