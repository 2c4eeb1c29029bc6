//! Rigid body state types.
//!
//! This module provides the rigid body record the stepping function owns:
//! pose, velocity, mass properties, the fixed/scripted classification, the
//! material index and any attached force callbacks.

use std::sync::Arc;

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dynamics::{ForceCallback, Wrench};

/// Index of a rigid body in the body array.
///
/// Contacts refer to bodies through this index, never through references,
/// so the body array may be reallocated between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId(pub usize);

impl BodyId {
    /// Create a new body ID.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the raw index value.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for BodyId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

/// Position and orientation of a rigid body.
///
/// # Example
///
/// ```
/// use prox_types::Pose;
/// use nalgebra::Point3;
///
/// let pose = Pose::from_position(Point3::new(1.0, 2.0, 3.0));
/// let world = pose.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert_eq!(world, Point3::new(2.0, 2.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Position in world coordinates.
    pub position: Point3<f64>,
    /// Orientation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Create an identity pose (origin, no rotation).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose at the given position with no rotation.
    #[must_use]
    pub fn from_position(position: Point3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from position and rotation.
    #[must_use]
    pub const fn new(position: Point3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self { position, rotation }
    }

    /// Transform a point from local to world coordinates.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.rotation * local.coords
    }

    /// Transform a vector from local to world coordinates (rotation only).
    #[must_use]
    pub fn transform_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }

    /// Transform a point from world to local coordinates.
    #[must_use]
    pub fn inverse_transform_point(&self, world: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation.inverse() * (world - self.position))
    }

    /// Transform a vector from world to local coordinates.
    #[must_use]
    pub fn inverse_transform_vector(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse() * world
    }

    /// Check if the pose contains valid (finite) values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|x| x.is_finite())
            && self.rotation.coords.iter().all(|x| x.is_finite())
    }
}

/// Linear and angular velocity of a rigid body, both in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Twist {
    /// Linear velocity of the center of mass (m/s).
    pub linear: Vector3<f64>,
    /// Angular velocity (rad/s).
    pub angular: Vector3<f64>,
}

impl Twist {
    /// Create a twist from linear and angular components.
    #[must_use]
    pub const fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    /// Zero velocity.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Velocity of a point rigidly attached to the body.
    ///
    /// `offset` is the world-frame vector from the center of mass to the point.
    #[must_use]
    pub fn velocity_at_point(&self, offset: &Vector3<f64>) -> Vector3<f64> {
        self.linear + self.angular.cross(offset)
    }

    /// Check if the twist contains valid (finite) values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.linear.iter().all(|x| x.is_finite()) && self.angular.iter().all(|x| x.is_finite())
    }
}

/// Mass and body-frame inertia tensor about the center of mass.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// Total mass in kg.
    pub mass: f64,
    /// Inertia tensor about the center of mass in body coordinates (kg·m²).
    pub inertia: Matrix3<f64>,
}

impl MassProperties {
    /// Create mass properties with given values.
    #[must_use]
    pub const fn new(mass: f64, inertia: Matrix3<f64>) -> Self {
        Self { mass, inertia }
    }

    /// Mass properties of a uniform solid sphere: I = (2/5) m r².
    #[must_use]
    pub fn sphere(mass: f64, radius: f64) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self {
            mass,
            inertia: Matrix3::from_diagonal(&Vector3::new(i, i, i)),
        }
    }

    /// Mass properties of a uniform solid box with the given half extents.
    #[must_use]
    pub fn box_shape(mass: f64, half_extents: Vector3<f64>) -> Self {
        let x2 = 4.0 * half_extents.x * half_extents.x;
        let y2 = 4.0 * half_extents.y * half_extents.y;
        let z2 = 4.0 * half_extents.z * half_extents.z;

        Self {
            mass,
            inertia: Matrix3::from_diagonal(&Vector3::new(
                mass * (y2 + z2) / 12.0,
                mass * (x2 + z2) / 12.0,
                mass * (x2 + y2) / 12.0,
            )),
        }
    }

    /// Get the inverse mass (0 for non-positive or infinite mass).
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        if self.mass <= 0.0 || self.mass.is_infinite() {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    /// Get the inverse inertia tensor, or `None` if it is singular.
    #[must_use]
    pub fn inverse_inertia(&self) -> Option<Matrix3<f64>> {
        self.inertia.try_inverse()
    }

    /// Validate that the mass properties are usable for a free body.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(crate::SimError::invalid_mass(format!(
                "mass must be positive and finite, got {}",
                self.mass
            )));
        }

        if !self.inertia.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_mass("inertia must be finite"));
        }

        let eigenvalues = self.inertia.symmetric_eigenvalues();
        if eigenvalues.iter().any(|&e| e <= 0.0) {
            return Err(crate::SimError::invalid_mass(
                "inertia tensor must be positive definite",
            ));
        }

        Ok(())
    }
}

/// How a body takes part in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BodyKind {
    /// Moved by forces and contact impulses.
    #[default]
    Free,
    /// Never moves.
    Fixed,
    /// Follows its prescribed velocity; contacts cannot push it.
    Scripted,
}

/// A rigid body.
///
/// Mutated only by the integrator and the solver's velocity update.
#[derive(Debug, Clone)]
pub struct RigidBody {
    /// Index of this body in the body array.
    pub id: BodyId,
    /// Position and orientation.
    pub pose: Pose,
    /// Linear and angular velocity.
    pub twist: Twist,
    /// Mass and body-frame inertia.
    pub mass_properties: MassProperties,
    /// Free, fixed or scripted.
    pub kind: BodyKind,
    /// Index into the material table.
    pub material: usize,
    /// Characteristic material structure direction in body coordinates.
    ///
    /// Zero for isotropic materials.
    pub structure_direction: Vector3<f64>,
    /// Force callbacks evaluated every step for free bodies.
    pub forces: Vec<Arc<dyn ForceCallback>>,
}

impl RigidBody {
    /// Create a free body at the given pose.
    #[must_use]
    pub fn new(id: BodyId, pose: Pose, mass_properties: MassProperties) -> Self {
        Self {
            id,
            pose,
            twist: Twist::zero(),
            mass_properties,
            kind: BodyKind::Free,
            material: 0,
            structure_direction: Vector3::zeros(),
            forces: Vec::new(),
        }
    }

    /// Create a fixed body at the given pose.
    #[must_use]
    pub fn fixed(id: BodyId, pose: Pose) -> Self {
        Self {
            kind: BodyKind::Fixed,
            ..Self::new(id, pose, MassProperties::new(0.0, Matrix3::zeros()))
        }
    }

    /// Set the body kind.
    #[must_use]
    pub fn with_kind(mut self, kind: BodyKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the material index.
    #[must_use]
    pub fn with_material(mut self, material: usize) -> Self {
        self.material = material;
        self
    }

    /// Set the body-frame material structure direction.
    #[must_use]
    pub fn with_structure_direction(mut self, direction: Vector3<f64>) -> Self {
        self.structure_direction = direction;
        self
    }

    /// Set the initial velocity.
    #[must_use]
    pub fn with_twist(mut self, twist: Twist) -> Self {
        self.twist = twist;
        self
    }

    /// Attach a force callback.
    #[must_use]
    pub fn with_force(mut self, force: Arc<dyn ForceCallback>) -> Self {
        self.forces.push(force);
        self
    }

    /// Check if the body never moves.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.kind == BodyKind::Fixed
    }

    /// Check if the body follows a prescribed velocity.
    #[must_use]
    pub fn is_scripted(&self) -> bool {
        self.kind == BodyKind::Scripted
    }

    /// Check if forces and contacts act on the body.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.kind == BodyKind::Free
    }

    /// Inverse mass seen by the solver (0 for fixed and scripted bodies).
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        if self.is_free() {
            self.mass_properties.inverse_mass()
        } else {
            0.0
        }
    }

    /// Inertia tensor rotated into world coordinates: R I Rᵀ.
    #[must_use]
    pub fn world_inertia(&self) -> Matrix3<f64> {
        let r = self.pose.rotation.to_rotation_matrix();
        r.matrix() * self.mass_properties.inertia * r.matrix().transpose()
    }

    /// Inverse world inertia seen by the solver (0 for fixed and scripted bodies).
    #[must_use]
    pub fn world_inverse_inertia(&self) -> Matrix3<f64> {
        if !self.is_free() {
            return Matrix3::zeros();
        }
        let r = self.pose.rotation.to_rotation_matrix();
        self.mass_properties
            .inverse_inertia()
            .map_or_else(Matrix3::zeros, |inv| {
                r.matrix() * inv * r.matrix().transpose()
            })
    }

    /// Material structure direction rotated into world coordinates.
    #[must_use]
    pub fn world_structure_direction(&self) -> Vector3<f64> {
        self.pose.transform_vector(&self.structure_direction)
    }

    /// Sum of every attached force callback at the current state.
    #[must_use]
    pub fn callback_wrench(&self, time: f64) -> Wrench {
        self.forces
            .iter()
            .fold(Wrench::zero(), |acc, f| acc + f.wrench(self, time))
    }

    /// Validate the body before a step mutates it.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.pose.is_finite() || !self.twist.is_finite() {
            return Err(crate::SimError::invalid_input(format!(
                "{} has non-finite state",
                self.id
            )));
        }
        if !self.structure_direction.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_input(format!(
                "{} has a non-finite structure direction",
                self.id
            )));
        }
        if self.is_free() {
            self.mass_properties.validate()?;
        }
        Ok(())
    }
}
