//! Contact Jacobian and system assembly.
//!
//! Each contact contributes one block row with two 4×6 blocks, one per body.
//! Rows are `{normal, s, t, drilling}`, columns are `{linear, angular}`:
//!
//! ```text
//! body j:  [  n   (r_j × n) ]      body i:  [ -n   -(r_i × n) ]
//!          [  s   (r_j × s) ]               [ -s   -(r_i × s) ]
//!          [  t   (r_j × t) ]               [ -t   -(r_i × t) ]
//!          [  0        n    ]               [  0       -n     ]
//! ```
//!
//! with `r` the lever arm from the body's center of mass to the contact
//! point. `J u` is then the velocity of `j` relative to `i` in contact
//! coordinates, and a positive normal impulse pushes `j` along `n`.

use nalgebra::Vector3;
use prox_contact::{ContactFrame, ContactPoint, MatchStickModel, MaterialTable};
use prox_linalg::{
    BlockDiagonalMatrix, BlockMatrix, BlockVector, BodyVector, ContactVector, JacobianBlock,
    MassBlock, TwoColumnBlockMatrix,
};
use prox_types::{Result, RigidBody, SimError, WorldConfig};

use crate::forces::external_forces;

/// Jacobian block of one body for one contact, before the sign is applied.
#[must_use]
pub fn jacobian_block(frame: &ContactFrame, lever_arm: &Vector3<f64>) -> JacobianBlock {
    let mut block = JacobianBlock::zeros();
    for (row, axis) in [frame.n, frame.s, frame.t].iter().enumerate() {
        block.fixed_view_mut::<1, 3>(row, 0).copy_from(&axis.transpose());
        block
            .fixed_view_mut::<1, 3>(row, 3)
            .copy_from(&lever_arm.cross(axis).transpose());
    }
    block.fixed_view_mut::<1, 3>(3, 3).copy_from(&frame.n.transpose());
    block
}

fn body(bodies: &[RigidBody], id: prox_types::BodyId) -> Result<&RigidBody> {
    bodies.get(id.index()).ok_or(SimError::InvalidBodyId(id.index()))
}

/// Build the contact Jacobian for `contacts` over `bodies`.
pub fn assemble_jacobian(
    contacts: &[ContactPoint],
    frames: &[ContactFrame],
    bodies: &[RigidBody],
) -> Result<TwoColumnBlockMatrix<4, 6>> {
    if frames.len() != contacts.len() {
        return Err(SimError::dimension_mismatch(
            "assemble_jacobian",
            contacts.len(),
            frames.len(),
        ));
    }
    let mut jacobian = TwoColumnBlockMatrix::with_capacity(bodies.len(), contacts.len());
    for (contact, frame) in contacts.iter().zip(frames) {
        let bi = body(bodies, contact.body_i)?;
        let bj = body(bodies, contact.body_j)?;
        let ri = contact.position - bi.pose.position;
        let rj = contact.position - bj.pose.position;
        jacobian.push_row(
            contact.body_i.index(),
            -jacobian_block(frame, &ri),
            contact.body_j.index(),
            jacobian_block(frame, &rj),
        )?;
    }
    Ok(jacobian)
}

/// Block diagonal generalized inverse mass; zero for fixed and scripted bodies.
#[must_use]
pub fn assemble_inverse_mass(bodies: &[RigidBody]) -> BlockDiagonalMatrix<6, 6> {
    BlockDiagonalMatrix::from_blocks(
        bodies
            .iter()
            .map(|b| {
                let mut block = MassBlock::zeros();
                block
                    .fixed_view_mut::<3, 3>(0, 0)
                    .fill_diagonal(b.inverse_mass());
                block
                    .fixed_view_mut::<3, 3>(3, 3)
                    .copy_from(&b.world_inverse_inertia());
                block
            })
            .collect(),
    )
}

/// Generalized velocities `(v, ω)` of every body.
#[must_use]
pub fn assemble_velocities(bodies: &[RigidBody]) -> BlockVector<6> {
    BlockVector::from_blocks(
        bodies
            .iter()
            .map(|b| {
                let mut u = BodyVector::zeros();
                u.fixed_rows_mut::<3>(0).copy_from(&b.twist.linear);
                u.fixed_rows_mut::<3>(3).copy_from(&b.twist.angular);
                u
            })
            .collect(),
    )
}

/// Everything the proximal solver needs for one step.
#[derive(Debug, Clone)]
pub struct ContactSystem {
    /// Contact Jacobian `J`.
    pub jacobian: TwoColumnBlockMatrix<4, 6>,
    /// Mass-weighted Jacobian `J M⁻¹`; `w = (J M⁻¹)ᵀ λ` is the velocity change.
    pub weighted: TwoColumnBlockMatrix<4, 6>,
    /// Generalized inverse mass `M⁻¹`.
    pub inverse_mass: BlockDiagonalMatrix<6, 6>,
    /// Velocities before the step.
    pub velocities: BlockVector<6>,
    /// External forces, gyroscopic term included.
    pub external: BlockVector<6>,
    /// Velocities after external forces only, `u + dt M⁻¹ f_ext`.
    pub free_velocities: BlockVector<6>,
    /// Contact velocities without contact impulses, plus restitution and drift terms.
    pub rhs: BlockVector<4>,
    /// Friction model of every contact.
    pub models: Vec<MatchStickModel>,
    /// Contact frame of every contact.
    pub frames: Vec<ContactFrame>,
    /// Time step.
    pub dt: f64,
}

impl ContactSystem {
    /// Assemble the system for one step.
    ///
    /// All indices (bodies, materials) are checked before anything is built.
    pub fn build(
        contacts: &[ContactPoint],
        bodies: &[RigidBody],
        materials: &MaterialTable,
        config: &WorldConfig,
        dt: f64,
        time: f64,
    ) -> Result<Self> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::InvalidTimestep(dt));
        }
        let mut models = Vec::with_capacity(contacts.len());
        for contact in contacts {
            contact.validate()?;
            let bi = body(bodies, contact.body_i)?;
            let bj = body(bodies, contact.body_j)?;
            models.push(*materials.get(bi.material, bj.material)?);
        }
        let frames: Vec<ContactFrame> = contacts.iter().map(ContactPoint::frame).collect();

        let jacobian = assemble_jacobian(contacts, &frames, bodies)?;
        let inverse_mass = assemble_inverse_mass(bodies);
        let weighted = jacobian.mul_block_diagonal(&inverse_mass)?;
        let velocities = assemble_velocities(bodies);
        let external = external_forces(bodies, config, time);

        // Free velocity u + dt M⁻¹ f_ext.
        let mut free = velocities.clone();
        let mut accel = BlockVector::zeros(bodies.len());
        inverse_mass.mul_vec(&external, &mut accel, true)?;
        free.axpy(dt, &accel)?;

        let mut approach = BlockVector::zeros(contacts.len());
        jacobian.mul_vec(&velocities, &mut approach, true)?;

        let mut rhs = BlockVector::zeros(contacts.len());
        jacobian.mul_vec(&free, &mut rhs, true)?;
        for (k, contact) in contacts.iter().enumerate() {
            let bounce = models[k].restitution * approach[k][0].min(0.0);
            let drift = config.error_reduction * contact.penetration.max(0.0) / dt;
            rhs[k][0] += bounce - drift;
        }

        Ok(Self {
            jacobian,
            weighted,
            inverse_mass,
            velocities,
            external,
            free_velocities: free,
            rhs,
            models,
            frames,
            dt,
        })
    }

    /// Number of contacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rhs.len()
    }

    /// True when there are no contacts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rhs.is_empty()
    }

    /// Number of bodies.
    #[must_use]
    pub fn bodies(&self) -> usize {
        self.velocities.len()
    }

    /// Velocity change `w = (J M⁻¹)ᵀ λ` produced by impulses `lambda`.
    pub fn velocity_change(&self, lambda: &BlockVector<4>) -> Result<BlockVector<6>> {
        let mut w = BlockVector::zeros(self.bodies());
        self.weighted.transpose_mul_vec(lambda, &mut w, true)?;
        Ok(w)
    }

    /// Velocities at the end of the step, `u + dt M⁻¹ f_ext + w`.
    pub fn updated_velocities(&self, w: &BlockVector<6>) -> Result<BlockVector<6>> {
        let mut u = self.free_velocities.clone();
        u.add_assign(w)?;
        Ok(u)
    }

    /// Contact-space velocity `J w + b` of contact `k`.
    #[must_use]
    pub fn contact_velocity(&self, k: usize, w: &BlockVector<6>) -> ContactVector {
        self.jacobian.mul_row(k, w) + self.rhs[k]
    }
}
