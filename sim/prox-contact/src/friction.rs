//! Friction-cone projections.
//!
//! Given an updated normal impulse `λn` and an unconstrained target
//! `z = (z_s, z_t, z_τ)` for the tangential and drilling impulses, the
//! projections return the closest point of the feasible set:
//!
//! ```text
//! { x : (x_s / μ_s λn)² + (x_t / μ_t λn)² + (x_τ / μ_τ λn)² ≤ 1 }
//! ```
//!
//! # Algorithm
//!
//! Outside the ellipsoid, the closest point is `x_i = a_i² z_i / (a_i² + t)`
//! where `t ≥ 0` is the root of the secular equation
//!
//! ```text
//! f(t) = Σ (a_i z_i / (a_i² + t))² - 1 = 0
//! ```
//!
//! Axes with equal semi-axes collapse into one coordinate (the norm of
//! their components). With two distinct semi-axes, clearing denominators
//! gives a quartic in `t` whose largest real root is the one we want; it is
//! solved in closed form and polished with Newton. With three distinct
//! semi-axes the numerical projection is used directly. `f` is convex and
//! decreasing for `t ≥ 0`, so Newton from `t = 0` approaches the root from
//! below and is bounded to a fixed number of iterations.
//!
//! A zero semi-axis (zero coefficient) forces its component to zero.

use nalgebra::{Vector2, Vector3};
use prox_types::FrictionSolver;
use smallvec::SmallVec;
use tracing::warn;

use crate::model::MatchStickModel;
use crate::poly;

/// Semi-axes at or below this length are treated as zero.
const ZERO_AXIS: f64 = 1e-12;

/// Relative difference below which two semi-axes are merged.
const EQUAL_AXES: f64 = 1e-9;

/// Slack on the ellipsoid boundary for the inside test.
const INSIDE_TOLERANCE: f64 = 1e-12;

/// Newton iteration cap of the numerical projection.
const MAX_NEWTON_ITERATIONS: usize = 64;

/// Convergence threshold on the secular function.
const SECULAR_TOLERANCE: f64 = 1e-14;

/// (semi-axis, coordinate) pairs of the reduced problem.
type Reduced = SmallVec<[(f64, f64); 3]>;

/// The friction ellipsoid of one contact.
///
/// # Example
///
/// ```
/// use prox_contact::FrictionEllipsoid;
/// use nalgebra::Vector3;
///
/// let cone = FrictionEllipsoid::new(&Vector3::new(0.5, 0.5, 0.0), 2.0);
/// let x = cone.project_analytical(&Vector3::new(3.0, 4.0, 0.0));
/// assert!((x.norm() - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrictionEllipsoid {
    axes: Vector3<f64>,
}

impl FrictionEllipsoid {
    /// Ellipsoid with semi-axes `μ λn`; a non-positive `λn` gives the origin.
    #[must_use]
    pub fn new(coefficients: &Vector3<f64>, lambda_n: f64) -> Self {
        let scale = if lambda_n > 0.0 { lambda_n } else { 0.0 };
        Self {
            axes: coefficients.map(|mu| (mu * scale).max(0.0)),
        }
    }

    /// Semi-axes along `s`, `t` and the drilling axis.
    #[must_use]
    pub fn axes(&self) -> Vector3<f64> {
        self.axes
    }

    /// `Σ (x_i / a_i)²`, infinite if `x` leaves a collapsed axis.
    #[must_use]
    pub fn level(&self, x: &Vector3<f64>) -> f64 {
        let mut level = 0.0;
        for (a, xi) in self.axes.iter().zip(x.iter()) {
            if *a > ZERO_AXIS {
                level += (xi / a) * (xi / a);
            } else if *xi != 0.0 {
                return f64::INFINITY;
            }
        }
        level
    }

    /// True when `x` lies in the ellipsoid (boundary included).
    #[must_use]
    pub fn contains(&self, x: &Vector3<f64>) -> bool {
        self.level(x) <= 1.0 + INSIDE_TOLERANCE
    }

    /// Closed-form projection of `z` onto the ellipsoid.
    #[must_use]
    pub fn project_analytical(&self, z: &Vector3<f64>) -> Vector3<f64> {
        if self.contains(z) {
            return *z;
        }
        let (z, active) = self.restrict(z);
        if active.is_empty() {
            return Vector3::zeros();
        }
        if self.level(&z) <= 1.0 + INSIDE_TOLERANCE {
            return z;
        }

        let groups = group_axes(&self.axes, &z, &active);
        let t = match groups.as_slice() {
            // Ball: x = a z / r, i.e. a² / (a² + t) = a / r.
            [(a, r)] => (*r > 0.0).then(|| a * (r - a)),
            [first, second] => quartic_root(*first, *second),
            _ => None,
        };

        match t {
            Some(t) => self.enforce(&scale_by_root(&self.axes, &z, &active, t)),
            None => {
                if groups.len() < 3 {
                    warn!(?groups, "no usable ellipsoid root, projecting numerically");
                }
                self.project_numerical(&z)
            }
        }
    }

    /// Newton projection of `z` onto the ellipsoid.
    #[must_use]
    pub fn project_numerical(&self, z: &Vector3<f64>) -> Vector3<f64> {
        if self.contains(z) {
            return *z;
        }
        let (z, active) = self.restrict(z);
        if active.is_empty() {
            return Vector3::zeros();
        }
        if self.level(&z) <= 1.0 + INSIDE_TOLERANCE {
            return z;
        }

        let pairs: Reduced = active.iter().map(|&i| (self.axes[i], z[i].abs())).collect();
        let t = newton_root(&pairs);
        self.enforce(&scale_by_root(&self.axes, &z, &active, t))
    }

    /// Zero the components on collapsed axes; returns the active axis indices.
    fn restrict(&self, z: &Vector3<f64>) -> (Vector3<f64>, SmallVec<[usize; 3]>) {
        let mut restricted = *z;
        let mut active = SmallVec::new();
        for i in 0..3 {
            if self.axes[i] > ZERO_AXIS {
                active.push(i);
            } else {
                restricted[i] = 0.0;
            }
        }
        (restricted, active)
    }

    /// Pull a point that landed a rounding error outside back onto the boundary.
    fn enforce(&self, x: &Vector3<f64>) -> Vector3<f64> {
        let level = self.level(x);
        if level > 1.0 && level.is_finite() {
            x / level.sqrt()
        } else {
            *x
        }
    }
}

/// Merge active axes with equal semi-axes into (semi-axis, norm) groups.
fn group_axes(axes: &Vector3<f64>, z: &Vector3<f64>, active: &[usize]) -> Reduced {
    let mut groups: SmallVec<[(f64, f64); 3]> = SmallVec::new();
    for &i in active {
        let a = axes[i];
        match groups
            .iter_mut()
            .find(|(g, _)| (g - a).abs() <= EQUAL_AXES * g.max(a))
        {
            Some((_, sq)) => *sq += z[i] * z[i],
            None => groups.push((a, z[i] * z[i])),
        }
    }
    groups.iter().map(|&(a, sq)| (a, sq.sqrt())).collect()
}

/// Largest non-negative root of the two-axis secular equation.
///
/// `a1² r1² (a2² + t)² + a2² r2² (a1² + t)² - (a1² + t)² (a2² + t)² = 0`
fn quartic_root((a1, r1): (f64, f64), (a2, r2): (f64, f64)) -> Option<f64> {
    let (a1s, a2s) = (a1 * a1, a2 * a2);
    let sq1 = poly::multiply(&[1.0, a1s], &[1.0, a1s]);
    let sq2 = poly::multiply(&[1.0, a2s], &[1.0, a2s]);
    let product = poly::multiply(&sq1, &sq2);

    let mut coefficients = [0.0; 5];
    for (i, c) in product.iter().enumerate() {
        coefficients[i] -= c;
    }
    for i in 0..3 {
        coefficients[i + 2] += a1s * r1 * r1 * sq2[i] + a2s * r2 * r2 * sq1[i];
    }

    let [c4, c3, c2, c1, c0] = coefficients;
    let pairs: Reduced = [(a1, r1), (a2, r2)].into_iter().collect();
    let slack = 1e-10 * (a1s + a2s);
    poly::solve_quartic(c4, c3, c2, c1, c0)
        .into_iter()
        .rev()
        .find(|&t| t >= -slack)
        .map(|t| polish(&pairs, t.max(0.0)))
        .filter(|t| t.is_finite() && secular(&pairs, *t).0.abs() < 1e-6)
}

/// Secular function and its derivative at `t`.
fn secular(pairs: &[(f64, f64)], t: f64) -> (f64, f64) {
    pairs.iter().fold((-1.0, 0.0), |(f, df), &(a, r)| {
        let d = a * a + t;
        let q = a * r / d;
        (f + q * q, df - 2.0 * q * q / d)
    })
}

fn polish(pairs: &[(f64, f64)], mut t: f64) -> f64 {
    for _ in 0..3 {
        let (f, df) = secular(pairs, t);
        if f.abs() < SECULAR_TOLERANCE || df == 0.0 {
            break;
        }
        t = (t - f / df).max(0.0);
    }
    t
}

/// Safeguarded Newton on the secular equation over `[0, ‖a ∘ r‖]`.
fn newton_root(pairs: &[(f64, f64)]) -> f64 {
    let mut lo = 0.0;
    let mut hi = pairs
        .iter()
        .map(|(a, r)| (a * r) * (a * r))
        .sum::<f64>()
        .sqrt();
    let mut t = 0.0;

    for _ in 0..MAX_NEWTON_ITERATIONS {
        let (f, df) = secular(pairs, t);
        if f.abs() < SECULAR_TOLERANCE {
            break;
        }
        if f > 0.0 {
            lo = t;
        } else {
            hi = t;
        }
        let mut next = t - f / df;
        if !(next > lo && next < hi) {
            next = 0.5 * (lo + hi);
        }
        if (next - t).abs() <= f64::EPSILON * t.max(1.0) {
            t = next;
            break;
        }
        t = next;
    }
    t
}

/// `x_i = a_i² z_i / (a_i² + t)` on the active axes.
fn scale_by_root(axes: &Vector3<f64>, z: &Vector3<f64>, active: &[usize], t: f64) -> Vector3<f64> {
    let mut x = Vector3::zeros();
    for &i in active {
        let a2 = axes[i] * axes[i];
        x[i] = a2 * z[i] / (a2 + t);
    }
    x
}

/// Project the tangential part of `z` onto the disk of radius `mu λn`.
///
/// The drilling component is always zero.
#[must_use]
pub fn project_disk(mu: f64, lambda_n: f64, z: &Vector3<f64>) -> Vector3<f64> {
    if lambda_n <= 0.0 || mu <= 0.0 {
        return Vector3::zeros();
    }
    let radius = mu * lambda_n;
    let tangential = Vector2::new(z.x, z.y);
    let norm = tangential.norm();
    let projected = if norm > radius {
        tangential * (radius / norm)
    } else {
        tangential
    };
    Vector3::new(projected.x, projected.y, 0.0)
}

/// Project `(z_s, z_t, z_τ)` with the selected friction solver.
///
/// Always returns zero when `lambda_n ≤ 0`.
#[must_use]
pub fn project_friction(
    solver: FrictionSolver,
    model: &MatchStickModel,
    lambda_n: f64,
    z: &Vector3<f64>,
) -> Vector3<f64> {
    if lambda_n <= 0.0 {
        return Vector3::zeros();
    }
    match solver {
        FrictionSolver::AnalyticalEllipsoid => {
            FrictionEllipsoid::new(&model.anisotropic, lambda_n).project_analytical(z)
        }
        FrictionSolver::Numerical => {
            FrictionEllipsoid::new(&model.anisotropic, lambda_n).project_numerical(z)
        }
        FrictionSolver::AnalyticalSphere => project_disk(model.friction, lambda_n, z),
        FrictionSolver::None => Vector3::zeros(),
    }
}
