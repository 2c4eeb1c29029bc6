//! Real roots of low-degree polynomials.
//!
//! Coefficients are given highest degree first. Every solver returns the real
//! roots in ascending order, refined with a few Newton steps on the original
//! polynomial. Callers decide which root is meaningful.

use smallvec::SmallVec;

/// Up to four real roots.
pub type Roots = SmallVec<[f64; 4]>;

/// Relative size below which a leading coefficient counts as zero.
const DEGENERATE_LEADING: f64 = 1e-14;

/// Newton refinement steps applied to every root.
const POLISH_STEPS: usize = 3;

/// Evaluate a polynomial (highest degree first) with Horner's scheme.
#[must_use]
pub fn evaluate(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().fold(0.0, |acc, &c| acc * x + c)
}

/// Product of two polynomials (highest degree first).
#[must_use]
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &ai) in a.iter().enumerate() {
        for (j, &bj) in b.iter().enumerate() {
            out[i + j] += ai * bj;
        }
    }
    out
}

/// Real roots of `a x² + b x + c`.
#[must_use]
pub fn solve_quadratic(a: f64, b: f64, c: f64) -> Roots {
    let mut roots = Roots::new();
    let scale = a.abs().max(b.abs()).max(c.abs());
    if scale == 0.0 {
        return roots;
    }
    if a.abs() <= DEGENERATE_LEADING * scale {
        if b != 0.0 {
            roots.push(-c / b);
        }
        return roots;
    }

    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return roots;
    }
    if disc == 0.0 {
        roots.push(-b / (2.0 * a));
        return roots;
    }

    // Numerically stable form, avoids cancellation in -b ± √disc.
    let q = -0.5 * (b + b.signum() * disc.sqrt());
    let (r0, r1) = if q == 0.0 {
        let r = (-c / a).sqrt();
        (-r, r)
    } else {
        (q / a, c / q)
    };
    roots.push(r0.min(r1));
    roots.push(r0.max(r1));
    roots
}

/// Real roots of `a x³ + b x² + c x + d`.
#[must_use]
pub fn solve_cubic(a: f64, b: f64, c: f64, d: f64) -> Roots {
    let scale = a.abs().max(b.abs()).max(c.abs()).max(d.abs());
    if scale == 0.0 {
        return Roots::new();
    }
    if a.abs() <= DEGENERATE_LEADING * scale {
        return solve_quadratic(b, c, d);
    }

    let (b, c, d) = (b / a, c / a, d / a);
    let shift = b / 3.0;
    let p = c - b * b / 3.0;
    let q = 2.0 * b * b * b / 27.0 - b * c / 3.0 + d;

    let mut roots = Roots::new();
    let half_q = 0.5 * q;
    let third_p = p / 3.0;
    let disc = half_q * half_q + third_p * third_p * third_p;

    if p.abs() < f64::EPSILON && q.abs() < f64::EPSILON {
        roots.push(-shift);
    } else if disc > 0.0 {
        let sq = disc.sqrt();
        let y = (-half_q + sq).cbrt() + (-half_q - sq).cbrt();
        roots.push(y - shift);
    } else {
        // Three real roots, trigonometric form.
        let r = (-third_p).sqrt();
        let cos_arg = (-half_q / (r * r * r)).clamp(-1.0, 1.0);
        let phi = cos_arg.acos();
        for k in 0..3_u8 {
            let angle = (phi + 2.0 * std::f64::consts::PI * f64::from(k)) / 3.0;
            roots.push(2.0 * r * angle.cos() - shift);
        }
    }

    let coefficients = [1.0, b, c, d];
    finish(&coefficients, roots)
}

/// Real roots of `a x⁴ + b x³ + c x² + d x + e` (Ferrari's method).
#[must_use]
pub fn solve_quartic(a: f64, b: f64, c: f64, d: f64, e: f64) -> Roots {
    let scale = a.abs().max(b.abs()).max(c.abs()).max(d.abs()).max(e.abs());
    if scale == 0.0 {
        return Roots::new();
    }
    if a.abs() <= DEGENERATE_LEADING * scale {
        return solve_cubic(b, c, d, e);
    }

    let (b, c, d, e) = (b / a, c / a, d / a, e / a);
    let shift = b / 4.0;
    let b2 = b * b;
    // Depressed quartic y⁴ + p y² + q y + r with x = y - b/4.
    let p = c - 3.0 * b2 / 8.0;
    let q = d - b * c / 2.0 + b2 * b / 8.0;
    let r = e - b * d / 4.0 + b2 * c / 16.0 - 3.0 * b2 * b2 / 256.0;

    let mut roots = Roots::new();
    let q_scale = 1.0 + p.abs().max(r.abs());
    if q.abs() <= 1e-12 * q_scale {
        // Biquadratic: z² + p z + r = 0 with z = y².
        for z in solve_quadratic(1.0, p, r) {
            if z > 0.0 {
                let y = z.sqrt();
                roots.push(-y - shift);
                roots.push(y - shift);
            } else if z > -1e-12 * q_scale {
                roots.push(-shift);
            }
        }
    } else {
        // Resolvent cubic m³ + p m² + (p²/4 - r) m - q²/8 = 0 has a positive root.
        let resolvent = solve_cubic(1.0, p, 0.25 * p * p - r, -0.125 * q * q);
        let m = resolvent.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if m > 0.0 {
            let s = (2.0 * m).sqrt();
            let k = q / (2.0 * s);
            roots.extend(
                solve_quadratic(1.0, s, 0.5 * p + m - k)
                    .into_iter()
                    .map(|y| y - shift),
            );
            roots.extend(
                solve_quadratic(1.0, -s, 0.5 * p + m + k)
                    .into_iter()
                    .map(|y| y - shift),
            );
        }
    }

    let coefficients = [1.0, b, c, d, e];
    finish(&coefficients, roots)
}

fn finish(coefficients: &[f64], mut roots: Roots) -> Roots {
    let degree = coefficients.len().saturating_sub(1);
    let derivative: SmallVec<[f64; 4]> = coefficients[..degree]
        .iter()
        .enumerate()
        .map(|(i, &c)| c * (degree - i) as f64)
        .collect();

    for root in &mut roots {
        for _ in 0..POLISH_STEPS {
            let f = evaluate(coefficients, *root);
            let df = evaluate(&derivative, *root);
            if df.abs() < f64::EPSILON || !f.is_finite() {
                break;
            }
            let next = *root - f / df;
            if !next.is_finite() || evaluate(coefficients, next).abs() > f.abs() {
                break;
            }
            *root = next;
        }
    }
    roots.retain(|r| r.is_finite());
    roots.sort_by(f64::total_cmp);
    roots
}
