//! Double-dogleg trust-region step.
//!
//! The step is chosen on the piecewise path from the origin through the
//! Cauchy point (minimiser of the quadratic model along the gradient) to a
//! relaxed Newton point, a fraction of the way along the Gauss-Newton step.
//! The bias factor `x_bias` moves the relaxed point: `0` places it on the
//! Newton point, larger values pull it towards the origin.

use std::fmt;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Which branch produced a trial step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepType {
    /// Full Gauss-Newton step, inside the trust region.
    #[serde(rename = "Newton")]
    Newton,
    /// Newton direction, clipped to the trust radius.
    #[serde(rename = "restrained Newton")]
    RestrainedNewton,
    /// Steepest descent, clipped to the trust radius.
    #[serde(rename = "gradient")]
    Gradient,
    /// Blend of the Cauchy and relaxed Newton points on the trust boundary.
    #[serde(rename = "Newton-Cauchy")]
    NewtonCauchy,
    /// Damped step from the Levenberg-Marquardt proposer.
    #[serde(rename = "Levenberg-Marquardt")]
    LevenbergMarquardt,
}

impl StepType {
    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            StepType::Newton => "Newton",
            StepType::RestrainedNewton => "restrained Newton",
            StepType::Gradient => "gradient",
            StepType::NewtonCauchy => "Newton-Cauchy",
            StepType::LevenbergMarquardt => "Levenberg-Marquardt",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A trial step and the diagnostics the search controller needs.
#[derive(Debug, Clone, PartialEq)]
pub struct DoglegStep {
    /// Parameter update.
    pub delta: DVector<f64>,
    /// Euclidean length of `delta`.
    pub step_len: f64,
    /// Scale applied to the branch's base direction.
    pub step_scale: f64,
    /// Branch taken.
    pub step_type: StepType,
}

/// Compute a double-dogleg step.
///
/// # Arguments
///
/// * `newton_delta` - Gauss-Newton step
/// * `gradient` - cost gradient `J^T r`
/// * `grad_hess_grad` - curvature along the gradient, `g^T H g`
/// * `x_bias` - relaxed Newton bias in `[0, 1]`
/// * `trust_radius` - current trust radius
///
/// The returned step is no longer than `trust_radius` unless its type is
/// [`StepType::Newton`].
///
/// # Example
///
/// ```
/// use bpe_core::math::solvers::{double_dogleg, StepType};
/// use nalgebra::DVector;
///
/// let newton = DVector::from_vec(vec![1.0, 2.0]);
/// let gradient = DVector::from_vec(vec![3.0, 4.0]);
///
/// let step = double_dogleg(&newton, &gradient, 5.0, 0.1, 2.0);
/// assert_eq!(step.step_type, StepType::RestrainedNewton);
/// assert!((step.step_len - 2.0).abs() < 1e-12);
/// ```
pub fn double_dogleg(
    newton_delta: &DVector<f64>,
    gradient: &DVector<f64>,
    grad_hess_grad: f64,
    x_bias: f64,
    trust_radius: f64,
) -> DoglegStep {
    let newton_len = newton_delta.norm();

    if newton_len <= trust_radius {
        return DoglegStep {
            delta: newton_delta.clone(),
            step_len: newton_len,
            step_scale: 1.0,
            step_type: StepType::Newton,
        };
    }

    let gradient_len = gradient.norm();
    if gradient_len == 0.0 {
        // Flat gradient: no Cauchy direction exists, clip the Newton step.
        return restrained_newton(newton_delta, newton_len, trust_radius);
    }

    let cauchy_len = gradient_len.powi(3) / grad_hess_grad;
    let relaxed_newton_len =
        1.0 - x_bias * (1.0 + cauchy_len * gradient_len / gradient.dot(newton_delta));

    if trust_radius / newton_len >= relaxed_newton_len {
        return restrained_newton(newton_delta, newton_len, trust_radius);
    }

    if cauchy_len > trust_radius {
        let delta = gradient * -(trust_radius / gradient_len);
        return DoglegStep {
            step_len: delta.norm(),
            delta,
            step_scale: trust_radius / cauchy_len,
            step_type: StepType::Gradient,
        };
    }

    // Point on the Cauchy -> relaxed Newton segment at distance trust_radius.
    let cauchy_pt = gradient * -(cauchy_len / gradient_len);
    let new_minus_cau = newton_delta * relaxed_newton_len - &cauchy_pt;
    let cau_dot_new_minus_cau = cauchy_pt.dot(&new_minus_cau);
    let cau_len_sq = cauchy_pt.norm_squared();
    let new_minus_cau_len_sq = new_minus_cau.norm_squared();
    let tr_sq_minus_cau_sq = trust_radius * trust_radius - cau_len_sq;
    let discr = (cau_dot_new_minus_cau * cau_dot_new_minus_cau
        + new_minus_cau_len_sq * tr_sq_minus_cau_sq)
        .sqrt();

    // Weight 0 is the Cauchy point, weight 1 the relaxed Newton point.
    let weight = if cau_dot_new_minus_cau < 0.0 {
        (discr - cau_dot_new_minus_cau) / new_minus_cau_len_sq
    } else {
        tr_sq_minus_cau_sq / (cau_dot_new_minus_cau + discr)
    };

    let delta = cauchy_pt + new_minus_cau * weight;
    DoglegStep {
        step_len: delta.norm(),
        delta,
        step_scale: weight,
        step_type: StepType::NewtonCauchy,
    }
}

fn restrained_newton(newton_delta: &DVector<f64>, newton_len: f64, trust_radius: f64) -> DoglegStep {
    let step_scale = trust_radius / newton_len;
    let delta = newton_delta * step_scale;
    DoglegStep {
        step_len: delta.norm(),
        delta,
        step_scale,
        step_type: StepType::RestrainedNewton,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn vec2(a: f64, b: f64) -> DVector<f64> {
        DVector::from_vec(vec![a, b])
    }

    // ========================================
    // Branch Selection Tests
    // ========================================

    #[test]
    fn test_newton_inside_trust_region() {
        let newton = vec2(0.3, 0.4);
        let step = double_dogleg(&newton, &vec2(-1.0, -1.0), 2.0, 0.8, 1.0);
        assert_eq!(step.step_type, StepType::Newton);
        assert_eq!(step.delta, newton);
        assert_relative_eq!(step.step_len, 0.5, epsilon = 1e-15);
        assert_eq!(step.step_scale, 1.0);
    }

    #[test]
    fn test_newton_on_boundary() {
        let newton = vec2(3.0, 4.0);
        let step = double_dogleg(&newton, &vec2(-1.0, 0.0), 1.0, 0.8, 5.0);
        assert_eq!(step.step_type, StepType::Newton);
    }

    #[test]
    fn test_restrained_newton() {
        let step = double_dogleg(&vec2(1.0, 2.0), &vec2(3.0, 4.0), 5.0, 0.1, 2.0);
        assert_eq!(step.step_type, StepType::RestrainedNewton);
        assert_relative_eq!(step.step_len, 2.0, epsilon = 1e-12);
        assert_relative_eq!(step.step_scale, 2.0 / 5.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(step.delta[1], 2.0 * step.delta[0], epsilon = 1e-12);
    }

    #[test]
    fn test_gradient_step() {
        // cauchy_len = 1 / 0.5 = 2 > trust radius 1, relaxed point at Newton
        let step = double_dogleg(&vec2(10.0, 0.0), &vec2(-1.0, 0.0), 0.5, 0.0, 1.0);
        assert_eq!(step.step_type, StepType::Gradient);
        assert_relative_eq!(step.delta[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(step.delta[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(step.step_len, 1.0, epsilon = 1e-12);
        assert_relative_eq!(step.step_scale, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_newton_cauchy_collinear() {
        // cauchy point 0.25 along x, relaxed Newton point at 10
        let step = double_dogleg(&vec2(10.0, 0.0), &vec2(-1.0, 0.0), 4.0, 0.0, 1.0);
        assert_eq!(step.step_type, StepType::NewtonCauchy);
        assert_relative_eq!(step.delta[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(step.step_scale, 0.75 / 9.75, epsilon = 1e-12);
        assert_relative_eq!(step.step_len, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_newton_cauchy_lands_on_boundary() {
        // H = diag(1, 10), r chosen so the Newton and gradient directions differ
        let gradient = vec2(-1.0, -5.0);
        let newton = vec2(1.0, 0.5);
        let ghg = 1.0 * 1.0 + 10.0 * 25.0;
        let trust_radius = 0.6;
        let step = double_dogleg(&newton, &gradient, ghg, 0.0, trust_radius);
        assert_eq!(step.step_type, StepType::NewtonCauchy);
        assert_relative_eq!(step.step_len, trust_radius, epsilon = 1e-12);
        assert!(step.step_scale > 0.0 && step.step_scale < 1.0);
    }

    #[test]
    fn test_zero_gradient_clips_newton() {
        let step = double_dogleg(&vec2(4.0, 0.0), &vec2(0.0, 0.0), 0.0, 0.8, 2.0);
        assert_eq!(step.step_type, StepType::RestrainedNewton);
        assert_relative_eq!(step.step_len, 2.0, epsilon = 1e-12);
    }

    // ========================================
    // StepType Tests
    // ========================================

    #[test]
    fn test_step_type_labels() {
        assert_eq!(StepType::Newton.to_string(), "Newton");
        assert_eq!(StepType::RestrainedNewton.to_string(), "restrained Newton");
        assert_eq!(StepType::Gradient.to_string(), "gradient");
        assert_eq!(StepType::NewtonCauchy.to_string(), "Newton-Cauchy");
        assert_eq!(
            StepType::LevenbergMarquardt.to_string(),
            "Levenberg-Marquardt"
        );
    }

    // ========================================
    // Property Tests
    // ========================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_step_within_trust_radius_unless_newton(
            curvature in prop::collection::vec(0.01f64..100.0, 3),
            gradient in prop::collection::vec(-10.0f64..10.0, 3),
            x_bias in 0.0f64..=1.0,
            trust_radius in 1e-3f64..50.0,
        ) {
            let gradient = DVector::from_vec(gradient);
            prop_assume!(gradient.norm() > 1e-6);

            // Diagonal Gauss-Newton model: H = diag(curvature), newton = -H^-1 g
            let newton = DVector::from_iterator(
                3,
                gradient.iter().zip(&curvature).map(|(g, h)| -g / h),
            );
            let ghg: f64 = gradient.iter().zip(&curvature).map(|(g, h)| g * g * h).sum();

            let step = double_dogleg(&newton, &gradient, ghg, x_bias, trust_radius);
            if step.step_type != StepType::Newton {
                prop_assert!(step.step_len <= trust_radius * (1.0 + 1e-9));
            }
            prop_assert!((step.delta.norm() - step.step_len).abs() <= 1e-12 * step.step_len.max(1.0));
        }
    }
}
