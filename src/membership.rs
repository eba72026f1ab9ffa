use crate::error::Result;
use crate::schema_error;
use crate::utils::clamp01;
use serde::{Deserialize, Serialize};

/// Membership function shapes supported by the engine.
///
/// A closed family on purpose: the inference loop matches on the variant
/// instead of going through dynamic dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MembershipFunction {
    Triangular { left: f64, center: f64, right: f64 },
    Trapezoidal { left: f64, left_top: f64, right_top: f64, right: f64 },
    Gaussian { center: f64, sigma: f64 },
}

impl MembershipFunction {
    /// Triangle with feet at `a`/`c` and apex at `b`; requires a <= b <= c.
    pub fn triangular(a: f64, b: f64, c: f64) -> Result<Self> {
        if !(a <= b && b <= c) {
            return Err(schema_error!("tri: a<=b<=c required"));
        }
        Ok(Self::Triangular { left: a, center: b, right: c })
    }

    /// Trapezoid with feet at `a`/`d` and plateau on [b, c]; requires
    /// a <= b <= c <= d.
    pub fn trapezoidal(a: f64, b: f64, c: f64, d: f64) -> Result<Self> {
        if !(a <= b && b <= c && c <= d) {
            return Err(schema_error!("trap: a<=b<=c<=d required"));
        }
        Ok(Self::Trapezoidal { left: a, left_top: b, right_top: c, right: d })
    }

    pub fn gaussian(center: f64, sigma: f64) -> Result<Self> {
        if !(sigma > 0.0) {
            return Err(schema_error!("gauss: sigma > 0 required"));
        }
        Ok(Self::Gaussian { center, sigma })
    }

    /// Membership grade at `x`, always within [0, 1].
    ///
    /// The apex/plateau test runs before the boundary exclusion so degenerate
    /// shapes (a foot coinciding with the apex) still reach 1 at the apex.
    pub fn mu(&self, x: f64) -> f64 {
        let value = match *self {
            Self::Triangular { left, center, right } => {
                if x == center {
                    1.0
                } else if x <= left || x >= right {
                    0.0
                } else if x < center {
                    ratio(x - left, center - left)
                } else {
                    ratio(right - x, right - center)
                }
            }
            Self::Trapezoidal { left, left_top, right_top, right } => {
                if x >= left_top && x <= right_top {
                    1.0
                } else if x <= left || x >= right {
                    0.0
                } else if x < left_top {
                    ratio(x - left, left_top - left)
                } else {
                    ratio(right - x, right - right_top)
                }
            }
            Self::Gaussian { center, sigma } => {
                let z = (x - center) / sigma;
                (-0.5 * z * z).exp()
            }
        };
        clamp01(value)
    }

    /// Finite interval containing every x with mu(x) > 0; exact for the
    /// piecewise-linear shapes, a +/-4 sigma window for the Gaussian.
    pub fn support(&self) -> (f64, f64) {
        match *self {
            Self::Triangular { left, right, .. } => (left, right),
            Self::Trapezoidal { left, right, .. } => (left, right),
            Self::Gaussian { center, sigma } => (center - 4.0 * sigma, center + 4.0 * sigma),
        }
    }

    /// Shape keyword as spelled in the `.fz` grammar.
    pub fn shape_name(&self) -> &'static str {
        match self {
            Self::Triangular { .. } => "tri",
            Self::Trapezoidal { .. } => "trap",
            Self::Gaussian { .. } => "gauss",
        }
    }

    /// Shape parameters in grammar order.
    pub fn params(&self) -> Vec<f64> {
        match *self {
            Self::Triangular { left, center, right } => vec![left, center, right],
            Self::Trapezoidal { left, left_top, right_top, right } => {
                vec![left, left_top, right_top, right]
            }
            Self::Gaussian { center, sigma } => vec![center, sigma],
        }
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn triangular_membership() {
        let mf = MembershipFunction::triangular(0.0, 5.0, 10.0).unwrap();
        assert_eq!(mf.mu(0.0), 0.0);
        assert_eq!(mf.mu(2.5), 0.5);
        assert_eq!(mf.mu(5.0), 1.0);
        assert_eq!(mf.mu(7.5), 0.5);
        assert_eq!(mf.mu(10.0), 0.0);
        assert_eq!(mf.mu(-1.0), 0.0);
        assert_eq!(mf.support(), (0.0, 10.0));
    }

    #[test]
    fn degenerate_left_shoulder_peaks_at_apex() {
        // tri(0, 0, 5): the apex coincides with the left foot
        let mf = MembershipFunction::triangular(0.0, 0.0, 5.0).unwrap();
        assert_eq!(mf.mu(0.0), 1.0);
        assert_eq!(mf.mu(2.5), 0.5);
        assert_eq!(mf.mu(5.0), 0.0);
    }

    #[test]
    fn trapezoidal_membership() {
        let mf = MembershipFunction::trapezoidal(0.0, 2.0, 4.0, 6.0).unwrap();
        assert_eq!(mf.mu(1.0), 0.5);
        assert_eq!(mf.mu(2.0), 1.0);
        assert_eq!(mf.mu(3.0), 1.0);
        assert_eq!(mf.mu(5.0), 0.5);
        assert_eq!(mf.mu(6.0), 0.0);
        assert_eq!(mf.support(), (0.0, 6.0));
    }

    #[test]
    fn gaussian_membership() {
        let mf = MembershipFunction::gaussian(5.0, 1.0).unwrap();
        assert_eq!(mf.mu(5.0), 1.0);
        assert!((mf.mu(6.0) - (-0.5f64).exp()).abs() < 1e-12);
        assert_eq!(mf.support(), (1.0, 9.0));
    }

    #[test]
    fn shape_constraints_rejected() {
        assert!(MembershipFunction::triangular(10.0, 5.0, 20.0).is_err());
        assert!(MembershipFunction::trapezoidal(0.0, 3.0, 2.0, 4.0).is_err());
        assert!(MembershipFunction::gaussian(0.0, 0.0).is_err());
        assert!(MembershipFunction::gaussian(0.0, -1.0).is_err());
    }

    proptest! {
        #[test]
        fn mu_stays_in_unit_interval(
            p in prop::array::uniform3(-100.0f64..100.0),
            x in -200.0f64..200.0,
        ) {
            let mut sorted = p;
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let mf = MembershipFunction::triangular(sorted[0], sorted[1], sorted[2]).unwrap();
            let mu = mf.mu(x);
            prop_assert!((0.0..=1.0).contains(&mu));
        }

        #[test]
        fn gaussian_mu_stays_in_unit_interval(
            center in -50.0f64..50.0,
            sigma in 0.01f64..20.0,
            x in -200.0f64..200.0,
        ) {
            let mf = MembershipFunction::gaussian(center, sigma).unwrap();
            let mu = mf.mu(x);
            prop_assert!((0.0..=1.0).contains(&mu));
        }
    }
}
