use crate::error::PriorError;
use crate::prior::empirical::EmpiricalPrior;

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use statrs::function::erf::{erfc, erfc_inv};
use std::f64::consts::{SQRT_2, TAU};
use std::fmt::Debug;

#[enum_dispatch]
pub trait PriorDistributionTrait: Clone + Debug + Send + Sync {
    /// Percent-point function (inverse CDF), maps `u` from the unit interval to the parameter space
    fn ppf(&self, u: f64) -> f64;

    /// Natural logarithm of the probability density at x
    fn ln_pdf(&self, x: f64) -> f64;
}

/// Prior probability distribution of a single free parameter
#[enum_dispatch(PriorDistributionTrait)]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[non_exhaustive]
pub enum Prior {
    Normal(NormalPrior),
    Uniform(UniformPrior),
    TruncatedNormal(TruncatedNormalPrior),
    Empirical(EmpiricalPrior),
}

impl Prior {
    pub fn normal(mu: f64, std: f64) -> Result<Self, PriorError> {
        NormalPrior::new(mu, std).map(Into::into)
    }

    pub fn uniform(left: f64, right: f64) -> Result<Self, PriorError> {
        UniformPrior::new(left, right).map(Into::into)
    }

    /// Normal distribution truncated to `[lower, upper]`, bounds are in parameter units
    pub fn truncated_normal(mu: f64, std: f64, lower: f64, upper: f64) -> Result<Self, PriorError> {
        TruncatedNormalPrior::new(mu, std, lower, upper).map(Into::into)
    }

    pub fn empirical(quantile_values: Vec<f64>) -> Result<Self, PriorError> {
        EmpiricalPrior::new(quantile_values).map(Into::into)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Normal(_) => "normal",
            Self::Uniform(_) => "uniform",
            Self::TruncatedNormal(_) => "truncatednormal",
            Self::Empirical(_) => "empirical",
        }
    }
}

fn ln_norm_coeff(std: f64) -> f64 {
    -f64::ln(std) - 0.5 * f64::ln(TAU)
}

fn std_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

fn std_normal_sf(z: f64) -> f64 {
    0.5 * erfc(z / SQRT_2)
}

fn std_normal_ppf(p: f64) -> f64 {
    -SQRT_2 * erfc_inv(2.0 * p)
}

fn std_normal_isf(q: f64) -> f64 {
    SQRT_2 * erfc_inv(2.0 * q)
}

fn check_std(distribution: &'static str, std: f64) -> Result<(), PriorError> {
    if std.is_finite() && std > 0.0 {
        Ok(())
    } else {
        Err(PriorError::InvalidDistribution {
            distribution,
            reason: "standard deviation must be positive and finite",
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(
    into = "NormalPriorParameters",
    try_from = "NormalPriorParameters"
)]
pub struct NormalPrior {
    mu: f64,
    std: f64,
    ln_prob_coeff: f64,
}

impl NormalPrior {
    pub fn new(mu: f64, std: f64) -> Result<Self, PriorError> {
        if !mu.is_finite() {
            return Err(PriorError::InvalidDistribution {
                distribution: "normal",
                reason: "mean must be finite",
            });
        }
        check_std("normal", std)?;
        Ok(Self {
            mu,
            std,
            ln_prob_coeff: ln_norm_coeff(std),
        })
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn std(&self) -> f64 {
        self.std
    }
}

impl PriorDistributionTrait for NormalPrior {
    fn ppf(&self, u: f64) -> f64 {
        self.mu + self.std * std_normal_ppf(u)
    }

    fn ln_pdf(&self, x: f64) -> f64 {
        let z = (x - self.mu) / self.std;
        self.ln_prob_coeff - 0.5 * z.powi(2)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename = "NormalPrior")]
struct NormalPriorParameters {
    mu: f64,
    std: f64,
}

impl From<NormalPrior> for NormalPriorParameters {
    fn from(f: NormalPrior) -> Self {
        Self {
            mu: f.mu,
            std: f.std,
        }
    }
}

impl TryFrom<NormalPriorParameters> for NormalPrior {
    type Error = PriorError;

    fn try_from(f: NormalPriorParameters) -> Result<Self, Self::Error> {
        Self::new(f.mu, f.std)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(
    into = "UniformPriorParameters",
    try_from = "UniformPriorParameters"
)]
pub struct UniformPrior {
    range: std::ops::RangeInclusive<f64>,
    ln_prob: f64,
}

impl UniformPrior {
    pub fn new(left: f64, right: f64) -> Result<Self, PriorError> {
        if !(left.is_finite() && right.is_finite()) {
            return Err(PriorError::InvalidDistribution {
                distribution: "uniform",
                reason: "bounds must be finite",
            });
        }
        if left >= right {
            return Err(PriorError::InvalidDistribution {
                distribution: "uniform",
                reason: "lower bound must be smaller than upper bound",
            });
        }
        Ok(Self {
            range: left..=right,
            ln_prob: -f64::ln(right - left),
        })
    }

    pub fn left(&self) -> f64 {
        *self.range.start()
    }

    pub fn right(&self) -> f64 {
        *self.range.end()
    }
}

impl PriorDistributionTrait for UniformPrior {
    fn ppf(&self, u: f64) -> f64 {
        self.left() + u * (self.right() - self.left())
    }

    fn ln_pdf(&self, x: f64) -> f64 {
        if self.range.contains(&x) {
            self.ln_prob
        } else {
            f64::NEG_INFINITY
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename = "UniformPrior")]
struct UniformPriorParameters {
    range: std::ops::RangeInclusive<f64>,
}

impl From<UniformPrior> for UniformPriorParameters {
    fn from(f: UniformPrior) -> Self {
        Self { range: f.range }
    }
}

impl TryFrom<UniformPriorParameters> for UniformPrior {
    type Error = PriorError;

    fn try_from(f: UniformPriorParameters) -> Result<Self, Self::Error> {
        Self::new(*f.range.start(), *f.range.end())
    }
}

/// Normal distribution truncated to a finite or one-sided interval
///
/// Internally the bounds are standardized, `a = (lower - mu) / std`, `b = (upper - mu) / std`.
/// Intervals lying in the right tail are inverted through the survival function to keep
/// precision.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(
    into = "TruncatedNormalPriorParameters",
    try_from = "TruncatedNormalPriorParameters"
)]
pub struct TruncatedNormalPrior {
    mu: f64,
    std: f64,
    a: f64,
    b: f64,
    mass: f64,
    ln_prob_coeff: f64,
}

impl TruncatedNormalPrior {
    pub fn new(mu: f64, std: f64, lower: f64, upper: f64) -> Result<Self, PriorError> {
        check_std("truncated normal", std)?;
        Self::from_standardized((lower - mu) / std, (upper - mu) / std, mu, std)
    }

    /// Construct from standardized bounds `a` and `b`
    pub fn from_standardized(a: f64, b: f64, mu: f64, std: f64) -> Result<Self, PriorError> {
        check_std("truncated normal", std)?;
        if !mu.is_finite() || a.is_nan() || b.is_nan() || a >= b {
            return Err(PriorError::InvalidDistribution {
                distribution: "truncated normal",
                reason: "mean must be finite and lower bound smaller than upper bound",
            });
        }
        let mass = if a > 0.0 {
            std_normal_sf(a) - std_normal_sf(b)
        } else {
            std_normal_cdf(b) - std_normal_cdf(a)
        };
        if mass <= 0.0 || !mass.is_finite() {
            return Err(PriorError::InvalidDistribution {
                distribution: "truncated normal",
                reason: "truncation interval has vanishing probability",
            });
        }
        Ok(Self {
            mu,
            std,
            a,
            b,
            mass,
            ln_prob_coeff: ln_norm_coeff(std) - f64::ln(mass),
        })
    }

    pub fn lower(&self) -> f64 {
        self.mu + self.a * self.std
    }

    pub fn upper(&self) -> f64 {
        self.mu + self.b * self.std
    }
}

impl PriorDistributionTrait for TruncatedNormalPrior {
    fn ppf(&self, u: f64) -> f64 {
        if u <= 0.0 {
            return self.lower();
        }
        if u >= 1.0 {
            return self.upper();
        }
        let z = if self.a > 0.0 {
            let sf_a = std_normal_sf(self.a);
            std_normal_isf(sf_a - u * self.mass)
        } else {
            let cdf_a = std_normal_cdf(self.a);
            std_normal_ppf(cdf_a + u * self.mass)
        };
        self.mu + self.std * z.clamp(self.a, self.b)
    }

    fn ln_pdf(&self, x: f64) -> f64 {
        let z = (x - self.mu) / self.std;
        if (self.a..=self.b).contains(&z) {
            self.ln_prob_coeff - 0.5 * z.powi(2)
        } else {
            f64::NEG_INFINITY
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename = "TruncatedNormalPrior")]
struct TruncatedNormalPriorParameters {
    mu: f64,
    std: f64,
    a: f64,
    b: f64,
}

impl From<TruncatedNormalPrior> for TruncatedNormalPriorParameters {
    fn from(f: TruncatedNormalPrior) -> Self {
        Self {
            mu: f.mu,
            std: f.std,
            a: f.a,
            b: f.b,
        }
    }
}

impl TryFrom<TruncatedNormalPriorParameters> for TruncatedNormalPrior {
    type Error = PriorError;

    fn try_from(f: TruncatedNormalPriorParameters) -> Result<Self, Self::Error> {
        Self::from_standardized(f.a, f.b, f.mu, f.std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // Numerical integral of exp(ln_pdf) over [left, right]
    fn integrate(prior: &Prior, left: f64, right: f64) -> f64 {
        const N: usize = 200_000;
        let h = (right - left) / N as f64;
        (0..N)
            .map(|i| f64::exp(prior.ln_pdf(left + (i as f64 + 0.5) * h)) * h)
            .sum()
    }

    // ln_pdf must be the derivative of the inverse of ppf
    fn check_ppf_density_consistency(prior: &Prior, us: &[f64]) {
        for &u in us {
            let eps = 1e-6;
            let dx_du = (prior.ppf(u + eps) - prior.ppf(u - eps)) / (2.0 * eps);
            let pdf = f64::exp(prior.ln_pdf(prior.ppf(u)));
            assert_relative_eq!(pdf * dx_du, 1.0, max_relative = 1e-4);
        }
    }

    #[test]
    fn normal_quantiles() {
        let prior = Prior::normal(-0.125, 0.234).unwrap();
        assert_relative_eq!(prior.ppf(0.5), -0.125, epsilon = 1e-12);
        assert_relative_eq!(prior.ppf(0.841_344_746_068_543), -0.125 + 0.234, epsilon = 1e-9);
        assert_relative_eq!(prior.ppf(0.025), -0.125 - 1.959_963_984_540_054 * 0.234, epsilon = 1e-9);
        check_ppf_density_consistency(&prior, &[0.01, 0.2, 0.5, 0.9]);
    }

    #[test]
    fn normal_normalized() {
        let prior = Prior::normal(5777.0, 100.0).unwrap();
        assert_relative_eq!(integrate(&prior, 4777.0, 6777.0), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn uniform() {
        let prior = Prior::uniform(0.1, 10.0).unwrap();
        assert_eq!(prior.ppf(0.0), 0.1);
        assert_eq!(prior.ppf(1.0), 10.0);
        assert_relative_eq!(prior.ppf(0.5), 5.05, epsilon = 1e-12);
        assert_relative_eq!(prior.ln_pdf(3.0), -f64::ln(9.9), epsilon = 1e-12);
        assert_eq!(prior.ln_pdf(10.5), f64::NEG_INFINITY);
        assert_eq!(prior.ln_pdf(f64::NAN), f64::NEG_INFINITY);
    }

    #[test]
    fn uniform_rejects_inverted_bounds() {
        assert!(matches!(
            Prior::uniform(1.0, 1.0),
            Err(PriorError::InvalidDistribution { .. })
        ));
        assert!(Prior::uniform(2.0, 1.0).is_err());
    }

    #[test]
    fn normal_rejects_bad_std() {
        assert!(Prior::normal(0.0, 0.0).is_err());
        assert!(Prior::normal(0.0, -1.0).is_err());
        assert!(Prior::normal(0.0, f64::NAN).is_err());
    }

    #[test]
    fn inflation_like_truncated_normal() {
        let prior = Prior::truncated_normal(0.5, 0.5, 0.0, 5.0).unwrap();
        assert_eq!(prior.ppf(0.0), 0.0);
        assert_relative_eq!(prior.ppf(1.0), 5.0, epsilon = 1e-9);
        for i in 0..=100 {
            let x = prior.ppf(i as f64 / 100.0);
            assert!((0.0..=5.0).contains(&x));
        }
        assert_eq!(prior.ln_pdf(-0.1), f64::NEG_INFINITY);
        assert_relative_eq!(integrate(&prior, 0.0, 5.0), 1.0, epsilon = 1e-5);
        check_ppf_density_consistency(&prior, &[0.05, 0.3, 0.5, 0.8, 0.95]);
    }

    #[test]
    fn one_sided_truncated_normal_is_half_normal() {
        // the normalization-constant prior: loc 0, scale 1e-20, standardized support [0, 1e20]
        let prior: Prior = TruncatedNormalPrior::from_standardized(0.0, 1e20, 0.0, 1e-20)
            .unwrap()
            .into();
        assert_eq!(prior.ppf(0.0), 0.0);
        // median of a half-normal is 0.6745 sigma
        assert_relative_eq!(prior.ppf(0.5), 0.674_489_750_196_081_7e-20, max_relative = 1e-9);
        assert!(prior.ppf(0.999) > 0.0);
        assert!(prior.ppf(0.999).is_finite());
    }

    #[test]
    fn right_tail_truncated_normal() {
        let prior = Prior::truncated_normal(0.0, 1.0, 8.0, 9.0).unwrap();
        for i in 0..=10 {
            let x = prior.ppf(i as f64 / 10.0);
            assert!((8.0..=9.0).contains(&x), "{x}");
        }
        assert!(prior.ppf(0.3) < prior.ppf(0.6));
    }

    #[test]
    fn truncated_normal_ppf_hits_bounds_exactly() {
        let cases = [(0.5, 0.5, 0.0, 5.0), (0.0, 1.0, 8.0, 9.0), (2.0, 0.1, -1.0, 2.5)];
        for (mu, std, lower, upper) in cases {
            let prior = TruncatedNormalPrior::new(mu, std, lower, upper).unwrap();
            assert_eq!(prior.ppf(0.0), prior.lower());
            assert_eq!(prior.ppf(1.0), prior.upper());
            assert!(prior.ppf(1e-12) >= prior.lower());
        }
        let inflation = Prior::truncated_normal(0.5, 0.5, 0.0, 5.0).unwrap();
        assert_eq!(inflation.ppf(0.0), 0.0);
        assert_eq!(inflation.ppf(1.0), 5.0);
    }

    #[test]
    fn truncated_normal_raw_bounds_match_standardized() {
        let raw = TruncatedNormalPrior::new(1.0, 2.0, -1.0, 7.0).unwrap();
        let std = TruncatedNormalPrior::from_standardized(-1.0, 3.0, 1.0, 2.0).unwrap();
        assert_eq!(raw, std);
        assert_relative_eq!(raw.lower(), -1.0);
        assert_relative_eq!(raw.upper(), 7.0);
    }

    #[test]
    fn serde_roundtrip_revalidates() {
        let prior = Prior::truncated_normal(0.5, 0.5, 0.0, 5.0).unwrap();
        let json = serde_json::to_string(&prior).unwrap();
        let back: Prior = serde_json::from_str(&json).unwrap();
        assert_eq!(prior, back);

        let bad = r#"{"Normal":{"mu":0.0,"std":-1.0}}"#;
        assert!(serde_json::from_str::<Prior>(bad).is_err());
    }
}
