use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

// Underlying array is guaranteed to be sorted, contiguous and NaN-free
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SortedSamples(Array1<f64>);

impl SortedSamples {
    pub fn maximum(&self) -> f64 {
        self[self.len() - 1]
    }

    pub fn minimum(&self) -> f64 {
        self[0]
    }

    pub fn median(&self) -> f64 {
        assert_ne!(self.len(), 0);
        let i = (self.len() - 1) / 2;
        if self.len() % 2 == 0 {
            0.5 * (self[i] + self[i + 1])
        } else {
            self[i]
        }
    }

    /// Quantile with linear interpolation between order statistics, R-7 from
    /// https://en.wikipedia.org/wiki/Quantile
    pub fn ppf(&self, q: f64) -> f64 {
        assert_ne!(self.len(), 0);
        assert!(
            (0.0..=1.0).contains(&q),
            "quantile should be between zero and unity"
        );
        let h = (self.len() - 1) as f64 * q;
        let h_floor = h.floor();
        #[allow(clippy::cast_sign_loss)]
        let i = h_floor as usize;
        if i >= self.len() - 1 {
            self.maximum()
        } else {
            self[i] + (h - h_floor) * (self[i + 1] - self[i])
        }
    }
}

impl From<Vec<f64>> for SortedSamples {
    fn from(mut v: Vec<f64>) -> Self {
        v.retain(|x| !x.is_nan());
        v.sort_unstable_by(f64::total_cmp);
        Self(Array1::from_vec(v))
    }
}

impl From<ArrayView1<'_, f64>> for SortedSamples {
    fn from(v: ArrayView1<'_, f64>) -> Self {
        v.to_vec().into()
    }
}

impl Deref for SortedSamples {
    type Target = [f64];

    fn deref(&self) -> &Self::Target {
        // constructed from a Vec, so it is always in standard layout
        self.0.as_slice().unwrap_or(&[])
    }
}

/// Posterior summary of a single parameter
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct CredibleInterval {
    pub median: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Median together with the central interval holding the probability mass of `alpha` standard
/// deviations of a normal distribution
///
/// The bounds are the `(1 - z) / 2` and `(1 + z) / 2` quantiles with `z = erf(alpha / sqrt(2))`,
/// so `alpha = 1` gives the 15.87% and 84.13% percentiles.
pub fn credibility_interval(samples: ArrayView1<'_, f64>, alpha: f64) -> CredibleInterval {
    let z = libm::erf(alpha / std::f64::consts::SQRT_2);
    let sorted = SortedSamples::from(samples);
    CredibleInterval {
        median: sorted.median(),
        lower: sorted.ppf(0.5 * (1.0 - z)),
        upper: sorted.ppf(0.5 * (1.0 + z)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use ndarray::Array1;
    use rand::prelude::*;
    use rand_distr::StandardNormal;

    #[test]
    fn median_is_ppf_half() {
        let mut rng = StdRng::seed_from_u64(0);
        for i in 0..10 {
            let a: SortedSamples = (0..100 + i)
                .map(|_| rng.random::<f64>())
                .collect::<Vec<_>>()
                .into();
            assert_relative_eq!(a.median(), a.ppf(0.5), epsilon = 1e-15);
        }
    }

    #[test]
    fn ppf_bounds_and_interpolation() {
        let a = SortedSamples::from(vec![4.0, 1.0, 3.0, 2.0]);
        assert_eq!(a.ppf(0.0), a.minimum());
        assert_eq!(a.ppf(1.0), a.maximum());
        assert_eq!(a.ppf(0.5), 2.5);
        assert_relative_eq!(a.ppf(0.25), 1.75);
    }

    #[test]
    fn median_skips_nan() {
        let a = SortedSamples::from(vec![f64::NAN, 3.0, 1.0, 2.0]);
        assert_eq!(a.len(), 3);
        assert_eq!(a.median(), 2.0);
    }

    #[test]
    fn interval_of_standard_normal() {
        let mut rng = StdRng::seed_from_u64(42);
        let samples: Array1<f64> = (0..100_000)
            .map(|_| rng.sample::<f64, _>(StandardNormal))
            .collect();
        let ci = credibility_interval(samples.view(), 1.0);
        assert!(ci.median.abs() < 0.02);
        assert_relative_eq!(ci.lower, -1.0, epsilon = 0.03);
        assert_relative_eq!(ci.upper, 1.0, epsilon = 0.03);
    }

    #[test]
    fn interval_of_shifted_normal() {
        let mut rng = StdRng::seed_from_u64(1);
        let samples: Array1<f64> = (0..1000)
            .map(|_| 10.0 + 2.0 * rng.sample::<f64, _>(StandardNormal))
            .collect();
        let ci = credibility_interval(samples.view(), 1.0);
        assert_relative_eq!(ci.median, 10.0, epsilon = 0.3);
        assert_relative_eq!(ci.upper - ci.median, 2.0, epsilon = 0.4);
        assert_relative_eq!(ci.median - ci.lower, 2.0, epsilon = 0.4);
    }
}
