use crate::error::SamplerError;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;

/// Tolerance on the total of importance weights, square root of the machine epsilon
pub const WEIGHTS_SUM_TOLERANCE: f64 = 1.4901161193847656e-8;

/// Systematic resampling of weighted samples into an equally weighted set of the same size
///
/// `weights` must sum to unity within [WEIGHTS_SUM_TOLERANCE]. A single uniform draw shifts the
/// evenly spaced positions `(u + i) / n`, each position picks the sample whose cumulative weight
/// first exceeds it.
pub fn resample_equal<R>(
    samples: ArrayView2<'_, f64>,
    weights: ArrayView1<'_, f64>,
    rng: &mut R,
) -> Result<Array2<f64>, SamplerError>
where
    R: Rng + ?Sized,
{
    let n = weights.len();
    if n == 0 {
        return Err(SamplerError::NoSamples);
    }
    assert_eq!(samples.nrows(), n, "one weight per sample is required");
    let total = weights.sum();
    if !((total - 1.0).abs() <= WEIGHTS_SUM_TOLERANCE) {
        return Err(SamplerError::Weights(total));
    }

    let offset: f64 = rng.random();
    let mut idx = Vec::with_capacity(n);
    let mut cumulative = weights[0];
    let mut j = 0;
    for i in 0..n {
        let position = (offset + i as f64) / n as f64;
        while position >= cumulative && j < n - 1 {
            j += 1;
            cumulative += weights[j];
        }
        idx.push(j);
    }
    Ok(samples.select(Axis(0), &idx))
}
