//! Posterior reduction
//!
//! Raw sampler output becomes an equally weighted [Posterior], which is then summarized into a
//! [ResultRecord] and a best-fit table.

pub mod record;
pub use record::{
    BEST_FIT_FILE, FitResult, LIKELIHOOD_KEY, LOGLIKE_KEY, ParameterSummary, ResultRecord,
    format_best_fit,
};

pub mod resample;
pub use resample::resample_equal;

pub mod stats;
pub use stats::{CredibleInterval, SortedSamples, credibility_interval};

use crate::config::ModelGridName;
use crate::error::SamplerError;
use crate::objective::{ModelGrid, SedObjective};
use crate::parameters::MAX_NPARAMS;
use crate::sampler::{DynestyRun, MultiNestRun, RawRun};
use crate::star::Star;

use ndarray::{Array1, Array2};
use rand::Rng;
use std::collections::BTreeMap;
use tracing::debug;

/// Width of the reported intervals in standard deviations
pub const INTERVAL_SIGMA: f64 = 1.0;

/// Equally weighted posterior of the free parameters
#[derive(Clone, Debug, PartialEq)]
pub struct Posterior {
    pub lnz: f64,
    pub lnzerr: f64,
    /// Shape `(nsamples, ndim)`, free parameters in canonical order
    pub samples: Array2<f64>,
}

impl Posterior {
    /// Resample importance-weighted dynesty output with weights `exp(logwt - lnZ)`
    pub fn from_dynesty<R>(run: &DynestyRun, rng: &mut R) -> Result<Self, SamplerError>
    where
        R: Rng + ?Sized,
    {
        let weights = run.importance_weights();
        let samples = resample_equal(run.samples.view(), weights.view(), rng)?;
        Ok(Self {
            lnz: run.lnz(),
            lnzerr: run.lnzerr(),
            samples,
        })
    }

    /// Read the equally weighted posterior and the global evidence of a MultiNest run
    pub fn from_multinest(run: &MultiNestRun) -> Result<Self, SamplerError> {
        let samples = run.equal_weighted_posterior()?;
        let (lnz, lnzerr) = run.global_evidence()?;
        Ok(Self {
            lnz,
            lnzerr,
            samples,
        })
    }

    pub fn from_raw<R>(raw: &RawRun, rng: &mut R) -> Result<Self, SamplerError>
    where
        R: Rng + ?Sized,
    {
        match raw {
            RawRun::Dynesty(run) => Self::from_dynesty(run, rng),
            RawRun::MultiNest(run) => Self::from_multinest(run),
        }
    }

    pub fn nsamples(&self) -> usize {
        self.samples.nrows()
    }
}

/// Fit provenance stored next to the posterior
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Provenance {
    pub engine: &'static str,
    pub model_grid: ModelGridName,
}

/// Summarize `posterior` into the result record and the best-fit table
///
/// The log-likelihood is recomputed for every sample. The best fit is the per-parameter median
/// for free parameters and the fixed value otherwise, its likelihood is evaluated at that point.
pub fn summarize<G>(
    posterior: &Posterior,
    objective: &SedObjective<'_, G>,
    star: &Star,
    provenance: Provenance,
) -> Result<FitResult, SamplerError>
where
    G: ModelGrid + ?Sized,
{
    let coordination = objective.coordination();
    let ndim = coordination.ndim();
    let nparams = coordination.nparams();
    if posterior.samples.ncols() != ndim {
        return Err(SamplerError::Dimension {
            actual: posterior.samples.ncols(),
            expected: ndim,
        });
    }
    let nsamples = posterior.nsamples();
    if nsamples == 0 {
        return Err(SamplerError::NoSamples);
    }

    let mut posterior_samples = BTreeMap::new();
    let mut best_fit = BTreeMap::new();
    let mut summary = Vec::with_capacity(nparams);
    let mut best_theta = [0.0; MAX_NPARAMS];
    let mut free_columns = posterior.samples.columns().into_iter();
    for (i, &parameter) in coordination.order().iter().enumerate() {
        let row = match coordination.fixed_value(parameter) {
            Some(value) => {
                posterior_samples.insert(parameter.to_string(), vec![value; nsamples]);
                ParameterSummary::Fixed { parameter, value }
            }
            None => {
                let column = free_columns.next().ok_or(SamplerError::Dimension {
                    actual: ndim,
                    expected: i + 1,
                })?;
                if column.iter().all(|x| x.is_nan()) {
                    return Err(SamplerError::NanPosterior(parameter));
                }
                posterior_samples.insert(parameter.to_string(), column.to_vec());
                ParameterSummary::Free {
                    parameter,
                    interval: credibility_interval(column, INTERVAL_SIGMA),
                }
            }
        };
        best_theta[i] = row.best_fit();
        best_fit.insert(parameter.to_string(), row.best_fit());
        summary.push(row);
    }

    let loglike: Array1<f64> = posterior
        .samples
        .rows()
        .into_iter()
        .map(|free| match free.as_slice() {
            Some(free) => objective.log_like(free),
            None => objective.log_like(&free.to_vec()),
        })
        .collect();
    posterior_samples.insert(LOGLIKE_KEY.to_owned(), loglike.to_vec());

    let likelihood = objective.log_like_theta(&best_theta[..nparams]);
    best_fit.insert(LIKELIHOOD_KEY.to_owned(), likelihood);
    debug!(nsamples, likelihood, "posterior summarized");

    let record = ResultRecord {
        lnz: posterior.lnz,
        lnzerr: posterior.lnzerr,
        posterior_samples,
        fixed: coordination.fixed().to_vec(),
        coordinator: coordination.coordinator_flags(),
        best_fit,
        star: star.clone(),
        engine: provenance.engine.to_owned(),
        norm: objective.mode().is_normalized(),
        model_grid: provenance.model_grid,
    };
    Ok(FitResult { record, summary })
}
