use crate::error::{ConfigError, SamplerError};
use crate::objective::{ModelGrid, SedObjective};
use crate::sampler::pool::WorkerPool;

use ndarray::{Array1, Array2};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Method bounding the live points in the unit cube
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    None,
    Single,
    Multi,
    Balls,
    Cubes,
}

/// Method proposing new live points within the bound
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SampleMethod {
    Auto,
    Unif,
    Rwalk,
    Slice,
    Rslice,
}

/// Settings of the dynesty engine
///
/// Static runs stop when the estimated remaining evidence drops below `dlogz`, dynamic runs use
/// `dlogz` and `nlive` for their initial baseline run. With `threads > 1` the likelihood is
/// evaluated on a [WorkerPool] created for the run.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DynestySettings {
    pub nlive: usize,
    pub dlogz: f64,
    pub bound: Bound,
    pub sample: SampleMethod,
    pub threads: usize,
    pub dynamic: bool,
}

impl DynestySettings {
    pub fn new(
        nlive: usize,
        dlogz: f64,
        bound: Bound,
        sample: SampleMethod,
        threads: usize,
        dynamic: bool,
    ) -> Result<Self, ConfigError> {
        let settings = Self {
            nlive,
            dlogz,
            bound,
            sample,
            threads,
            dynamic,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nlive == 0 {
            return Err(ConfigError::invalid("nlive", "positive", self.nlive));
        }
        if !(self.dlogz.is_finite() && self.dlogz > 0.0) {
            return Err(ConfigError::invalid("dlogz", "positive and finite", self.dlogz));
        }
        if self.threads == 0 {
            return Err(ConfigError::invalid("threads", "at least 1", self.threads));
        }
        Ok(())
    }

    #[inline]
    pub fn default_nlive() -> usize {
        500
    }

    #[inline]
    pub fn default_dlogz() -> f64 {
        0.5
    }

    #[inline]
    pub fn default_bound() -> Bound {
        Bound::Multi
    }

    #[inline]
    pub fn default_sample() -> SampleMethod {
        SampleMethod::Rwalk
    }

    #[inline]
    pub fn default_threads() -> usize {
        1
    }

    #[inline]
    pub fn default_dynamic() -> bool {
        false
    }
}

impl Default for DynestySettings {
    fn default() -> Self {
        Self {
            nlive: Self::default_nlive(),
            dlogz: Self::default_dlogz(),
            bound: Self::default_bound(),
            sample: Self::default_sample(),
            threads: Self::default_threads(),
            dynamic: Self::default_dynamic(),
        }
    }
}

/// Stopping rule handed to the sampler, runs always stop on the evidence tolerance
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Stopping {
    /// Static nested sampling
    Static { dlogz: f64 },
    /// Dynamic nested sampling, the tolerance applies to the initial baseline run
    Dynamic { dlogz_init: f64, nlive_init: usize },
}

/// Everything a dynesty-like sampler needs for one run
pub struct DynestyProblem<'a> {
    pub loglike: &'a (dyn Fn(&[f64]) -> f64 + Sync),
    pub prior_transform: &'a (dyn Fn(&[f64]) -> Vec<f64> + Sync),
    pub ndim: usize,
    pub nlive: usize,
    pub bound: Bound,
    pub sample: SampleMethod,
    pub stopping: Stopping,
    pub verbose: bool,
}

/// Nested sampler with dynesty's calling convention
///
/// `loglike` takes the physical free-parameter vector, `prior_transform` maps a unit-cube point to
/// a new physical vector. When `pool` is `Some`, likelihood evaluations should be dispatched
/// through [WorkerPool::map] in batches of [WorkerPool::queue_size] points.
pub trait DynestySampler {
    fn run_nested(
        &mut self,
        problem: &DynestyProblem<'_>,
        pool: Option<&WorkerPool>,
    ) -> Result<DynestyRun, SamplerError>;
}

/// Raw output of a dynesty run: importance-weighted dead points
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DynestyRun {
    /// Shape `(nsamples, ndim)`, physical free parameters
    pub samples: Array2<f64>,
    /// Log importance weights
    pub logwt: Array1<f64>,
    /// Cumulative log evidence, the last element is the final estimate
    pub logz: Array1<f64>,
    pub logzerr: Array1<f64>,
}

impl DynestyRun {
    pub fn validate(&self, ndim: usize) -> Result<(), SamplerError> {
        let nsamples = self.samples.nrows();
        if nsamples == 0 {
            return Err(SamplerError::NoSamples);
        }
        if self.samples.ncols() != ndim {
            return Err(SamplerError::Dimension {
                actual: self.samples.ncols(),
                expected: ndim,
            });
        }
        if self.logwt.len() != nsamples || self.logz.is_empty() || self.logzerr.is_empty() {
            return Err(SamplerError::Backend(format!(
                "inconsistent dynesty output: {} samples, {} weights, {} evidence values",
                nsamples,
                self.logwt.len(),
                self.logz.len()
            )));
        }
        Ok(())
    }

    pub fn lnz(&self) -> f64 {
        self.logz[self.logz.len() - 1]
    }

    pub fn lnzerr(&self) -> f64 {
        self.logzerr[self.logzerr.len() - 1]
    }

    /// Normalized importance weights `exp(logwt - lnZ)`
    pub fn importance_weights(&self) -> Array1<f64> {
        let lnz = self.lnz();
        self.logwt.mapv(|lw| f64::exp(lw - lnz))
    }
}

/// Run dynesty on the objective
///
/// The worker pool, if any, is owned by this call and released before it returns.
pub fn run_dynesty<G>(
    settings: &DynestySettings,
    objective: &SedObjective<'_, G>,
    sampler: &mut dyn DynestySampler,
    verbose: bool,
) -> Result<DynestyRun, SamplerError>
where
    G: ModelGrid + ?Sized,
{
    let ndim = objective.ndim();
    info!(
        engine = "dynesty",
        nlive = settings.nlive,
        dlogz = settings.dlogz,
        bound = ?settings.bound,
        sample = ?settings.sample,
        threads = settings.threads,
        dynamic = settings.dynamic,
        ndim,
        "starting nested sampling"
    );
    let loglike = |cube: &[f64]| objective.dynesty_log_like(cube);
    let prior_transform = |u: &[f64]| objective.dynesty_prior_transform(u);
    let stopping = if settings.dynamic {
        Stopping::Dynamic {
            dlogz_init: settings.dlogz,
            nlive_init: settings.nlive,
        }
    } else {
        Stopping::Static {
            dlogz: settings.dlogz,
        }
    };
    let problem = DynestyProblem {
        loglike: &loglike,
        prior_transform: &prior_transform,
        ndim,
        nlive: settings.nlive,
        bound: settings.bound,
        sample: settings.sample,
        stopping,
        verbose,
    };

    let run = if settings.threads > 1 {
        let pool = WorkerPool::new(settings.threads)?;
        sampler.run_nested(&problem, Some(&pool))?
    } else {
        sampler.run_nested(&problem, None)?
    };
    run.validate(ndim)?;
    Ok(run)
}
