use crate::error::{ConfigError, SamplerError};
use crate::objective::{ModelGrid, SedObjective};

use ndarray::{Array2, s};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Settings of the MultiNest engine
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MultiNestSettings {
    pub nlive: usize,
    /// Evidence tolerance
    pub dlogz: f64,
    pub sampling_efficiency: f64,
    pub max_modes: usize,
}

impl MultiNestSettings {
    pub fn new(
        nlive: usize,
        dlogz: f64,
        sampling_efficiency: f64,
        max_modes: usize,
    ) -> Result<Self, ConfigError> {
        let settings = Self {
            nlive,
            dlogz,
            sampling_efficiency,
            max_modes,
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
        if !(self.sampling_efficiency > 0.0 && self.sampling_efficiency <= 1.0) {
            return Err(ConfigError::invalid(
                "sampling_efficiency",
                "in (0, 1]",
                self.sampling_efficiency,
            ));
        }
        if self.max_modes == 0 {
            return Err(ConfigError::invalid("max_modes", "positive", self.max_modes));
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
    pub fn default_sampling_efficiency() -> f64 {
        0.8
    }

    #[inline]
    pub fn default_max_modes() -> usize {
        100
    }
}

impl Default for MultiNestSettings {
    fn default() -> Self {
        Self {
            nlive: Self::default_nlive(),
            dlogz: Self::default_dlogz(),
            sampling_efficiency: Self::default_sampling_efficiency(),
            max_modes: Self::default_max_modes(),
        }
    }
}

/// Everything a MultiNest-like sampler needs for one run
///
/// Both callbacks receive the sampler's parameter buffer together with `(ndim, n_params)`.
/// `prior_transform` overwrites the first `ndim` unit-cube values with physical values.
pub struct MultiNestProblem<'a> {
    pub loglike: &'a (dyn Fn(&[f64], usize, usize) -> f64 + Sync),
    pub prior_transform: &'a (dyn Fn(&mut [f64], usize, usize) + Sync),
    pub ndim: usize,
    pub n_params: usize,
    pub n_live_points: usize,
    pub evidence_tolerance: f64,
    pub sampling_efficiency: f64,
    pub max_modes: usize,
    /// Prefix of every output file, suffixes are appended verbatim
    pub outputfiles_basename: PathBuf,
    pub resume: bool,
    pub verbose: bool,
}

/// Nested sampler with MultiNest's calling convention
///
/// The run must leave `<basename>post_equal_weights.dat` and `<basename>stats.dat` behind, the
/// driver reads its results from them.
pub trait MultiNestSampler {
    fn run(&mut self, problem: &MultiNestProblem<'_>) -> Result<(), SamplerError>;
}

/// Output files of a finished MultiNest run
#[derive(Clone, Debug, PartialEq)]
pub struct MultiNestRun {
    basename: PathBuf,
    ndim: usize,
}

impl MultiNestRun {
    pub const POST_EQUAL_WEIGHTS_SUFFIX: &'static str = "post_equal_weights.dat";
    pub const STATS_SUFFIX: &'static str = "stats.dat";

    pub fn new(basename: impl Into<PathBuf>, ndim: usize) -> Self {
        Self {
            basename: basename.into(),
            ndim,
        }
    }

    pub fn basename(&self) -> &Path {
        &self.basename
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut path = OsString::from(self.basename.as_os_str());
        path.push(suffix);
        path.into()
    }

    pub fn post_equal_weights_path(&self) -> PathBuf {
        self.with_suffix(Self::POST_EQUAL_WEIGHTS_SUFFIX)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.with_suffix(Self::STATS_SUFFIX)
    }

    /// Equally weighted posterior, shape `(nsamples, ndim)`
    ///
    /// Every row of the file holds `ndim` parameter values followed by the log-likelihood, the
    /// trailing column is dropped.
    pub fn equal_weighted_posterior(&self) -> Result<Array2<f64>, SamplerError> {
        let path = self.post_equal_weights_path();
        let table = read_table(&path, self.ndim + 1)?;
        if table.nrows() == 0 {
            return Err(SamplerError::NoSamples);
        }
        Ok(table.slice(s![.., ..self.ndim]).to_owned())
    }

    /// Global log-evidence and its error
    ///
    /// The importance-sampling estimate is used when the stats file reports one.
    pub fn global_evidence(&self) -> Result<(f64, f64), SamplerError> {
        let path = self.stats_path();
        let text = fs::read_to_string(&path)?;
        let malformed = |reason: &str| SamplerError::MalformedOutput {
            path: path.clone(),
            reason: reason.to_owned(),
        };
        let mut nested = None;
        let mut importance = None;
        for line in text.lines() {
            let Some((label, value)) = line.split_once(':') else {
                continue;
            };
            let label = label.trim();
            if label == "Nested Sampling Global Log-Evidence" {
                nested = Some(parse_value_error(value).ok_or_else(|| malformed(line))?);
            } else if label == "Nested Importance Sampling Global Log-Evidence" {
                importance = Some(parse_value_error(value).ok_or_else(|| malformed(line))?);
            }
        }
        importance
            .or(nested)
            .ok_or_else(|| malformed("no global log-evidence line"))
    }
}

/// Parse `"X +/- Y"`
fn parse_value_error(s: &str) -> Option<(f64, f64)> {
    let (value, error) = s.split_once("+/-")?;
    Some((value.trim().parse().ok()?, error.trim().parse().ok()?))
}

/// Whitespace-separated numeric table with a fixed number of columns
fn read_table(path: &Path, ncols: usize) -> Result<Array2<f64>, SamplerError> {
    let text = fs::read_to_string(path)?;
    let mut values = Vec::new();
    let mut nrows = 0;
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| SamplerError::MalformedOutput {
                path: path.to_owned(),
                reason: format!("line {}: {err}", i + 1),
            })?;
        if row.len() != ncols {
            return Err(SamplerError::MalformedOutput {
                path: path.to_owned(),
                reason: format!("line {} has {} columns, expected {ncols}", i + 1, row.len()),
            });
        }
        values.extend(row);
        nrows += 1;
    }
    Array2::from_shape_vec((nrows, ncols), values).map_err(|err| SamplerError::MalformedOutput {
        path: path.to_owned(),
        reason: err.to_string(),
    })
}

/// Run MultiNest on the objective, writing chains under `<out_folder>/multinest/`
pub fn run_multinest<G>(
    settings: &MultiNestSettings,
    objective: &SedObjective<'_, G>,
    sampler: &mut dyn MultiNestSampler,
    out_folder: &Path,
    verbose: bool,
) -> Result<MultiNestRun, SamplerError>
where
    G: ModelGrid + ?Sized,
{
    let ndim = objective.ndim();
    let chains_dir = out_folder.join("multinest");
    fs::create_dir_all(&chains_dir)?;
    let basename = chains_dir.join("chains");
    info!(
        engine = "multinest",
        nlive = settings.nlive,
        dlogz = settings.dlogz,
        sampling_efficiency = settings.sampling_efficiency,
        max_modes = settings.max_modes,
        ndim,
        "starting nested sampling"
    );
    debug!(basename = %basename.display(), "MultiNest output prefix");

    let loglike = |cube: &[f64], ndim: usize, nparams: usize| {
        objective.multinest_log_like(cube, ndim, nparams)
    };
    let prior_transform = |cube: &mut [f64], ndim: usize, nparams: usize| {
        objective.multinest_prior_transform(cube, ndim, nparams)
    };
    let problem = MultiNestProblem {
        loglike: &loglike,
        prior_transform: &prior_transform,
        ndim,
        n_params: ndim,
        n_live_points: settings.nlive,
        evidence_tolerance: settings.dlogz,
        sampling_efficiency: settings.sampling_efficiency,
        max_modes: settings.max_modes,
        outputfiles_basename: basename.clone(),
        resume: false,
        verbose,
    };
    sampler.run(&problem)?;
    Ok(MultiNestRun::new(basename, ndim))
}
