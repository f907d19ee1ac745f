//! Nested sampling engines
//!
//! The samplers themselves are external: a caller supplies an implementation of
//! [DynestySampler] or [MultiNestSampler] wrapped into a [Backend]. This module validates the
//! engine settings, adapts the [SedObjective](crate::SedObjective) to the backend's calling
//! convention, owns the worker pool for the run and collects the raw output.

pub mod dynesty;
pub use dynesty::{
    Bound, DynestyProblem, DynestyRun, DynestySampler, DynestySettings, SampleMethod, Stopping,
    run_dynesty,
};

pub mod multinest;
pub use multinest::{
    MultiNestProblem, MultiNestRun, MultiNestSampler, MultiNestSettings, run_multinest,
};

pub mod pool;
pub use pool::WorkerPool;

use crate::error::{ConfigError, FitError};
use crate::objective::{ModelGrid, SedObjective};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine choice together with its settings
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum EngineSettings {
    Dynesty(DynestySettings),
    #[serde(rename = "multinest")]
    MultiNest(MultiNestSettings),
}

impl EngineSettings {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dynesty(_) => "dynesty",
            Self::MultiNest(_) => "multinest",
        }
    }

    pub fn nlive(&self) -> usize {
        match self {
            Self::Dynesty(s) => s.nlive,
            Self::MultiNest(s) => s.nlive,
        }
    }

    pub fn dlogz(&self) -> f64 {
        match self {
            Self::Dynesty(s) => s.dlogz,
            Self::MultiNest(s) => s.dlogz,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Dynesty(s) => s.validate(),
            Self::MultiNest(s) => s.validate(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::Dynesty(DynestySettings::default())
    }
}

impl From<DynestySettings> for EngineSettings {
    fn from(value: DynestySettings) -> Self {
        Self::Dynesty(value)
    }
}

impl From<MultiNestSettings> for EngineSettings {
    fn from(value: MultiNestSettings) -> Self {
        Self::MultiNest(value)
    }
}

/// Sampler implementation for a run, must match the configured engine
pub enum Backend<'a> {
    Dynesty(&'a mut dyn DynestySampler),
    MultiNest(&'a mut dyn MultiNestSampler),
}

impl Backend<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dynesty(_) => "dynesty",
            Self::MultiNest(_) => "multinest",
        }
    }
}

/// Raw output of either engine
#[derive(Clone, Debug)]
pub enum RawRun {
    Dynesty(DynestyRun),
    MultiNest(MultiNestRun),
}

/// Dispatch the objective to the backend of the configured engine
pub fn run_sampler<G>(
    settings: &EngineSettings,
    objective: &SedObjective<'_, G>,
    backend: Backend<'_>,
    out_folder: &Path,
    verbose: bool,
) -> Result<RawRun, FitError>
where
    G: ModelGrid + ?Sized,
{
    settings.validate()?;
    let run = match (settings, backend) {
        (EngineSettings::Dynesty(s), Backend::Dynesty(sampler)) => {
            RawRun::Dynesty(run_dynesty(s, objective, sampler, verbose)?)
        }
        (EngineSettings::MultiNest(s), Backend::MultiNest(sampler)) => {
            RawRun::MultiNest(run_multinest(s, objective, sampler, out_folder, verbose)?)
        }
        (settings, backend) => {
            return Err(ConfigError::EngineMismatch {
                configured: settings.name(),
                provided: backend.name(),
            }
            .into());
        }
    };
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_settings_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            engine: EngineSettings,
        }

        let w: Wrapper = toml::from_str("[engine]\nname = \"dynesty\"\n").unwrap();
        assert_eq!(w.engine, EngineSettings::default());

        let w: Wrapper = toml::from_str(
            "[engine]\nname = \"multinest\"\nnlive = 1000\nsampling_efficiency = 0.3\n",
        )
        .unwrap();
        assert_eq!(
            w.engine,
            EngineSettings::MultiNest(MultiNestSettings {
                nlive: 1000,
                sampling_efficiency: 0.3,
                ..Default::default()
            })
        );
        assert_eq!(w.engine.name(), "multinest");
        assert_eq!(w.engine.nlive(), 1000);

        let w: Wrapper = toml::from_str(
            "[engine]\nname = \"dynesty\"\nbound = \"single\"\nsample = \"slice\"\nthreads = 4\ndynamic = true\n",
        )
        .unwrap();
        let EngineSettings::Dynesty(s) = w.engine else {
            panic!("dynesty expected");
        };
        assert_eq!(s.bound, Bound::Single);
        assert_eq!(s.sample, SampleMethod::Slice);
        assert_eq!(s.threads, 4);
        assert!(s.dynamic);
    }

    #[test]
    fn unknown_engine_is_rejected() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Wrapper {
            engine: EngineSettings,
        }

        assert!(toml::from_str::<Wrapper>("[engine]\nname = \"emcee\"\n").is_err());
        assert!(toml::from_str::<Wrapper>("[engine]\nname = \"dynesty\"\nnlive_points = 3\n").is_err());
    }
}
