use crate::parameters::{FitMode, Parameter};

use std::path::PathBuf;

/// Error returned while constructing priors or parsing a prior specification
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PriorError {
    #[error("prior given for unknown parameter \"{0}\"")]
    UnknownParameter(String),

    #[error("parameter {parameter} does not exist in {mode:?} fitting mode")]
    NotInMode { parameter: Parameter, mode: FitMode },

    #[error("unknown prior kind \"{0}\", expected one of uniform, normal, truncatednormal, default, fixed")]
    UnknownKind(String),

    #[error("{kind} prior expects {expected} comma-separated operands, got \"{operands}\"")]
    WrongOperandCount {
        kind: &'static str,
        expected: usize,
        operands: String,
    },

    #[error("cannot parse prior operand \"{0}\" as a number")]
    BadOperand(String),

    #[error("invalid {distribution} prior: {reason}")]
    InvalidDistribution {
        distribution: &'static str,
        reason: &'static str,
    },

    #[error("invalid empirical prior table: {0}")]
    InvalidTable(&'static str),

    #[error("isochrone log g estimator returned no result, logg has no usable prior")]
    LoggEstimateUnavailable,

    #[error("no prior available for free parameter {0}")]
    Missing(Parameter),

    #[error("prior specification line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<PriorError>,
    },
}

/// Error returned for invalid fitter or engine settings
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{setting} must be {requirement}, got {value}")]
    InvalidSetting {
        setting: &'static str,
        requirement: &'static str,
        value: String,
    },

    #[error("engine {configured} is configured, but a {provided} backend was supplied")]
    EngineMismatch {
        configured: &'static str,
        provided: &'static str,
    },

    #[error("cannot parse fitter configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    pub(crate) fn invalid(
        setting: &'static str,
        requirement: &'static str,
        value: impl ToString,
    ) -> Self {
        Self::InvalidSetting {
            setting,
            requirement,
            value: value.to_string(),
        }
    }
}

/// Error raised by a sampler driver or while reading the sampler output
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("cannot build likelihood worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("nested sampling backend failed: {0}")]
    Backend(String),

    #[error("malformed sampler output {}: {reason}", path.display())]
    MalformedOutput { path: PathBuf, reason: String },

    #[error("importance weights sum to {0}, expected unity")]
    Weights(f64),

    #[error("sampler returned no posterior samples")]
    NoSamples,

    #[error("posterior of {0} holds only NaN samples")]
    NanPosterior(Parameter),

    #[error("posterior samples have {actual} columns, expected {expected}")]
    Dimension { actual: usize, expected: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Top-level error of a fitting run
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error(transparent)]
    Prior(#[from] PriorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error("cannot write fit output: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot serialize fit result: {0}")]
    Json(#[from] serde_json::Error),
}
