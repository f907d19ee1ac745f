#![doc = include_str!("../README.md")]

mod config;
pub use config::{FitterConfig, ModelGridName};

mod coordination;
pub use coordination::Coordination;

mod error;
pub use error::{ConfigError, FitError, PriorError, SamplerError};

mod fitter;
pub use fitter::{FitOutput, FitSetup, Fitter};

mod objective;
pub use objective::{
    LN_LIKE_FLOOR, ModelGrid, ObservedPhotometry, SedObjective, SedTheta,
    ln_likelihood_from_fluxes,
};

mod parameters;
pub use parameters::{FitMode, MAX_NPARAMS, NORMALIZED_ORDER, PHYSICAL_ORDER, Parameter};

pub mod prelude;

pub mod prior;
pub use prior::{LoggEstimator, Prior, PriorBuilder, PriorMap, PriorSetup, PriorTables};

pub mod result;
pub use result::{FitResult, Posterior, ResultRecord};

pub mod sampler;
pub use sampler::{
    Backend, DynestySampler, DynestySettings, EngineSettings, MultiNestSampler,
    MultiNestSettings, WorkerPool,
};

mod star;
pub use star::{ISOCHRONE_BANDS, Measurement, Photometry, Star};

pub use ndarray;
