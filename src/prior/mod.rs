//! Prior construction
//!
//! Every free parameter gets a [Prior] supporting both the unit-cube transform used by nested
//! samplers ([PriorDistributionTrait::ppf]) and log-density evaluation
//! ([PriorDistributionTrait::ln_pdf]). [PriorBuilder] derives data-driven defaults from the
//! [Star](crate::Star) and merges them with user [PriorOverride]s.

pub mod builder;
pub use builder::{DefaultPriors, IsochroneInputs, LoggEstimator, PriorBuilder, PriorSetup};

pub mod distribution;
pub use distribution::{
    NormalPrior, Prior, PriorDistributionTrait, TruncatedNormalPrior, UniformPrior,
};

pub mod empirical;
pub use empirical::{EmpiricalPrior, PriorTables};

pub mod spec;
pub use spec::{PriorOverride, PriorSpec, parse_prior_spec, read_prior_file};

use crate::parameters::Parameter;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prior distribution of every free parameter
///
/// Fixed parameters have no entry.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PriorMap(BTreeMap<Parameter, Prior>);

impl PriorMap {
    pub fn get(&self, parameter: Parameter) -> Option<&Prior> {
        self.0.get(&parameter)
    }

    pub fn contains(&self, parameter: Parameter) -> bool {
        self.0.contains_key(&parameter)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Parameter, &Prior)> {
        self.0.iter().map(|(&p, prior)| (p, prior))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn insert(&mut self, parameter: Parameter, prior: Prior) {
        self.0.insert(parameter, prior);
    }

    pub(crate) fn remove(&mut self, parameter: Parameter) -> Option<Prior> {
        self.0.remove(&parameter)
    }
}

impl FromIterator<(Parameter, Prior)> for PriorMap {
    fn from_iter<I: IntoIterator<Item = (Parameter, Prior)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
