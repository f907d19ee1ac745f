use crate::error::PriorError;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Physical parameter of the SED model
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum Parameter {
    #[serde(rename = "teff")]
    Teff,
    #[serde(rename = "logg")]
    Logg,
    #[serde(rename = "z")]
    Z,
    #[serde(rename = "dist")]
    Dist,
    #[serde(rename = "rad")]
    Rad,
    #[serde(rename = "norm")]
    Norm,
    #[serde(rename = "Av")]
    Av,
    #[serde(rename = "inflation")]
    Inflation,
}

impl Parameter {
    /// Every name a prior specification may refer to, in either fitting mode
    pub const ALL: [Parameter; 8] = [
        Self::Teff,
        Self::Logg,
        Self::Z,
        Self::Dist,
        Self::Rad,
        Self::Norm,
        Self::Av,
        Self::Inflation,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Teff => "teff",
            Self::Logg => "logg",
            Self::Z => "z",
            Self::Dist => "dist",
            Self::Rad => "rad",
            Self::Norm => "norm",
            Self::Av => "Av",
            Self::Inflation => "inflation",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Parameter {
    type Err = PriorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| PriorError::UnknownParameter(s.to_owned()))
    }
}

pub const PHYSICAL_ORDER: [Parameter; 7] = [
    Parameter::Teff,
    Parameter::Logg,
    Parameter::Z,
    Parameter::Dist,
    Parameter::Rad,
    Parameter::Av,
    Parameter::Inflation,
];

pub const NORMALIZED_ORDER: [Parameter; 6] = [
    Parameter::Teff,
    Parameter::Logg,
    Parameter::Z,
    Parameter::Norm,
    Parameter::Av,
    Parameter::Inflation,
];

/// Largest canonical order length over all fitting modes
pub const MAX_NPARAMS: usize = PHYSICAL_ORDER.len();

/// Fitting mode, which selects the canonical parameter order
///
/// In [FitMode::Physical] the model flux is scaled by `(rad / dist)^2`, in [FitMode::Normalized]
/// a single normalization constant replaces both; a radius can be derived from the parallax
/// afterwards.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    Physical,
    Normalized,
}

impl FitMode {
    pub fn from_norm_flag(norm: bool) -> Self {
        if norm {
            Self::Normalized
        } else {
            Self::Physical
        }
    }

    pub fn is_normalized(self) -> bool {
        matches!(self, Self::Normalized)
    }

    /// Canonical parameter order, every index in the crate is relative to it
    pub fn order(self) -> &'static [Parameter] {
        match self {
            Self::Physical => &PHYSICAL_ORDER,
            Self::Normalized => &NORMALIZED_ORDER,
        }
    }

    pub fn nparams(self) -> usize {
        self.order().len()
    }

    pub fn index_of(self, parameter: Parameter) -> Option<usize> {
        self.order().iter().position(|&p| p == parameter)
    }

    pub fn contains(self, parameter: Parameter) -> bool {
        self.index_of(parameter).is_some()
    }

    pub fn names(self) -> impl Iterator<Item = &'static str> {
        self.order().iter().map(|p| p.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_order() {
        let names: Vec<_> = FitMode::Physical.names().collect();
        assert_eq!(
            names,
            ["teff", "logg", "z", "dist", "rad", "Av", "inflation"]
        );
    }

    #[test]
    fn normalized_order() {
        let names: Vec<_> = FitMode::Normalized.names().collect();
        assert_eq!(names, ["teff", "logg", "z", "norm", "Av", "inflation"]);
    }

    #[test]
    fn av_index_follows_order() {
        assert_eq!(FitMode::Physical.index_of(Parameter::Av), Some(5));
        assert_eq!(FitMode::Normalized.index_of(Parameter::Av), Some(4));
        assert_eq!(FitMode::Normalized.index_of(Parameter::Dist), None);
        assert_eq!(FitMode::Physical.index_of(Parameter::Norm), None);
    }

    #[test]
    fn parse_names() {
        for p in Parameter::ALL {
            assert_eq!(p.name().parse::<Parameter>().unwrap(), p);
        }
        assert_eq!(
            "foo".parse::<Parameter>(),
            Err(PriorError::UnknownParameter("foo".into()))
        );
        // names are case-sensitive, "av" is not "Av"
        assert!("av".parse::<Parameter>().is_err());
    }
}
