use crate::error::{FitError, PriorError};
use crate::parameters::Parameter;
use crate::prior::distribution::Prior;

use itertools::Itertools;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Declarative prior of a single parameter
///
/// Every variant carries typed operands, so a malformed bounds string is rejected while the
/// specification is parsed and never reaches the sampler.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PriorSpec {
    Uniform {
        low: f64,
        high: f64,
    },
    Normal {
        mean: f64,
        std: f64,
    },
    /// Bounds are given in parameter units and standardized internally
    #[serde(rename = "truncatednormal")]
    TruncatedNormal {
        mean: f64,
        std: f64,
        upper: f64,
        lower: f64,
    },
    /// Data-driven default prior
    Default,
    /// Hold the parameter fixed, it is not sampled
    Fixed {
        value: f64,
    },
}

fn parse_operands(operands: &str) -> Result<Vec<f64>, PriorError> {
    operands
        .split(',')
        .map(str::trim)
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| PriorError::BadOperand(s.to_owned()))
        })
        .collect()
}

impl PriorSpec {
    /// Parse a prior kind (case-insensitive) with its comma-separated operands
    ///
    /// `default` takes no operands, `operands` is ignored for it.
    pub fn parse(kind: &str, operands: Option<&str>) -> Result<Self, PriorError> {
        let kind = kind.to_lowercase();
        if kind == "default" {
            return Ok(Self::Default);
        }
        let raw = operands.unwrap_or_default();
        let values = parse_operands(raw)?;
        let wrong_count = |kind: &'static str, expected: usize| PriorError::WrongOperandCount {
            kind,
            expected,
            operands: raw.to_owned(),
        };
        match kind.as_str() {
            "uniform" => {
                let (low, high) = values
                    .into_iter()
                    .collect_tuple()
                    .ok_or_else(|| wrong_count("uniform", 2))?;
                Ok(Self::Uniform { low, high })
            }
            "normal" => {
                let (mean, std) = values
                    .into_iter()
                    .collect_tuple()
                    .ok_or_else(|| wrong_count("normal", 2))?;
                Ok(Self::Normal { mean, std })
            }
            "truncatednormal" => {
                let (mean, std, upper, lower) = values
                    .into_iter()
                    .collect_tuple()
                    .ok_or_else(|| wrong_count("truncatednormal", 4))?;
                Ok(Self::TruncatedNormal {
                    mean,
                    std,
                    upper,
                    lower,
                })
            }
            "fixed" => {
                let (value,) = values
                    .into_iter()
                    .collect_tuple()
                    .ok_or_else(|| wrong_count("fixed", 1))?;
                Ok(Self::Fixed { value })
            }
            _ => Err(PriorError::UnknownKind(kind)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Uniform { .. } => "uniform",
            Self::Normal { .. } => "normal",
            Self::TruncatedNormal { .. } => "truncatednormal",
            Self::Default => "default",
            Self::Fixed { .. } => "fixed",
        }
    }

    /// Distribution described by the specification, `None` for [PriorSpec::Default] and
    /// [PriorSpec::Fixed]
    pub fn distribution(&self) -> Result<Option<Prior>, PriorError> {
        match *self {
            Self::Uniform { low, high } => Prior::uniform(low, high).map(Some),
            Self::Normal { mean, std } => Prior::normal(mean, std).map(Some),
            Self::TruncatedNormal {
                mean,
                std,
                upper,
                lower,
            } => Prior::truncated_normal(mean, std, lower, upper).map(Some),
            Self::Default | Self::Fixed { .. } => Ok(None),
        }
    }
}

/// User override of the default prior of one parameter
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PriorOverride {
    pub parameter: Parameter,
    #[serde(flatten)]
    pub spec: PriorSpec,
}

impl PriorOverride {
    pub fn new(parameter: Parameter, spec: PriorSpec) -> Self {
        Self { parameter, spec }
    }

    fn parse_line(line: &str) -> Result<Option<Self>, PriorError> {
        let line = line.split('#').next().unwrap_or_default();
        let mut columns = line.split_whitespace();
        let Some(name) = columns.next() else {
            return Ok(None);
        };
        let kind = columns.next().ok_or_else(|| PriorError::WrongOperandCount {
            kind: "prior",
            expected: 2,
            operands: line.trim().to_owned(),
        })?;
        let operands = columns.next();
        let parameter = name.parse()?;
        let spec = PriorSpec::parse(kind, operands)?;
        Ok(Some(Self { parameter, spec }))
    }
}

/// Parse a whitespace-delimited prior specification
///
/// Each line holds a parameter name, a prior kind and a comma-separated operand string, for
/// example `teff normal 5700,100`. `#` starts a comment, blank lines are skipped.
pub fn parse_prior_spec(text: &str) -> Result<Vec<PriorOverride>, PriorError> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            PriorOverride::parse_line(line)
                .map_err(|source| PriorError::AtLine {
                    line: i + 1,
                    source: Box::new(source),
                })
                .transpose()
        })
        .collect()
}

pub fn read_prior_file(path: impl AsRef<Path>) -> Result<Vec<PriorOverride>, FitError> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_prior_spec(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prior::distribution::PriorDistributionTrait;

    use approx::assert_relative_eq;

    #[test]
    fn parse_every_kind() {
        let text = "\
# parameter kind operands
teff    Normal           5777,100
logg    uniform          3.5,5.0
z       TruncatedNormal  0.0,0.2,0.5,-0.5
dist    default
rad     default          ignored
Av      fixed            0.05
";
        let overrides = parse_prior_spec(text).unwrap();
        assert_eq!(
            overrides,
            vec![
                PriorOverride::new(
                    Parameter::Teff,
                    PriorSpec::Normal {
                        mean: 5777.0,
                        std: 100.0
                    }
                ),
                PriorOverride::new(
                    Parameter::Logg,
                    PriorSpec::Uniform {
                        low: 3.5,
                        high: 5.0
                    }
                ),
                PriorOverride::new(
                    Parameter::Z,
                    PriorSpec::TruncatedNormal {
                        mean: 0.0,
                        std: 0.2,
                        upper: 0.5,
                        lower: -0.5
                    }
                ),
                PriorOverride::new(Parameter::Dist, PriorSpec::Default),
                PriorOverride::new(Parameter::Rad, PriorSpec::Default),
                PriorOverride::new(Parameter::Av, PriorSpec::Fixed { value: 0.05 }),
            ]
        );
    }

    #[test]
    fn truncated_normal_operand_order_is_upper_then_lower() {
        let spec = PriorSpec::parse("truncatednormal", Some("1.0,0.5,2.0,0.0")).unwrap();
        let prior = spec.distribution().unwrap().unwrap();
        assert_eq!(prior.kind(), "truncatednormal");
        assert_relative_eq!(prior.ppf(0.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(prior.ppf(1.0), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let err = parse_prior_spec("teff normal 5000,100\nfoo uniform 0,1\n").unwrap_err();
        assert_eq!(
            err,
            PriorError::AtLine {
                line: 2,
                source: Box::new(PriorError::UnknownParameter("foo".into()))
            }
        );
    }

    #[test]
    fn malformed_operands_are_rejected() {
        assert!(matches!(
            PriorSpec::parse("uniform", Some("0")),
            Err(PriorError::WrongOperandCount { expected: 2, .. })
        ));
        assert!(matches!(
            PriorSpec::parse("normal", Some("1,2,3")),
            Err(PriorError::WrongOperandCount { expected: 2, .. })
        ));
        assert_eq!(
            PriorSpec::parse("fixed", Some("abc")),
            Err(PriorError::BadOperand("abc".into()))
        );
        assert!(PriorSpec::parse("fixed", None).is_err());
        assert_eq!(
            PriorSpec::parse("lognormal", Some("1,2")),
            Err(PriorError::UnknownKind("lognormal".into()))
        );
        assert!(parse_prior_spec("teff\n").is_err());
    }

    #[test]
    fn serde_representation() {
        let o = PriorOverride::new(Parameter::Av, PriorSpec::Fixed { value: 0.1 });
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"parameter": "Av", "kind": "fixed", "value": 0.1})
        );
    }
}
