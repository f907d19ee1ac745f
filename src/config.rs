use crate::error::{ConfigError, FitError};
use crate::parameters::FitMode;
use crate::sampler::EngineSettings;
use crate::star::Star;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stellar atmosphere model grid the synthetic photometry comes from
///
/// The name is recorded in the fit output, the grid itself is supplied by the caller.
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum ModelGridName {
    #[default]
    Phoenix,
    Btsettl,
    Btnextgen,
    Btcond,
    Kurucz,
    Ck04,
}

impl ModelGridName {
    pub fn name(self) -> &'static str {
        match self {
            Self::Phoenix => "phoenix",
            Self::Btsettl => "btsettl",
            Self::Btnextgen => "btnextgen",
            Self::Btcond => "btcond",
            Self::Kurucz => "kurucz",
            Self::Ck04 => "ck04",
        }
    }
}

impl fmt::Display for ModelGridName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Settings of a single fitting run
///
/// Usually read from a TOML file:
///
/// ```toml
/// norm = false
/// grid = "phoenix"
/// estimate_logg = true
/// prior_file = "priors.dat"
/// out_folder = "HD 209458/"
/// seed = 42
///
/// [engine]
/// name = "dynesty"
/// nlive = 500
/// dlogz = 0.5
/// bound = "multi"
/// sample = "rwalk"
/// threads = 4
/// dynamic = false
/// ```
///
/// Every key is optional.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FitterConfig {
    #[serde(default)]
    pub engine: EngineSettings,
    /// Fit a normalization constant instead of distance and radius
    #[serde(default = "FitterConfig::default_norm")]
    pub norm: bool,
    #[serde(default)]
    pub grid: ModelGridName,
    /// Derive the log g prior from isochrones
    #[serde(default = "FitterConfig::default_estimate_logg")]
    pub estimate_logg: bool,
    /// Prior override file, see [parse_prior_spec](crate::prior::parse_prior_spec)
    #[serde(default)]
    pub prior_file: Option<PathBuf>,
    /// Output directory, `<star name>/` if not given
    #[serde(default)]
    pub out_folder: Option<PathBuf>,
    #[serde(default = "FitterConfig::default_verbose")]
    pub verbose: bool,
    /// Seed of the posterior resampling, taken from the OS if not given
    #[serde(default)]
    pub seed: Option<u64>,
}

impl FitterConfig {
    #[inline]
    pub fn default_norm() -> bool {
        false
    }

    #[inline]
    pub fn default_estimate_logg() -> bool {
        false
    }

    #[inline]
    pub fn default_verbose() -> bool {
        true
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FitError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()
    }

    pub fn mode(&self) -> FitMode {
        FitMode::from_norm_flag(self.norm)
    }

    /// Output directory for `star`
    pub fn out_folder_for(&self, star: &Star) -> PathBuf {
        self.out_folder
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}/", star.name)))
    }

    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(FitterConfig)
    }
}

impl Default for FitterConfig {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            norm: Self::default_norm(),
            grid: ModelGridName::default(),
            estimate_logg: Self::default_estimate_logg(),
            prior_file: None,
            out_folder: None,
            verbose: Self::default_verbose(),
            seed: None,
        }
    }
}
