use crate::coordination::Coordination;
use crate::error::PriorError;
use crate::parameters::{FitMode, Parameter};
use crate::prior::distribution::{Prior, TruncatedNormalPrior};
use crate::prior::empirical::PriorTables;
use crate::prior::spec::{PriorOverride, PriorSpec};
use crate::prior::PriorMap;
use crate::star::{Measurement, Star};

use std::collections::BTreeMap;
use std::f64::consts::LN_10;
use tracing::{debug, info, warn};

/// Population prior of the metallicity [Fe/H]
pub const Z_PRIOR_MEAN: f64 = -0.125;
pub const Z_PRIOR_STD: f64 = 0.234;

/// Support of the uniform radius prior used when the catalogs have no radius, solar radii
pub const FALLBACK_RADIUS_RANGE: (f64, f64) = (0.1, 10.0);

/// Truncated-normal prior of the likelihood inflation term: location, scale and support
pub const INFLATION_PRIOR: (f64, f64, f64, f64) = (0.5, 0.5, 0.0, 5.0);

/// Scale of the one-sided normalization-constant prior
pub const NORM_PRIOR_SCALE: f64 = 1e-20;

/// Inputs of the isochrone log g estimator
///
/// Keys are `Teff`, `LogL`, `radius`, `parallax` and isochrone band names such as `G` or `W1`.
pub type IsochroneInputs = BTreeMap<&'static str, Measurement>;

/// Default prior of every parameter, or the reason it has none
pub type DefaultPriors = BTreeMap<Parameter, Result<Prior, PriorError>>;

/// Isochrone-based surface gravity estimator
pub trait LoggEstimator {
    /// Estimate log g and its uncertainty, `None` if the isochrone fit gave no result
    fn estimate(&self, bands: &[&str], inputs: &IsochroneInputs) -> Option<(f64, f64)>;
}

/// Priors of the free parameters together with the fixed-parameter bookkeeping
#[derive(Clone, Debug, PartialEq)]
pub struct PriorSetup {
    pub priors: PriorMap,
    pub coordination: Coordination,
}

impl PriorSetup {
    pub fn ndim(&self) -> usize {
        self.coordination.ndim()
    }
}

/// Builds the [PriorMap] of a star from data-driven defaults and user overrides
pub struct PriorBuilder<'a> {
    star: &'a Star,
    mode: FitMode,
    tables: &'a PriorTables,
    logg_estimator: Option<&'a dyn LoggEstimator>,
}

impl<'a> PriorBuilder<'a> {
    /// Builder with log g estimation disabled
    pub fn new(star: &'a Star, mode: FitMode, tables: &'a PriorTables) -> Self {
        Self {
            star,
            mode,
            tables,
            logg_estimator: None,
        }
    }

    /// Enable log g estimation with isochrones
    pub fn with_logg_estimator(mut self, estimator: &'a dyn LoggEstimator) -> Self {
        self.logg_estimator = Some(estimator);
        self
    }

    fn measured_normal(measurement: Measurement) -> Result<Prior, PriorError> {
        Prior::normal(measurement.value, measurement.error)
    }

    fn isochrone_inputs(&self) -> (Vec<&'static str>, IsochroneInputs) {
        let mut inputs = IsochroneInputs::new();
        if let Some(t) = self.star.temperature {
            inputs.insert("Teff", t);
        }
        if let Some(lum) = self.star.luminosity {
            if lum.value > 0.0 {
                inputs.insert(
                    "LogL",
                    Measurement::new(lum.value.log10(), lum.error / (lum.value * LN_10)),
                );
            }
        }
        if let Some(rad) = self.star.radius {
            inputs.insert("radius", rad);
        }
        if let Some(plx) = self.star.parallax {
            inputs.insert("parallax", plx);
        }
        let mut bands = vec![];
        for (band, magnitude) in self.star.isochrone_magnitudes() {
            inputs.insert(band, magnitude);
            bands.push(band);
        }
        (bands, inputs)
    }

    fn default_logg(&self) -> Result<Prior, PriorError> {
        let Some(estimator) = self.logg_estimator else {
            return Ok(self.tables.logg.clone().into());
        };
        let (bands, inputs) = self.isochrone_inputs();
        if inputs.is_empty() {
            warn!(
                parameter = "logg",
                "no temperature, luminosity, radius, parallax or isochrone magnitudes for {}, \
                 using the empirical logg prior",
                self.star.name
            );
            return Ok(self.tables.logg.clone().into());
        }
        info!(?bands, "estimating logg using isochrones");
        let (logg, logg_err) = estimator
            .estimate(&bands, &inputs)
            .ok_or(PriorError::LoggEstimateUnavailable)?;
        debug!(logg, logg_err, "isochrone logg estimate");
        Prior::normal(logg, logg_err)
    }

    /// Data-driven default priors
    ///
    /// A zero catalog extinction fixes `Av` at zero in `coordination`. Every other parameter of
    /// the mode gets an entry; a default that cannot be built (no distance in the catalog, failed
    /// log g estimate, unusable catalog uncertainty) is kept as its error, which surfaces only if
    /// the parameter ends up free without an override.
    pub fn default_priors(
        &self,
        coordination: &mut Coordination,
    ) -> Result<DefaultPriors, PriorError> {
        let mut defaults = DefaultPriors::new();

        let teff = match self.star.temperature {
            Some(t) => Self::measured_normal(t),
            None => {
                warn!(
                    parameter = "teff",
                    "no temperature measurement for {}, using the empirical teff prior",
                    self.star.name
                );
                Ok(self.tables.teff.clone().into())
            }
        };
        defaults.insert(Parameter::Teff, teff);
        defaults.insert(Parameter::Logg, self.default_logg());
        defaults.insert(Parameter::Z, Prior::normal(Z_PRIOR_MEAN, Z_PRIOR_STD));

        match self.mode {
            FitMode::Physical => {
                let dist = match self.star.distance {
                    Some(dist) => Self::measured_normal(dist),
                    None => Err(PriorError::Missing(Parameter::Dist)),
                };
                defaults.insert(Parameter::Dist, dist);
                let rad = match self.star.radius {
                    Some(rad) => Self::measured_normal(rad),
                    None => {
                        let (low, high) = FALLBACK_RADIUS_RANGE;
                        warn!(
                            parameter = "rad",
                            "no catalog radius for {}, using a uniform radius prior on [{low}, {high}]; \
                             consider fitting the normalization constant instead",
                            self.star.name
                        );
                        Prior::uniform(low, high)
                    }
                };
                defaults.insert(Parameter::Rad, rad);
            }
            FitMode::Normalized => {
                let norm = TruncatedNormalPrior::from_standardized(
                    0.0,
                    NORM_PRIOR_SCALE.recip(),
                    0.0,
                    NORM_PRIOR_SCALE,
                );
                defaults.insert(Parameter::Norm, norm.map(Into::into));
            }
        }

        if self.star.extinction == 0.0 {
            debug!("catalog extinction is zero, Av is fixed");
            coordination.fix(Parameter::Av, 0.0)?;
        } else {
            defaults.insert(Parameter::Av, Prior::uniform(0.0, self.star.extinction));
        }

        let (loc, scale, lower, upper) = INFLATION_PRIOR;
        defaults.insert(
            Parameter::Inflation,
            Prior::truncated_normal(loc, scale, lower, upper),
        );

        Ok(defaults)
    }

    /// Apply one override, `explicit` collects the user-given priors of free parameters
    fn apply_override(
        &self,
        o: &PriorOverride,
        explicit: &mut PriorMap,
        coordination: &mut Coordination,
    ) -> Result<(), PriorError> {
        let parameter = o.parameter;
        if !self.mode.contains(parameter) {
            return Err(PriorError::NotInMode {
                parameter,
                mode: self.mode,
            });
        }
        if parameter == Parameter::Av
            && self.star.extinction == 0.0
            && !matches!(o.spec, PriorSpec::Fixed { .. })
        {
            warn!(
                parameter = "Av",
                kind = o.spec.kind(),
                "catalog extinction is zero, Av stays fixed at 0 and its prior override is ignored"
            );
            return Ok(());
        }
        match o.spec {
            PriorSpec::Fixed { value } => {
                coordination.fix(parameter, value)?;
                explicit.remove(parameter);
            }
            PriorSpec::Default => {
                coordination.release(parameter);
                explicit.remove(parameter);
            }
            _ => {
                if let Some(prior) = o.spec.distribution()? {
                    coordination.release(parameter);
                    explicit.insert(parameter, prior);
                }
            }
        }
        Ok(())
    }

    /// Build the priors, applying `overrides` in order on top of the defaults
    ///
    /// Later overrides of the same parameter replace earlier ones. A default is used only for a
    /// free parameter without an override, so an unusable default of an overridden or fixed
    /// parameter is not an error.
    pub fn build(&self, overrides: Option<&[PriorOverride]>) -> Result<PriorSetup, PriorError> {
        let mut coordination = Coordination::new(self.mode);
        let mut defaults = self.default_priors(&mut coordination)?;
        let mut explicit = PriorMap::default();

        match overrides {
            Some(overrides) => {
                for o in overrides {
                    self.apply_override(o, &mut explicit, &mut coordination)?;
                }
            }
            None => warn!("no prior specification given, using default priors"),
        }

        let mut priors = PriorMap::default();
        for &parameter in self.mode.order() {
            if coordination.is_fixed(parameter) {
                continue;
            }
            let prior = match explicit.remove(parameter) {
                Some(prior) => prior,
                None => defaults
                    .remove(&parameter)
                    .unwrap_or(Err(PriorError::Missing(parameter)))?,
            };
            priors.insert(parameter, prior);
        }

        Ok(PriorSetup {
            priors,
            coordination,
        })
    }
}
