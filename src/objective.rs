//! Likelihood and prior-transform adapters
//!
//! Nested samplers see only the free parameters. [SedObjective] binds everything else once,
//! before sampling starts: the star, the model grid, the priors and the [Coordination]. It is
//! immutable afterwards and `Sync`, so worker threads share it by reference; per-thread scratch
//! buffers keep the hot path allocation-free.

use crate::coordination::Coordination;
use crate::error::PriorError;
use crate::parameters::{FitMode, MAX_NPARAMS, Parameter};
use crate::prior::{Prior, PriorDistributionTrait, PriorMap, PriorSetup};
use crate::star::Star;

use ndarray::{Array1, ArrayView1, Zip};
use std::cell::RefCell;
use std::f64::consts::TAU;
use thread_local::ThreadLocal;

/// Log-likelihood returned for unphysical models, e.g. non-positive synthetic fluxes
pub const LN_LIKE_FLOOR: f64 = -1e300;

/// Full parameter vector in the canonical order of its fitting mode
#[derive(Clone, Copy, Debug)]
pub struct SedTheta<'a> {
    mode: FitMode,
    values: &'a [f64],
}

impl<'a> SedTheta<'a> {
    /// # Panics
    /// If `values` does not match the canonical order length of `mode`
    pub fn new(mode: FitMode, values: &'a [f64]) -> Self {
        assert_eq!(values.len(), mode.nparams(), "wrong parameter vector length");
        Self { mode, values }
    }

    pub fn mode(&self) -> FitMode {
        self.mode
    }

    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    pub fn get(&self, parameter: Parameter) -> Option<f64> {
        self.mode.index_of(parameter).map(|i| self.values[i])
    }

    fn value_of(&self, parameter: Parameter) -> f64 {
        self.get(parameter).unwrap_or(f64::NAN)
    }

    pub fn teff(&self) -> f64 {
        self.value_of(Parameter::Teff)
    }

    pub fn logg(&self) -> f64 {
        self.value_of(Parameter::Logg)
    }

    pub fn z(&self) -> f64 {
        self.value_of(Parameter::Z)
    }

    pub fn av(&self) -> f64 {
        self.value_of(Parameter::Av)
    }

    pub fn inflation(&self) -> f64 {
        self.value_of(Parameter::Inflation)
    }
}

/// Interpolated grid of synthetic photometry
///
/// Implementations own the interpolators, which are loaded once at startup.
pub trait ModelGrid: Sync {
    /// Write the model flux of every filter into `fluxes`, same units as the observed fluxes
    ///
    /// In [FitMode::Physical] the model is scaled by `(rad / dist)^2`, in [FitMode::Normalized]
    /// by `norm`, in both cases after applying the extinction `Av`.
    fn synthetic_fluxes(&self, theta: SedTheta<'_>, filters: &[String], fluxes: &mut [f64]);
}

/// Observed photometry entering the likelihood
#[derive(Clone, Debug, PartialEq)]
pub struct ObservedPhotometry {
    pub filters: Vec<String>,
    pub flux: Array1<f64>,
    pub flux_error: Array1<f64>,
}

impl ObservedPhotometry {
    pub fn from_star(star: &Star) -> Self {
        let used: Vec<_> = star.used_photometry().collect();
        Self {
            filters: used.iter().map(|p| p.filter.clone()).collect(),
            flux: used.iter().map(|p| p.flux).collect(),
            flux_error: used.iter().map(|p| p.flux_error).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Gaussian log-likelihood with the error inflation term added in quadrature
///
/// `model` holds the synthetic fluxes of `observed.filters`.
pub fn ln_likelihood_from_fluxes(model: &[f64], observed: &ObservedPhotometry, inflation: f64) -> f64 {
    if model.iter().any(|&m| m <= 0.0 || !m.is_finite()) {
        return LN_LIKE_FLOOR;
    }
    let inflation2 = inflation.powi(2);
    let chi2 = Zip::from(ArrayView1::from(model))
        .and(&observed.flux)
        .and(&observed.flux_error)
        .fold(0.0, |acc, &m, &f, &e| {
            let sigma2 = e.powi(2) + inflation2;
            acc + (f - m).powi(2) / sigma2 + f64::ln(TAU * sigma2)
        });
    let lnl = -0.5 * chi2;
    if lnl.is_nan() { LN_LIKE_FLOOR } else { lnl }
}

/// Sampler-agnostic objective of an SED fit
pub struct SedObjective<'a, G: ?Sized> {
    grid: &'a G,
    coordination: &'a Coordination,
    priors: &'a PriorMap,
    observed: ObservedPhotometry,
    free_priors: Vec<Prior>,
    fluxes: ThreadLocal<RefCell<Vec<f64>>>,
}

impl<'a, G> SedObjective<'a, G>
where
    G: ModelGrid + ?Sized,
{
    pub fn new(star: &Star, grid: &'a G, setup: &'a PriorSetup) -> Result<Self, PriorError> {
        let free_priors = setup
            .coordination
            .free_parameters()
            .map(|p| setup.priors.get(p).cloned().ok_or(PriorError::Missing(p)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            grid,
            coordination: &setup.coordination,
            priors: &setup.priors,
            observed: ObservedPhotometry::from_star(star),
            free_priors,
            fluxes: ThreadLocal::new(),
        })
    }

    pub fn ndim(&self) -> usize {
        self.free_priors.len()
    }

    pub fn mode(&self) -> FitMode {
        self.coordination.mode()
    }

    pub fn coordination(&self) -> &Coordination {
        self.coordination
    }

    pub fn priors(&self) -> &PriorMap {
        self.priors
    }

    pub fn observed(&self) -> &ObservedPhotometry {
        &self.observed
    }

    fn fluxes_buffer(&self) -> &RefCell<Vec<f64>> {
        self.fluxes.get_or(|| RefCell::new(vec![0.0; self.observed.len()]))
    }

    /// Log-likelihood at a full canonical parameter vector
    pub fn log_like_theta(&self, theta: &[f64]) -> f64 {
        let mut fluxes = self.fluxes_buffer().borrow_mut();
        let theta = SedTheta::new(self.mode(), theta);
        self.grid.synthetic_fluxes(theta, &self.observed.filters, &mut fluxes);
        ln_likelihood_from_fluxes(&fluxes, &self.observed, theta.inflation())
    }

    /// Log-likelihood at a free-parameter vector
    pub fn log_like(&self, free: &[f64]) -> f64 {
        let nparams = self.coordination.nparams();
        let mut theta = [0.0; MAX_NPARAMS];
        self.coordination.build_params_into(free, &mut theta[..nparams]);
        self.log_like_theta(&theta[..nparams])
    }

    /// Map unit-cube values to free parameters through each prior's percent-point function
    pub fn prior_transform_into(&self, u: &[f64], free: &mut [f64]) {
        assert_eq!(u.len(), self.ndim(), "wrong unit-cube vector length");
        for ((x, &u), prior) in free.iter_mut().zip(u).zip(&self.free_priors) {
            *x = prior.ppf(u);
        }
    }

    pub fn prior_transform(&self, u: &[f64]) -> Vec<f64> {
        let mut free = vec![0.0; u.len()];
        self.prior_transform_into(u, &mut free);
        free
    }

    /// Sum of the free-parameter prior log-densities
    pub fn ln_prior(&self, free: &[f64]) -> f64 {
        free.iter()
            .zip(&self.free_priors)
            .map(|(&x, prior)| prior.ln_pdf(x))
            .sum()
    }

    /// Unnormalized log-posterior, `-inf` outside the prior support
    pub fn ln_posterior(&self, free: &[f64]) -> f64 {
        let ln_prior = self.ln_prior(free);
        if ln_prior.is_finite() {
            ln_prior + self.log_like(free)
        } else {
            f64::NEG_INFINITY
        }
    }

    /// Log-likelihood in the dynesty calling convention
    pub fn dynesty_log_like(&self, cube: &[f64]) -> f64 {
        self.log_like(cube)
    }

    /// Prior transform in the dynesty calling convention, returns a new vector
    pub fn dynesty_prior_transform(&self, cube: &[f64]) -> Vec<f64> {
        self.prior_transform(cube)
    }

    /// Log-likelihood in the MultiNest calling convention
    ///
    /// MultiNest passes its parameter buffer, only the first `ndim` entries are sampled values.
    pub fn multinest_log_like(&self, cube: &[f64], ndim: usize, _nparams: usize) -> f64 {
        self.log_like(&cube[..ndim])
    }

    /// Prior transform in the MultiNest calling convention, the cube is transformed in place
    pub fn multinest_prior_transform(&self, cube: &mut [f64], ndim: usize, _nparams: usize) {
        let mut u = [0.0; MAX_NPARAMS];
        u[..ndim].copy_from_slice(&cube[..ndim]);
        self.prior_transform_into(&u[..ndim], &mut cube[..ndim]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prior::{EmpiricalPrior, PriorBuilder, PriorTables, parse_prior_spec};
    use crate::star::Photometry;

    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Flat spectrum equal to `teff * 1e-4 * (rad / dist)^2`, scaled by `10^(-0.4 Av)`
    struct FlatGrid {
        calls: AtomicUsize,
    }

    impl ModelGrid for FlatGrid {
        fn synthetic_fluxes(&self, theta: SedTheta<'_>, _filters: &[String], fluxes: &mut [f64]) {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let scale = match theta.mode() {
                FitMode::Physical => {
                    let rad = theta.get(Parameter::Rad).unwrap();
                    let dist = theta.get(Parameter::Dist).unwrap();
                    (rad / dist).powi(2)
                }
                FitMode::Normalized => theta.get(Parameter::Norm).unwrap(),
            };
            let value = theta.teff() * 1e-4 * scale * 10f64.powf(-0.4 * theta.av());
            fluxes.fill(value);
        }
    }

    fn star() -> Star {
        let mut star = Star::new("flat")
            .with_temperature(5000.0, 100.0)
            .with_radius(1.0, 0.1)
            .with_distance(10.0, 0.5);
        for (filter, used) in [("2MASS_J", true), ("2MASS_H", true), ("SDSS_u", false)] {
            star = star.with_photometry(Photometry {
                filter: filter.into(),
                magnitude: 10.0,
                magnitude_error: 0.01,
                flux: 0.005,
                flux_error: 0.001,
                used,
            });
        }
        star
    }

    fn tables() -> PriorTables {
        PriorTables {
            teff: EmpiricalPrior::new(vec![3000.0, 6000.0]).unwrap(),
            logg: EmpiricalPrior::new(vec![3.0, 5.0]).unwrap(),
        }
    }

    #[test]
    fn likelihood_formula() {
        let observed = ObservedPhotometry {
            filters: vec!["a".into(), "b".into()],
            flux: Array1::from(vec![1.0, 2.0]),
            flux_error: Array1::from(vec![0.1, 0.2]),
        };
        let model = [1.1, 1.8];
        let inflation = 0.05;
        let s1 = 0.1f64.powi(2) + inflation * inflation;
        let s2 = 0.2f64.powi(2) + inflation * inflation;
        let desired = -0.5
            * (0.01 / s1 + f64::ln(TAU * s1) + 0.04 / s2 + f64::ln(TAU * s2));
        assert_relative_eq!(
            ln_likelihood_from_fluxes(&model, &observed, inflation),
            desired,
            epsilon = 1e-12
        );
        assert_eq!(
            ln_likelihood_from_fluxes(&[1.0, 0.0], &observed, inflation),
            LN_LIKE_FLOOR
        );
        assert_eq!(
            ln_likelihood_from_fluxes(&[f64::NAN, 1.0], &observed, inflation),
            LN_LIKE_FLOOR
        );
    }

    #[test]
    fn log_like_uses_fixed_av() {
        let star = star();
        let tables = tables();
        let setup = PriorBuilder::new(&star, FitMode::Physical, &tables)
            .build(None)
            .unwrap();
        let grid = FlatGrid {
            calls: AtomicUsize::new(0),
        };
        let objective = SedObjective::new(&star, &grid, &setup).unwrap();
        assert_eq!(objective.ndim(), 6);
        assert_eq!(objective.observed().len(), 2);

        let free = [5000.0, 4.5, 0.0, 10.0, 1.0, 0.0];
        let theta = setup.coordination.build_params(&free);
        assert_eq!(theta[5], 0.0);
        assert_eq!(objective.log_like(&free), objective.log_like_theta(&theta));
        // model flux 0.005 matches the data exactly
        let sigma2 = 0.001f64.powi(2);
        assert_relative_eq!(
            objective.log_like(&free),
            -f64::ln(TAU * sigma2),
            epsilon = 1e-9
        );
        assert_eq!(grid.calls.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn prior_transform_in_free_order() {
        let star = star();
        let tables = tables();
        let overrides = parse_prior_spec(
            "teff uniform 4000,6000\nlogg fixed 4.5\nz uniform -1,1\ndist uniform 5,15\n\
             rad uniform 0.5,1.5\ninflation uniform 0,1\n",
        )
        .unwrap();
        let setup = PriorBuilder::new(&star, FitMode::Physical, &tables)
            .build(Some(&overrides))
            .unwrap();
        let grid = FlatGrid {
            calls: AtomicUsize::new(0),
        };
        let objective = SedObjective::new(&star, &grid, &setup).unwrap();
        assert_eq!(objective.ndim(), 5);

        let u = [0.5, 0.25, 0.0, 1.0, 0.5];
        let free = objective.dynesty_prior_transform(&u);
        assert_eq!(free, vec![5000.0, -0.5, 5.0, 1.5, 0.5]);

        let mut cube = u.to_vec();
        cube.extend([9.0, 9.0]);
        objective.multinest_prior_transform(&mut cube, 5, 7);
        assert_eq!(&cube[..5], &free[..]);
        // derived-parameter slots beyond ndim are left alone
        assert_eq!(&cube[5..], &[9.0, 9.0]);
        assert_eq!(
            objective.multinest_log_like(&cube, 5, 7),
            objective.dynesty_log_like(&free)
        );
    }

    #[test]
    fn ln_posterior_outside_support() {
        let star = star();
        let tables = tables();
        let overrides = parse_prior_spec("teff uniform 4000,6000\n").unwrap();
        let setup = PriorBuilder::new(&star, FitMode::Normalized, &tables)
            .build(Some(&overrides))
            .unwrap();
        let grid = FlatGrid {
            calls: AtomicUsize::new(0),
        };
        let objective = SedObjective::new(&star, &grid, &setup).unwrap();
        let free = [7000.0, 4.5, 0.0, 1e-6, 0.0];
        assert_eq!(objective.ln_posterior(&free), f64::NEG_INFINITY);
        assert_eq!(grid.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn objective_is_shareable_between_threads() {
        let star = star();
        let tables = tables();
        let setup = PriorBuilder::new(&star, FitMode::Physical, &tables)
            .build(None)
            .unwrap();
        let grid = FlatGrid {
            calls: AtomicUsize::new(0),
        };
        let objective = SedObjective::new(&star, &grid, &setup).unwrap();
        let free = [5000.0, 4.5, 0.0, 10.0, 1.0, 0.1];
        let expected = objective.log_like(&free);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| assert_eq!(objective.log_like(&free), expected));
            }
        });
    }
}
