use crate::error::PriorError;
use crate::parameters::{FitMode, Parameter};

use serde::{Deserialize, Serialize};

/// Fixed/free status of every canonical parameter
///
/// `coordinator[i]` is `true` when the `i`-th parameter of [FitMode::order] is held fixed at
/// `fixed[i]`, and `false` when it is sampled. Both vectors always have the length of the
/// canonical order. The structure is filled while priors are built and is read-only afterwards.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Coordination {
    mode: FitMode,
    coordinator: Vec<bool>,
    fixed: Vec<f64>,
}

impl Coordination {
    /// All parameters of the mode are free
    pub fn new(mode: FitMode) -> Self {
        Self {
            mode,
            coordinator: vec![false; mode.nparams()],
            fixed: vec![0.0; mode.nparams()],
        }
    }

    pub fn mode(&self) -> FitMode {
        self.mode
    }

    pub fn order(&self) -> &'static [Parameter] {
        self.mode.order()
    }

    /// Hold `parameter` at `value`, an already fixed parameter gets the new value
    pub fn fix(&mut self, parameter: Parameter, value: f64) -> Result<(), PriorError> {
        let idx = self
            .mode
            .index_of(parameter)
            .ok_or(PriorError::NotInMode {
                parameter,
                mode: self.mode,
            })?;
        self.coordinator[idx] = true;
        self.fixed[idx] = value;
        Ok(())
    }

    /// Make `parameter` free again
    pub(crate) fn release(&mut self, parameter: Parameter) {
        if let Some(idx) = self.mode.index_of(parameter) {
            self.coordinator[idx] = false;
            self.fixed[idx] = 0.0;
        }
    }

    pub fn is_fixed(&self, parameter: Parameter) -> bool {
        self.mode
            .index_of(parameter)
            .is_some_and(|idx| self.coordinator[idx])
    }

    pub fn fixed_value(&self, parameter: Parameter) -> Option<f64> {
        let idx = self.mode.index_of(parameter)?;
        self.coordinator[idx].then_some(self.fixed[idx])
    }

    pub fn coordinator(&self) -> &[bool] {
        &self.coordinator
    }

    /// Coordinator as 1 (fixed) / 0 (free) flags
    pub fn coordinator_flags(&self) -> Vec<u8> {
        self.coordinator.iter().map(|&c| u8::from(c)).collect()
    }

    pub fn fixed(&self) -> &[f64] {
        &self.fixed
    }

    /// Number of sampled dimensions, `len(order) - sum(coordinator)`
    pub fn ndim(&self) -> usize {
        self.coordinator.iter().filter(|&&c| !c).count()
    }

    pub fn nparams(&self) -> usize {
        self.coordinator.len()
    }

    /// Free parameters in canonical order, this is the layout of every sampler vector
    pub fn free_parameters(&self) -> impl Iterator<Item = Parameter> + '_ {
        self.order()
            .iter()
            .zip(&self.coordinator)
            .filter(|&(_, &c)| !c)
            .map(|(&p, _)| p)
    }

    /// Expand a free-parameter vector into the full canonical vector `theta`
    ///
    /// Fixed slots receive their fixed values, free slots consume `free` in order. This runs once
    /// per likelihood evaluation, so it writes into a caller-provided buffer.
    ///
    /// # Panics
    /// If `free.len()` differs from [Coordination::ndim] or `theta.len()` differs from the
    /// canonical order length.
    pub fn build_params_into(&self, free: &[f64], theta: &mut [f64]) {
        assert_eq!(free.len(), self.ndim(), "wrong free-parameter vector length");
        assert_eq!(theta.len(), self.nparams(), "wrong parameter vector length");
        let mut free = free.iter();
        for ((x, &is_fixed), &fixed) in theta.iter_mut().zip(&self.coordinator).zip(&self.fixed) {
            *x = if is_fixed {
                fixed
            } else {
                // length is checked above
                *free.next().unwrap_or(&f64::NAN)
            };
        }
    }

    pub fn build_params(&self, free: &[f64]) -> Vec<f64> {
        let mut theta = vec![0.0; self.nparams()];
        self.build_params_into(free, &mut theta);
        theta
    }

    /// Inverse of [Coordination::build_params]: free slots of `theta` in canonical order
    pub fn extract_free(&self, theta: &[f64]) -> Vec<f64> {
        theta
            .iter()
            .zip(&self.coordinator)
            .filter(|&(_, &c)| !c)
            .map(|(&x, _)| x)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::prelude::*;

    fn coordination_from_mask(mode: FitMode, mask: u32, rng: &mut StdRng) -> Coordination {
        let mut coordination = Coordination::new(mode);
        for (i, &p) in mode.order().iter().enumerate() {
            if mask & (1 << i) != 0 {
                coordination.fix(p, rng.random_range(-10.0..10.0)).unwrap();
            }
        }
        coordination
    }

    fn check_every_mask(mode: FitMode) {
        let mut rng = StdRng::seed_from_u64(0);
        for mask in 0..(1u32 << mode.nparams()) {
            let coordination = coordination_from_mask(mode, mask, &mut rng);
            let nfixed = coordination.coordinator().iter().filter(|&&c| c).count();
            assert_eq!(coordination.ndim(), mode.nparams() - nfixed);

            let free: Vec<f64> = (0..coordination.ndim())
                .map(|_| rng.random_range(-100.0..100.0))
                .collect();
            let theta = coordination.build_params(&free);
            assert_eq!(theta.len(), mode.nparams());
            for i in 0..mode.nparams() {
                if coordination.coordinator()[i] {
                    assert_eq!(theta[i], coordination.fixed()[i]);
                }
            }
            assert_eq!(coordination.extract_free(&theta), free);
        }
    }

    #[test]
    fn build_params_physical_every_mask() {
        check_every_mask(FitMode::Physical);
    }

    #[test]
    fn build_params_normalized_every_mask() {
        check_every_mask(FitMode::Normalized);
    }

    #[test]
    fn all_fixed_has_zero_dimensions() {
        let mut coordination = Coordination::new(FitMode::Normalized);
        for &p in FitMode::Normalized.order() {
            coordination.fix(p, 1.0).unwrap();
        }
        assert_eq!(coordination.ndim(), 0);
        assert_eq!(coordination.build_params(&[]), vec![1.0; 6]);
    }

    #[test]
    fn av_fixed_at_zero_expands_six_to_seven() {
        let mut coordination = Coordination::new(FitMode::Physical);
        coordination.fix(Parameter::Av, 0.0).unwrap();
        assert_eq!(coordination.coordinator_flags(), [0, 0, 0, 0, 0, 1, 0]);

        let free = [5777.0, 4.44, 0.01, 10.0, 1.0, 0.1];
        let theta = coordination.build_params(&free);
        assert_eq!(theta, [5777.0, 4.44, 0.01, 10.0, 1.0, 0.0, 0.1]);
        let av_idx = FitMode::Physical.index_of(Parameter::Av).unwrap();
        assert_eq!(theta[av_idx], 0.0);
    }

    #[test]
    fn fix_rejects_parameter_of_other_mode() {
        let mut coordination = Coordination::new(FitMode::Normalized);
        assert_eq!(
            coordination.fix(Parameter::Dist, 10.0),
            Err(PriorError::NotInMode {
                parameter: Parameter::Dist,
                mode: FitMode::Normalized,
            })
        );
        assert_eq!(coordination.ndim(), 6);
    }

    #[test]
    fn free_parameters_skip_fixed() {
        let mut coordination = Coordination::new(FitMode::Normalized);
        coordination.fix(Parameter::Logg, 4.5).unwrap();
        let free: Vec<_> = coordination.free_parameters().collect();
        assert_eq!(
            free,
            [
                Parameter::Teff,
                Parameter::Z,
                Parameter::Norm,
                Parameter::Av,
                Parameter::Inflation
            ]
        );
        assert_eq!(coordination.fixed_value(Parameter::Logg), Some(4.5));
        assert_eq!(coordination.fixed_value(Parameter::Teff), None);
    }

    #[test]
    #[should_panic(expected = "wrong free-parameter vector length")]
    fn build_params_wrong_length() {
        Coordination::new(FitMode::Physical).build_params(&[1.0]);
    }
}
