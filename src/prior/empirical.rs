use crate::error::{FitError, PriorError};
use crate::prior::distribution::PriorDistributionTrait;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prior tabulated by its percent-point function
///
/// `values[i]` is the quantile of level `i / (n - 1)`, the CDF is linear between the nodes, so the
/// density is piecewise constant. Values must be strictly increasing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(into = "Vec<f64>", try_from = "Vec<f64>")]
pub struct EmpiricalPrior {
    values: Vec<f64>,
}

impl EmpiricalPrior {
    pub fn new(values: Vec<f64>) -> Result<Self, PriorError> {
        if values.len() < 2 {
            return Err(PriorError::InvalidTable("at least two quantiles are required"));
        }
        if values.iter().any(|x| !x.is_finite()) {
            return Err(PriorError::InvalidTable("quantiles must be finite"));
        }
        if !values.windows(2).all(|w| w[0] < w[1]) {
            return Err(PriorError::InvalidTable(
                "quantiles must be strictly increasing",
            ));
        }
        Ok(Self { values })
    }

    /// Parse whitespace-separated quantile values, `#` starts a comment
    pub fn from_text(text: &str) -> Result<Self, PriorError> {
        let values = text
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default())
            .flat_map(str::split_whitespace)
            .map(|token| {
                token
                    .parse::<f64>()
                    .map_err(|_| PriorError::BadOperand(token.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(values)
    }

    pub fn minimum(&self) -> f64 {
        self.values[0]
    }

    pub fn maximum(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    fn nsegments(&self) -> usize {
        self.values.len() - 1
    }
}

impl PriorDistributionTrait for EmpiricalPrior {
    fn ppf(&self, u: f64) -> f64 {
        let h = u.clamp(0.0, 1.0) * self.nsegments() as f64;
        let h_floor = h.floor();
        #[allow(clippy::cast_sign_loss)]
        let i = h_floor as usize;
        if i >= self.nsegments() {
            self.maximum()
        } else {
            self.values[i] + (h - h_floor) * (self.values[i + 1] - self.values[i])
        }
    }

    fn ln_pdf(&self, x: f64) -> f64 {
        if !(self.minimum()..=self.maximum()).contains(&x) {
            return f64::NEG_INFINITY;
        }
        let j = self
            .values
            .partition_point(|&v| v <= x)
            .clamp(1, self.nsegments());
        let width = self.values[j] - self.values[j - 1];
        -f64::ln(self.nsegments() as f64 * width)
    }
}

impl From<EmpiricalPrior> for Vec<f64> {
    fn from(f: EmpiricalPrior) -> Self {
        f.values
    }
}

impl TryFrom<Vec<f64>> for EmpiricalPrior {
    type Error = PriorError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

/// Empirical population priors used when a star lacks the data for a tailored prior
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PriorTables {
    pub teff: EmpiricalPrior,
    pub logg: EmpiricalPrior,
}

impl PriorTables {
    pub const TEFF_FILE: &'static str = "teff_ppf.dat";
    pub const LOGG_FILE: &'static str = "logg_ppf.dat";

    /// Load [PriorTables::TEFF_FILE] and [PriorTables::LOGG_FILE] from `dir`
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, FitError> {
        let dir = dir.as_ref();
        let read = |name: &str| -> Result<EmpiricalPrior, FitError> {
            let text = std::fs::read_to_string(dir.join(name))?;
            Ok(EmpiricalPrior::from_text(&text)?)
        };
        Ok(Self {
            teff: read(Self::TEFF_FILE)?,
            logg: read(Self::LOGG_FILE)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ppf_interpolates_nodes() {
        let prior = EmpiricalPrior::new(vec![3000.0, 4000.0, 6000.0]).unwrap();
        assert_eq!(prior.ppf(0.0), 3000.0);
        assert_eq!(prior.ppf(0.5), 4000.0);
        assert_eq!(prior.ppf(1.0), 6000.0);
        assert_relative_eq!(prior.ppf(0.25), 3500.0);
        assert_relative_eq!(prior.ppf(0.75), 5000.0);
    }

    #[test]
    fn density_is_inverse_segment_width() {
        let prior = EmpiricalPrior::new(vec![3000.0, 4000.0, 6000.0]).unwrap();
        assert_relative_eq!(prior.ln_pdf(3500.0), -f64::ln(2000.0));
        assert_relative_eq!(prior.ln_pdf(5000.0), -f64::ln(4000.0));
        assert_relative_eq!(prior.ln_pdf(6000.0), -f64::ln(4000.0));
        assert_eq!(prior.ln_pdf(2999.0), f64::NEG_INFINITY);
        assert_eq!(prior.ln_pdf(f64::NAN), f64::NEG_INFINITY);
    }

    #[test]
    fn from_text_with_comments() {
        let text = "# logg quantiles\n3.5 4.0\n4.3  # median-ish\n\n4.6 5.0\n";
        let prior = EmpiricalPrior::from_text(text).unwrap();
        assert_eq!(Vec::from(prior), vec![3.5, 4.0, 4.3, 4.6, 5.0]);
    }

    #[test]
    fn rejects_bad_tables() {
        assert!(EmpiricalPrior::new(vec![1.0]).is_err());
        assert!(EmpiricalPrior::new(vec![1.0, 1.0]).is_err());
        assert!(EmpiricalPrior::new(vec![2.0, 1.0]).is_err());
        assert_eq!(
            EmpiricalPrior::from_text("1.0 two"),
            Err(PriorError::BadOperand("two".into()))
        );
    }

    #[test]
    fn load_tables() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PriorTables::TEFF_FILE), "3000 5000 7000\n").unwrap();
        std::fs::write(dir.path().join(PriorTables::LOGG_FILE), "3.0 4.5 5.0\n").unwrap();
        let tables = PriorTables::load(dir.path()).unwrap();
        assert_eq!(tables.teff.ppf(0.5), 5000.0);
        assert_eq!(tables.logg.maximum(), 5.0);
    }
}
