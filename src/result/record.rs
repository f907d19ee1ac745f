use crate::config::ModelGridName;
use crate::error::FitError;
use crate::parameters::Parameter;
use crate::result::stats::CredibleInterval;
use crate::star::Star;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Key of the per-sample log-likelihood in [ResultRecord::posterior_samples]
pub const LOGLIKE_KEY: &str = "loglike";

/// Key of the best-fit log-likelihood in [ResultRecord::best_fit]
pub const LIKELIHOOD_KEY: &str = "likelihood";

pub const BEST_FIT_FILE: &str = "best_fit.dat";

/// Persistent record of a fit
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ResultRecord {
    #[serde(rename = "lnZ")]
    pub lnz: f64,
    #[serde(rename = "lnZerr")]
    pub lnzerr: f64,
    /// Samples of every canonical parameter, fixed ones repeat their value, plus [LOGLIKE_KEY]
    pub posterior_samples: BTreeMap<String, Vec<f64>>,
    pub fixed: Vec<f64>,
    /// 1 for fixed, 0 for free
    pub coordinator: Vec<u8>,
    /// Posterior medians and fixed values, plus [LIKELIHOOD_KEY]
    pub best_fit: BTreeMap<String, f64>,
    pub star: Star,
    pub engine: String,
    pub norm: bool,
    pub model_grid: ModelGridName,
}

impl ResultRecord {
    /// `<engine>_out.json`
    pub fn file_name(&self) -> String {
        format!("{}_out.json", self.engine)
    }

    pub fn write_json(&self, path: &Path) -> Result<(), FitError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> Result<Self, FitError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

/// Row of the best-fit table
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub enum ParameterSummary {
    Free {
        parameter: Parameter,
        interval: CredibleInterval,
    },
    Fixed {
        parameter: Parameter,
        value: f64,
    },
}

impl ParameterSummary {
    pub fn parameter(&self) -> Parameter {
        match self {
            Self::Free { parameter, .. } | Self::Fixed { parameter, .. } => *parameter,
        }
    }

    /// Median of a free parameter or value of a fixed one
    pub fn best_fit(&self) -> f64 {
        match self {
            Self::Free { interval, .. } => interval.median,
            Self::Fixed { value, .. } => *value,
        }
    }
}

/// Tab-separated best-fit table with 1-sigma bounds, fixed parameters are marked `FIXED`
pub fn format_best_fit(summary: &[ParameterSummary]) -> String {
    let mut table = String::from("Parameter\tmedian\tupper\tlower\n");
    for row in summary {
        // writing into a String never fails
        let _ = match row {
            ParameterSummary::Free {
                parameter,
                interval,
            } => writeln!(
                table,
                "{parameter}\t{:.4}\t{:.4}\t{:.4}",
                interval.median, interval.upper, interval.lower
            ),
            ParameterSummary::Fixed { parameter, value } => {
                writeln!(table, "{parameter}\t{value:.4}\tFIXED")
            }
        };
    }
    table
}

/// Everything a finished fit produces
#[derive(Clone, Debug, PartialEq)]
pub struct FitResult {
    pub record: ResultRecord,
    pub summary: Vec<ParameterSummary>,
}

impl FitResult {
    /// Write `best_fit.dat` and `<engine>_out.json` into `out_folder`, returns their paths
    pub fn write(&self, out_folder: &Path) -> Result<(PathBuf, PathBuf), FitError> {
        std::fs::create_dir_all(out_folder)?;
        let best_fit_path = out_folder.join(BEST_FIT_FILE);
        std::fs::write(&best_fit_path, format_best_fit(&self.summary))?;
        let record_path = out_folder.join(self.record.file_name());
        self.record.write_json(&record_path)?;
        Ok((best_fit_path, record_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_fit_table() {
        let summary = [
            ParameterSummary::Free {
                parameter: Parameter::Teff,
                interval: CredibleInterval {
                    median: 5777.123456,
                    lower: 5700.0,
                    upper: 5850.55556,
                },
            },
            ParameterSummary::Fixed {
                parameter: Parameter::Av,
                value: 0.0,
            },
        ];
        assert_eq!(
            format_best_fit(&summary),
            "Parameter\tmedian\tupper\tlower\nteff\t5777.1235\t5850.5556\t5700.0000\nAv\t0.0000\tFIXED\n"
        );
        assert_eq!(summary[0].best_fit(), 5777.123456);
        assert_eq!(summary[1].parameter(), Parameter::Av);
    }
}
