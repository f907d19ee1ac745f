use crate::config::FitterConfig;
use crate::error::{ConfigError, FitError};
use crate::objective::{ModelGrid, SedObjective};
use crate::prior::{LoggEstimator, PriorBuilder, PriorSetup, PriorTables, read_prior_file};
use crate::result::{FitResult, Posterior, Provenance, summarize};
use crate::sampler::{Backend, run_sampler};
use crate::star::Star;

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Prepared fitting run: priors are built and the output directory exists
#[derive(Clone, Debug, PartialEq)]
pub struct FitSetup {
    pub setup: PriorSetup,
    pub out_folder: PathBuf,
}

impl FitSetup {
    pub fn ndim(&self) -> usize {
        self.setup.ndim()
    }
}

/// Output of a finished fit
#[derive(Clone, Debug, PartialEq)]
pub struct FitOutput {
    pub result: FitResult,
    pub best_fit_path: PathBuf,
    pub record_path: PathBuf,
}

/// Bayesian SED fitter of a single star
///
/// ```ignore
/// let config = FitterConfig::from_file("fit.toml")?;
/// let tables = PriorTables::load("prior_tables")?;
/// let fitter = Fitter::new(config, &star, &tables)?;
/// let setup = fitter.initialize()?;
/// let output = fitter.fit(&setup, &grid, Backend::Dynesty(&mut sampler))?;
/// ```
pub struct Fitter<'a> {
    config: FitterConfig,
    star: &'a Star,
    tables: &'a PriorTables,
    logg_estimator: Option<&'a dyn LoggEstimator>,
}

impl<'a> Fitter<'a> {
    pub fn new(
        config: FitterConfig,
        star: &'a Star,
        tables: &'a PriorTables,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            star,
            tables,
            logg_estimator: None,
        })
    }

    /// Isochrone estimator used when [FitterConfig::estimate_logg] is set
    pub fn with_logg_estimator(mut self, estimator: &'a dyn LoggEstimator) -> Self {
        self.logg_estimator = Some(estimator);
        self
    }

    pub fn config(&self) -> &FitterConfig {
        &self.config
    }

    pub fn star(&self) -> &Star {
        self.star
    }

    /// Create the output directory and build the priors
    pub fn initialize(&self) -> Result<FitSetup, FitError> {
        let out_folder = self.config.out_folder_for(self.star);
        std::fs::create_dir_all(&out_folder)?;

        let mut builder = PriorBuilder::new(self.star, self.config.mode(), self.tables);
        if self.config.estimate_logg {
            let estimator = self.logg_estimator.ok_or_else(|| {
                ConfigError::invalid(
                    "estimate_logg",
                    "accompanied by a log g estimator",
                    true,
                )
            })?;
            builder = builder.with_logg_estimator(estimator);
        } else if self.logg_estimator.is_some() {
            warn!("log g estimator is given, but estimate_logg is off");
        }

        let overrides = match &self.config.prior_file {
            Some(path) => {
                info!(path = %path.display(), "reading prior overrides");
                Some(read_prior_file(path)?)
            }
            None => None,
        };
        let setup = builder.build(overrides.as_deref())?;
        let free: Vec<_> = setup.coordination.free_parameters().collect();
        info!(
            star = %self.star.name,
            mode = ?self.config.mode(),
            ndim = setup.ndim(),
            ?free,
            "fitter initialized"
        );
        Ok(FitSetup { setup, out_folder })
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Sample the posterior, summarize it and write the result files
    pub fn fit<G>(
        &self,
        setup: &FitSetup,
        grid: &G,
        backend: Backend<'_>,
    ) -> Result<FitOutput, FitError>
    where
        G: ModelGrid + ?Sized,
    {
        let start = Instant::now();
        let objective = SedObjective::new(self.star, grid, &setup.setup)?;
        let raw = run_sampler(
            &self.config.engine,
            &objective,
            backend,
            &setup.out_folder,
            self.config.verbose,
        )?;
        let posterior = Posterior::from_raw(&raw, &mut self.rng())?;
        let provenance = Provenance {
            engine: self.config.engine.name(),
            model_grid: self.config.grid,
        };
        let result = summarize(&posterior, &objective, self.star, provenance)?;
        let (best_fit_path, record_path) = result.write(&setup.out_folder)?;

        let elapsed = start.elapsed();
        info!(
            star = %self.star.name,
            lnz = posterior.lnz,
            lnzerr = posterior.lnzerr,
            nsamples = posterior.nsamples(),
            elapsed_seconds = elapsed.as_secs_f64(),
            "fit finished"
        );
        log_elapsed(elapsed.as_secs_f64(), &setup.out_folder);
        Ok(FitOutput {
            result,
            best_fit_path,
            record_path,
        })
    }

    /// [Fitter::initialize] followed by [Fitter::fit]
    pub fn run<G>(&self, grid: &G, backend: Backend<'_>) -> Result<FitOutput, FitError>
    where
        G: ModelGrid + ?Sized,
    {
        let setup = self.initialize()?;
        self.fit(&setup, grid, backend)
    }
}

fn log_elapsed(seconds: f64, out_folder: &Path) {
    let hours = (seconds / 3600.0).floor();
    let minutes = ((seconds - 3600.0 * hours) / 60.0).floor();
    let seconds = seconds - 3600.0 * hours - 60.0 * minutes;
    info!(
        "fitting took {hours:.0}h {minutes:.0}m {seconds:.2}s, results are in {}",
        out_folder.display()
    );
}
