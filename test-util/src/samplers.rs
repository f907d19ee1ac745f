use ndarray::{Array1, Array2};
use rand::prelude::*;
use sed_fit::result::resample_equal;
use sed_fit::sampler::{DynestyProblem, DynestyRun, MultiNestProblem, MultiNestRun};
use sed_fit::{DynestySampler, MultiNestSampler, SamplerError, WorkerPool};
use std::fmt::Write as _;
use std::path::PathBuf;

pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|&x| f64::exp(x - max)).sum::<f64>().ln()
}

/// Evidence error of prior importance sampling from the spread of the weights
fn evidence_error(logl: &[f64], logz_total: f64) -> f64 {
    let n = logl.len() as f64;
    let second_moment = logl
        .iter()
        .map(|&l| f64::exp(2.0 * (l - logz_total)))
        .sum::<f64>()
        / n;
    ((second_moment - 1.0).max(0.0) / n).sqrt()
}

/// Draws unit-cube points, maps them through the prior and weights them by the likelihood
struct PriorDraws {
    points: Vec<Vec<f64>>,
    logl: Vec<f64>,
    logwt: Vec<f64>,
    logz: f64,
    logzerr: f64,
}

impl PriorDraws {
    fn new(points: Vec<Vec<f64>>, logl: Vec<f64>) -> Self {
        let ln_n = (logl.len() as f64).ln();
        let logwt: Vec<f64> = logl.iter().map(|&l| l - ln_n).collect();
        let logz = log_sum_exp(&logwt);
        let logzerr = evidence_error(&logl, logz);
        Self {
            points,
            logl,
            logwt,
            logz,
            logzerr,
        }
    }

    fn weights(&self) -> Array1<f64> {
        self.logwt.iter().map(|&lw| f64::exp(lw - self.logz)).collect()
    }

    fn samples(&self, ndim: usize) -> Array2<f64> {
        Array2::from_shape_fn((self.points.len(), ndim), |(i, j)| self.points[i][j])
    }
}

/// Dynesty stand-in: importance sampling from the prior
///
/// Returns importance-weighted points in dynesty's output layout. Records what the driver passed
/// in, so tests can inspect the run setup.
#[derive(Debug)]
pub struct PriorImportanceSampler {
    pub npoints: usize,
    rng: StdRng,
    pub last_nlive: Option<usize>,
    pub last_ndim: Option<usize>,
    pub last_pool_threads: Option<usize>,
    pub last_queue_size: Option<usize>,
    pub last_verbose: Option<bool>,
}

impl PriorImportanceSampler {
    pub fn new(npoints: usize, seed: u64) -> Self {
        Self {
            npoints,
            rng: StdRng::seed_from_u64(seed),
            last_nlive: None,
            last_ndim: None,
            last_pool_threads: None,
            last_queue_size: None,
            last_verbose: None,
        }
    }
}

impl DynestySampler for PriorImportanceSampler {
    fn run_nested(
        &mut self,
        problem: &DynestyProblem<'_>,
        pool: Option<&WorkerPool>,
    ) -> Result<DynestyRun, SamplerError> {
        self.last_nlive = Some(problem.nlive);
        self.last_ndim = Some(problem.ndim);
        self.last_verbose = Some(problem.verbose);
        self.last_pool_threads = pool.map(WorkerPool::threads);
        self.last_queue_size = pool.map(WorkerPool::queue_size);

        let points: Vec<Vec<f64>> = (0..self.npoints)
            .map(|_| {
                let u: Vec<f64> = (0..problem.ndim).map(|_| self.rng.random()).collect();
                (problem.prior_transform)(u.as_slice())
            })
            .collect();
        let logl = match pool {
            Some(pool) => pool.map(&points, problem.loglike),
            None => points.iter().map(|p| (problem.loglike)(p.as_slice())).collect(),
        };
        let draws = PriorDraws::new(points, logl);

        let mut logz = Vec::with_capacity(draws.logwt.len());
        let mut running = f64::NEG_INFINITY;
        for &lw in &draws.logwt {
            running = log_sum_exp(&[running, lw]);
            logz.push(running);
        }
        // the running sum may differ from the batch sum in the last bits
        if let Some(last) = logz.last_mut() {
            *last = draws.logz;
        }
        let logzerr = vec![draws.logzerr; logz.len()];
        Ok(DynestyRun {
            samples: draws.samples(problem.ndim),
            logwt: Array1::from(draws.logwt.clone()),
            logz: Array1::from(logz),
            logzerr: Array1::from(logzerr),
        })
    }
}

/// MultiNest stand-in: prior importance sampling followed by equal-weight resampling
///
/// Writes `post_equal_weights.dat` and `stats.dat` under the requested basename, exercising the
/// callbacks with a parameter buffer longer than `ndim`.
#[derive(Debug)]
pub struct ResamplingMultiNest {
    pub npoints: usize,
    rng: StdRng,
    pub last_basename: Option<PathBuf>,
}

impl ResamplingMultiNest {
    pub fn new(npoints: usize, seed: u64) -> Self {
        Self {
            npoints,
            rng: StdRng::seed_from_u64(seed),
            last_basename: None,
        }
    }
}

impl MultiNestSampler for ResamplingMultiNest {
    fn run(&mut self, problem: &MultiNestProblem<'_>) -> Result<(), SamplerError> {
        self.last_basename = Some(problem.outputfiles_basename.clone());
        let (ndim, n_params) = (problem.ndim, problem.n_params);

        let mut points = Vec::with_capacity(self.npoints);
        let mut logl = Vec::with_capacity(self.npoints);
        for _ in 0..self.npoints {
            let mut cube: Vec<f64> = (0..ndim).map(|_| self.rng.random()).collect();
            cube.push(f64::NAN);
            (problem.prior_transform)(cube.as_mut_slice(), ndim, n_params);
            logl.push((problem.loglike)(cube.as_slice(), ndim, n_params));
            cube.truncate(ndim);
            points.push(cube);
        }
        let draws = PriorDraws::new(points, logl);
        let mut with_loglike = draws.samples(ndim + 1);
        for (i, &l) in draws.logl.iter().enumerate() {
            with_loglike[[i, ndim]] = l;
        }
        let weights = draws.weights();
        let equal = resample_equal(with_loglike.view(), weights.view(), &mut self.rng)?;

        let mut table = String::new();
        for row in equal.rows() {
            for x in row {
                let _ = write!(table, " {x:.17E}");
            }
            table.push('\n');
        }
        let run = MultiNestRun::new(problem.outputfiles_basename.clone(), ndim);
        std::fs::write(run.post_equal_weights_path(), table)?;
        std::fs::write(
            run.stats_path(),
            format!(
                " Nested Sampling Global Log-Evidence           :  {:.17E}  +/-  {:.17E}\n",
                draws.logz, draws.logzerr
            ),
        )?;
        Ok(())
    }
}

/// Backend failing after recording whether the driver gave it a worker pool
#[derive(Debug, Default)]
pub struct FailingSampler {
    pub pool_threads: Option<usize>,
    pub calls: usize,
}

impl DynestySampler for FailingSampler {
    fn run_nested(
        &mut self,
        _problem: &DynestyProblem<'_>,
        pool: Option<&WorkerPool>,
    ) -> Result<DynestyRun, SamplerError> {
        self.calls += 1;
        self.pool_threads = pool.map(WorkerPool::threads);
        Err(SamplerError::Backend("sampler crashed".into()))
    }
}

impl MultiNestSampler for FailingSampler {
    fn run(&mut self, _problem: &MultiNestProblem<'_>) -> Result<(), SamplerError> {
        self.calls += 1;
        Err(SamplerError::Backend("sampler crashed".into()))
    }
}
