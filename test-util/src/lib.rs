pub use grid::{PowerLawGrid, TRUE_PHYSICAL_THETA, synthetic_star};
pub use samplers::{FailingSampler, PriorImportanceSampler, ResamplingMultiNest, log_sum_exp};
pub use tables::toy_prior_tables;

mod grid;
mod samplers;
mod tables;
