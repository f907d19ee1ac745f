pub use crate::objective::ModelGrid;
pub use crate::prior::{LoggEstimator, PriorDistributionTrait};
pub use crate::sampler::{DynestySampler, MultiNestSampler};
