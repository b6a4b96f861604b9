pub mod batch;
pub mod device;
pub mod model;
pub mod pool;
pub mod provider;
pub mod tokenize;

pub use batch::{pack, BatchLimits, SubBatch};
pub use pool::masked_mean_l2;
pub use provider::{create_provider, EmbedProvider, ProviderKind};
pub use tokenize::{EstimatorKind, HeuristicEstimator, TiktokenEstimator, TokenEstimator, PLACEHOLDER};
