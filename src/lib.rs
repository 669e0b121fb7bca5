pub mod capability;
pub mod cli;
pub mod compare;
pub mod config;
pub mod context;
pub mod index;
pub mod metadata;
mod metrics;
mod server;
pub mod vector;

pub use compare::{ComparisonOrchestrator, ComparisonResult, CompareRequest, SyntheticImage, Track};
pub use config::Opts;
pub use context::RetrievalContext;
pub use index::{Match, SimilarityIndex};
