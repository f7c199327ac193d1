pub mod cache;
pub mod config;
pub mod engine;
pub mod quality;
pub mod scorer;


pub use cache::{MemoryCache, SqliteCache};
pub use config::ResolverConfig;
pub use engine::{CascadeMode, EngineConfig, Origin, Resolution, ResolutionEngine};
pub use quality::{QualityGate, QualityThresholds};
pub use scorer::{FScorer, ScoreReport};
