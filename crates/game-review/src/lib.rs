//! Game review pipeline.
//!
//! An [`EngineSession`] drives a UCI engine, the [`GameAnalyzer`] evaluates
//! every position of a game through it, and the [`MoveClassifier`] turns
//! consecutive evaluation pairs into one [`Classification`] per half-move.
//! [`ReviewContext`] bundles those with the loaded game and a cache.

pub mod analyzer;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluation;
pub mod protocol;
pub mod session;
pub mod summary;

pub use analyzer::GameAnalyzer;
pub use cache::{CacheKey, ClassificationStore, FileCache, NoCache};
pub use classifier::{Classification, GamePhase, MoveClassifier, Tag, Tier};
pub use config::ReviewConfig;
pub use context::ReviewContext;
pub use error::{CacheError, ConfigError, ReviewError, SessionError};
pub use evaluation::{EvalSource, EvaluationResult, NormalizedEvaluation};
pub use protocol::SearchUpdate;
pub use session::{EngineSession, PositionEvaluator, SessionOptions, SessionState};
pub use summary::{PlayerSummary, ReviewSummary};
