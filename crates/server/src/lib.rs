//! Server crate for the game recommendation engine.
//!
//! This crate contains the hybrid orchestrator the presentation layer
//! calls, the blending algorithm behind its `hybrid` mode and the engine
//! configuration shared with the offline tooling.

pub mod blend;
pub mod config;
pub mod mode;
pub mod orchestrator;

pub use blend::{BlendPlan, blend_pools};
pub use config::{AppConfig, BlendConfig, CliConfig, EngineConfig, FileConfig};
pub use mode::{RecommendationMode, UnknownMode};
pub use orchestrator::HybridOrchestrator;
