//! # Adaptive Core (Palimpsest)
//!
//! The adaptive content pipeline. This crate reads the `story_model` snapshot of a
//! reader's journey, derives behavioural signals from it, and mutates node text
//! accordingly.
//!
//! ## Core Components
//!
//! - **analysis**: Path pattern analyzer - reading patterns, engagement, fingerprint
//! - **conditions**: Memoized evaluator for declarative condition trees
//! - **bleed**: Character bleed - perspective-change mutations
//! - **attractors**: Attractor engagement system - theme groups and derived rules
//! - **transform**: Priority resolver and transformation applier
//! - **variants**: Multi-variant source text parsing and selection
//! - **engine**: The `AdaptiveEngine` facade tying the stages together
//!
//! ## Design Philosophy
//!
//! - **Snapshot-Driven**: Every computation runs over an immutable path/registry snapshot
//! - **Explicit Services**: Caches live on service objects owned by the host, never in globals
//! - **Fail Soft**: A bad rule or transformation leaves text untouched instead of blanking it

pub mod analysis;
pub mod attractors;
pub mod bleed;
pub mod cache;
pub mod conditions;
pub mod config;
pub mod engine;
pub mod error;
pub mod transform;
pub mod variants;

pub use analysis::*;
pub use attractors::*;
pub use bleed::*;
pub use conditions::*;
pub use config::*;
pub use engine::*;
pub use error::*;
pub use transform::*;
pub use variants::*;
