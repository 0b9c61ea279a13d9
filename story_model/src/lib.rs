//! # Story Model
//!
//! The "story bible" crate - node metadata, the reader's recorded journey, and the
//! declarative rule vocabulary (conditions and text transformations).
//! This crate is the single source of truth for narrative state and does not contain
//! any adaptive logic.

pub mod error;
pub mod nodes;
pub mod reader_path;
pub mod registry;
pub mod rules;

pub use error::*;
pub use nodes::*;
pub use reader_path::*;
pub use registry::*;
pub use rules::*;
