use thiserror::Error;

use crate::nodes::NodeId;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("temporal value {0} is outside 1..=10")]
    TemporalValueOutOfRange(u8),

    #[error("endpoint orientation must not be empty")]
    EmptyOrientation,
}
