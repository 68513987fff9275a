//! Reorder requests sent to the remote authority.

use serde::{Deserialize, Serialize};

/// Where a dragged item should land.
///
/// `index` is the zero-based slot within `group` after the move. `None`
/// appends to the end of the group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveTarget<G> {
    pub group: G,
    pub index: Option<usize>,
}

impl<G> MoveTarget<G> {
    pub fn at(group: G, index: usize) -> Self {
        Self {
            group,
            index: Some(index),
        }
    }

    pub fn append(group: G) -> Self {
        Self { group, index: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionEntry {
    pub id: String,
    pub position: i64,
}

/// Transient value object describing a new order.
///
/// `Positions` carries the complete renumbering of the group an item was
/// reordered within. `MoveToGroup` moves one item into another group; `index`
/// is its zero-based slot there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReorderRequest<G> {
    Positions { entries: Vec<PositionEntry> },
    MoveToGroup { id: String, group: G, index: usize },
}

impl<G> ReorderRequest<G> {
    pub fn position_of(&self, id: &str) -> Option<i64> {
        match self {
            ReorderRequest::Positions { entries } => entries
                .iter()
                .find(|entry| entry.id == id)
                .map(|entry| entry.position),
            ReorderRequest::MoveToGroup { .. } => None,
        }
    }

    pub fn is_cross_group(&self) -> bool {
        matches!(self, ReorderRequest::MoveToGroup { .. })
    }

    /// Ids of all items the request touches.
    pub fn item_ids(&self) -> Vec<&str> {
        match self {
            ReorderRequest::Positions { entries } => {
                entries.iter().map(|entry| entry.id.as_str()).collect()
            }
            ReorderRequest::MoveToGroup { id, .. } => vec![id.as_str()],
        }
    }
}
