//! Seams of the ordering layer
//!
//! `OrderingApi` is the remote authority that owns the real order.
//! `DragCapability` is what a UI toolkit's drag-and-drop adapter talks to.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::controller::ReconcileOutcome;
use crate::drag::{DragError, DragFeedback};
use questboard_api::{ApiError, ContainerId, MoveTarget, OrderableItem, Quest, ReorderRequest};

pub type Result<T> = std::result::Result<T, ApiError>;

/// Remote authority for the order of a container's items.
#[async_trait]
pub trait OrderingApi<T>: Send + Sync
where
    T: OrderableItem,
{
    /// Full ordered set of items of a container, with group and position.
    async fn fetch_list(&self, container: &ContainerId) -> Result<Vec<T>>;

    /// Persist a new order. Fails with a transport- or validation-level error
    /// (e.g. an unknown item id).
    async fn apply_reorder(
        &self,
        container: &ContainerId,
        request: &ReorderRequest<T::Group>,
    ) -> Result<()>;
}

/// Quest lists additionally regenerate recurring quests.
#[async_trait]
pub trait QuestApi: OrderingApi<Quest> {
    /// Create a fresh instance of a recurring quest on `date`, appended to
    /// that day's list.
    async fn spawn_recurring(&self, template: &Quest, date: NaiveDate) -> Result<Quest>;
}

/// Drag-and-drop callbacks, independent of any UI toolkit.
///
/// Drag-over never mutates state; only a drop on a valid target does.
#[async_trait]
pub trait DragCapability<G>: Send + Sync
where
    G: Send + Sync + 'static,
{
    fn on_drag_start(&self, id: &str) -> std::result::Result<(), DragError>;

    fn on_drag_over(&self, target: &MoveTarget<G>) -> DragFeedback;

    /// `None` means the item was released outside any drop target.
    async fn on_drop(&self, target: Option<MoveTarget<G>>) -> ReconcileOutcome;

    fn on_drag_cancel(&self);
}
