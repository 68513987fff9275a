//! Optimistic ordering for boards and quest lists
//!
//! This crate provides:
//! - `reorder`: pure list moves that produce the optimistic list and the reorder request
//! - `drag`: drag session tracking
//! - `controller`: `ReorderController`, which applies moves optimistically and rolls back on failure
//! - `traits`: `OrderingApi`/`QuestApi` (the remote authority) and `DragCapability` (the UI seam)
//! - `app_state`: injected UI state (sidebar, search, notifications)
//! - `rollover`: carrying unfinished quests over to a new day
//! - `memory_backend`: in-process authority for tests and offline use

pub mod app_state;
pub mod controller;
pub mod drag;
pub mod memory_backend;
pub mod reorder;
pub mod rollover;
pub mod traits;

pub use app_state::{AppState, Notification, NotificationCenter, NotificationLevel};
pub use controller::{ReconcileOutcome, ReorderController, ReorderPhase};
pub use drag::{DragError, DragFeedback, DragSession, DragTracker};
pub use memory_backend::{MemoryBackend, CallGate};
pub use reorder::MovePlan;
pub use rollover::{plan_rollover, QuestRolloverService, RolloverFailure, RolloverPlan, RolloverReport};
pub use traits::{DragCapability, OrderingApi, QuestApi, Result};

pub use questboard_api::{
    ApiError, Card, CardStatus, ContainerId, MoveTarget, OrderableItem, PositionEntry, Quest,
    Recurrence, ReorderRequest,
};
