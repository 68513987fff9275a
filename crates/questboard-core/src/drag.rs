//! Drag session tracking
//!
//! A session exists only between drag start and drop/cancel. Hovering over a
//! candidate target never mutates anything; it only reports whether dropping
//! there would change the order.

use crate::reorder::{group_members, slot_of};
use questboard_api::{MoveTarget, OrderableItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession<G> {
    pub item_id: String,
    pub origin_group: G,
    pub origin_index: usize,
}

/// Visual feedback for a hovered drop target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragFeedback {
    /// Dropping here changes the order.
    Accept,
    /// The item's own slot; dropping here does nothing.
    NoOp,
    /// No drag in progress, or the dragged item is gone.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DragError {
    #[error("A drag is already in progress for item {id}")]
    AlreadyDragging { id: String },

    #[error("Item not in list: {id}")]
    UnknownItem { id: String },

    #[error("No drag in progress")]
    NotDragging,

    #[error("The list is being reloaded")]
    Reloading,
}

/// At most one drag session per list.
#[derive(Debug)]
pub struct DragTracker<G> {
    session: Option<DragSession<G>>,
}

impl<G> Default for DragTracker<G> {
    fn default() -> Self {
        Self { session: None }
    }
}

impl<G: Clone + Eq> DragTracker<G> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&DragSession<G>> {
        self.session.as_ref()
    }

    pub fn start<T>(&mut self, items: &[T], id: &str) -> Result<&DragSession<G>, DragError>
    where
        T: OrderableItem<Group = G>,
    {
        if let Some(active) = &self.session {
            return Err(DragError::AlreadyDragging {
                id: active.item_id.clone(),
            });
        }

        let (origin_group, origin_index) = slot_of(items, id).ok_or_else(|| DragError::UnknownItem {
            id: id.to_string(),
        })?;

        Ok(self.session.insert(DragSession {
            item_id: id.to_string(),
            origin_group,
            origin_index,
        }))
    }

    pub fn over<T>(&self, items: &[T], target: &MoveTarget<G>) -> DragFeedback
    where
        T: OrderableItem<Group = G>,
    {
        let Some(session) = &self.session else {
            return DragFeedback::Reject;
        };
        // Slot is looked up again: the list may have been refreshed mid-drag
        let Some((group, index)) = slot_of(items, &session.item_id) else {
            return DragFeedback::Reject;
        };
        if group != target.group {
            return DragFeedback::Accept;
        }

        let others = group_members(items, &group).count() - 1;
        let slot = target.index.unwrap_or(others).min(others);
        if slot == index {
            DragFeedback::NoOp
        } else {
            DragFeedback::Accept
        }
    }

    /// End the session for a drop.
    pub fn finish(&mut self) -> Result<DragSession<G>, DragError> {
        self.session.take().ok_or(DragError::NotDragging)
    }

    pub fn cancel(&mut self) -> Option<DragSession<G>> {
        self.session.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use questboard_api::Quest;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn quests() -> Vec<Quest> {
        vec![
            Quest::new("a", "Read", day()).at(1),
            Quest::new("b", "Write", day()).at(2),
            Quest::new("c", "Walk", day()).at(3),
        ]
    }

    #[test]
    fn test_start_captures_origin() {
        let mut tracker = DragTracker::new();
        let session = tracker.start(&quests(), "b").unwrap();
        assert_eq!(session.origin_group, day());
        assert_eq!(session.origin_index, 1);
        assert!(tracker.is_active());
    }

    #[test]
    fn test_only_one_session() {
        let items = quests();
        let mut tracker = DragTracker::new();
        tracker.start(&items, "a").unwrap();
        assert_eq!(
            tracker.start(&items, "b").unwrap_err(),
            DragError::AlreadyDragging { id: "a".into() }
        );
    }

    #[test]
    fn test_unknown_item() {
        let mut tracker: DragTracker<NaiveDate> = DragTracker::new();
        assert_eq!(
            tracker.start(&quests(), "nope").unwrap_err(),
            DragError::UnknownItem { id: "nope".into() }
        );
        assert!(!tracker.is_active());
    }

    #[test]
    fn test_over_reports_feedback_without_mutating() {
        let items = quests();
        let mut tracker = DragTracker::new();
        assert_eq!(
            tracker.over(&items, &MoveTarget::at(day(), 0)),
            DragFeedback::Reject
        );

        tracker.start(&items, "b").unwrap();
        assert_eq!(
            tracker.over(&items, &MoveTarget::at(day(), 1)),
            DragFeedback::NoOp
        );
        assert_eq!(
            tracker.over(&items, &MoveTarget::at(day(), 0)),
            DragFeedback::Accept
        );
        assert_eq!(
            tracker.over(&items, &MoveTarget::append(day().succ_opt().unwrap())),
            DragFeedback::Accept
        );
        assert_eq!(tracker.session().unwrap().origin_index, 1);
    }

    #[test]
    fn test_finish_and_cancel_destroy_session() {
        let items = quests();
        let mut tracker = DragTracker::new();
        tracker.start(&items, "c").unwrap();
        assert_eq!(tracker.finish().unwrap().item_id, "c");
        assert_eq!(tracker.finish().unwrap_err(), DragError::NotDragging);

        tracker.start(&items, "a").unwrap();
        assert!(tracker.cancel().is_some());
        assert!(!tracker.is_active());
    }
}
