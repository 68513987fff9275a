//! Optimistic reorder controller
//!
//! The controller owns the displayed order of one container. A drop is
//! applied to the local list immediately and persisted in the background.
//! If the authority rejects it, the list is reloaded from the authority
//! (never restored from a local copy) and the user gets an error
//! notification.
//!
//! Overlapping drops follow a latest-wins rule: every drop bumps a
//! generation counter, only the newest drop decides the outcome, and once
//! the last overlapping write has settled the list is reloaded so it matches
//! whatever order the authority ended up applying.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::drag::{DragError, DragFeedback, DragSession, DragTracker};
use crate::reorder::{group_members, plan_move, sort_items};
use crate::traits::{DragCapability, OrderingApi, Result};
use questboard_api::{ApiError, ContainerId, MoveTarget, OrderableItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderPhase {
    Idle,
    Dragging,
    /// A drop is shown but the authority has not answered yet.
    OptimisticApplied,
    /// Reloading the list from the authority.
    Reconciling,
}

/// How a drop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No drag in progress, released outside a target, the item vanished, or
    /// a rollback started during the drag.
    Cancelled,
    /// Dropped on its own slot; no request was sent.
    Unchanged,
    Confirmed,
    /// A newer drop was issued before this one settled.
    Superseded,
    /// Rejected; the list was reloaded from the authority.
    RolledBack { error: ApiError },
    /// Rejected, and the reload failed too. The list may not match the
    /// authority until the next successful refresh.
    Diverged {
        error: ApiError,
        refetch_error: ApiError,
    },
}

impl ReconcileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::RolledBack { .. } | Self::Diverged { .. })
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Self::RolledBack { error } | Self::Diverged { error, .. } => Some(error),
            _ => None,
        }
    }
}

struct ControllerState<T: OrderableItem> {
    items: Arc<Vec<T>>,
    drag: DragTracker<T::Group>,
    generation: u64,
    in_flight: usize,
    reconciling: usize,
    needs_resync: bool,
    stale: bool,
}

struct Inner<T: OrderableItem, A> {
    api: Arc<A>,
    container: ContainerId,
    app_state: Arc<AppState>,
    state: Mutex<ControllerState<T>>,
    snapshots: watch::Sender<Arc<Vec<T>>>,
}

pub struct ReorderController<T: OrderableItem, A> {
    inner: Arc<Inner<T, A>>,
}

impl<T: OrderableItem, A> Clone for ReorderController<T, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, A> ReorderController<T, A>
where
    T: OrderableItem,
    A: OrderingApi<T>,
{
    /// Starts with an empty list; call [`load`](Self::load) to populate it.
    pub fn new(api: Arc<A>, container: ContainerId, app_state: Arc<AppState>) -> Self {
        let (snapshots, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            inner: Arc::new(Inner {
                api,
                container,
                app_state,
                state: Mutex::new(ControllerState {
                    items: Arc::new(Vec::new()),
                    drag: DragTracker::new(),
                    generation: 0,
                    in_flight: 0,
                    reconciling: 0,
                    needs_resync: false,
                    stale: false,
                }),
                snapshots,
            }),
        }
    }

    pub fn container(&self) -> &ContainerId {
        &self.inner.container
    }

    pub fn items(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.inner.state.lock().items)
    }

    /// Items of one group, in display order.
    pub fn group(&self, group: &T::Group) -> Vec<T> {
        let items = self.items();
        group_members(items.as_slice(), group).cloned().collect()
    }

    /// Stream of list snapshots, starting with the current one.
    pub fn subscribe(&self) -> WatchStream<Arc<Vec<T>>> {
        WatchStream::new(self.inner.snapshots.subscribe())
    }

    pub fn phase(&self) -> ReorderPhase {
        let state = self.inner.state.lock();
        if state.drag.is_active() {
            ReorderPhase::Dragging
        } else if state.reconciling > 0 {
            ReorderPhase::Reconciling
        } else if state.in_flight > 0 {
            ReorderPhase::OptimisticApplied
        } else {
            ReorderPhase::Idle
        }
    }

    /// True after a reload from the authority failed.
    pub fn is_stale(&self) -> bool {
        self.inner.state.lock().stale
    }

    pub fn generation(&self) -> u64 {
        self.inner.state.lock().generation
    }

    /// Fetch the list from the authority.
    ///
    /// If a drop is still being persisted the result is discarded and the
    /// list is reloaded once that drop settles. If a drop was applied and
    /// settled while the fetch was running, the fetch is repeated.
    pub async fn load(&self) -> Result<()> {
        loop {
            let generation = self.generation();
            let mut items = match self.inner.api.fetch_list(&self.inner.container).await {
                Ok(items) => items,
                Err(error) => {
                    self.inner.state.lock().stale = true;
                    warn!(
                        "[ReorderController] Failed to load {}: {}",
                        self.inner.container, error
                    );
                    self.inner
                        .app_state
                        .notifications()
                        .error(format!("Could not load {}: {}", self.inner.container, error));
                    return Err(error);
                }
            };
            sort_items(&mut items);

            let mut state = self.inner.state.lock();
            if state.in_flight > 0 {
                state.needs_resync = true;
                debug!(
                    "[ReorderController] Discarding load of {}: a drop is being saved",
                    self.inner.container
                );
                return Ok(());
            }
            if state.generation != generation {
                debug!(
                    "[ReorderController] Reloading {}: a drop settled meanwhile",
                    self.inner.container
                );
                continue;
            }

            info!(
                "[ReorderController] Loaded {} item(s) for {}",
                items.len(),
                self.inner.container
            );
            state.stale = false;
            self.replace_items(&mut state, items);
            return Ok(());
        }
    }

    /// Reload on user request, e.g. after a failed reconciliation.
    pub async fn refresh(&self) -> Result<()> {
        debug!("[ReorderController] Refreshing {}", self.inner.container);
        self.load().await
    }

    /// Not allowed while a rejected drop is being rolled back; the list on
    /// screen is the order the authority refused.
    pub fn drag_start(&self, id: &str) -> std::result::Result<DragSession<T::Group>, DragError> {
        let mut state = self.inner.state.lock();
        if state.reconciling > 0 {
            debug!(
                "[ReorderController] Drag of {} refused while {} reloads",
                id, self.inner.container
            );
            return Err(DragError::Reloading);
        }
        let items = Arc::clone(&state.items);
        let session = state.drag.start(items.as_slice(), id)?.clone();
        debug!(
            "[ReorderController] Drag started for {} at {:?}[{}]",
            session.item_id, session.origin_group, session.origin_index
        );
        Ok(session)
    }

    pub fn drag_over(&self, target: &MoveTarget<T::Group>) -> DragFeedback {
        let state = self.inner.state.lock();
        state.drag.over(state.items.as_slice(), target)
    }

    /// Returns false if no drag was in progress.
    pub fn cancel_drag(&self) -> bool {
        let cancelled = self.inner.state.lock().drag.cancel();
        if let Some(session) = &cancelled {
            debug!("[ReorderController] Drag cancelled for {}", session.item_id);
        }
        cancelled.is_some()
    }

    /// Drop the dragged item on `target` (`None` = outside any target).
    ///
    /// The new order is visible to subscribers before this awaits the
    /// authority.
    pub async fn drop_on(&self, target: Option<MoveTarget<T::Group>>) -> ReconcileOutcome {
        let (generation, request) = {
            let mut state = self.inner.state.lock();
            let Ok(session) = state.drag.finish() else {
                return ReconcileOutcome::Cancelled;
            };
            let Some(target) = target else {
                debug!(
                    "[ReorderController] {} released outside any target",
                    session.item_id
                );
                return ReconcileOutcome::Cancelled;
            };
            if state.reconciling > 0 {
                debug!(
                    "[ReorderController] Drop of {} discarded: a rollback started during the drag",
                    session.item_id
                );
                return ReconcileOutcome::Cancelled;
            }

            let plan = match plan_move(state.items.as_slice(), &session.item_id, &target) {
                Ok(Some(plan)) => plan,
                Ok(None) => return ReconcileOutcome::Unchanged,
                Err(error) => {
                    warn!(
                        "[ReorderController] Dropped item {} is no longer in the list: {}",
                        session.item_id, error
                    );
                    return ReconcileOutcome::Cancelled;
                }
            };

            if state.in_flight > 0 {
                // The authority may apply overlapping writes in any order
                state.needs_resync = true;
            }
            state.generation += 1;
            state.in_flight += 1;
            // Quests moved to another day leave this list
            let container = &self.inner.container;
            let items = plan
                .items
                .into_iter()
                .filter(|item| &item.container() == container)
                .collect();
            self.replace_items(&mut state, items);
            (state.generation, plan.request)
        };

        debug!(
            "[ReorderController] Sending reorder #{} for {}",
            generation, self.inner.container
        );
        let result = self
            .inner
            .api
            .apply_reorder(&self.inner.container, &request)
            .await;
        self.settle(generation, result).await
    }

    async fn settle(&self, generation: u64, result: Result<()>) -> ReconcileOutcome {
        if let Err(error) = &result {
            warn!(
                "[ReorderController] Reorder #{} for {} failed: {}",
                generation, self.inner.container, error
            );
            self.inner
                .app_state
                .notifications()
                .error(format!("Could not save the new order: {}", error));
        }

        let (latest, resync_at) = {
            let mut state = self.inner.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            let latest = generation == state.generation;
            if result.is_err() {
                state.needs_resync = true;
            }

            let resync = (latest && result.is_err()) || (state.needs_resync && state.in_flight == 0);
            if resync {
                state.reconciling += 1;
                state.needs_resync = false;
            }
            (latest, resync.then_some(state.generation))
        };

        let refetch = match resync_at {
            Some(current) => Some(self.resync(current).await),
            None => None,
        };

        match (latest, result, refetch) {
            (false, _, _) => ReconcileOutcome::Superseded,
            (true, Ok(()), _) => {
                debug!(
                    "[ReorderController] Reorder #{} for {} confirmed",
                    generation, self.inner.container
                );
                ReconcileOutcome::Confirmed
            }
            (true, Err(error), Some(Err(refetch_error))) => ReconcileOutcome::Diverged {
                error,
                refetch_error,
            },
            (true, Err(error), _) => ReconcileOutcome::RolledBack { error },
        }
    }

    /// Replace the list with the authority's order, unless a newer drop was
    /// applied while the fetch was running.
    async fn resync(&self, generation: u64) -> Result<()> {
        let fetched = self.inner.api.fetch_list(&self.inner.container).await;

        let mut state = self.inner.state.lock();
        state.reconciling = state.reconciling.saturating_sub(1);
        let mut items = match fetched {
            Ok(items) => items,
            Err(error) => {
                state.stale = true;
                drop(state);
                warn!(
                    "[ReorderController] Reload of {} failed, list may be out of date: {}",
                    self.inner.container, error
                );
                self.inner.app_state.notifications().warn(format!(
                    "Could not reload {}. Refresh to see the saved order.",
                    self.inner.container
                ));
                return Err(error);
            }
        };

        if state.generation != generation {
            // The newer drop reloads when it settles
            state.needs_resync = true;
            debug!(
                "[ReorderController] Discarding reload of {}: superseded by #{}",
                self.inner.container, state.generation
            );
            return Ok(());
        }

        sort_items(&mut items);
        state.stale = false;
        state.needs_resync = state.in_flight > 0;
        self.replace_items(&mut state, items);
        info!(
            "[ReorderController] Reloaded {} from the authority",
            self.inner.container
        );
        Ok(())
    }

    /// Published while the state lock is held, so subscribers observe
    /// snapshots in the order they were made.
    fn replace_items(&self, state: &mut ControllerState<T>, items: Vec<T>) {
        state.items = Arc::new(items);
        self.inner.snapshots.send_replace(Arc::clone(&state.items));
    }
}

#[async_trait]
impl<T, A> DragCapability<T::Group> for ReorderController<T, A>
where
    T: OrderableItem,
    A: OrderingApi<T> + 'static,
{
    fn on_drag_start(&self, id: &str) -> std::result::Result<(), DragError> {
        self.drag_start(id).map(|_| ())
    }

    fn on_drag_over(&self, target: &MoveTarget<T::Group>) -> DragFeedback {
        self.drag_over(target)
    }

    async fn on_drop(&self, target: Option<MoveTarget<T::Group>>) -> ReconcileOutcome {
        self.drop_on(target).await
    }

    fn on_drag_cancel(&self) {
        self.cancel_drag();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_backend::MemoryBackend;
    use questboard_api::{Card, CardStatus};

    fn controller(cards: Vec<Card>) -> ReorderController<Card, MemoryBackend<Card>> {
        ReorderController::new(
            Arc::new(MemoryBackend::with_items(cards)),
            ContainerId::board("b1"),
            Arc::new(AppState::default()),
        )
    }

    #[tokio::test]
    async fn test_drop_without_drag_is_cancelled() {
        let controller = controller(vec![]);
        assert_eq!(
            controller.drop_on(Some(MoveTarget::at(CardStatus::Todo, 0))).await,
            ReconcileOutcome::Cancelled
        );
        assert_eq!(controller.generation(), 0);
    }

    #[tokio::test]
    async fn test_release_outside_target_is_cancelled() {
        let controller = controller(vec![Card::new("b1", "A", CardStatus::Todo).with_id("a")]);
        controller.load().await.unwrap();
        controller.drag_start("a").unwrap();
        assert_eq!(controller.phase(), ReorderPhase::Dragging);
        assert_eq!(controller.drop_on(None).await, ReconcileOutcome::Cancelled);
        assert_eq!(controller.phase(), ReorderPhase::Idle);
    }

    #[test]
    fn test_outcome_helpers() {
        let error = ApiError::Network {
            message: "offline".into(),
        };
        let outcome = ReconcileOutcome::RolledBack {
            error: error.clone(),
        };
        assert!(outcome.is_failure());
        assert_eq!(outcome.error(), Some(&error));
        assert!(!ReconcileOutcome::Superseded.is_failure());
    }
}
