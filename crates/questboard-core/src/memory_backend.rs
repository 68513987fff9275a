//! In-memory ordering authority
//!
//! A process-local stand-in for the remote service. It applies reorder
//! requests with the same rules as the local mutator, which makes it a
//! reference implementation for tests and the backing store of the CLI's
//! offline mode. Failures and slow writes can be injected.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};
use tracing::debug;

use crate::reorder::{apply_request, sort_items};
use crate::traits::{OrderingApi, QuestApi, Result};
use questboard_api::{ApiError, ContainerId, OrderableItem, Quest, ReorderRequest};

/// Holds calls until the test releases them.
///
/// Calls queue up in arrival order and can be released oldest-first or
/// newest-first, which is how out-of-order server responses are simulated.
#[derive(Clone, Default)]
pub struct CallGate {
    inner: Arc<GateInner>,
}

#[derive(Default)]
struct GateInner {
    state: Mutex<GateState>,
    arrived: Notify,
}

#[derive(Default)]
struct GateState {
    open: bool,
    waiting: VecDeque<oneshot::Sender<()>>,
}

impl CallGate {
    fn enter(&self) -> Option<oneshot::Receiver<()>> {
        let rx = {
            let mut state = self.inner.state.lock();
            if state.open {
                return None;
            }
            let (tx, rx) = oneshot::channel();
            state.waiting.push_back(tx);
            rx
        };
        self.inner.arrived.notify_one();
        Some(rx)
    }

    pub fn pending(&self) -> usize {
        self.inner.state.lock().waiting.len()
    }

    /// Wait until at least `count` calls are held.
    pub async fn wait_for_pending(&self, count: usize) {
        while self.pending() < count {
            self.inner.arrived.notified().await;
        }
    }

    pub fn release_oldest(&self) -> bool {
        let next = self.inner.state.lock().waiting.pop_front();
        match next {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    pub fn release_newest(&self) -> bool {
        let next = self.inner.state.lock().waiting.pop_back();
        match next {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    /// Release everything and let future calls through.
    pub fn open(&self) {
        let waiting: Vec<_> = {
            let mut state = self.inner.state.lock();
            state.open = true;
            state.waiting.drain(..).collect()
        };
        for tx in waiting {
            let _ = tx.send(());
        }
    }
}

struct MemoryState<T: OrderableItem> {
    items: Vec<T>,
    fail_reads: usize,
    fail_writes: usize,
    requests: Vec<ReorderRequest<T::Group>>,
    fetches: usize,
}

pub struct MemoryBackend<T: OrderableItem> {
    state: Mutex<MemoryState<T>>,
    write_gate: Mutex<Option<CallGate>>,
    read_gate: Mutex<Option<CallGate>>,
}

impl<T: OrderableItem> Default for MemoryBackend<T> {
    fn default() -> Self {
        Self::with_items(Vec::new())
    }
}

impl<T: OrderableItem> MemoryBackend<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(mut items: Vec<T>) -> Self {
        sort_items(&mut items);
        Self {
            state: Mutex::new(MemoryState {
                items,
                fail_reads: 0,
                fail_writes: 0,
                requests: Vec::new(),
                fetches: 0,
            }),
            write_gate: Mutex::new(None),
            read_gate: Mutex::new(None),
        }
    }

    pub fn insert(&self, item: T) {
        let mut state = self.state.lock();
        state.items.push(item);
        sort_items(&mut state.items);
    }

    /// Authoritative list of a container, bypassing failure injection.
    pub fn snapshot(&self, container: &ContainerId) -> Vec<T> {
        self.state
            .lock()
            .items
            .iter()
            .filter(|item| &item.container() == container)
            .cloned()
            .collect()
    }

    pub fn fail_next_writes(&self, count: usize) {
        self.state.lock().fail_writes = count;
    }

    pub fn fail_next_reads(&self, count: usize) {
        self.state.lock().fail_reads = count;
    }

    pub fn hold_writes(&self) -> CallGate {
        let gate = CallGate::default();
        *self.write_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn hold_reads(&self) -> CallGate {
        let gate = CallGate::default();
        *self.read_gate.lock() = Some(gate.clone());
        gate
    }

    async fn pass(gate: &Mutex<Option<CallGate>>) {
        let ticket = gate.lock().as_ref().and_then(|gate| gate.enter());
        if let Some(ticket) = ticket {
            // A dropped gate releases the call as well
            let _ = ticket.await;
        }
    }

    /// Every reorder request received, including rejected ones.
    pub fn requests(&self) -> Vec<ReorderRequest<T::Group>> {
        self.state.lock().requests.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.state.lock().fetches
    }

    fn injected_write_failure(state: &mut MemoryState<T>, what: &str) -> Result<()> {
        if state.fail_writes > 0 {
            state.fail_writes -= 1;
            return Err(ApiError::Network {
                message: format!("Injected write failure for {}", what),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<T: OrderableItem> OrderingApi<T> for MemoryBackend<T> {
    async fn fetch_list(&self, container: &ContainerId) -> Result<Vec<T>> {
        Self::pass(&self.read_gate).await;
        let mut state = self.state.lock();
        state.fetches += 1;
        if state.fail_reads > 0 {
            state.fail_reads -= 1;
            return Err(ApiError::Network {
                message: format!("Injected read failure for {}", container),
            });
        }

        Ok(state
            .items
            .iter()
            .filter(|item| &item.container() == container)
            .cloned()
            .collect())
    }

    async fn apply_reorder(
        &self,
        container: &ContainerId,
        request: &ReorderRequest<T::Group>,
    ) -> Result<()> {
        Self::pass(&self.write_gate).await;

        let mut state = self.state.lock();
        state.requests.push(request.clone());
        Self::injected_write_failure(&mut state, &container.to_string())?;

        // A cross-group move may land in another container (quests change day)
        let destination = match request {
            ReorderRequest::MoveToGroup { id, group, .. } => state
                .items
                .iter()
                .find(|item| item.id() == id && &item.container() == container)
                .map(|item| {
                    let mut moved = item.clone();
                    moved.set_group(group.clone());
                    moved.container()
                }),
            ReorderRequest::Positions { .. } => None,
        };
        let in_scope = |item: &T| {
            let owner = item.container();
            &owner == container || destination.as_ref() == Some(&owner)
        };

        let (mut scoped, rest): (Vec<T>, Vec<T>) = state.items.drain(..).partition(in_scope);
        // Ids from other containers are unknown here
        let result = apply_request(&mut scoped, request);
        state.items = rest;
        state.items.extend(scoped);
        sort_items(&mut state.items);
        result?;

        debug!(
            "[MemoryBackend] Applied reorder of {} item(s) in {}",
            request.item_ids().len(),
            container
        );
        Ok(())
    }
}

#[async_trait]
impl QuestApi for MemoryBackend<Quest> {
    async fn spawn_recurring(&self, template: &Quest, date: NaiveDate) -> Result<Quest> {
        let mut state = self.state.lock();
        Self::injected_write_failure(&mut state, &format!("spawn of {}", template.id))?;

        if template.recurrence.is_none() {
            return Err(ApiError::invalid(format!(
                "Quest {} is not recurring",
                template.id
            )));
        }

        let position = state
            .items
            .iter()
            .filter(|quest| quest.date == date)
            .map(|quest| quest.position)
            .max()
            .unwrap_or(0)
            + 1;
        let quest = template
            .spawn_instance(uuid::Uuid::new_v4().to_string(), date)
            .at(position);

        state.items.push(quest.clone());
        sort_items(&mut state.items);
        debug!(
            "[MemoryBackend] Spawned {} from {} on {}",
            quest.id,
            quest.template_key(),
            date
        );
        Ok(quest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questboard_api::{Card, CardStatus, PositionEntry, Recurrence};

    fn board() -> ContainerId {
        ContainerId::board("b1")
    }

    fn seeded() -> MemoryBackend<Card> {
        MemoryBackend::with_items(vec![
            Card::new("b1", "A", CardStatus::Todo).with_id("a").at(1),
            Card::new("b1", "B", CardStatus::Todo).with_id("b").at(2),
            Card::new("b2", "X", CardStatus::Todo).with_id("x").at(1),
        ])
    }

    #[tokio::test]
    async fn test_fetch_is_scoped_to_container() {
        let backend = seeded();
        let cards = backend.fetch_list(&board()).await.unwrap();
        assert_eq!(
            cards.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(backend.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_rejects_items_of_other_containers() {
        let backend = seeded();
        let request = ReorderRequest::Positions {
            entries: vec![PositionEntry {
                id: "x".into(),
                position: 5,
            }],
        };
        assert_eq!(
            backend.apply_reorder(&board(), &request).await,
            Err(ApiError::item_not_found("x"))
        );
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let backend = seeded();
        backend.fail_next_reads(1);
        assert!(backend.fetch_list(&board()).await.is_err());
        assert!(backend.fetch_list(&board()).await.is_ok());

        backend.fail_next_writes(1);
        let request = ReorderRequest::MoveToGroup {
            id: "a".into(),
            group: CardStatus::Done,
            index: 0,
        };
        assert!(matches!(
            backend.apply_reorder(&board(), &request).await,
            Err(ApiError::Network { .. })
        ));
        backend.apply_reorder(&board(), &request).await.unwrap();
        let done: Vec<_> = backend
            .snapshot(&board())
            .into_iter()
            .filter(|c| c.status == CardStatus::Done)
            .collect();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, "a");
    }

    #[tokio::test]
    async fn test_write_gate_holds_until_released() {
        let backend = Arc::new(seeded());
        let gate = backend.hold_writes();

        let writer = {
            let backend = Arc::clone(&backend);
            tokio::spawn(async move {
                let request = ReorderRequest::MoveToGroup {
                    id: "b".into(),
                    group: CardStatus::Todo,
                    index: 0,
                };
                backend.apply_reorder(&board(), &request).await
            })
        };

        gate.wait_for_pending(1).await;
        assert!(backend.requests().is_empty());
        assert!(gate.release_oldest());
        writer.await.unwrap().unwrap();

        let ids: Vec<_> = backend.snapshot(&board()).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_spawn_recurring_appends_to_day() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let yesterday = today.pred_opt().unwrap();
        let template = Quest::new("q1", "Stretch", yesterday)
            .recurring(Recurrence::Daily)
            .done();
        let backend = MemoryBackend::with_items(vec![
            template.clone(),
            Quest::new("q2", "Read", today).at(4),
        ]);

        let spawned = backend.spawn_recurring(&template, today).await.unwrap();
        assert_eq!(spawned.position, 5);
        assert_eq!(spawned.template_key(), "q1");
        assert_eq!(backend.snapshot(&ContainerId::Day(today)).len(), 2);

        let plain = Quest::new("q3", "Once", yesterday);
        assert!(backend.spawn_recurring(&plain, today).await.is_err());
    }
}
