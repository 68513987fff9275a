//! Property-based tests for ReorderController using proptest-state-machine
//!
//! A board of cards is driven through random drags and drops, some of which
//! the backend rejects. After every step the controller's list is compared
//! with a column model that only knows "remove, then insert at a clamped
//! index".
//!
//! ## Invariants checked after each transition
//!
//! - Every card appears exactly once, in the column and order the model expects
//! - Positions are dense from 1 within each column
//! - The list shown by the controller equals the backend's list
//! - No drag session or in-flight write is left behind

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use proptest_state_machine::{ReferenceStateMachine, StateMachineTest};
use questboard_core::{
    AppState, Card, CardStatus, ContainerId, MemoryBackend, MoveTarget, ReconcileOutcome,
    ReorderController, ReorderPhase,
};

const BOARD: &str = "pbt-board";

/// Reference model: card ids per column, in display order.
#[derive(Debug, Clone, Default)]
pub struct BoardModel {
    columns: BTreeMap<CardStatus, Vec<String>>,
}

impl BoardModel {
    fn ids(&self) -> Vec<String> {
        self.columns.values().flatten().cloned().collect()
    }

    fn locate(&self, id: &str) -> Option<(CardStatus, usize)> {
        self.columns.iter().find_map(|(status, ids)| {
            ids.iter()
                .position(|candidate| candidate == id)
                .map(|index| (*status, index))
        })
    }

    fn apply_move(&mut self, id: &str, status: CardStatus, index: Option<usize>) {
        let Some((from, at)) = self.locate(id) else {
            return;
        };
        if let Some(column) = self.columns.get_mut(&from) {
            column.remove(at);
        }
        let column = self.columns.entry(status).or_default();
        let slot = index.unwrap_or(column.len()).min(column.len());
        column.insert(slot, id.to_string());
    }

    fn non_empty_columns(&self) -> BTreeMap<CardStatus, Vec<String>> {
        self.columns
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(status, ids)| (*status, ids.clone()))
            .collect()
    }

    fn is_own_slot(&self, id: &str, status: CardStatus, index: Option<usize>) -> bool {
        let mut moved = self.clone();
        moved.apply_move(id, status, index);
        moved.non_empty_columns() == self.non_empty_columns()
    }
}

fn columns_of(cards: &[Card]) -> BTreeMap<CardStatus, Vec<String>> {
    let mut columns: BTreeMap<CardStatus, Vec<String>> = BTreeMap::new();
    for card in cards {
        columns.entry(card.status).or_default().push(card.id.clone());
    }
    columns
}

#[derive(Clone, Debug)]
pub enum BoardTransition {
    Move {
        id: String,
        status: CardStatus,
        index: Option<usize>,
    },
    /// The backend rejects the write; the list must come back unchanged.
    RejectedMove {
        id: String,
        status: CardStatus,
        index: Option<usize>,
    },
    /// Released outside every drop target.
    DropOutside { id: String },
    Refresh,
}

impl ReferenceStateMachine for BoardModel {
    type State = Self;
    type Transition = BoardTransition;

    fn init_state() -> BoxedStrategy<Self::State> {
        prop::collection::vec(0..CardStatus::ALL.len(), 1..10)
            .prop_map(|columns| {
                let mut model = BoardModel::default();
                for (i, column) in columns.into_iter().enumerate() {
                    model
                        .columns
                        .entry(CardStatus::ALL[column])
                        .or_default()
                        .push(format!("card-{}", i));
                }
                model
            })
            .boxed()
    }

    fn transitions(state: &Self::State) -> BoxedStrategy<Self::Transition> {
        let ids = state.ids();
        let target = |ids: Vec<String>| {
            (
                prop::sample::select(ids),
                prop::sample::select(CardStatus::ALL.to_vec()),
                prop::option::of(0usize..12),
            )
        };

        prop_oneof![
            6 => target(ids.clone()).prop_map(|(id, status, index)| BoardTransition::Move { id, status, index }),
            2 => target(ids.clone()).prop_map(|(id, status, index)| BoardTransition::RejectedMove { id, status, index }),
            1 => prop::sample::select(ids).prop_map(|id| BoardTransition::DropOutside { id }),
            1 => Just(BoardTransition::Refresh),
        ]
        .boxed()
    }

    fn preconditions(state: &Self::State, transition: &Self::Transition) -> bool {
        match transition {
            BoardTransition::Move { id, .. }
            | BoardTransition::RejectedMove { id, .. }
            | BoardTransition::DropOutside { id } => state.locate(id).is_some(),
            BoardTransition::Refresh => true,
        }
    }

    fn apply(mut state: Self::State, transition: &Self::Transition) -> Self::State {
        if let BoardTransition::Move { id, status, index } = transition {
            state.apply_move(id, *status, *index);
        }
        state
    }
}

pub struct BoardHarness {
    runtime: tokio::runtime::Runtime,
    backend: Arc<MemoryBackend<Card>>,
    controller: ReorderController<Card, MemoryBackend<Card>>,
}

impl BoardHarness {
    fn drag_and_drop(&self, id: &str, target: Option<MoveTarget<CardStatus>>) -> ReconcileOutcome {
        self.controller
            .drag_start(id)
            .expect("model only picks cards that exist");
        self.runtime.block_on(self.controller.drop_on(target))
    }
}

impl StateMachineTest for BoardHarness {
    type SystemUnderTest = Self;
    type Reference = BoardModel;

    fn init_test(
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) -> Self::SystemUnderTest {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("failed to build runtime");

        let cards = ref_state
            .columns
            .iter()
            .flat_map(|(status, ids)| {
                ids.iter().enumerate().map(move |(i, id)| {
                    Card::new(BOARD, id.clone(), *status)
                        .with_id(id.clone())
                        .at(i as i64 + 1)
                })
            })
            .collect();
        let backend = Arc::new(MemoryBackend::with_items(cards));
        let controller = ReorderController::new(
            Arc::clone(&backend),
            ContainerId::board(BOARD),
            Arc::new(AppState::default()),
        );
        runtime
            .block_on(controller.load())
            .expect("initial load should succeed");

        BoardHarness {
            runtime,
            backend,
            controller,
        }
    }

    fn apply(
        state: Self::SystemUnderTest,
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
        transition: <Self::Reference as ReferenceStateMachine>::Transition,
    ) -> Self::SystemUnderTest {
        match &transition {
            BoardTransition::Move { id, status, index } => {
                let before = columns_of(&state.controller.items());
                let outcome = state.drag_and_drop(
                    id,
                    Some(MoveTarget {
                        group: *status,
                        index: *index,
                    }),
                );
                // ref_state already has the move applied
                let expected = if before == ref_state.non_empty_columns() {
                    ReconcileOutcome::Unchanged
                } else {
                    ReconcileOutcome::Confirmed
                };
                assert_eq!(outcome, expected, "unexpected outcome for {:?}", transition);
            }
            BoardTransition::RejectedMove { id, status, index } => {
                let noop = ref_state.is_own_slot(id, *status, *index);
                state.backend.fail_next_writes(1);
                let outcome = state.drag_and_drop(
                    id,
                    Some(MoveTarget {
                        group: *status,
                        index: *index,
                    }),
                );
                if noop {
                    assert_eq!(outcome, ReconcileOutcome::Unchanged);
                    // Nothing was sent, so the injected failure is still armed
                    state.backend.fail_next_writes(0);
                } else {
                    assert!(
                        matches!(outcome, ReconcileOutcome::RolledBack { .. }),
                        "expected rollback for {:?}, got {:?}",
                        transition,
                        outcome
                    );
                }
            }
            BoardTransition::DropOutside { id } => {
                assert_eq!(state.drag_and_drop(id, None), ReconcileOutcome::Cancelled);
            }
            BoardTransition::Refresh => {
                state
                    .runtime
                    .block_on(state.controller.refresh())
                    .expect("refresh should succeed");
            }
        }
        state
    }

    fn check_invariants(
        state: &Self::SystemUnderTest,
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) {
        let items = state.controller.items();

        for status in CardStatus::ALL {
            let shown: Vec<&str> = items
                .iter()
                .filter(|c| c.status == status)
                .map(|c| c.id.as_str())
                .collect();
            let expected: Vec<&str> = ref_state
                .columns
                .get(&status)
                .map(|ids| ids.iter().map(String::as_str).collect())
                .unwrap_or_default();
            assert_eq!(shown, expected, "column {} differs from model", status);

            let positions: Vec<i64> = items
                .iter()
                .filter(|c| c.status == status)
                .map(|c| c.position)
                .collect();
            assert_eq!(positions, (1..=positions.len() as i64).collect::<Vec<_>>());
        }

        assert_eq!(
            items.as_slice(),
            state
                .backend
                .snapshot(&ContainerId::board(BOARD))
                .as_slice()
        );
        assert_eq!(state.controller.phase(), ReorderPhase::Idle);
        assert!(!state.controller.is_stale());
    }
}

proptest_state_machine::prop_state_machine! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn test_reorder_controller_state_machine(sequential 1..25 => BoardHarness);
}
