//! Day rollover for quests
//!
//! Unfinished quests move to the next day, appended after whatever that day
//! already holds. Finished recurring quests get a fresh instance on the new
//! day when their recurrence fires.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::reorder::sort_items;
use crate::traits::{QuestApi, Result};
use questboard_api::{ApiError, ContainerId, Quest, ReorderRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloverPlan {
    pub to: NaiveDate,
    /// Ids of quests to move, in their original order.
    pub carry_over: Vec<String>,
    /// Templates that get a new instance on `to`.
    pub spawn: Vec<Quest>,
}

impl RolloverPlan {
    pub fn is_empty(&self) -> bool {
        self.carry_over.is_empty() && self.spawn.is_empty()
    }
}

/// Decide what a rollover from `from_quests` onto `to` does.
///
/// Pure; `to_quests` is only consulted to avoid spawning a recurring quest
/// that already has an instance on `to`.
pub fn plan_rollover(from_quests: &[Quest], to_quests: &[Quest], to: NaiveDate) -> RolloverPlan {
    let mut from: Vec<Quest> = from_quests.to_vec();
    sort_items(&mut from);

    let carry_over: Vec<String> = from
        .iter()
        .filter(|quest| !quest.completed)
        .map(|quest| quest.id.clone())
        .collect();

    let mut present: HashSet<&str> = to_quests.iter().map(Quest::template_key).collect();
    present.extend(
        from.iter()
            .filter(|quest| !quest.completed)
            .map(Quest::template_key),
    );

    let mut spawn = Vec::new();
    for quest in from.iter().filter(|quest| quest.completed) {
        let Some(recurrence) = quest.recurrence else {
            continue;
        };
        if recurrence.fires_on(to) && present.insert(quest.template_key()) {
            spawn.push(quest.clone());
        }
    }

    RolloverPlan {
        to,
        carry_over,
        spawn,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloverFailure {
    pub id: String,
    pub error: ApiError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RolloverReport {
    pub carried: Vec<String>,
    /// Ids of the new instances.
    pub spawned: Vec<String>,
    pub failed: Vec<RolloverFailure>,
}

impl RolloverReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct QuestRolloverService<A> {
    api: Arc<A>,
    app_state: Arc<AppState>,
}

impl<A: QuestApi> QuestRolloverService<A> {
    pub fn new(api: Arc<A>, app_state: Arc<AppState>) -> Self {
        Self { api, app_state }
    }

    /// Carry unfinished quests of `from` over to `to` and spawn recurring ones.
    ///
    /// A failing quest is recorded in the report and does not stop the rest.
    pub async fn roll_over(&self, from: NaiveDate, to: NaiveDate) -> Result<RolloverReport> {
        if to <= from {
            return Err(ApiError::invalid(format!(
                "Cannot roll over from {} to {}: target day must be later",
                from, to
            )));
        }

        let source = ContainerId::Day(from);
        let from_quests = self.api.fetch_list(&source).await?;
        let to_quests = self.api.fetch_list(&ContainerId::Day(to)).await?;
        let plan = plan_rollover(&from_quests, &to_quests, to);
        if plan.is_empty() {
            debug!("[Rollover] Nothing to roll over from {} to {}", from, to);
            return Ok(RolloverReport::default());
        }

        info!(
            "[Rollover] {} -> {}: carrying {} quest(s), spawning {}",
            from,
            to,
            plan.carry_over.len(),
            plan.spawn.len()
        );

        let mut report = RolloverReport::default();
        let mut next_index = to_quests.len();
        for id in plan.carry_over {
            let request = ReorderRequest::MoveToGroup {
                id: id.clone(),
                group: to,
                index: next_index,
            };
            match self.api.apply_reorder(&source, &request).await {
                Ok(()) => {
                    next_index += 1;
                    report.carried.push(id);
                }
                Err(error) => {
                    warn!("[Rollover] Failed to carry {} over to {}: {}", id, to, error);
                    report.failed.push(RolloverFailure { id, error });
                }
            }
        }

        for template in plan.spawn {
            match self.api.spawn_recurring(&template, to).await {
                Ok(instance) => report.spawned.push(instance.id),
                Err(error) => {
                    warn!(
                        "[Rollover] Failed to spawn {} on {}: {}",
                        template.id, to, error
                    );
                    report.failed.push(RolloverFailure {
                        id: template.id,
                        error,
                    });
                }
            }
        }

        let notifications = self.app_state.notifications();
        if report.is_clean() {
            notifications.info(format!(
                "Moved {} quest(s) to {}, {} recurring quest(s) added",
                report.carried.len(),
                to,
                report.spawned.len()
            ));
        } else {
            notifications.error(format!(
                "Rollover to {} incomplete: {} quest(s) failed",
                to,
                report.failed.len()
            ));
        }
        Ok(report)
    }
}
