use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::fmt::Display;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use questboard_api::{
    Card, CardStatus, ContainerId, MoveTarget, OrderableItem, Quest, Recurrence,
};
use questboard_core::{
    AppState, MemoryBackend, OrderingApi, QuestApi, QuestRolloverService, ReconcileOutcome,
    ReorderController,
};

#[derive(Debug, Parser)]
#[command(name = "questboard", version, about = "Reorder kanban cards and daily quests")]
pub struct Cli {
    /// Config file (default: ~/.config/questboard/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Work against a seeded in-memory backend instead of the service
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Print a board (board:<id>) or a day's quests (day:<yyyy-mm-dd>, today)
    Show { container: ContainerId },

    /// Move an item as if it was dragged and dropped
    Move {
        container: ContainerId,
        id: String,
        /// Destination column or day; defaults to the item's own
        #[arg(long)]
        group: Option<String>,
        /// Zero-based slot in the destination; defaults to the end
        #[arg(long)]
        index: Option<usize>,
    },

    /// Carry unfinished quests over to another day
    Rollover {
        /// Defaults to the day before `--to`
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Defaults to today
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

/// The authorities for both item kinds.
pub struct Backends<C, Q> {
    pub cards: Arc<C>,
    pub quests: Arc<Q>,
}

pub const DEMO_BOARD: &str = "demo";

impl Backends<MemoryBackend<Card>, MemoryBackend<Quest>> {
    /// A small board and two days of quests around `today`.
    pub fn offline(today: NaiveDate) -> Self {
        let yesterday = today.pred_opt().unwrap_or(today);
        let cards = vec![
            Card::new(DEMO_BOARD, "Sketch landing page", CardStatus::Todo)
                .with_id("c1")
                .at(1),
            Card::new(DEMO_BOARD, "Write release notes", CardStatus::Todo)
                .with_id("c2")
                .at(2),
            Card::new(DEMO_BOARD, "Fix login redirect", CardStatus::InProgress)
                .with_id("c3")
                .at(1),
            Card::new(DEMO_BOARD, "Upgrade dependencies", CardStatus::Done)
                .with_id("c4")
                .at(1),
        ];
        let quests = vec![
            Quest::new("q1", "Morning stretch", yesterday)
                .at(1)
                .recurring(Recurrence::Daily)
                .done(),
            Quest::new("q2", "Call the bank", yesterday).at(2),
            Quest::new("q3", "Read a chapter", yesterday).at(3),
            Quest::new("q4", "Water plants", today).at(1),
        ];

        Self {
            cards: Arc::new(MemoryBackend::with_items(cards)),
            quests: Arc::new(MemoryBackend::with_items(quests)),
        }
    }
}

/// One line of `show` output.
pub trait Listing {
    fn describe(&self) -> String;
}

impl Listing for Card {
    fn describe(&self) -> String {
        format!("{}. {} [{}]", self.position, self.title, self.id)
    }
}

impl Listing for Quest {
    fn describe(&self) -> String {
        let check = if self.completed { "x" } else { " " };
        let recurring = if self.recurrence.is_some() {
            " (recurring)"
        } else {
            ""
        };
        format!(
            "{}. [{}] {}{} [{}]",
            self.position, check, self.title, recurring, self.id
        )
    }
}

pub async fn run<C, Q, W>(
    command: Command,
    backends: &Backends<C, Q>,
    app_state: Arc<AppState>,
    out: &mut W,
) -> Result<()>
where
    C: OrderingApi<Card> + 'static,
    Q: QuestApi + 'static,
    W: Write,
{
    match command {
        Command::Show { container } => match &container {
            ContainerId::Board(_) => {
                let controller: ReorderController<Card, C> =
                    ReorderController::new(Arc::clone(&backends.cards), container, app_state);
                show(&controller, out).await
            }
            ContainerId::Day(_) => {
                let controller: ReorderController<Quest, Q> =
                    ReorderController::new(Arc::clone(&backends.quests), container, app_state);
                show(&controller, out).await
            }
        },
        Command::Move {
            container,
            id,
            group,
            index,
        } => match &container {
            ContainerId::Board(_) => {
                let controller: ReorderController<Card, C> =
                    ReorderController::new(Arc::clone(&backends.cards), container, app_state);
                move_item(&controller, &id, group.as_deref(), index, out).await
            }
            ContainerId::Day(_) => {
                let controller: ReorderController<Quest, Q> =
                    ReorderController::new(Arc::clone(&backends.quests), container, app_state);
                move_item(&controller, &id, group.as_deref(), index, out).await
            }
        },
        Command::Rollover { from, to } => {
            let to = to.unwrap_or_else(|| Local::now().date_naive());
            let from = match from {
                Some(from) => from,
                None => to.pred_opt().context("No day before the target day")?,
            };
            rollover(Arc::clone(&backends.quests), app_state, from, to, out).await
        }
    }
}

async fn show<T, A, W>(controller: &ReorderController<T, A>, out: &mut W) -> Result<()>
where
    T: OrderableItem + Listing,
    T::Group: Display,
    A: OrderingApi<T>,
    W: Write,
{
    controller
        .load()
        .await
        .with_context(|| format!("Failed to load {}", controller.container()))?;

    let items = controller.items();
    writeln!(out, "{}", controller.container())?;
    if items.is_empty() {
        writeln!(out, "  (empty)")?;
    }

    let mut current: Option<&T::Group> = None;
    for item in items.iter() {
        if current != Some(item.group()) {
            writeln!(out, "  {}", item.group())?;
            current = Some(item.group());
        }
        writeln!(out, "    {}", item.describe())?;
    }
    Ok(())
}

async fn move_item<T, A, W>(
    controller: &ReorderController<T, A>,
    id: &str,
    group: Option<&str>,
    index: Option<usize>,
    out: &mut W,
) -> Result<()>
where
    T: OrderableItem + Listing,
    T::Group: FromStr + Display,
    <T::Group as FromStr>::Err: std::error::Error + Send + Sync + 'static,
    A: OrderingApi<T>,
    W: Write,
{
    let group = group
        .map(|raw| {
            raw.parse::<T::Group>()
                .with_context(|| format!("Invalid destination '{}'", raw))
        })
        .transpose()?;

    controller
        .load()
        .await
        .with_context(|| format!("Failed to load {}", controller.container()))?;
    let session = controller.drag_start(id)?;
    let target = MoveTarget {
        group: group.unwrap_or(session.origin_group),
        index,
    };
    info!("[Cli] Moving {} to {}", id, target.group);

    match controller.drop_on(Some(target.clone())).await {
        ReconcileOutcome::Confirmed | ReconcileOutcome::Superseded => {
            writeln!(out, "Moved {} to {}", id, target.group)?;
        }
        ReconcileOutcome::Unchanged => {
            writeln!(out, "{} is already in that slot", id)?;
        }
        ReconcileOutcome::Cancelled => {
            anyhow::bail!("Move of {} was cancelled: the item is gone", id);
        }
        ReconcileOutcome::RolledBack { error } => {
            anyhow::bail!("Move of {} was rejected: {}", id, error);
        }
        ReconcileOutcome::Diverged {
            error,
            refetch_error,
        } => {
            anyhow::bail!(
                "Move of {} was rejected ({}) and reloading failed ({}); the shown order may be stale",
                id,
                error,
                refetch_error
            );
        }
    }

    for item in controller.group(&target.group) {
        writeln!(out, "    {}", item.describe())?;
    }
    Ok(())
}

async fn rollover<Q, W>(
    api: Arc<Q>,
    app_state: Arc<AppState>,
    from: NaiveDate,
    to: NaiveDate,
    out: &mut W,
) -> Result<()>
where
    Q: QuestApi,
    W: Write,
{
    let service = QuestRolloverService::new(api, app_state);
    let report = service
        .roll_over(from, to)
        .await
        .with_context(|| format!("Rollover from {} to {} failed", from, to))?;

    writeln!(
        out,
        "Carried {} quest(s) from {} to {}, spawned {} recurring quest(s)",
        report.carried.len(),
        from,
        to,
        report.spawned.len()
    )?;
    for failure in &report.failed {
        writeln!(out, "  failed {}: {}", failure.id, failure.error)?;
    }
    Ok(())
}
