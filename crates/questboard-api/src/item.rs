//! Orderable items
//!
//! Both kanban cards and daily quests are ordered by a `(group, position)`
//! pair. Cards are grouped by status column, quests by the day they are
//! scheduled for.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ApiError, ContainerId};

/// An entity that can be reordered within and moved between groups.
///
/// Positions are sort keys: lower sorts earlier, gaps are allowed, but two
/// items of the same group never share a position after a local mutation.
pub trait OrderableItem: Clone + fmt::Debug + Send + Sync + 'static {
    type Group: Clone + Eq + Ord + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    fn id(&self) -> &str;
    fn position(&self) -> i64;
    fn set_position(&mut self, position: i64);
    fn group(&self) -> &Self::Group;
    fn set_group(&mut self, group: Self::Group);

    /// The list this item is fetched with.
    fn container(&self) -> ContainerId;
}

/// Kanban column of a card. Declaration order is column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    #[default]
    Todo,
    InProgress,
    InReview,
    Done,
    Cancelled,
}

impl CardStatus {
    pub const ALL: [CardStatus; 5] = [
        CardStatus::Todo,
        CardStatus::InProgress,
        CardStatus::InReview,
        CardStatus::Done,
        CardStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Todo => "todo",
            CardStatus::InProgress => "in_progress",
            CardStatus::InReview => "in_review",
            CardStatus::Done => "done",
            CardStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CardStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CardStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ApiError::invalid(format!("Unknown card status: {}", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub board_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: CardStatus,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn new(board_id: impl Into<String>, title: impl Into<String>, status: CardStatus) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            board_id: board_id.into(),
            title: title.into(),
            description: None,
            status,
            position: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn at(mut self, position: i64) -> Self {
        self.position = position;
        self
    }
}

impl OrderableItem for Card {
    type Group = CardStatus;

    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }

    fn group(&self) -> &CardStatus {
        &self.status
    }

    fn set_group(&mut self, group: CardStatus) {
        self.status = group;
    }

    fn container(&self) -> ContainerId {
        ContainerId::Board(self.board_id.clone())
    }
}

/// How often a quest comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
    Weekdays,
    Weekly { weekday: Weekday },
}

impl Recurrence {
    pub fn fires_on(&self, date: NaiveDate) -> bool {
        match self {
            Recurrence::Daily => true,
            Recurrence::Weekdays => !matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
            Recurrence::Weekly { weekday } => date.weekday() == *weekday,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    pub position: i64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    /// The quest this recurring instance was spawned from.
    #[serde(default)]
    pub template_id: Option<String>,
}

impl Quest {
    pub fn new(id: impl Into<String>, title: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            date,
            position: 0,
            completed: false,
            recurrence: None,
            template_id: None,
        }
    }

    pub fn at(mut self, position: i64) -> Self {
        self.position = position;
        self
    }

    pub fn recurring(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    pub fn done(mut self) -> Self {
        self.completed = true;
        self
    }

    /// Identity shared by every instance of a recurring quest.
    pub fn template_key(&self) -> &str {
        self.template_id.as_deref().unwrap_or(&self.id)
    }

    /// A fresh, incomplete instance of this quest on `date`.
    pub fn spawn_instance(&self, id: impl Into<String>, date: NaiveDate) -> Quest {
        Quest {
            id: id.into(),
            title: self.title.clone(),
            date,
            position: 0,
            completed: false,
            recurrence: self.recurrence,
            template_id: Some(self.template_key().to_string()),
        }
    }
}

impl OrderableItem for Quest {
    type Group = NaiveDate;

    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }

    fn group(&self) -> &NaiveDate {
        &self.date
    }

    fn set_group(&mut self, group: NaiveDate) {
        self.date = group;
    }

    fn container(&self) -> ContainerId {
        ContainerId::Day(self.date)
    }
}
