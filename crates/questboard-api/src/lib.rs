use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod item;
pub mod request;

pub use item::{Card, CardStatus, OrderableItem, Quest, Recurrence};
pub use request::{MoveTarget, PositionEntry, ReorderRequest};

/// Identifies a list that is fetched and reordered as a whole.
///
/// Kanban cards are listed per board, quests per day. The "today" quest list
/// is not a separate variant: it is resolved against the local clock with
/// [`ContainerId::today`] before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ContainerId {
    Board(String),
    Day(NaiveDate),
}

impl ContainerId {
    pub fn board(id: impl Into<String>) -> Self {
        ContainerId::Board(id.into())
    }

    pub fn today() -> Self {
        ContainerId::Day(chrono::Local::now().date_naive())
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerId::Board(id) => write!(f, "board:{}", id),
            ContainerId::Day(date) => write!(f, "day:{}", date.format("%Y-%m-%d")),
        }
    }
}

impl FromStr for ContainerId {
    type Err = ApiError;

    /// Accepts `board:<id>`, `day:<yyyy-mm-dd>` and `today`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "today" {
            return Ok(ContainerId::today());
        }

        match s.split_once(':') {
            Some(("board", id)) if !id.is_empty() => Ok(ContainerId::Board(id.to_string())),
            Some(("day", date)) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map(ContainerId::Day)
                .map_err(|e| ApiError::InvalidOperation {
                    message: format!("Invalid date in container id '{}': {}", s, e),
                }),
            _ => Err(ApiError::InvalidOperation {
                message: format!(
                    "Unknown container id '{}' (expected board:<id>, day:<yyyy-mm-dd> or today)",
                    s
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_id_display_and_parse() {
        let board = ContainerId::board("b-1");
        assert_eq!(board.to_string(), "board:b-1");
        assert_eq!("board:b-1".parse::<ContainerId>().unwrap(), board);

        let day = ContainerId::Day(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
        assert_eq!(day.to_string(), "day:2026-10-16");
        assert_eq!("day:2026-10-16".parse::<ContainerId>().unwrap(), day);
    }

    #[test]
    fn test_container_id_rejects_garbage() {
        assert!("board:".parse::<ContainerId>().is_err());
        assert!("day:yesterday".parse::<ContainerId>().is_err());
        assert!("column:1".parse::<ContainerId>().is_err());
    }

    #[test]
    fn test_today_is_a_day() {
        assert!(matches!(
            "today".parse::<ContainerId>().unwrap(),
            ContainerId::Day(_)
        ));
    }

    #[test]
    fn test_transport_classification() {
        let network = ApiError::Network {
            message: "connection refused".into(),
        };
        let validation = ApiError::Validation {
            status: 404,
            message: "no such card".into(),
        };
        assert!(network.is_transport());
        assert!(!validation.is_transport());
    }
}

/// Structured error types for ordering operations.
///
/// Serializable so they can be shown by any frontend without losing the
/// variant. Transport and validation failures are handled the same way by the
/// reorder controller; the distinction is kept for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ApiError {
    #[error("Item not found: {id}")]
    ItemNotFound { id: String },

    #[error("Container not found: {container}")]
    ContainerNotFound { container: String },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Rejected by server (HTTP {status}): {message}")]
    Validation { status: u16, message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn item_not_found(id: impl Into<String>) -> Self {
        ApiError::ItemNotFound { id: id.into() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::InvalidOperation {
            message: message.into(),
        }
    }

    /// True for failures where the request may never have reached the server.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Network { .. })
    }
}
