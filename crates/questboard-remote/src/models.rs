//! Request bodies of the ordering service

use chrono::NaiveDate;
use questboard_api::{CardStatus, PositionEntry};
use serde::{Deserialize, Serialize};

/// `POST /boards/{id}/cards/reorder`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderCardsBody {
    pub entries: Vec<PositionEntry>,
}

/// `PATCH /cards/{id}/move`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCardBody {
    pub status: CardStatus,
    pub index: usize,
}

/// `POST /quests/reorder`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderQuestsBody {
    pub date: NaiveDate,
    pub entries: Vec<PositionEntry>,
}

/// `PATCH /quests/{id}/move`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveQuestBody {
    pub date: NaiveDate,
    pub index: usize,
}

/// `POST /quests/{id}/spawn`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnQuestBody {
    pub date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_move_bodies_wire_shape() {
        let card = MoveCardBody {
            status: CardStatus::InReview,
            index: 2,
        };
        assert_eq!(
            serde_json::to_value(&card).unwrap(),
            json!({"status": "in_review", "index": 2})
        );

        let quest = MoveQuestBody {
            date: NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
            index: 0,
        };
        assert_eq!(
            serde_json::to_value(&quest).unwrap(),
            json!({"date": "2026-10-17", "index": 0})
        );
    }
}
