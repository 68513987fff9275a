//! Cross-cutting UI state
//!
//! `AppState` is created once by the frontend and handed to every component
//! that needs it (`Arc<AppState>`). There is no global instance.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;

pub const DEFAULT_MAX_VISIBLE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A toast shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct NotificationQueue {
    next_id: u64,
    active: VecDeque<Notification>,
}

/// Bounded list of active notifications. The oldest one is evicted when a
/// new one would exceed `max_visible`.
#[derive(Debug)]
pub struct NotificationCenter {
    queue: Mutex<NotificationQueue>,
    max_visible: usize,
    tx: broadcast::Sender<Notification>,
}

impl NotificationCenter {
    pub fn new(max_visible: usize) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            queue: Mutex::new(NotificationQueue::default()),
            max_visible: max_visible.max(1),
            tx,
        }
    }

    pub fn push(&self, level: NotificationLevel, message: impl Into<String>) -> u64 {
        let notification = {
            let mut queue = self.queue.lock();
            queue.next_id += 1;
            let notification = Notification {
                id: queue.next_id,
                level,
                message: message.into(),
                created_at: Utc::now(),
            };
            queue.active.push_back(notification.clone());
            while queue.active.len() > self.max_visible {
                queue.active.pop_front();
            }
            notification
        };

        let id = notification.id;
        // Nobody listening is fine
        let _ = self.tx.send(notification);
        id
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.push(NotificationLevel::Info, message)
    }

    pub fn warn(&self, message: impl Into<String>) -> u64 {
        self.push(NotificationLevel::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.push(NotificationLevel::Error, message)
    }

    /// Returns false if the notification was already gone.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut queue = self.queue.lock();
        let before = queue.active.len();
        queue.active.retain(|n| n.id != id);
        queue.active.len() != before
    }

    pub fn clear(&self) {
        self.queue.lock().active.clear();
    }

    pub fn active(&self) -> Vec<Notification> {
        self.queue.lock().active.iter().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

#[derive(Debug, Default)]
struct UiState {
    sidebar_open: bool,
    search_query: String,
}

#[derive(Debug)]
pub struct AppState {
    ui: RwLock<UiState>,
    notifications: NotificationCenter,
}

impl AppState {
    pub fn new(max_visible_notifications: usize) -> Self {
        Self {
            ui: RwLock::new(UiState {
                sidebar_open: true,
                search_query: String::new(),
            }),
            notifications: NotificationCenter::new(max_visible_notifications),
        }
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn sidebar_open(&self) -> bool {
        self.ui.read().sidebar_open
    }

    pub fn set_sidebar_open(&self, open: bool) {
        self.ui.write().sidebar_open = open;
    }

    /// Returns the new state.
    pub fn toggle_sidebar(&self) -> bool {
        let mut ui = self.ui.write();
        ui.sidebar_open = !ui.sidebar_open;
        ui.sidebar_open
    }

    pub fn search_query(&self) -> String {
        self.ui.read().search_query.clone()
    }

    pub fn set_search_query(&self, query: impl Into<String>) {
        self.ui.write().search_query = query.into().trim().to_string();
    }

    pub fn clear_search(&self) {
        self.ui.write().search_query.clear();
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VISIBLE)
    }
}
