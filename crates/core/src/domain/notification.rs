use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::actor::ActorId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn generate() -> Self {
        Self(format!("NTF-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "info" => Some(Self::Info),
            "success" => Some(Self::Success),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub target_user_id: ActorId,
    pub title: Option<String>,
    pub message: String,
    pub kind: NotificationKind,
    pub read: bool,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Version used for last-writer-wins merging.
    pub updated_at: DateTime<Utc>,
}

/// A notification before it is persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub target_user_id: ActorId,
    pub message: String,
    pub kind: NotificationKind,
    pub link: Option<String>,
    pub title: Option<String>,
}

impl NewNotification {
    pub fn new(
        target_user_id: ActorId,
        message: impl Into<String>,
        kind: NotificationKind,
    ) -> Self {
        Self { target_user_id, message: message.into(), kind, link: None, title: None }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn into_notification(self, now: DateTime<Utc>) -> Notification {
        Notification {
            id: NotificationId::generate(),
            target_user_id: self.target_user_id,
            title: self.title,
            message: self.message,
            kind: self.kind,
            read: false,
            link: self.link,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Local view of one actor's notifications, fed both by pushed rows and by local
/// read-state changes.
#[derive(Clone, Debug, Default)]
pub struct NotificationFeed {
    entries: HashMap<NotificationId, Notification>,
}

impl NotificationFeed {
    pub fn from_notifications(notifications: impl IntoIterator<Item = Notification>) -> Self {
        let mut feed = Self::default();
        for notification in notifications {
            feed.apply(notification);
        }
        feed
    }

    /// Last writer wins per id; an older version never overwrites a newer one.
    /// Returns whether the entry changed.
    pub fn apply(&mut self, incoming: Notification) -> bool {
        match self.entries.get(&incoming.id) {
            Some(existing) if existing.updated_at > incoming.updated_at => false,
            Some(existing) if existing == &incoming => false,
            _ => {
                self.entries.insert(incoming.id.clone(), incoming);
                true
            }
        }
    }

    pub fn mark_read(&mut self, id: &NotificationId, now: DateTime<Utc>) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) if !entry.read => {
                entry.read = true;
                entry.updated_at = now;
                true
            }
            _ => false,
        }
    }

    pub fn mark_all_read(&mut self, now: DateTime<Utc>) -> usize {
        let mut changed = 0;
        for entry in self.entries.values_mut().filter(|entry| !entry.read) {
            entry.read = true;
            entry.updated_at = now;
            changed += 1;
        }
        changed
    }

    pub fn unread_count(&self) -> usize {
        self.entries.values().filter(|entry| !entry.read).count()
    }

    pub fn newest_first(&self) -> Vec<&Notification> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| right.id.cmp(&left.id))
        });
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::domain::actor::ActorId;

    use super::{NewNotification, NotificationFeed, NotificationKind};

    fn target() -> ActorId {
        ActorId("c-1".to_string())
    }

    #[test]
    fn feed_is_newest_first_with_unread_counter() {
        let now = Utc::now();
        let older = NewNotification::new(target(), "Quote received", NotificationKind::Info)
            .into_notification(now - Duration::minutes(10));
        let newer = NewNotification::new(target(), "Quote approved", NotificationKind::Success)
            .with_title("Approved")
            .into_notification(now);

        let feed = NotificationFeed::from_notifications([older, newer]);

        let messages: Vec<_> = feed.newest_first().iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["Quote approved", "Quote received"]);
        assert_eq!(feed.unread_count(), 2);
    }

    #[test]
    fn mark_read_is_idempotent() {
        let notification = NewNotification::new(target(), "Quote approved", NotificationKind::Info)
            .into_notification(Utc::now());
        let id = notification.id.clone();
        let mut feed = NotificationFeed::from_notifications([notification]);

        assert!(feed.mark_read(&id, Utc::now()));
        assert!(!feed.mark_read(&id, Utc::now()));
        assert_eq!(feed.unread_count(), 0);
    }

    #[test]
    fn stale_push_does_not_undo_local_read() {
        let created = Utc::now();
        let pushed = NewNotification::new(target(), "Quote signed", NotificationKind::Success)
            .into_notification(created);
        let mut feed = NotificationFeed::from_notifications([pushed.clone()]);

        assert_eq!(feed.mark_all_read(created + Duration::seconds(5)), 1);
        assert!(!feed.apply(pushed));
        assert_eq!(feed.unread_count(), 0);
    }

    #[test]
    fn newer_push_wins_over_local_state() {
        let created = Utc::now();
        let pushed = NewNotification::new(target(), "Quote signed", NotificationKind::Success)
            .into_notification(created);
        let mut feed = NotificationFeed::from_notifications([pushed.clone()]);
        feed.mark_all_read(created + Duration::seconds(1));

        let mut remote = pushed;
        remote.read = false;
        remote.updated_at = created + Duration::seconds(2);
        assert!(feed.apply(remote));
        assert_eq!(feed.unread_count(), 1);
    }
}
