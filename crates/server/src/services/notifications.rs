//! Best-effort notification fan-out.
//!
//! Delivery never fails the action that triggered it: store errors and timeouts are logged and
//! swallowed. Inserted rows are also pushed on a broadcast channel that subscribers filter by
//! recipient.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use quoteflow_core::access::Gate;
use quoteflow_core::domain::actor::{Actor, ActorId, Role};
use quoteflow_core::domain::notification::{
    NewNotification, Notification, NotificationFeed, NotificationId,
};
use quoteflow_core::errors::ApplicationError;
use quoteflow_core::lifecycle::{NotificationIntent, Recipient};
use quoteflow_db::repositories::{NotificationRepository, ProfileRepository};

use crate::guard::ServiceGuard;

const REALTIME_CAPACITY: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeedView {
    pub unread_count: usize,
    pub notifications: Vec<Notification>,
}

#[derive(Clone)]
pub struct NotificationService {
    notifications: Arc<dyn NotificationRepository>,
    profiles: Arc<dyn ProfileRepository>,
    guard: ServiceGuard,
    realtime: broadcast::Sender<Notification>,
}

impl NotificationService {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        profiles: Arc<dyn ProfileRepository>,
        guard: ServiceGuard,
    ) -> Self {
        let (realtime, _) = broadcast::channel(REALTIME_CAPACITY);
        Self { notifications, profiles, guard, realtime }
    }

    /// Live rows addressed to `actor`, from now on.
    pub fn subscribe(&self, actor: &ActorId) -> NotificationSubscription {
        NotificationSubscription { actor: actor.clone(), receiver: self.realtime.subscribe() }
    }

    /// Persists and pushes one notification. Returns `None` when delivery failed.
    pub async fn notify(
        &self,
        notification: NewNotification,
        correlation_id: &str,
    ) -> Option<Notification> {
        let notification = notification.into_notification(Utc::now());
        let result =
            self.guard.write("notifications.insert", self.notifications.insert(&notification)).await;

        match result {
            Ok(()) => {
                // No subscriber is fine.
                let _ = self.realtime.send(notification.clone());
                debug!(
                    event_name = "notification.delivered",
                    correlation_id,
                    notification_id = %notification.id,
                    target_user_id = %notification.target_user_id,
                    "notification stored"
                );
                Some(notification)
            }
            Err(error) => {
                warn!(
                    event_name = "notification.delivery_failed",
                    correlation_id,
                    target_user_id = %notification.target_user_id,
                    error = %error,
                    "notification dropped"
                );
                None
            }
        }
    }

    /// Expands recipients and delivers every intent. Returns the number stored.
    pub async fn dispatch(&self, intents: &[NotificationIntent], correlation_id: &str) -> usize {
        let mut delivered = 0;
        for intent in intents {
            for target in self.resolve(&intent.recipient, correlation_id).await {
                let mut notification =
                    NewNotification::new(target, intent.message.clone(), intent.kind)
                        .with_title(intent.title.clone());
                if let Some(link) = &intent.link {
                    notification = notification.with_link(link.clone());
                }
                if self.notify(notification, correlation_id).await.is_some() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    async fn resolve(&self, recipient: &Recipient, correlation_id: &str) -> Vec<ActorId> {
        match recipient {
            Recipient::Actor(id) => vec![id.clone()],
            Recipient::Admins => {
                match self.guard.read("profiles.list", || self.profiles.list(Some(Role::Admin))).await
                {
                    Ok(admins) => admins.into_iter().map(|admin| admin.id).collect(),
                    Err(error) => {
                        warn!(
                            event_name = "notification.recipients_unresolved",
                            correlation_id,
                            error = %error,
                            "could not list admins"
                        );
                        Vec::new()
                    }
                }
            }
        }
    }

    pub async fn feed(&self, actor: Option<&Actor>) -> Result<FeedView, ApplicationError> {
        let actor = Gate::ViewNotifications.check(actor)?;
        let rows = self
            .guard
            .read("notifications.list", || self.notifications.list_for(&actor.id))
            .await?;

        let feed = NotificationFeed::from_notifications(rows);
        Ok(FeedView {
            unread_count: feed.unread_count(),
            notifications: feed.newest_first().into_iter().cloned().collect(),
        })
    }

    /// Idempotent. Returns whether the row flipped to read; rows of other actors are never
    /// touched.
    pub async fn mark_read(
        &self,
        actor: Option<&Actor>,
        id: &NotificationId,
    ) -> Result<bool, ApplicationError> {
        let actor = Gate::ViewNotifications.check(actor)?;
        self.guard
            .write("notifications.mark_read", self.notifications.mark_read(&actor.id, id, Utc::now()))
            .await
    }

    pub async fn mark_all_read(&self, actor: Option<&Actor>) -> Result<u64, ApplicationError> {
        let actor = Gate::ViewNotifications.check(actor)?;
        self.guard
            .write(
                "notifications.mark_all_read",
                self.notifications.mark_all_read(&actor.id, Utc::now()),
            )
            .await
    }
}

/// Broadcast receiver scoped to one recipient.
pub struct NotificationSubscription {
    actor: ActorId,
    receiver: broadcast::Receiver<Notification>,
}

impl NotificationSubscription {
    /// Next row for this actor; `None` once the service is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.recv().await {
                Ok(notification) if notification.target_user_id == self.actor => {
                    return Some(notification);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        event_name = "notification.subscriber_lagged",
                        target_user_id = %self.actor,
                        skipped,
                        "realtime subscriber fell behind"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use quoteflow_core::domain::actor::{Actor, ActorId, Role};
    use quoteflow_core::domain::notification::{
        NewNotification, Notification, NotificationId, NotificationKind,
    };
    use quoteflow_core::lifecycle::{NotificationIntent, Recipient};
    use quoteflow_db::repositories::{
        InMemoryNotificationRepository, InMemoryProfileRepository, NotificationRepository,
        ProfileRepository, RepositoryError,
    };

    use super::NotificationService;
    use crate::guard::ServiceGuard;

    struct FailingNotifications;

    #[async_trait]
    impl NotificationRepository for FailingNotifications {
        async fn insert(&self, _: &Notification) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }
        async fn list_for(&self, _: &ActorId) -> Result<Vec<Notification>, RepositoryError> {
            Ok(Vec::new())
        }
        async fn mark_read(
            &self,
            _: &ActorId,
            _: &NotificationId,
            _: DateTime<Utc>,
        ) -> Result<bool, RepositoryError> {
            Ok(false)
        }
        async fn mark_all_read(&self, _: &ActorId, _: DateTime<Utc>) -> Result<u64, RepositoryError> {
            Ok(0)
        }
    }

    fn actor(id: &str, role: Role) -> Actor {
        let mut actor =
            Actor::register(ActorId(id.to_string()), id, format!("{id}@acme.test"), Utc::now());
        actor.role = role;
        actor
    }

    async fn service_with_admins(admins: &[&str]) -> NotificationService {
        let profiles = Arc::new(InMemoryProfileRepository::default());
        for id in admins {
            profiles.save(actor(id, Role::Admin)).await.expect("save admin");
        }
        profiles.save(actor("C1", Role::Client)).await.expect("save client");
        NotificationService::new(
            Arc::new(InMemoryNotificationRepository::default()),
            profiles,
            ServiceGuard::default(),
        )
    }

    #[tokio::test]
    async fn admins_recipient_fans_out_to_every_admin() {
        let service = service_with_admins(&["A1", "A2"]).await;
        let intent = NotificationIntent {
            recipient: Recipient::Admins,
            title: "New quote to review".to_string(),
            message: "Quote Q-1 awaits approval.".to_string(),
            kind: NotificationKind::Info,
            link: Some("/quotes/Q-1".to_string()),
        };

        assert_eq!(service.dispatch(&[intent], "corr-1").await, 2);

        let feed = service.feed(Some(&actor("A2", Role::Admin))).await.expect("feed");
        assert_eq!(feed.unread_count, 1);
        assert_eq!(feed.notifications[0].link.as_deref(), Some("/quotes/Q-1"));

        let client_feed = service.feed(Some(&actor("C1", Role::Client))).await.expect("feed");
        assert!(client_feed.notifications.is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_swallowed() {
        let service = NotificationService::new(
            Arc::new(FailingNotifications),
            Arc::new(InMemoryProfileRepository::default()),
            ServiceGuard::default(),
        );

        let delivered = service
            .notify(
                NewNotification::new(ActorId("C1".to_string()), "hello", NotificationKind::Info),
                "corr-2",
            )
            .await;
        assert!(delivered.is_none());
    }

    #[tokio::test]
    async fn mark_read_is_idempotent_and_counts_drop() {
        let service = service_with_admins(&[]).await;
        let client = actor("C1", Role::Client);
        let first = service
            .notify(NewNotification::new(client.id.clone(), "one", NotificationKind::Info), "c")
            .await
            .expect("stored");
        service
            .notify(NewNotification::new(client.id.clone(), "two", NotificationKind::Success), "c")
            .await
            .expect("stored");

        assert!(service.mark_read(Some(&client), &first.id).await.expect("mark read"));
        assert!(!service.mark_read(Some(&client), &first.id).await.expect("mark read again"));
        assert_eq!(service.feed(Some(&client)).await.expect("feed").unread_count, 1);

        service.mark_all_read(Some(&client)).await.expect("mark all");
        assert_eq!(service.feed(Some(&client)).await.expect("feed").unread_count, 0);
    }

    #[tokio::test]
    async fn subscription_only_sees_its_own_rows() {
        let service = service_with_admins(&[]).await;
        let mut subscription = service.subscribe(&ActorId("C1".to_string()));

        service
            .notify(
                NewNotification::new(ActorId("C2".to_string()), "other", NotificationKind::Info),
                "c",
            )
            .await;
        service
            .notify(
                NewNotification::new(ActorId("C1".to_string()), "mine", NotificationKind::Info),
                "c",
            )
            .await;

        let received = tokio::time::timeout(Duration::from_secs(1), subscription.recv())
            .await
            .expect("row within a second")
            .expect("channel open");
        assert_eq!(received.message, "mine");
    }

    #[tokio::test]
    async fn anonymous_feed_is_unauthenticated() {
        let service = service_with_admins(&[]).await;
        assert!(service.feed(None).await.is_err());
    }
}
