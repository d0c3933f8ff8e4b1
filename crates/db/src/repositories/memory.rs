use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use quoteflow_core::domain::actor::{Actor, ActorId, Role};
use quoteflow_core::domain::cart::Cart;
use quoteflow_core::domain::dossier::{Comment, Dossier, DossierId};
use quoteflow_core::domain::notification::{Notification, NotificationId};
use quoteflow_core::domain::offer::{Offer, OfferId};
use quoteflow_core::domain::quote::{Quote, QuoteId, QuoteStatus};

use super::{
    CartRepository, Credential, CredentialRepository, DossierRepository, NotificationRepository,
    OfferRepository, ProfileRepository, QuoteFilter, QuoteRepository, RepositoryError,
    SessionRecord,
};

#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<HashMap<String, Actor>>,
}

#[async_trait::async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn find_by_id(&self, id: &ActorId) -> Result<Option<Actor>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(&id.0).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Actor>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.values().find(|actor| actor.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn list(&self, role: Option<Role>) -> Result<Vec<Actor>, RepositoryError> {
        let profiles = self.profiles.read().await;
        let mut listed: Vec<Actor> = profiles
            .values()
            .filter(|actor| role.map_or(true, |role| actor.role == role))
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.display_name.cmp(&b.display_name).then(a.id.cmp(&b.id)));
        Ok(listed)
    }

    async fn save(&self, actor: Actor) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        let taken = profiles
            .values()
            .any(|other| other.id != actor.id && other.email.eq_ignore_ascii_case(&actor.email));
        if taken {
            return Err(RepositoryError::Duplicate { resource: "profile email", id: actor.email });
        }
        profiles.insert(actor.id.0.clone(), actor);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryOfferRepository {
    offers: RwLock<HashMap<String, Offer>>,
}

#[async_trait::async_trait]
impl OfferRepository for InMemoryOfferRepository {
    async fn find_by_id(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        let offers = self.offers.read().await;
        Ok(offers.get(&id.0).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Offer>, RepositoryError> {
        let offers = self.offers.read().await;
        let mut active: Vec<Offer> = offers.values().filter(|offer| offer.active).cloned().collect();
        active.sort_by(|a, b| a.category.cmp(&b.category).then(a.name.cmp(&b.name)));
        Ok(active)
    }

    async fn save(&self, offer: Offer) -> Result<(), RepositoryError> {
        let mut offers = self.offers.write().await;
        offers.insert(offer.id.0.clone(), offer);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCartRepository {
    carts: RwLock<HashMap<String, Cart>>,
}

#[async_trait::async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn load(&self, owner: &ActorId) -> Result<Option<Cart>, RepositoryError> {
        let carts = self.carts.read().await;
        Ok(carts.get(&owner.0).cloned())
    }

    async fn save(&self, cart: Cart) -> Result<(), RepositoryError> {
        let mut carts = self.carts.write().await;
        carts.insert(cart.owner.0.clone(), cart);
        Ok(())
    }

    async fn clear(&self, owner: &ActorId) -> Result<(), RepositoryError> {
        let mut carts = self.carts.write().await;
        carts.remove(&owner.0);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryQuoteRepository {
    quotes: RwLock<HashMap<String, Quote>>,
}

impl InMemoryQuoteRepository {
    async fn remove_for_dossier(&self, dossier_id: &DossierId) {
        let mut quotes = self.quotes.write().await;
        quotes.retain(|_, quote| &quote.dossier_id != dossier_id);
    }
}

#[async_trait::async_trait]
impl QuoteRepository for InMemoryQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.get(&id.0).cloned())
    }

    async fn list(&self, filter: &QuoteFilter) -> Result<Vec<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        let mut listed: Vec<Quote> =
            quotes.values().filter(|quote| filter.matches(quote)).cloned().collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(listed)
    }

    async fn insert(&self, quote: &Quote) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        if quotes.contains_key(&quote.id.0) {
            return Err(RepositoryError::Duplicate { resource: "quote", id: quote.id.0.clone() });
        }
        quotes.insert(quote.id.0.clone(), quote.clone());
        Ok(())
    }

    async fn compare_and_set_status(
        &self,
        next: &Quote,
        expected: QuoteStatus,
    ) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        match quotes.get_mut(&next.id.0) {
            Some(stored) if stored.status == expected => {
                *stored = next.clone();
                Ok(())
            }
            _ => Err(RepositoryError::Conflict(format!("quote {}", next.id))),
        }
    }
}

#[derive(Default)]
pub struct InMemoryDossierRepository {
    dossiers: RwLock<HashMap<String, Dossier>>,
    quotes: Option<Arc<InMemoryQuoteRepository>>,
}

impl InMemoryDossierRepository {
    /// Deleting a dossier also removes its quotes from `quotes`.
    pub fn with_quotes(quotes: Arc<InMemoryQuoteRepository>) -> Self {
        Self { dossiers: RwLock::default(), quotes: Some(quotes) }
    }
}

#[async_trait::async_trait]
impl DossierRepository for InMemoryDossierRepository {
    async fn find_by_id(&self, id: &DossierId) -> Result<Option<Dossier>, RepositoryError> {
        let dossiers = self.dossiers.read().await;
        Ok(dossiers.get(&id.0).cloned())
    }

    async fn list(&self, client: Option<&ActorId>) -> Result<Vec<Dossier>, RepositoryError> {
        let dossiers = self.dossiers.read().await;
        let mut listed: Vec<Dossier> = dossiers
            .values()
            .filter(|dossier| client.map_or(true, |client| &dossier.client_id == client))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(listed)
    }

    async fn save(&self, dossier: &Dossier) -> Result<(), RepositoryError> {
        let mut dossiers = self.dossiers.write().await;
        let comments =
            dossiers.get(&dossier.id.0).map(|stored| stored.comments.clone()).unwrap_or_default();
        let mut row = dossier.clone();
        row.comments = comments;
        dossiers.insert(row.id.0.clone(), row);
        Ok(())
    }

    async fn add_comment(&self, comment: &Comment) -> Result<(), RepositoryError> {
        let mut dossiers = self.dossiers.write().await;
        let dossier = dossiers.get_mut(&comment.dossier_id.0).ok_or_else(|| {
            RepositoryError::Decode(format!("dossier {} does not exist", comment.dossier_id))
        })?;
        dossier.comments.push(comment.clone());
        dossier.updated_at = comment.created_at;
        Ok(())
    }

    async fn delete(&self, id: &DossierId) -> Result<bool, RepositoryError> {
        let removed = self.dossiers.write().await.remove(&id.0).is_some();
        if removed {
            if let Some(quotes) = &self.quotes {
                quotes.remove_for_dossier(id).await;
            }
        }
        Ok(removed)
    }
}

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    notifications: RwLock<HashMap<String, Notification>>,
}

#[async_trait::async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn insert(&self, notification: &Notification) -> Result<(), RepositoryError> {
        let mut notifications = self.notifications.write().await;
        notifications.insert(notification.id.0.clone(), notification.clone());
        Ok(())
    }

    async fn list_for(&self, target: &ActorId) -> Result<Vec<Notification>, RepositoryError> {
        let notifications = self.notifications.read().await;
        let mut listed: Vec<Notification> = notifications
            .values()
            .filter(|notification| &notification.target_user_id == target)
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.0.cmp(&a.id.0)));
        Ok(listed)
    }

    async fn mark_read(
        &self,
        target: &ActorId,
        id: &NotificationId,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut notifications = self.notifications.write().await;
        match notifications.get_mut(&id.0) {
            Some(notification) if &notification.target_user_id == target && !notification.read => {
                notification.read = true;
                notification.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_read(
        &self,
        target: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut notifications = self.notifications.write().await;
        let mut changed = 0;
        for notification in notifications
            .values_mut()
            .filter(|notification| &notification.target_user_id == target && !notification.read)
        {
            notification.read = true;
            notification.updated_at = now;
            changed += 1;
        }
        Ok(changed)
    }
}

#[derive(Default)]
pub struct InMemoryCredentialRepository {
    credentials: RwLock<HashMap<String, Credential>>,
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

#[async_trait::async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, RepositoryError> {
        let credentials = self.credentials.read().await;
        Ok(credentials.values().find(|credential| credential.email == email).cloned())
    }

    async fn find_by_actor(&self, actor: &ActorId) -> Result<Option<Credential>, RepositoryError> {
        let credentials = self.credentials.read().await;
        Ok(credentials.get(&actor.0).cloned())
    }

    async fn insert(&self, credential: &Credential) -> Result<(), RepositoryError> {
        let mut credentials = self.credentials.write().await;
        let taken = credentials.contains_key(&credential.actor_id.0)
            || credentials.values().any(|stored| stored.email == credential.email);
        if taken {
            return Err(RepositoryError::Duplicate {
                resource: "credential",
                id: credential.email.clone(),
            });
        }
        credentials.insert(credential.actor_id.0.clone(), credential.clone());
        Ok(())
    }

    async fn confirm_email(&self, actor: &ActorId) -> Result<bool, RepositoryError> {
        let mut credentials = self.credentials.write().await;
        Ok(credentials
            .get_mut(&actor.0)
            .map(|credential| {
                credential.email_confirmed = true;
            })
            .is_some())
    }

    async fn insert_session(&self, session: &SessionRecord) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(token).is_some())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use quoteflow_core::domain::actor::{ActorId, ActorRef};
    use quoteflow_core::domain::dossier::{Dossier, DossierId};
    use quoteflow_core::domain::notification::{NewNotification, NotificationKind};
    use quoteflow_core::domain::offer::OfferId;
    use quoteflow_core::domain::quote::{Quote, QuoteDraft, QuoteId, QuoteLine, QuoteStatus};

    use crate::repositories::{
        DossierRepository, InMemoryDossierRepository, InMemoryNotificationRepository,
        InMemoryQuoteRepository, NotificationRepository, QuoteFilter, QuoteRepository,
        RepositoryError,
    };

    fn client() -> ActorRef {
        ActorRef { user_id: ActorId("C1".to_string()), user_name: "Ada".to_string() }
    }

    fn quote(id: &str, dossier: &str) -> Quote {
        Quote::draft(
            QuoteDraft {
                id: QuoteId(id.to_string()),
                dossier_id: DossierId(dossier.to_string()),
                client: client(),
                agent: None,
                items: vec![QuoteLine {
                    offer_id: OfferId("fiber-pro".to_string()),
                    offer_title: "Fiber Pro".to_string(),
                    unit_price: Decimal::new(100, 0),
                    quantity: 2,
                }],
                bank_details: None,
                created_by: client(),
            },
            Utc::now(),
        )
        .expect("valid draft")
    }

    #[tokio::test]
    async fn compare_and_set_rejects_stale_status() {
        let repo = InMemoryQuoteRepository::default();
        let draft = quote("Q-1", "DOS-1");
        repo.insert(&draft).await.expect("insert");

        let mut pending = draft.clone();
        pending.status = QuoteStatus::Pending;
        repo.compare_and_set_status(&pending, QuoteStatus::Draft).await.expect("first writer");

        let mut racing = draft;
        racing.status = QuoteStatus::PendingAdmin;
        let error = repo
            .compare_and_set_status(&racing, QuoteStatus::Draft)
            .await
            .expect_err("second writer sees a changed status");
        assert!(matches!(error, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn duplicate_quote_insert_is_refused() {
        let repo = InMemoryQuoteRepository::default();
        repo.insert(&quote("Q-1", "DOS-1")).await.expect("insert");
        assert!(matches!(
            repo.insert(&quote("Q-1", "DOS-1")).await,
            Err(RepositoryError::Duplicate { .. })
        ));
    }

    #[tokio::test]
    async fn deleting_a_dossier_cascades_to_its_quotes() {
        let quotes = Arc::new(InMemoryQuoteRepository::default());
        let dossiers = InMemoryDossierRepository::with_quotes(quotes.clone());
        let dossier = Dossier::open(
            DossierId("DOS-1".to_string()),
            ActorId("C1".to_string()),
            None,
            "Office move",
            None,
            Utc::now(),
        )
        .expect("dossier");
        dossiers.save(&dossier).await.expect("save");
        quotes.insert(&quote("Q-1", "DOS-1")).await.expect("quote in dossier");
        quotes.insert(&quote("Q-2", "DOS-2")).await.expect("quote elsewhere");

        assert!(dossiers.delete(&dossier.id).await.expect("delete"));
        let remaining = quotes.list(&QuoteFilter::default()).await.expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id.0, "Q-2");
        assert!(!dossiers.delete(&dossier.id).await.expect("second delete"));
    }

    #[tokio::test]
    async fn notifications_list_newest_first_and_mark_read_is_scoped() {
        let repo = InMemoryNotificationRepository::default();
        let target = ActorId("C1".to_string());
        let now = Utc::now();

        let older = NewNotification::new(target.clone(), "older", NotificationKind::Info)
            .into_notification(now - Duration::minutes(5));
        let newer = NewNotification::new(target.clone(), "newer", NotificationKind::Success)
            .into_notification(now);
        repo.insert(&older).await.expect("insert older");
        repo.insert(&newer).await.expect("insert newer");

        let listed = repo.list_for(&target).await.expect("list");
        assert_eq!(listed[0].message, "newer");

        let stranger = ActorId("C2".to_string());
        assert!(!repo.mark_read(&stranger, &older.id, now).await.expect("foreign mark"));
        assert!(repo.mark_read(&target, &older.id, now).await.expect("own mark"));
        assert_eq!(repo.mark_all_read(&target, now).await.expect("mark all"), 1);
    }
}
