use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use quoteflow_core::domain::actor::{Actor, ActorId, Role};
use quoteflow_core::domain::cart::Cart;
use quoteflow_core::domain::dossier::{Comment, Dossier, DossierId};
use quoteflow_core::domain::notification::{Notification, NotificationId};
use quoteflow_core::domain::offer::{Offer, OfferId};
use quoteflow_core::domain::quote::{Quote, QuoteId, QuoteStatus};
use quoteflow_core::errors::ApplicationError;

use crate::DbPool;

pub mod cart;
pub mod credential;
pub mod dossier;
pub mod memory;
pub mod notification;
pub mod offer;
pub mod profile;
pub mod quote;

pub use cart::SqlCartRepository;
pub use credential::SqlCredentialRepository;
pub use dossier::SqlDossierRepository;
pub use memory::{
    InMemoryCartRepository, InMemoryCredentialRepository, InMemoryDossierRepository,
    InMemoryNotificationRepository, InMemoryOfferRepository, InMemoryProfileRepository,
    InMemoryQuoteRepository,
};
pub use notification::SqlNotificationRepository;
pub use offer::SqlOfferRepository;
pub use profile::SqlProfileRepository;
pub use quote::SqlQuoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{0} changed concurrently")]
    Conflict(String),
    #[error("{resource} `{id}` already exists")]
    Duplicate { resource: &'static str, id: String },
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(subject) => Self::Conflict(subject),
            RepositoryError::Duplicate { resource, id } => {
                Self::Conflict(format!("{resource} `{id}`"))
            }
            other => Self::Persistence(other.to_string()),
        }
    }
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_id(&self, id: &ActorId) -> Result<Option<Actor>, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Actor>, RepositoryError>;
    /// Ordered by display name. `None` lists every role.
    async fn list(&self, role: Option<Role>) -> Result<Vec<Actor>, RepositoryError>;
    async fn save(&self, actor: Actor) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait OfferRepository: Send + Sync {
    async fn find_by_id(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError>;
    async fn list_active(&self) -> Result<Vec<Offer>, RepositoryError>;
    async fn save(&self, offer: Offer) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn load(&self, owner: &ActorId) -> Result<Option<Cart>, RepositoryError>;
    async fn save(&self, cart: Cart) -> Result<(), RepositoryError>;
    async fn clear(&self, owner: &ActorId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait DossierRepository: Send + Sync {
    /// Loads the dossier with its comments in chronological order.
    async fn find_by_id(&self, id: &DossierId) -> Result<Option<Dossier>, RepositoryError>;
    /// Newest first. `client` restricts the listing to one client's dossiers.
    async fn list(&self, client: Option<&ActorId>) -> Result<Vec<Dossier>, RepositoryError>;
    /// Upserts the dossier row; comments are written through `add_comment`.
    async fn save(&self, dossier: &Dossier) -> Result<(), RepositoryError>;
    async fn add_comment(&self, comment: &Comment) -> Result<(), RepositoryError>;
    /// Removes the dossier together with its comments and quotes.
    async fn delete(&self, id: &DossierId) -> Result<bool, RepositoryError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuoteFilter {
    pub client_id: Option<ActorId>,
    pub status: Option<QuoteStatus>,
    pub dossier_id: Option<DossierId>,
}

impl QuoteFilter {
    pub fn matches(&self, quote: &Quote) -> bool {
        self.client_id.as_ref().map_or(true, |id| &quote.client_id == id)
            && self.status.map_or(true, |status| quote.status == status)
            && self.dossier_id.as_ref().map_or(true, |id| &quote.dossier_id == id)
    }
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    /// Newest first.
    async fn list(&self, filter: &QuoteFilter) -> Result<Vec<Quote>, RepositoryError>;
    /// Writes the quote and its items atomically. Fails with `Duplicate` for a known id.
    async fn insert(&self, quote: &Quote) -> Result<(), RepositoryError>;
    /// Persists `next` only while the stored status still equals `expected`.
    async fn compare_and_set_status(
        &self,
        next: &Quote,
        expected: QuoteStatus,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &Notification) -> Result<(), RepositoryError>;
    /// Newest first.
    async fn list_for(&self, target: &ActorId) -> Result<Vec<Notification>, RepositoryError>;
    async fn mark_read(
        &self,
        target: &ActorId,
        id: &NotificationId,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
    async fn mark_all_read(
        &self,
        target: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}

/// Stored login material for one actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    pub actor_id: ActorId,
    pub email: String,
    pub salt: String,
    pub password_digest: String,
    pub email_confirmed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: String,
    pub actor_id: ActorId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, RepositoryError>;
    async fn find_by_actor(&self, actor: &ActorId) -> Result<Option<Credential>, RepositoryError>;
    async fn insert(&self, credential: &Credential) -> Result<(), RepositoryError>;
    async fn confirm_email(&self, actor: &ActorId) -> Result<bool, RepositoryError>;
    async fn insert_session(&self, session: &SessionRecord) -> Result<(), RepositoryError>;
    async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>, RepositoryError>;
    async fn delete_session(&self, token: &str) -> Result<bool, RepositoryError>;
}

/// One handle per resource, shared by the services.
#[derive(Clone)]
pub struct Repositories {
    pub profiles: Arc<dyn ProfileRepository>,
    pub offers: Arc<dyn OfferRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub dossiers: Arc<dyn DossierRepository>,
    pub quotes: Arc<dyn QuoteRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub credentials: Arc<dyn CredentialRepository>,
}

impl Repositories {
    pub fn sqlite(pool: DbPool) -> Self {
        Self {
            profiles: Arc::new(SqlProfileRepository::new(pool.clone())),
            offers: Arc::new(SqlOfferRepository::new(pool.clone())),
            carts: Arc::new(SqlCartRepository::new(pool.clone())),
            dossiers: Arc::new(SqlDossierRepository::new(pool.clone())),
            quotes: Arc::new(SqlQuoteRepository::new(pool.clone())),
            notifications: Arc::new(SqlNotificationRepository::new(pool.clone())),
            credentials: Arc::new(SqlCredentialRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        let quotes = Arc::new(InMemoryQuoteRepository::default());
        Self {
            profiles: Arc::new(InMemoryProfileRepository::default()),
            offers: Arc::new(InMemoryOfferRepository::default()),
            carts: Arc::new(InMemoryCartRepository::default()),
            dossiers: Arc::new(InMemoryDossierRepository::with_quotes(quotes.clone())),
            quotes,
            notifications: Arc::new(InMemoryNotificationRepository::default()),
            credentials: Arc::new(InMemoryCredentialRepository::default()),
        }
    }
}

pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{field}: {error}")))
}

pub(crate) fn parse_optional_timestamp(
    field: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|value| parse_timestamp(field, &value)).transpose()
}

pub(crate) fn parse_decimal(
    field: &str,
    value: &str,
) -> Result<rust_decimal::Decimal, RepositoryError> {
    value
        .parse::<rust_decimal::Decimal>()
        .map_err(|error| RepositoryError::Decode(format!("{field}: {error}")))
}

pub(crate) fn decode<T>(result: Result<T, sqlx::Error>) -> Result<T, RepositoryError> {
    result.map_err(|error| RepositoryError::Decode(error.to_string()))
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    error.as_database_error().is_some_and(|db_error| db_error.is_unique_violation())
}
