use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Gate;
use crate::domain::actor::{Actor, ActorId, Role};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DossierId(pub String);

impl DossierId {
    pub fn generate() -> Self {
        Self(format!("DOS-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for DossierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommentId(pub String);

impl CommentId {
    pub fn generate() -> Self {
        Self(format!("CMT-{}", Uuid::new_v4().simple()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DossierStatus {
    New,
    InProgress,
    Completed,
    Cancelled,
}

impl DossierStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "new" => Some(Self::New),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for DossierStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only remark on a dossier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub dossier_id: DossierId,
    pub author_id: ActorId,
    pub author_role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dossier {
    pub id: DossierId,
    pub client_id: ActorId,
    pub agent_id: Option<ActorId>,
    pub title: String,
    pub description: Option<String>,
    pub status: DossierStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comments: Vec<Comment>,
}

impl Dossier {
    pub fn open(
        id: DossierId,
        client_id: ActorId,
        agent_id: Option<ActorId>,
        title: impl Into<String>,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(DomainError::Validation("dossier title is required".to_string()));
        }

        Ok(Self {
            id,
            client_id,
            agent_id,
            title,
            description: description.filter(|text| !text.trim().is_empty()),
            status: DossierStatus::New,
            created_at: now,
            updated_at: now,
            comments: Vec::new(),
        })
    }

    /// Any target status is accepted. Returns `false` when the status was already `next`.
    pub fn set_status(
        &mut self,
        actor: &Actor,
        next: DossierStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        Gate::UpdateDossierStatus.check(Some(actor))?;
        if self.status == next {
            return Ok(false);
        }
        self.status = next;
        self.updated_at = now;
        Ok(true)
    }

    /// Appends a comment; bumps `updated_at` and leaves the status untouched.
    pub fn add_comment(
        &mut self,
        author: &Actor,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment, DomainError> {
        Gate::CommentDossier.check_owned(Some(author), &self.client_id)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::Validation("comment text is required".to_string()));
        }

        let comment = Comment {
            id: CommentId::generate(),
            dossier_id: self.id.clone(),
            author_id: author.id.clone(),
            author_role: author.role,
            text: text.to_string(),
            created_at: now,
        };
        self.comments.push(comment.clone());
        self.updated_at = now;
        Ok(comment)
    }
}
