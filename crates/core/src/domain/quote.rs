use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::actor::{ActorId, ActorRef};
use crate::domain::dossier::DossierId;
use crate::domain::offer::OfferId;
use crate::errors::DomainError;
use crate::pricing::QuoteTotals;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuoteId(pub String);

impl QuoteId {
    pub fn generate() -> Self {
        Self(format!("Q-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Pending,
    PendingAdmin,
    Approved,
    Signed,
    Rejected,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::PendingAdmin => "pending_admin",
            Self::Approved => "approved",
            Self::Signed => "signed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "pending_admin" => Some(Self::PendingAdmin),
            "approved" => Some(Self::Approved),
            "signed" => Some(Self::Signed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Signed | Self::Rejected)
    }

    pub fn awaiting_review(&self) -> bool {
        matches!(self, Self::Pending | Self::PendingAdmin)
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priced line, snapshotted from the cart at checkout. Never re-priced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub offer_id: OfferId,
    pub offer_title: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl QuoteLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    pub bank_name: String,
    pub iban: String,
    pub bic: String,
}

impl BankDetails {
    /// Returns the normalized form: IBAN and BIC upper-cased with spaces removed.
    pub fn validate(&self) -> Result<Self, DomainError> {
        let bank_name = self.bank_name.trim();
        if bank_name.is_empty() {
            return Err(DomainError::Validation("bank name is required".to_string()));
        }

        let iban: String =
            self.iban.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase();
        let iban_shape_ok = (15..=34).contains(&iban.len())
            && iban.chars().all(|c| c.is_ascii_alphanumeric())
            && iban.chars().take(2).all(|c| c.is_ascii_alphabetic());
        if !iban_shape_ok {
            return Err(DomainError::Validation(
                "IBAN must be 15 to 34 alphanumeric characters starting with a country code"
                    .to_string(),
            ));
        }

        let bic: String =
            self.bic.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase();
        let bic_shape_ok =
            matches!(bic.len(), 8 | 11) && bic.chars().all(|c| c.is_ascii_alphanumeric());
        if !bic_shape_ok {
            return Err(DomainError::Validation(
                "BIC must be 8 or 11 alphanumeric characters".to_string(),
            ));
        }

        Ok(Self { bank_name: bank_name.to_string(), iban, bic })
    }
}

/// Input for a quote built at checkout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuoteDraft {
    pub id: QuoteId,
    pub dossier_id: DossierId,
    pub client: ActorRef,
    pub agent: Option<ActorRef>,
    pub items: Vec<QuoteLine>,
    pub bank_details: Option<BankDetails>,
    pub created_by: ActorRef,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub dossier_id: DossierId,
    pub client_id: ActorId,
    pub client_name: String,
    pub agent_id: Option<ActorId>,
    pub agent_name: Option<String>,
    pub items: Vec<QuoteLine>,
    pub total_price: Decimal,
    pub status: QuoteStatus,
    pub bank_details: Option<BankDetails>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub signed_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub last_updated_by: ActorRef,
}

impl Quote {
    /// Builds a `draft` quote whose total is fixed from the line snapshots.
    pub fn draft(input: QuoteDraft, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if input.items.is_empty() {
            return Err(DomainError::Validation("a quote needs at least one item".to_string()));
        }
        if let Some(line) = input.items.iter().find(|line| line.quantity == 0) {
            return Err(DomainError::Validation(format!(
                "item `{}` has a zero quantity",
                line.offer_id
            )));
        }
        if let Some(line) = input.items.iter().find(|line| line.unit_price.is_sign_negative()) {
            return Err(DomainError::Validation(format!(
                "item `{}` has a negative price",
                line.offer_id
            )));
        }
        let bank_details = input.bank_details.as_ref().map(BankDetails::validate).transpose()?;
        let total_price = input.items.iter().map(QuoteLine::line_total).sum();

        Ok(Self {
            id: input.id,
            dossier_id: input.dossier_id,
            client_id: input.client.user_id,
            client_name: input.client.user_name,
            agent_id: input.agent.as_ref().map(|agent| agent.user_id.clone()),
            agent_name: input.agent.map(|agent| agent.user_name),
            items: input.items,
            total_price,
            status: QuoteStatus::Draft,
            bank_details,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
            signed_at: None,
            rejected_at: None,
            last_updated_by: input.created_by,
        })
    }

    pub fn computed_total(&self) -> Decimal {
        self.items.iter().map(QuoteLine::line_total).sum()
    }

    pub fn document_availability(&self) -> DocumentAvailability {
        match self.status {
            QuoteStatus::Approved | QuoteStatus::Signed => DocumentAvailability::Available,
            QuoteStatus::Draft => DocumentAvailability::Disabled {
                reason: "The quote has not been submitted yet.".to_string(),
            },
            QuoteStatus::Pending | QuoteStatus::PendingAdmin => DocumentAvailability::Disabled {
                reason: "The quote is awaiting administrator approval.".to_string(),
            },
            QuoteStatus::Rejected => DocumentAvailability::Disabled {
                reason: "The quote was rejected and cannot be printed.".to_string(),
            },
        }
    }
}

/// Whether the printable document may be produced. Disabled states carry the reason shown
/// next to the greyed-out action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DocumentAvailability {
    Available,
    Disabled { reason: String },
}

impl DocumentAvailability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// Produces the printable quote. No renderer ships with the platform; deployments plug one in.
pub trait QuoteDocumentRenderer: Send + Sync {
    fn content_type(&self) -> &'static str;
    fn render(&self, quote: &Quote, totals: &QuoteTotals) -> Result<Vec<u8>, DomainError>;
}
