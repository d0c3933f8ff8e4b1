pub mod access;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod pricing;
pub mod session;

pub use access::{can_access_resource, has_access, AccessError, Gate};
pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use domain::actor::{Actor, ActorId, ActorRef, Role};
pub use domain::cart::{Cart, CartLine};
pub use domain::dossier::{Comment, CommentId, Dossier, DossierId, DossierStatus};
pub use domain::notification::{
    NewNotification, Notification, NotificationFeed, NotificationId, NotificationKind,
};
pub use domain::offer::{Offer, OfferId};
pub use domain::quote::{BankDetails, Quote, QuoteDraft, QuoteId, QuoteLine, QuoteStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use lifecycle::{QuoteEvent, QuoteLifecycle, TransitionOutcome};
pub use session::{AuthError, AuthProvider, Session, SessionToken, SignInResult, SignUp};
