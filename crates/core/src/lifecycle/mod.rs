pub mod engine;
pub mod states;

pub use engine::{transition, LifecycleError, QuoteLifecycle};
pub use states::{NotificationIntent, QuoteEvent, Recipient, TransitionOutcome};
