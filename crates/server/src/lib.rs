pub mod api;
pub mod bootstrap;
pub mod guard;
pub mod health;
pub mod services;

pub use api::{router, AppState};
pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};
pub use guard::ServiceGuard;
pub use services::AppServices;
