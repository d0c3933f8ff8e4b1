pub mod auth;
pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use auth::LocalAuthProvider;
pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoSeed, SeedResult};
pub use repositories::{RepositoryError, Repositories};
