//! Sessions and the authentication provider contract.
//!
//! A [`Session`] is an explicit value resolved from a bearer token on every call; nothing
//! about the current actor is kept in ambient state.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::access::AccessError;
use crate::domain::actor::{Actor, ActorId};
use crate::errors::{ApplicationError, DomainError};

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub String);

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "SessionToken({prefix}…)")
    }
}

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub actor: Actor,
    pub token: SessionToken,
    pub email_confirmed: bool,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub display_name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl SignUp {
    pub const MIN_PASSWORD_LEN: usize = 8;

    /// Trims and lower-cases the email, rejects obviously malformed input.
    pub fn normalized(mut self) -> Result<Self, AuthError> {
        self.email = self.email.trim().to_ascii_lowercase();
        self.display_name = self.display_name.trim().to_string();

        let well_formed = self
            .email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !well_formed {
            return Err(AuthError::Validation(format!("`{}` is not a valid email", self.email)));
        }
        if self.display_name.is_empty() {
            return Err(AuthError::Validation("display name is required".to_string()));
        }
        if self.password.chars().count() < Self::MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "password must have at least {} characters",
                Self::MIN_PASSWORD_LEN
            )));
        }
        Ok(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SignInResult {
    pub actor_id: ActorId,
    pub session_token: SessionToken,
    pub email_confirmed: bool,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("an account already exists for `{0}`")]
    EmailTaken(String),
    #[error("email address is not confirmed")]
    EmailNotConfirmed,
    #[error("session is unknown or signed out")]
    UnknownSession,
    #[error("session expired")]
    SessionExpired,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("auth backend failure: {0}")]
    Backend(String),
}

impl From<AuthError> for ApplicationError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials | AuthError::UnknownSession | AuthError::SessionExpired => {
                Self::from(AccessError::Unauthenticated)
            }
            AuthError::EmailTaken(email) => Self::Conflict(format!("account `{email}`")),
            AuthError::EmailNotConfirmed | AuthError::Validation(_) => {
                Self::Domain(DomainError::Validation(value.to_string()))
            }
            AuthError::Backend(message) => Self::Persistence(message),
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, request: SignUp) -> Result<Actor, AuthError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInResult, AuthError>;
    async fn sign_out(&self, token: &SessionToken) -> Result<(), AuthError>;
    async fn resolve(&self, token: &SessionToken) -> Result<Session, AuthError>;
}

/// Hex SHA-256 of `salt || pepper || password`.
pub fn hash_password(salt: &str, pepper: &SecretString, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(pepper.expose_secret().as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn verify_password(salt: &str, pepper: &SecretString, password: &str, digest: &str) -> bool {
    let computed = hash_password(salt, pepper, password);
    computed.len() == digest.len()
        && computed.bytes().zip(digest.bytes()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

pub fn generate_salt() -> String {
    random_hex::<16>()
}

pub fn generate_token() -> SessionToken {
    SessionToken(random_hex::<32>())
}

fn random_hex<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use secrecy::SecretString;

    use crate::domain::actor::{Actor, ActorId};
    use crate::errors::ApplicationError;

    use super::{
        generate_salt, generate_token, hash_password, verify_password, AuthError, Session,
        SignUp,
    };

    fn sign_up(email: &str, password: &str) -> SignUp {
        SignUp {
            email: email.to_string(),
            password: password.to_string(),
            display_name: "Ada".to_string(),
            company: None,
            phone: None,
        }
    }

    #[test]
    fn digest_depends_on_salt_and_pepper() {
        let pepper = SecretString::from("pepper-pepper-pepper".to_string());
        let salt = generate_salt();
        let digest = hash_password(&salt, &pepper, "correct horse");

        assert!(verify_password(&salt, &pepper, "correct horse", &digest));
        assert!(!verify_password(&salt, &pepper, "wrong horse", &digest));
        assert!(!verify_password(&generate_salt(), &pepper, "correct horse", &digest));

        let other_pepper = SecretString::from("another-pepper-value".to_string());
        assert!(!verify_password(&salt, &other_pepper, "correct horse", &digest));
    }

    #[test]
    fn tokens_are_unique_and_redacted_in_debug() {
        let first = generate_token();
        let second = generate_token();
        assert_ne!(first, second);
        assert_eq!(first.as_str().len(), 64);
        assert!(!format!("{first:?}").contains(first.as_str()));
    }

    #[test]
    fn sign_up_normalizes_email_and_checks_password() {
        let normalized = sign_up("  Ada@Example.COM ", "longenough").normalized().expect("valid");
        assert_eq!(normalized.email, "ada@example.com");

        assert!(matches!(
            sign_up("not-an-email", "longenough").normalized(),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            sign_up("ada@example.com", "short").normalized(),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn session_expiry_is_inclusive() {
        let now = Utc::now();
        let session = Session {
            actor: Actor::register(ActorId("C1".into()), "Ada", "ada@example.com", now),
            token: generate_token(),
            email_confirmed: true,
            expires_at: now + Duration::minutes(5),
        };
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + Duration::minutes(5)));
    }

    #[test]
    fn auth_failures_map_to_application_errors() {
        assert_eq!(
            ApplicationError::from(AuthError::SessionExpired)
                .into_interface("r")
                .http_status(),
            401
        );
        assert_eq!(
            ApplicationError::from(AuthError::EmailTaken("a@b.c".into()))
                .into_interface("r")
                .http_status(),
            409
        );
    }
}
