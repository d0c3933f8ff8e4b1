//! Password sign-in backed by the `credentials` and `sessions` tables.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::SecretString;
use tracing::{info, warn};

use quoteflow_core::config::AuthConfig;
use quoteflow_core::domain::actor::{Actor, ActorId};
use quoteflow_core::session::{
    generate_salt, generate_token, hash_password, verify_password, AuthError, AuthProvider,
    Session, SessionToken, SignInResult, SignUp,
};

use crate::repositories::{
    Credential, CredentialRepository, ProfileRepository, Repositories, RepositoryError,
    SessionRecord,
};

impl From<RepositoryError> for AuthError {
    fn from(value: RepositoryError) -> Self {
        Self::Backend(value.to_string())
    }
}

#[derive(Clone)]
pub struct LocalAuthProvider {
    profiles: Arc<dyn ProfileRepository>,
    credentials: Arc<dyn CredentialRepository>,
    pepper: SecretString,
    session_ttl: Duration,
    require_email_confirmation: bool,
}

impl LocalAuthProvider {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        credentials: Arc<dyn CredentialRepository>,
        config: &AuthConfig,
    ) -> Self {
        let ttl_secs = i64::try_from(config.session_ttl_secs).unwrap_or(i64::MAX / 1_000);
        Self {
            profiles,
            credentials,
            pepper: config.signing_pepper.clone(),
            session_ttl: Duration::seconds(ttl_secs),
            require_email_confirmation: config.require_email_confirmation,
        }
    }

    pub fn from_repositories(repositories: &Repositories, config: &AuthConfig) -> Self {
        Self::new(repositories.profiles.clone(), repositories.credentials.clone(), config)
    }

    pub async fn confirm_email(&self, actor: &ActorId) -> Result<bool, AuthError> {
        Ok(self.credentials.confirm_email(actor).await?)
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn sign_up(&self, request: SignUp) -> Result<Actor, AuthError> {
        let request = request.normalized()?;
        if self.credentials.find_by_email(&request.email).await?.is_some() {
            return Err(AuthError::EmailTaken(request.email));
        }

        let now = Utc::now();
        let mut actor =
            Actor::register(ActorId::generate(), &request.display_name, &request.email, now);
        actor.company = request.company.filter(|value| !value.trim().is_empty());
        actor.phone = request.phone.filter(|value| !value.trim().is_empty());

        match self.profiles.save(actor.clone()).await {
            Ok(()) => {}
            Err(RepositoryError::Duplicate { .. }) => {
                return Err(AuthError::EmailTaken(request.email));
            }
            Err(error) => return Err(error.into()),
        }

        let salt = generate_salt();
        let credential = Credential {
            actor_id: actor.id.clone(),
            email: request.email.clone(),
            password_digest: hash_password(&salt, &self.pepper, &request.password),
            salt,
            email_confirmed: !self.require_email_confirmation,
            created_at: now,
        };
        match self.credentials.insert(&credential).await {
            Ok(()) => {}
            Err(RepositoryError::Duplicate { .. }) => {
                return Err(AuthError::EmailTaken(request.email));
            }
            Err(error) => return Err(error.into()),
        }

        info!(
            event_name = "auth.sign_up",
            correlation_id = "auth",
            actor_id = %actor.id,
            "actor registered"
        );
        Ok(actor)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInResult, AuthError> {
        let email = email.trim().to_ascii_lowercase();
        let Some(credential) = self.credentials.find_by_email(&email).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(&credential.salt, &self.pepper, password, &credential.password_digest)
        {
            warn!(
                event_name = "auth.sign_in_rejected",
                correlation_id = "auth",
                actor_id = %credential.actor_id,
                "password mismatch"
            );
            return Err(AuthError::InvalidCredentials);
        }
        if self.require_email_confirmation && !credential.email_confirmed {
            return Err(AuthError::EmailNotConfirmed);
        }

        let now = Utc::now();
        let token = generate_token();
        self.credentials
            .insert_session(&SessionRecord {
                token: token.0.clone(),
                actor_id: credential.actor_id.clone(),
                created_at: now,
                expires_at: now + self.session_ttl,
            })
            .await?;

        info!(
            event_name = "auth.sign_in",
            correlation_id = "auth",
            actor_id = %credential.actor_id,
            "session opened"
        );
        Ok(SignInResult {
            actor_id: credential.actor_id,
            session_token: token,
            email_confirmed: credential.email_confirmed,
        })
    }

    async fn sign_out(&self, token: &SessionToken) -> Result<(), AuthError> {
        self.credentials.delete_session(token.as_str()).await?;
        Ok(())
    }

    async fn resolve(&self, token: &SessionToken) -> Result<Session, AuthError> {
        let Some(record) = self.credentials.find_session(token.as_str()).await? else {
            return Err(AuthError::UnknownSession);
        };
        if Utc::now() >= record.expires_at {
            self.credentials.delete_session(token.as_str()).await?;
            return Err(AuthError::SessionExpired);
        }

        let Some(actor) = self.profiles.find_by_id(&record.actor_id).await? else {
            return Err(AuthError::UnknownSession);
        };
        let email_confirmed = self
            .credentials
            .find_by_actor(&actor.id)
            .await?
            .map(|credential| credential.email_confirmed)
            .unwrap_or(false);

        Ok(Session { actor, token: token.clone(), email_confirmed, expires_at: record.expires_at })
    }
}
