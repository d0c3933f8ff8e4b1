use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

use quoteflow_core::domain::actor::{Actor, Role};
use quoteflow_core::domain::offer::{Offer, OfferId};
use quoteflow_core::session::{AuthError, AuthProvider, SignUp};

use crate::auth::LocalAuthProvider;
use crate::repositories::{Repositories, RepositoryError};

/// Password shared by every demo account.
pub const DEMO_PASSWORD: &str = "quoteflow-demo";

struct DemoActor {
    email: &'static str,
    display_name: &'static str,
    company: Option<&'static str>,
    role: Role,
}

const DEMO_ACTORS: &[DemoActor] = &[
    DemoActor {
        email: "admin@quoteflow.test",
        display_name: "Alice Admin",
        company: None,
        role: Role::Admin,
    },
    DemoActor {
        email: "agent@quoteflow.test",
        display_name: "Gabriel Agent",
        company: None,
        role: Role::Agent,
    },
    DemoActor {
        email: "client@quoteflow.test",
        display_name: "Chloe Client",
        company: Some("Northwind Logistics"),
        role: Role::Client,
    },
];

struct DemoOffer {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    /// Minor units (cents).
    monthly_price: i64,
    setup_fee: i64,
    category: &'static str,
    active: bool,
}

const DEMO_OFFERS: &[DemoOffer] = &[
    DemoOffer {
        id: "fiber-pro-1g",
        name: "Fiber Pro 1 Gb/s",
        description: "Symmetric business fiber with 4h repair commitment",
        monthly_price: 10_000,
        setup_fee: 25_000,
        category: "internet",
        active: true,
    },
    DemoOffer {
        id: "fiber-backup-4g",
        name: "4G Backup Link",
        description: "Automatic failover when the primary link drops",
        monthly_price: 2_990,
        setup_fee: 0,
        category: "internet",
        active: true,
    },
    DemoOffer {
        id: "voip-line",
        name: "VoIP Line",
        description: "One SIP line with unlimited national calls",
        monthly_price: 5_000,
        setup_fee: 0,
        category: "telephony",
        active: true,
    },
    DemoOffer {
        id: "pbx-cloud",
        name: "Cloud PBX",
        description: "Hosted switchboard with IVR and call queues",
        monthly_price: 4_500,
        setup_fee: 9_900,
        category: "telephony",
        active: true,
    },
    DemoOffer {
        id: "adsl-legacy",
        name: "ADSL 20 Mb/s",
        description: "Retired copper access, kept for existing quotes",
        monthly_price: 2_500,
        setup_fee: 0,
        category: "internet",
        active: false,
    },
];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    pub actors_created: usize,
    pub actors_existing: usize,
    pub offers_upserted: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

/// Demo accounts (one per role) and a small telecom catalog.
pub struct DemoSeed;

impl DemoSeed {
    /// Idempotent: existing accounts are left alone, offers are upserted.
    pub async fn load(
        repositories: &Repositories,
        auth: &LocalAuthProvider,
    ) -> Result<SeedResult, RepositoryError> {
        let mut result = SeedResult::default();

        for demo in DEMO_ACTORS {
            if repositories.profiles.find_by_email(demo.email).await?.is_some() {
                result.actors_existing += 1;
                continue;
            }

            let actor = auth
                .sign_up(SignUp {
                    email: demo.email.to_string(),
                    password: DEMO_PASSWORD.to_string(),
                    display_name: demo.display_name.to_string(),
                    company: demo.company.map(str::to_string),
                    phone: None,
                })
                .await
                .map_err(auth_to_repository)?;
            auth.confirm_email(&actor.id).await.map_err(auth_to_repository)?;
            if demo.role != actor.role {
                repositories.profiles.save(with_role(actor, demo.role)).await?;
            }
            result.actors_created += 1;
        }

        for demo in DEMO_OFFERS {
            repositories.offers.save(demo_offer(demo)).await?;
            result.offers_upserted += 1;
        }

        info!(
            event_name = "db.seed.loaded",
            correlation_id = "seed",
            actors_created = result.actors_created,
            actors_existing = result.actors_existing,
            offers_upserted = result.offers_upserted,
            "demo dataset loaded"
        );
        Ok(result)
    }

    pub async fn verify(repositories: &Repositories) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for demo in DEMO_ACTORS {
            let actor = repositories.profiles.find_by_email(demo.email).await?;
            checks.push((demo.email, actor.is_some_and(|actor| actor.role == demo.role)));
        }

        let active = repositories.offers.list_active().await?;
        for demo in DEMO_OFFERS {
            let listed = active.iter().any(|offer| offer.id.0 == demo.id);
            checks.push((demo.id, listed == demo.active));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

fn with_role(mut actor: Actor, role: Role) -> Actor {
    actor.role = role;
    actor.updated_at = Utc::now();
    actor
}

fn demo_offer(demo: &DemoOffer) -> Offer {
    Offer {
        id: OfferId(demo.id.to_string()),
        name: demo.name.to_string(),
        description: demo.description.to_string(),
        monthly_price: Decimal::new(demo.monthly_price, 2),
        setup_fee: Decimal::new(demo.setup_fee, 2),
        category: demo.category.to_string(),
        active: demo.active,
    }
}

fn auth_to_repository(error: AuthError) -> RepositoryError {
    RepositoryError::Decode(format!("demo account provisioning failed: {error}"))
}
