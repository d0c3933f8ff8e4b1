use std::collections::HashMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use quoteflow_core::domain::actor::{ActorId, ActorRef};
use quoteflow_core::domain::dossier::DossierId;
use quoteflow_core::domain::offer::OfferId;
use quoteflow_core::domain::quote::{BankDetails, Quote, QuoteId, QuoteLine, QuoteStatus};

use super::{
    decode, is_unique_violation, parse_decimal, parse_optional_timestamp, parse_timestamp,
    QuoteFilter, QuoteRepository, RepositoryError,
};
use crate::DbPool;

const QUOTE_COLUMNS: &str = "id, dossier_id, client_id, client_name, agent_id, agent_name, \
     total_price, status, bank_name, iban, bic, rejection_reason, created_at, updated_at, \
     signed_at, rejected_at, last_updated_by_id, last_updated_by_name";

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn attach_items(&self, quotes: &mut [Quote]) -> Result<(), RepositoryError> {
        if quotes.is_empty() {
            return Ok(());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT quote_id, offer_id, offer_title, unit_price, quantity
             FROM quote_items WHERE quote_id IN (",
        );
        let mut ids = query.separated(", ");
        for quote in quotes.iter() {
            ids.push_bind(quote.id.0.clone());
        }
        ids.push_unseparated(") ORDER BY quote_id ASC, position ASC");

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut grouped: HashMap<String, Vec<QuoteLine>> = HashMap::new();
        for row in &rows {
            let quote_id: String = decode(row.try_get("quote_id"))?;
            grouped.entry(quote_id).or_default().push(row_to_line(row)?);
        }
        for quote in quotes.iter_mut() {
            quote.items = grouped.remove(&quote.id.0).unwrap_or_default();
        }
        Ok(())
    }
}

fn row_to_line(row: &SqliteRow) -> Result<QuoteLine, RepositoryError> {
    let unit_price: String = decode(row.try_get("unit_price"))?;
    let quantity: i64 = decode(row.try_get("quantity"))?;
    Ok(QuoteLine {
        offer_id: OfferId(decode(row.try_get("offer_id"))?),
        offer_title: decode(row.try_get("offer_title"))?,
        unit_price: parse_decimal("unit_price", &unit_price)?,
        quantity: u32::try_from(quantity)
            .map_err(|_| RepositoryError::Decode(format!("quantity {quantity}")))?,
    })
}

fn row_to_quote(row: &SqliteRow) -> Result<Quote, RepositoryError> {
    let status: String = decode(row.try_get("status"))?;
    let total_price: String = decode(row.try_get("total_price"))?;
    let agent_id: Option<String> = decode(row.try_get("agent_id"))?;
    let bank_name: Option<String> = decode(row.try_get("bank_name"))?;
    let iban: Option<String> = decode(row.try_get("iban"))?;
    let bic: Option<String> = decode(row.try_get("bic"))?;
    let created_at: String = decode(row.try_get("created_at"))?;
    let updated_at: String = decode(row.try_get("updated_at"))?;

    let bank_details = match (bank_name, iban, bic) {
        (Some(bank_name), Some(iban), Some(bic)) => Some(BankDetails { bank_name, iban, bic }),
        _ => None,
    };

    Ok(Quote {
        id: QuoteId(decode(row.try_get("id"))?),
        dossier_id: DossierId(decode(row.try_get("dossier_id"))?),
        client_id: ActorId(decode(row.try_get("client_id"))?),
        client_name: decode(row.try_get("client_name"))?,
        agent_id: agent_id.map(ActorId),
        agent_name: decode(row.try_get("agent_name"))?,
        items: Vec::new(),
        total_price: parse_decimal("total_price", &total_price)?,
        status: QuoteStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown quote status `{status}`")))?,
        bank_details,
        rejection_reason: decode(row.try_get("rejection_reason"))?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
        signed_at: parse_optional_timestamp("signed_at", decode(row.try_get("signed_at"))?)?,
        rejected_at: parse_optional_timestamp("rejected_at", decode(row.try_get("rejected_at"))?)?,
        last_updated_by: ActorRef {
            user_id: ActorId(decode(row.try_get("last_updated_by_id"))?),
            user_name: decode(row.try_get("last_updated_by_name"))?,
        },
    })
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut quotes = [row_to_quote(&row)?];
        self.attach_items(&mut quotes).await?;
        let [quote] = quotes;
        Ok(Some(quote))
    }

    async fn list(&self, filter: &QuoteFilter) -> Result<Vec<Quote>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes WHERE 1 = 1"
        ));
        if let Some(client_id) = &filter.client_id {
            query.push(" AND client_id = ").push_bind(client_id.0.clone());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(dossier_id) = &filter.dossier_id {
            query.push(" AND dossier_id = ").push_bind(dossier_id.0.clone());
        }
        query.push(" ORDER BY created_at DESC, id ASC");

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut quotes = rows.iter().map(row_to_quote).collect::<Result<Vec<_>, _>>()?;
        self.attach_items(&mut quotes).await?;
        Ok(quotes)
    }

    async fn insert(&self, quote: &Quote) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let bank = quote.bank_details.as_ref();

        let inserted = sqlx::query(
            "INSERT INTO quotes (id, dossier_id, client_id, client_name, agent_id, agent_name,
                                 total_price, status, bank_name, iban, bic, rejection_reason,
                                 created_at, updated_at, signed_at, rejected_at,
                                 last_updated_by_id, last_updated_by_name)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&quote.id.0)
        .bind(&quote.dossier_id.0)
        .bind(&quote.client_id.0)
        .bind(&quote.client_name)
        .bind(quote.agent_id.as_ref().map(|id| id.0.as_str()))
        .bind(&quote.agent_name)
        .bind(quote.total_price.to_string())
        .bind(quote.status.as_str())
        .bind(bank.map(|bank| bank.bank_name.as_str()))
        .bind(bank.map(|bank| bank.iban.as_str()))
        .bind(bank.map(|bank| bank.bic.as_str()))
        .bind(&quote.rejection_reason)
        .bind(quote.created_at.to_rfc3339())
        .bind(quote.updated_at.to_rfc3339())
        .bind(quote.signed_at.map(|at| at.to_rfc3339()))
        .bind(quote.rejected_at.map(|at| at.to_rfc3339()))
        .bind(&quote.last_updated_by.user_id.0)
        .bind(&quote.last_updated_by.user_name)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(error) if is_unique_violation(&error) => {
                return Err(RepositoryError::Duplicate {
                    resource: "quote",
                    id: quote.id.0.clone(),
                });
            }
            Err(error) => return Err(error.into()),
        }

        for (position, line) in quote.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO quote_items (quote_id, position, offer_id, offer_title, unit_price,
                                          quantity)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&quote.id.0)
            .bind(position as i64)
            .bind(&line.offer_id.0)
            .bind(&line.offer_title)
            .bind(line.unit_price.to_string())
            .bind(i64::from(line.quantity))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn compare_and_set_status(
        &self,
        next: &Quote,
        expected: QuoteStatus,
    ) -> Result<(), RepositoryError> {
        let updated = sqlx::query(
            "UPDATE quotes
             SET status = ?, rejection_reason = ?, updated_at = ?, signed_at = ?,
                 rejected_at = ?, last_updated_by_id = ?, last_updated_by_name = ?
             WHERE id = ? AND status = ?",
        )
        .bind(next.status.as_str())
        .bind(&next.rejection_reason)
        .bind(next.updated_at.to_rfc3339())
        .bind(next.signed_at.map(|at| at.to_rfc3339()))
        .bind(next.rejected_at.map(|at| at.to_rfc3339()))
        .bind(&next.last_updated_by.user_id.0)
        .bind(&next.last_updated_by.user_name)
        .bind(&next.id.0)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!("quote {}", next.id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use quoteflow_core::domain::actor::{Actor, ActorId, ActorRef};
    use quoteflow_core::domain::dossier::{Dossier, DossierId};
    use quoteflow_core::domain::offer::OfferId;
    use quoteflow_core::domain::quote::{
        BankDetails, Quote, QuoteDraft, QuoteId, QuoteLine, QuoteStatus,
    };

    use super::SqlQuoteRepository;
    use crate::repositories::{
        DossierRepository, ProfileRepository, QuoteFilter, QuoteRepository, RepositoryError,
        SqlDossierRepository, SqlProfileRepository,
    };
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let client = ActorId("C1".to_string());
        SqlProfileRepository::new(pool.clone())
            .save(Actor::register(client.clone(), "Ada", "ada@acme.test", Utc::now()))
            .await
            .expect("profile");
        for id in ["DOS-1", "DOS-2"] {
            let dossier = Dossier::open(
                DossierId(id.to_string()),
                client.clone(),
                None,
                "Office fit-out",
                None,
                Utc::now(),
            )
            .expect("dossier");
            SqlDossierRepository::new(pool.clone()).save(&dossier).await.expect("save dossier");
        }
        pool
    }

    fn quote(id: &str, dossier: &str, bank: bool) -> Quote {
        let client = ActorRef { user_id: ActorId("C1".into()), user_name: "Ada".into() };
        Quote::draft(
            QuoteDraft {
                id: QuoteId(id.to_string()),
                dossier_id: DossierId(dossier.to_string()),
                client: client.clone(),
                agent: None,
                items: vec![
                    QuoteLine {
                        offer_id: OfferId("a".into()),
                        offer_title: "A".into(),
                        unit_price: Decimal::new(10005, 2),
                        quantity: 2,
                    },
                    QuoteLine {
                        offer_id: OfferId("b".into()),
                        offer_title: "B".into(),
                        unit_price: Decimal::new(50, 0),
                        quantity: 1,
                    },
                ],
                bank_details: bank.then(|| BankDetails {
                    bank_name: "Acme Bank".into(),
                    iban: "FR7630006000011234567890189".into(),
                    bic: "AGRIFRPP".into(),
                }),
                created_by: client,
            },
            Utc::now(),
        )
        .expect("draft")
    }

    #[tokio::test]
    async fn insert_keeps_items_order_and_exact_total() {
        let repo = SqlQuoteRepository::new(setup().await);
        let stored = quote("Q-1", "DOS-1", true);
        repo.insert(&stored).await.expect("insert");

        let loaded = repo.find_by_id(&stored.id).await.expect("find").expect("exists");
        assert_eq!(loaded.items, stored.items);
        assert_eq!(loaded.total_price, Decimal::new(25010, 2));
        assert_eq!(loaded.bank_details, stored.bank_details);
        assert_eq!(loaded.status, QuoteStatus::Draft);

        let error = repo.insert(&stored).await.expect_err("duplicate");
        assert!(matches!(error, RepositoryError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn status_write_is_compare_and_set() {
        let repo = SqlQuoteRepository::new(setup().await);
        let draft = quote("Q-1", "DOS-1", false);
        repo.insert(&draft).await.expect("insert");

        let mut pending = draft.clone();
        pending.status = QuoteStatus::Pending;
        repo.compare_and_set_status(&pending, QuoteStatus::Draft).await.expect("cas");

        let error = repo
            .compare_and_set_status(&pending, QuoteStatus::Draft)
            .await
            .expect_err("stale expectation");
        assert!(matches!(error, RepositoryError::Conflict(_)));

        let mut rejected = pending.clone();
        rejected.status = QuoteStatus::Rejected;
        rejected.rejection_reason = Some("Budget cut".into());
        rejected.rejected_at = Some(Utc::now());
        repo.compare_and_set_status(&rejected, QuoteStatus::Pending).await.expect("reject");

        let loaded = repo.find_by_id(&draft.id).await.expect("find").expect("exists");
        assert_eq!(loaded.rejection_reason.as_deref(), Some("Budget cut"));
        assert!(loaded.rejected_at.is_some());
    }

    #[tokio::test]
    async fn list_filters_combine_and_dossier_delete_cascades() {
        let pool = setup().await;
        let repo = SqlQuoteRepository::new(pool.clone());
        repo.insert(&quote("Q-1", "DOS-1", false)).await.expect("q1");
        repo.insert(&quote("Q-2", "DOS-1", true)).await.expect("q2");
        repo.insert(&quote("Q-3", "DOS-2", false)).await.expect("q3");

        let in_dossier = repo
            .list(&QuoteFilter {
                dossier_id: Some(DossierId("DOS-1".into())),
                ..QuoteFilter::default()
            })
            .await
            .expect("by dossier");
        assert_eq!(in_dossier.len(), 2);
        assert!(in_dossier.iter().all(|quote| quote.items.len() == 2));

        let drafts_for_client = repo
            .list(&QuoteFilter {
                client_id: Some(ActorId("C1".into())),
                status: Some(QuoteStatus::Draft),
                dossier_id: None,
            })
            .await
            .expect("by client and status");
        assert_eq!(drafts_for_client.len(), 3);

        SqlDossierRepository::new(pool.clone())
            .delete(&DossierId("DOS-1".into()))
            .await
            .expect("delete dossier");
        let remaining = repo.list(&QuoteFilter::default()).await.expect("all");
        assert_eq!(remaining.len(), 1);
        let (items,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM quote_items").fetch_one(&pool).await.expect("count");
        assert_eq!(items, 2);
    }
}
