use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use quoteflow_core::domain::offer::{Offer, OfferId};

use super::{decode, parse_decimal, OfferRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOfferRepository {
    pool: DbPool,
}

impl SqlOfferRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_offer(row: &SqliteRow) -> Result<Offer, RepositoryError> {
    let monthly_price: String = decode(row.try_get("monthly_price"))?;
    let setup_fee: String = decode(row.try_get("setup_fee"))?;
    let active: i64 = decode(row.try_get("active"))?;

    Ok(Offer {
        id: OfferId(decode(row.try_get("id"))?),
        name: decode(row.try_get("name"))?,
        description: decode(row.try_get("description"))?,
        monthly_price: parse_decimal("monthly_price", &monthly_price)?,
        setup_fee: parse_decimal("setup_fee", &setup_fee)?,
        category: decode(row.try_get("category"))?,
        active: active != 0,
    })
}

#[async_trait::async_trait]
impl OfferRepository for SqlOfferRepository {
    async fn find_by_id(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, description, monthly_price, setup_fee, category, active
             FROM offers WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_offer).transpose()
    }

    async fn list_active(&self) -> Result<Vec<Offer>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, description, monthly_price, setup_fee, category, active
             FROM offers WHERE active = 1
             ORDER BY category ASC, name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_offer).collect()
    }

    async fn save(&self, offer: Offer) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO offers (id, name, description, monthly_price, setup_fee, category, active)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 monthly_price = excluded.monthly_price,
                 setup_fee = excluded.setup_fee,
                 category = excluded.category,
                 active = excluded.active",
        )
        .bind(&offer.id.0)
        .bind(&offer.name)
        .bind(&offer.description)
        .bind(offer.monthly_price.to_string())
        .bind(offer.setup_fee.to_string())
        .bind(&offer.category)
        .bind(i64::from(offer.active))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use quoteflow_core::domain::offer::{Offer, OfferId};

    use super::SqlOfferRepository;
    use crate::repositories::OfferRepository;
    use crate::{connect_with_settings, migrations};

    fn offer(id: &str, name: &str, category: &str, active: bool) -> Offer {
        Offer {
            id: OfferId(id.to_string()),
            name: name.to_string(),
            description: String::new(),
            monthly_price: Decimal::new(4990, 2),
            setup_fee: Decimal::new(100, 0),
            category: category.to_string(),
            active,
        }
    }

    #[tokio::test]
    async fn list_active_skips_retired_offers_and_keeps_exact_prices() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlOfferRepository::new(pool);

        repo.save(offer("fiber", "Fiber 1G", "internet", true)).await.expect("save");
        repo.save(offer("adsl", "ADSL", "internet", false)).await.expect("save");
        repo.save(offer("voip", "VoIP Line", "telephony", true)).await.expect("save");

        let active = repo.list_active().await.expect("list");
        let ids: Vec<_> = active.iter().map(|offer| offer.id.0.as_str()).collect();
        assert_eq!(ids, vec!["fiber", "voip"]);
        assert_eq!(active[0].monthly_price, Decimal::new(4990, 2));
    }
}
