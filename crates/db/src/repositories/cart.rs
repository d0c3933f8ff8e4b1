use sqlx::Row;

use quoteflow_core::domain::actor::ActorId;
use quoteflow_core::domain::cart::{Cart, CartLine};
use quoteflow_core::domain::offer::OfferId;

use super::{decode, parse_decimal, parse_timestamp, CartRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCartRepository {
    pool: DbPool,
}

impl SqlCartRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CartRepository for SqlCartRepository {
    async fn load(&self, owner: &ActorId) -> Result<Option<Cart>, RepositoryError> {
        let header = sqlx::query("SELECT updated_at FROM carts WHERE owner_id = ?")
            .bind(&owner.0)
            .fetch_optional(&self.pool)
            .await?;
        let Some(header) = header else {
            return Ok(None);
        };
        let updated_at: String = decode(header.try_get("updated_at"))?;

        let rows = sqlx::query(
            "SELECT offer_id, offer_title, unit_price, quantity
             FROM cart_lines WHERE owner_id = ? ORDER BY position ASC",
        )
        .bind(&owner.0)
        .fetch_all(&self.pool)
        .await?;

        let mut lines = Vec::with_capacity(rows.len());
        for row in &rows {
            let unit_price: String = decode(row.try_get("unit_price"))?;
            let quantity: i64 = decode(row.try_get("quantity"))?;
            lines.push(CartLine {
                offer_id: OfferId(decode(row.try_get("offer_id"))?),
                offer_title: decode(row.try_get("offer_title"))?,
                unit_price: parse_decimal("unit_price", &unit_price)?,
                quantity: u32::try_from(quantity)
                    .map_err(|_| RepositoryError::Decode(format!("quantity {quantity}")))?,
            });
        }

        Ok(Some(Cart {
            owner: owner.clone(),
            lines,
            updated_at: parse_timestamp("updated_at", &updated_at)?,
        }))
    }

    async fn save(&self, cart: Cart) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO carts (owner_id, updated_at) VALUES (?, ?)
             ON CONFLICT(owner_id) DO UPDATE SET updated_at = excluded.updated_at",
        )
        .bind(&cart.owner.0)
        .bind(cart.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cart_lines WHERE owner_id = ?")
            .bind(&cart.owner.0)
            .execute(&mut *tx)
            .await?;

        for (position, line) in cart.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO cart_lines (owner_id, position, offer_id, offer_title, unit_price,
                                         quantity)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&cart.owner.0)
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

    async fn clear(&self, owner: &ActorId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM carts WHERE owner_id = ?")
            .bind(&owner.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use quoteflow_core::domain::actor::{Actor, ActorId};
    use quoteflow_core::domain::cart::Cart;
    use quoteflow_core::domain::offer::{Offer, OfferId};

    use super::SqlCartRepository;
    use crate::repositories::{CartRepository, ProfileRepository, SqlProfileRepository};
    use crate::{connect_with_settings, migrations};

    fn offer(id: &str, price: i64) -> Offer {
        Offer {
            id: OfferId(id.to_string()),
            name: id.to_uppercase(),
            description: String::new(),
            monthly_price: Decimal::new(price, 0),
            setup_fee: Decimal::ZERO,
            category: "internet".to_string(),
            active: true,
        }
    }

    #[tokio::test]
    async fn cart_survives_reload_and_clear_removes_lines() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let owner = ActorId("C1".to_string());
        SqlProfileRepository::new(pool.clone())
            .save(Actor::register(owner.clone(), "Ada", "ada@acme.test", Utc::now()))
            .await
            .expect("profile");
        let repo = SqlCartRepository::new(pool.clone());

        let mut cart = Cart::new(owner.clone(), Utc::now());
        cart.add_item(&offer("a", 100), 2, Utc::now()).expect("add a");
        cart.add_item(&offer("b", 50), 1, Utc::now()).expect("add b");
        repo.save(cart.clone()).await.expect("save");

        let loaded = repo.load(&owner).await.expect("load").expect("cart exists");
        assert_eq!(loaded.total(), Decimal::new(250, 0));
        assert_eq!(loaded.lines.len(), 2);

        repo.clear(&owner).await.expect("clear");
        assert!(repo.load(&owner).await.expect("load").is_none());
        let (orphans,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_lines")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(orphans, 0);
    }
}
