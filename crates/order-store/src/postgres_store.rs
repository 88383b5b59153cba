use super::{OrderRepository, StoreError};
use crate::rows::{DeliveryRow, ItemRow, OrderRow, PaymentRow};
use async_trait::async_trait;
use common::config::{DatabaseConfig, ItemWritePolicy};
use common::metrics;
use domain::{Item, Order};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

const SELECT_ORDER: &str = r#"
    SELECT order_uid, track_number, entry, locale, internal_signature, customer_id,
           delivery_service, shardkey, sm_id, date_created, oof_shard
    FROM orders
"#;

const SELECT_DELIVERY: &str = r#"
    SELECT order_uid, name, phone, zip, city, address, region, email
    FROM delivery
"#;

const SELECT_PAYMENT: &str = r#"
    SELECT order_uid, transaction, request_id, currency, provider, amount, payment_dt,
           bank, delivery_cost, goods_total, custom_fee
    FROM payment
"#;

const SELECT_ITEMS: &str = r#"
    SELECT order_uid, chrt_id, track_number, price, rid, name, sale, size, total_price,
           nm_id, brand, status
    FROM items
"#;

/// PostgreSQL implementation of the order repository
pub struct PostgresOrderStore {
    pool: PgPool,
    item_policy: ItemWritePolicy,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool, item_policy: ItemWritePolicy) -> Self {
        Self { pool, item_policy }
    }

    /// Open a bounded connection pool and wrap it in a store.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        info!(
            "Connecting to database {}:{}/{} (pool {}..{})",
            config.host, config.port, config.database, config.min_connections, config.max_connections
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.url())
            .await?;

        info!("Database connected");
        Ok(Self::new(pool, config.item_write_policy))
    }

    /// Get the database pool (useful for testing)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn item_policy(&self) -> ItemWritePolicy {
        self.item_policy
    }

    async fn write_order(&self, order: &Order) -> Result<(), StoreError> {
        // Dropping `tx` without commit rolls everything back.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                order_uid, track_number, entry, locale, internal_signature, customer_id,
                delivery_service, shardkey, sm_id, date_created, oof_shard
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_uid) DO UPDATE SET
                track_number = EXCLUDED.track_number,
                entry = EXCLUDED.entry,
                locale = EXCLUDED.locale,
                internal_signature = EXCLUDED.internal_signature,
                customer_id = EXCLUDED.customer_id,
                delivery_service = EXCLUDED.delivery_service,
                shardkey = EXCLUDED.shardkey,
                sm_id = EXCLUDED.sm_id,
                date_created = EXCLUDED.date_created,
                oof_shard = EXCLUDED.oof_shard
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .execute(&mut *tx)
        .await?;

        let delivery = &order.delivery;
        sqlx::query(
            r#"
            INSERT INTO delivery (order_uid, name, phone, zip, city, address, region, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (order_uid) DO UPDATE SET
                name = EXCLUDED.name,
                phone = EXCLUDED.phone,
                zip = EXCLUDED.zip,
                city = EXCLUDED.city,
                address = EXCLUDED.address,
                region = EXCLUDED.region,
                email = EXCLUDED.email
            "#,
        )
        .bind(&order.order_uid)
        .bind(&delivery.name)
        .bind(&delivery.phone)
        .bind(&delivery.zip)
        .bind(&delivery.city)
        .bind(&delivery.address)
        .bind(&delivery.region)
        .bind(&delivery.email)
        .execute(&mut *tx)
        .await?;

        let payment = &order.payment;
        sqlx::query(
            r#"
            INSERT INTO payment (
                order_uid, transaction, request_id, currency, provider, amount,
                payment_dt, bank, delivery_cost, goods_total, custom_fee
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_uid) DO UPDATE SET
                transaction = EXCLUDED.transaction,
                request_id = EXCLUDED.request_id,
                currency = EXCLUDED.currency,
                provider = EXCLUDED.provider,
                amount = EXCLUDED.amount,
                payment_dt = EXCLUDED.payment_dt,
                bank = EXCLUDED.bank,
                delivery_cost = EXCLUDED.delivery_cost,
                goods_total = EXCLUDED.goods_total,
                custom_fee = EXCLUDED.custom_fee
            "#,
        )
        .bind(&order.order_uid)
        .bind(&payment.transaction)
        .bind(&payment.request_id)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.payment_dt)
        .bind(&payment.bank)
        .bind(payment.delivery_cost)
        .bind(payment.goods_total)
        .bind(payment.custom_fee)
        .execute(&mut *tx)
        .await?;

        if self.item_policy == ItemWritePolicy::Replace {
            let replaced = sqlx::query("DELETE FROM items WHERE order_uid = $1")
                .bind(&order.order_uid)
                .execute(&mut *tx)
                .await?;
            debug!(
                order_uid = %order.order_uid,
                "Removed {} previous item rows",
                replaced.rows_affected()
            );
        }

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO items (
                    order_uid, chrt_id, track_number, price, rid, name, sale, size,
                    total_price, nm_id, brand, status
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(&order.order_uid)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Read-only transaction whose queries all see the same snapshot.
    async fn begin_snapshot(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    async fn read_order(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        let mut tx = self.begin_snapshot().await?;

        let header = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE order_uid = $1"))
            .bind(order_uid)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(header) = header else {
            tx.commit().await?;
            return Ok(None);
        };

        let delivery =
            sqlx::query_as::<_, DeliveryRow>(&format!("{SELECT_DELIVERY} WHERE order_uid = $1"))
                .bind(order_uid)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| missing(order_uid, "delivery"))?;

        let payment =
            sqlx::query_as::<_, PaymentRow>(&format!("{SELECT_PAYMENT} WHERE order_uid = $1"))
                .bind(order_uid)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| missing(order_uid, "payment"))?;

        let items = sqlx::query_as::<_, ItemRow>(&format!(
            "{SELECT_ITEMS} WHERE order_uid = $1 ORDER BY id ASC"
        ))
        .bind(order_uid)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let items: Vec<Item> = items.into_iter().map(Item::from).collect();
        Ok(Some(header.into_order(delivery.into(), payment.into(), items)))
    }

    async fn read_all_orders(&self) -> Result<HashMap<String, Order>, StoreError> {
        let mut tx = self.begin_snapshot().await?;

        let headers = sqlx::query_as::<_, OrderRow>(SELECT_ORDER)
            .fetch_all(&mut *tx)
            .await?;
        let deliveries = sqlx::query_as::<_, DeliveryRow>(SELECT_DELIVERY)
            .fetch_all(&mut *tx)
            .await?;
        let payments = sqlx::query_as::<_, PaymentRow>(SELECT_PAYMENT)
            .fetch_all(&mut *tx)
            .await?;
        let item_rows = sqlx::query_as::<_, ItemRow>(&format!(
            "{SELECT_ITEMS} ORDER BY order_uid ASC, id ASC"
        ))
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut deliveries: HashMap<String, DeliveryRow> = deliveries
            .into_iter()
            .map(|row| (row.order_uid.clone(), row))
            .collect();
        let mut payments: HashMap<String, PaymentRow> = payments
            .into_iter()
            .map(|row| (row.order_uid.clone(), row))
            .collect();
        let mut items: HashMap<String, Vec<Item>> = HashMap::new();
        for row in item_rows {
            items.entry(row.order_uid.clone()).or_default().push(row.into());
        }

        let mut orders = HashMap::with_capacity(headers.len());
        for header in headers {
            let uid = header.order_uid.clone();
            let delivery = deliveries
                .remove(&uid)
                .ok_or_else(|| missing(&uid, "delivery"))?;
            let payment = payments
                .remove(&uid)
                .ok_or_else(|| missing(&uid, "payment"))?;
            let order_items = items.remove(&uid).unwrap_or_default();

            orders.insert(uid, header.into_order(delivery.into(), payment.into(), order_items));
        }

        Ok(orders)
    }
}

fn missing(order_uid: &str, section: &'static str) -> StoreError {
    StoreError::MissingSection {
        order_uid: order_uid.to_string(),
        section,
    }
}

/// Time an operation and record its outcome.
async fn observed<T, F>(operation: &'static str, fut: F) -> Result<T, StoreError>
where
    F: std::future::Future<Output = Result<T, StoreError>>,
{
    let start = Instant::now();
    let result = fut.await;
    metrics::record_store_operation(operation, result.is_ok(), start.elapsed().as_secs_f64());
    result
}

#[async_trait]
impl OrderRepository for PostgresOrderStore {
    async fn save_order(&self, order: &Order) -> Result<(), StoreError> {
        debug!(
            order_uid = %order.order_uid,
            items = order.items.len(),
            "Saving order"
        );

        match observed("save_order", self.write_order(order)).await {
            Ok(()) => {
                info!(order_uid = %order.order_uid, "Order saved");
                Ok(())
            }
            Err(e) => {
                error!(order_uid = %order.order_uid, error = %e, "Failed to save order, transaction rolled back");
                Err(e)
            }
        }
    }

    async fn get_order(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        debug!(order_uid, "Loading order");
        observed("get_order", self.read_order(order_uid)).await
    }

    async fn get_orders(&self) -> Result<HashMap<String, Order>, StoreError> {
        let orders = observed("get_orders", self.read_all_orders()).await?;
        debug!("Loaded {} orders", orders.len());
        Ok(orders)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_keeps_configured_item_policy() {
        let pool = PgPool::connect_lazy("postgresql://test").unwrap();
        let store = PostgresOrderStore::new(pool, ItemWritePolicy::Append);
        assert_eq!(store.item_policy(), ItemWritePolicy::Append);
    }

    #[test]
    fn test_missing_section_error_names_the_section() {
        let err = missing("abc", "payment");
        assert_eq!(err.to_string(), "Order abc has no payment row");
    }
}
