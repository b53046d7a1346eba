//! PostgreSQL store for workshop-service.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    CashClose, CatalogItem, Customer, InventoryMovement, ItemCostRow, ListWorkOrdersFilter,
    Payment, PaymentTotals, Purchase, PurchaseItem, StockLevel, Supplier, Vehicle, WorkOrder,
    WorkOrderEvent, WorkOrderItem, WorkOrderNote, WorkOrderTotals,
};
use crate::services::metrics::DB_QUERY_DURATION;

use super::{StoreTx, WorkshopStore};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "workshop-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl WorkshopStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;
        Ok(Box::new(PgStoreTx { tx }))
    }
}

/// One open PostgreSQL transaction. sqlx rolls the underlying transaction
/// back when it is dropped without commit.
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    // -------------------------------------------------------------------------
    // Customers & Vehicles
    // -------------------------------------------------------------------------

    async fn find_customer(
        &mut self,
        tenant_id: Uuid,
        owner_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Customer>, AppError> {
        sqlx::query_as::<_, Customer>(
            r#"
            SELECT customer_id, tenant_id, owner_id, name, phone, email, created_utc
            FROM customers
            WHERE tenant_id = $1 AND owner_id = $2 AND customer_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(owner_id)
        .bind(customer_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch customer: {}", e)))
    }

    async fn insert_customer(&mut self, customer: &Customer) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO customers (customer_id, tenant_id, owner_id, name, phone, email, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(customer.customer_id)
        .bind(customer.tenant_id)
        .bind(customer.owner_id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(customer.created_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert customer: {}", e)))?;
        Ok(())
    }

    async fn find_vehicle(
        &mut self,
        tenant_id: Uuid,
        owner_id: Uuid,
        vehicle_id: Uuid,
    ) -> Result<Option<Vehicle>, AppError> {
        sqlx::query_as::<_, Vehicle>(
            r#"
            SELECT vehicle_id, tenant_id, owner_id, customer_id, plate, make, model, year, created_utc
            FROM vehicles
            WHERE tenant_id = $1 AND owner_id = $2 AND vehicle_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(owner_id)
        .bind(vehicle_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch vehicle: {}", e)))
    }

    async fn insert_vehicle(&mut self, vehicle: &Vehicle) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO vehicles (vehicle_id, tenant_id, owner_id, customer_id, plate, make, model, year, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(vehicle.vehicle_id)
        .bind(vehicle.tenant_id)
        .bind(vehicle.owner_id)
        .bind(vehicle.customer_id)
        .bind(&vehicle.plate)
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(vehicle.created_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert vehicle: {}", e)))?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Catalog & Suppliers
    // -------------------------------------------------------------------------

    async fn find_catalog_item(
        &mut self,
        tenant_id: Uuid,
        catalog_item_id: Uuid,
    ) -> Result<Option<CatalogItem>, AppError> {
        sqlx::query_as::<_, CatalogItem>(
            r#"
            SELECT catalog_item_id, tenant_id, item_type, name, sku, price_cents, cost_cents, is_active, created_utc
            FROM catalog_items
            WHERE tenant_id = $1 AND catalog_item_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(catalog_item_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch catalog item: {}", e))
        })
    }

    async fn insert_catalog_item(&mut self, item: &CatalogItem) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO catalog_items (catalog_item_id, tenant_id, item_type, name, sku, price_cents, cost_cents, is_active, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.catalog_item_id)
        .bind(item.tenant_id)
        .bind(&item.item_type)
        .bind(&item.name)
        .bind(&item.sku)
        .bind(item.price_cents)
        .bind(item.cost_cents)
        .bind(item.is_active)
        .bind(item.created_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert catalog item: {}", e))
        })?;
        Ok(())
    }

    async fn lock_catalog_item(
        &mut self,
        tenant_id: Uuid,
        catalog_item_id: Uuid,
    ) -> Result<(), AppError> {
        // Serializes concurrent stock checks against the same item. Locking
        // a missing row is a no-op; existence is checked by the callers.
        sqlx::query("SELECT 1 FROM catalog_items WHERE tenant_id = $1 AND catalog_item_id = $2 FOR UPDATE")
            .bind(tenant_id)
            .bind(catalog_item_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to lock catalog item: {}", e))
            })?;
        Ok(())
    }

    async fn find_supplier(
        &mut self,
        tenant_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<Supplier>, AppError> {
        sqlx::query_as::<_, Supplier>(
            r#"
            SELECT supplier_id, tenant_id, name, phone, email, created_utc
            FROM suppliers
            WHERE tenant_id = $1 AND supplier_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(supplier_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch supplier: {}", e)))
    }

    async fn insert_supplier(&mut self, supplier: &Supplier) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO suppliers (supplier_id, tenant_id, name, phone, email, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(supplier.supplier_id)
        .bind(supplier.tenant_id)
        .bind(&supplier.name)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .bind(supplier.created_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert supplier: {}", e)))?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Work Orders
    // -------------------------------------------------------------------------

    async fn insert_work_order(&mut self, order: &WorkOrder) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_work_order"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO work_orders (
                work_order_id, tenant_id, owner_id, customer_id, vehicle_id,
                title, description, odometer_km, status,
                total_cents, cost_total_cents, margin_cents,
                paid_total_cents, balance_cents, payment_status,
                created_utc, updated_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(order.work_order_id)
        .bind(order.tenant_id)
        .bind(order.owner_id)
        .bind(order.customer_id)
        .bind(order.vehicle_id)
        .bind(&order.title)
        .bind(&order.description)
        .bind(order.odometer_km)
        .bind(&order.status)
        .bind(order.total_cents)
        .bind(order.cost_total_cents)
        .bind(order.margin_cents)
        .bind(order.paid_total_cents)
        .bind(order.balance_cents)
        .bind(&order.payment_status)
        .bind(order.created_utc)
        .bind(order.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert work order: {}", e))
        })?;

        timer.observe_duration();
        Ok(())
    }

    async fn find_work_order(
        &mut self,
        tenant_id: Uuid,
        owner_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Option<WorkOrder>, AppError> {
        sqlx::query_as::<_, WorkOrder>(
            r#"
            SELECT work_order_id, tenant_id, owner_id, customer_id, vehicle_id,
                   title, description, odometer_km, status,
                   total_cents, cost_total_cents, margin_cents,
                   paid_total_cents, balance_cents, payment_status,
                   created_utc, updated_utc
            FROM work_orders
            WHERE tenant_id = $1 AND owner_id = $2 AND work_order_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(owner_id)
        .bind(work_order_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch work order: {}", e)))
    }

    async fn find_work_order_in_tenant(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Option<WorkOrder>, AppError> {
        sqlx::query_as::<_, WorkOrder>(
            r#"
            SELECT work_order_id, tenant_id, owner_id, customer_id, vehicle_id,
                   title, description, odometer_km, status,
                   total_cents, cost_total_cents, margin_cents,
                   paid_total_cents, balance_cents, payment_status,
                   created_utc, updated_utc
            FROM work_orders
            WHERE tenant_id = $1 AND work_order_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(work_order_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch work order: {}", e)))
    }

    async fn lock_work_order(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<(), AppError> {
        // Serializes concurrent payment mutations against the same order.
        // Locking a missing row is a no-op; existence is checked by the
        // callers.
        sqlx::query("SELECT 1 FROM work_orders WHERE tenant_id = $1 AND work_order_id = $2 FOR UPDATE")
            .bind(tenant_id)
            .bind(work_order_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to lock work order: {}", e))
            })?;
        Ok(())
    }

    async fn list_work_orders(
        &mut self,
        tenant_id: Uuid,
        owner_id: Uuid,
        filter: &ListWorkOrdersFilter,
    ) -> Result<Vec<WorkOrder>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_work_orders"])
            .start_timer();

        let orders = sqlx::query_as::<_, WorkOrder>(
            r#"
            SELECT work_order_id, tenant_id, owner_id, customer_id, vehicle_id,
                   title, description, odometer_km, status,
                   total_cents, cost_total_cents, margin_cents,
                   paid_total_cents, balance_cents, payment_status,
                   created_utc, updated_utc
            FROM work_orders
            WHERE tenant_id = $1 AND owner_id = $2
              AND ($3::varchar IS NULL OR status = $3)
              AND ($4::uuid IS NULL OR customer_id = $4)
            ORDER BY created_utc DESC
            "#,
        )
        .bind(tenant_id)
        .bind(owner_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.customer_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list work orders: {}", e))
        })?;

        timer.observe_duration();
        Ok(orders)
    }

    async fn update_work_order_head(&mut self, order: &WorkOrder) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_work_order_head"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE work_orders
            SET customer_id = $3, vehicle_id = $4, title = $5, description = $6,
                odometer_km = $7, status = $8, updated_utc = $9
            WHERE tenant_id = $1 AND work_order_id = $2
            "#,
        )
        .bind(order.tenant_id)
        .bind(order.work_order_id)
        .bind(order.customer_id)
        .bind(order.vehicle_id)
        .bind(&order.title)
        .bind(&order.description)
        .bind(order.odometer_km)
        .bind(&order.status)
        .bind(order.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update work order: {}", e))
        })?;

        timer.observe_duration();
        Ok(())
    }

    async fn update_work_order_totals(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        totals: &WorkOrderTotals,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_work_order_totals"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE work_orders
            SET total_cents = $3, cost_total_cents = $4, margin_cents = $5,
                paid_total_cents = $6, balance_cents = $7, payment_status = $8,
                updated_utc = $9
            WHERE tenant_id = $1 AND work_order_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(work_order_id)
        .bind(totals.total_cents)
        .bind(totals.cost_total_cents)
        .bind(totals.margin_cents)
        .bind(totals.paid_total_cents)
        .bind(totals.balance_cents)
        .bind(totals.payment_status.as_str())
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update work order totals: {}", e))
        })?;

        timer.observe_duration();
        Ok(())
    }

    async fn update_work_order_payment_totals(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        totals: &PaymentTotals,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_work_order_payment_totals"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE work_orders
            SET paid_total_cents = $3, balance_cents = $4, payment_status = $5, updated_utc = $6
            WHERE tenant_id = $1 AND work_order_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(work_order_id)
        .bind(totals.paid_total_cents)
        .bind(totals.balance_cents)
        .bind(totals.payment_status.as_str())
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to update work order payment totals: {}",
                e
            ))
        })?;

        timer.observe_duration();
        Ok(())
    }

    async fn delete_work_order(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_work_order"])
            .start_timer();

        // Items, notes, events and payments go with it via ON DELETE CASCADE.
        sqlx::query("DELETE FROM work_orders WHERE tenant_id = $1 AND work_order_id = $2")
            .bind(tenant_id)
            .bind(work_order_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete work order: {}", e))
            })?;

        timer.observe_duration();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Work Order Items
    // -------------------------------------------------------------------------

    async fn insert_work_order_item(&mut self, item: &WorkOrderItem) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_work_order_item"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO work_order_items (
                item_id, tenant_id, work_order_id, catalog_item_id,
                item_type, name, qty, unit_price_cents, line_total_cents, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(item.item_id)
        .bind(item.tenant_id)
        .bind(item.work_order_id)
        .bind(item.catalog_item_id)
        .bind(&item.item_type)
        .bind(&item.name)
        .bind(item.qty)
        .bind(item.unit_price_cents)
        .bind(item.line_total_cents)
        .bind(item.created_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert work order item: {}", e))
        })?;

        timer.observe_duration();
        Ok(())
    }

    async fn find_work_order_item(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<WorkOrderItem>, AppError> {
        sqlx::query_as::<_, WorkOrderItem>(
            r#"
            SELECT item_id, tenant_id, work_order_id, catalog_item_id,
                   item_type, name, qty, unit_price_cents, line_total_cents, created_utc
            FROM work_order_items
            WHERE tenant_id = $1 AND work_order_id = $2 AND item_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(work_order_id)
        .bind(item_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch work order item: {}", e))
        })
    }

    async fn list_work_order_items(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Vec<WorkOrderItem>, AppError> {
        sqlx::query_as::<_, WorkOrderItem>(
            r#"
            SELECT item_id, tenant_id, work_order_id, catalog_item_id,
                   item_type, name, qty, unit_price_cents, line_total_cents, created_utc
            FROM work_order_items
            WHERE tenant_id = $1 AND work_order_id = $2
            ORDER BY created_utc
            "#,
        )
        .bind(tenant_id)
        .bind(work_order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list work order items: {}", e))
        })
    }

    async fn list_item_cost_rows(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Vec<ItemCostRow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_item_cost_rows"])
            .start_timer();

        // Inactive catalog rows still resolve: deactivation must not change
        // historical cost totals.
        let rows = sqlx::query_as::<_, ItemCostRow>(
            r#"
            SELECT i.item_type, i.qty, i.line_total_cents, c.cost_cents AS catalog_cost_cents
            FROM work_order_items i
            LEFT JOIN catalog_items c
              ON c.tenant_id = i.tenant_id AND c.catalog_item_id = i.catalog_item_id
            WHERE i.tenant_id = $1 AND i.work_order_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(work_order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch item cost rows: {}", e))
        })?;

        timer.observe_duration();
        Ok(rows)
    }

    async fn update_work_order_item(&mut self, item: &WorkOrderItem) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_work_order_item"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE work_order_items
            SET catalog_item_id = $4, item_type = $5, name = $6,
                qty = $7, unit_price_cents = $8, line_total_cents = $9
            WHERE tenant_id = $1 AND work_order_id = $2 AND item_id = $3
            "#,
        )
        .bind(item.tenant_id)
        .bind(item.work_order_id)
        .bind(item.item_id)
        .bind(item.catalog_item_id)
        .bind(&item.item_type)
        .bind(&item.name)
        .bind(item.qty)
        .bind(item.unit_price_cents)
        .bind(item.line_total_cents)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update work order item: {}", e))
        })?;

        timer.observe_duration();
        Ok(())
    }

    async fn delete_work_order_item(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_work_order_item"])
            .start_timer();

        sqlx::query(
            "DELETE FROM work_order_items WHERE tenant_id = $1 AND work_order_id = $2 AND item_id = $3",
        )
        .bind(tenant_id)
        .bind(work_order_id)
        .bind(item_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to delete work order item: {}", e))
        })?;

        timer.observe_duration();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Notes & Audit Events
    // -------------------------------------------------------------------------

    async fn insert_work_order_note(&mut self, note: &WorkOrderNote) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO work_order_notes (note_id, tenant_id, work_order_id, body, created_by_user_id, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(note.note_id)
        .bind(note.tenant_id)
        .bind(note.work_order_id)
        .bind(&note.body)
        .bind(note.created_by_user_id)
        .bind(note.created_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert note: {}", e)))?;
        Ok(())
    }

    async fn find_work_order_note(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        note_id: Uuid,
    ) -> Result<Option<WorkOrderNote>, AppError> {
        sqlx::query_as::<_, WorkOrderNote>(
            r#"
            SELECT note_id, tenant_id, work_order_id, body, created_by_user_id, created_utc
            FROM work_order_notes
            WHERE tenant_id = $1 AND work_order_id = $2 AND note_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(work_order_id)
        .bind(note_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch note: {}", e)))
    }

    async fn list_work_order_notes(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Vec<WorkOrderNote>, AppError> {
        sqlx::query_as::<_, WorkOrderNote>(
            r#"
            SELECT note_id, tenant_id, work_order_id, body, created_by_user_id, created_utc
            FROM work_order_notes
            WHERE tenant_id = $1 AND work_order_id = $2
            ORDER BY created_utc DESC
            "#,
        )
        .bind(tenant_id)
        .bind(work_order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list notes: {}", e)))
    }

    async fn delete_work_order_note(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
        note_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            "DELETE FROM work_order_notes WHERE tenant_id = $1 AND work_order_id = $2 AND note_id = $3",
        )
        .bind(tenant_id)
        .bind(work_order_id)
        .bind(note_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete note: {}", e)))?;
        Ok(())
    }

    async fn append_work_order_event(&mut self, event: &WorkOrderEvent) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO work_order_events (event_id, tenant_id, work_order_id, event_type, payload, created_by_user_id, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.event_id)
        .bind(event.tenant_id)
        .bind(event.work_order_id)
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(event.created_by_user_id)
        .bind(event.created_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to append event: {}", e)))?;
        Ok(())
    }

    async fn list_work_order_events(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Vec<WorkOrderEvent>, AppError> {
        sqlx::query_as::<_, WorkOrderEvent>(
            r#"
            SELECT event_id, tenant_id, work_order_id, event_type, payload, created_by_user_id, created_utc
            FROM work_order_events
            WHERE tenant_id = $1 AND work_order_id = $2
            ORDER BY created_utc
            "#,
        )
        .bind(tenant_id)
        .bind(work_order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list events: {}", e)))
    }

    // -------------------------------------------------------------------------
    // Inventory Ledger
    // -------------------------------------------------------------------------

    async fn append_movement(&mut self, movement: &InventoryMovement) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["append_movement"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO inventory_movements (
                movement_id, tenant_id, catalog_item_id, movement_type, qty,
                unit_cost_cents, reference_type, reference_id, created_by_user_id, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(movement.movement_id)
        .bind(movement.tenant_id)
        .bind(movement.catalog_item_id)
        .bind(&movement.movement_type)
        .bind(movement.qty)
        .bind(movement.unit_cost_cents)
        .bind(&movement.reference_type)
        .bind(&movement.reference_id)
        .bind(movement.created_by_user_id)
        .bind(movement.created_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to append movement: {}", e))
        })?;

        timer.observe_duration();
        Ok(())
    }

    async fn sum_movement_qty(
        &mut self,
        tenant_id: Uuid,
        catalog_item_id: Uuid,
    ) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sum_movement_qty"])
            .start_timer();

        let qty: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(qty), 0)::BIGINT
            FROM inventory_movements
            WHERE tenant_id = $1 AND catalog_item_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(catalog_item_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to sum movements: {}", e))
        })?;

        timer.observe_duration();
        Ok(qty)
    }

    async fn list_movements(
        &mut self,
        tenant_id: Uuid,
        catalog_item_id: Uuid,
    ) -> Result<Vec<InventoryMovement>, AppError> {
        sqlx::query_as::<_, InventoryMovement>(
            r#"
            SELECT movement_id, tenant_id, catalog_item_id, movement_type, qty,
                   unit_cost_cents, reference_type, reference_id, created_by_user_id, created_utc
            FROM inventory_movements
            WHERE tenant_id = $1 AND catalog_item_id = $2
            ORDER BY created_utc DESC
            "#,
        )
        .bind(tenant_id)
        .bind(catalog_item_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list movements: {}", e)))
    }

    async fn list_stock_levels(&mut self, tenant_id: Uuid) -> Result<Vec<StockLevel>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_stock_levels"])
            .start_timer();

        let levels = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT c.catalog_item_id, c.name, c.sku, c.cost_cents, c.price_cents, c.is_active,
                   COALESCE(SUM(m.qty), 0)::BIGINT AS qty_on_hand
            FROM catalog_items c
            LEFT JOIN inventory_movements m
              ON m.tenant_id = c.tenant_id AND m.catalog_item_id = c.catalog_item_id
            WHERE c.tenant_id = $1 AND c.item_type = 'PART'
            GROUP BY c.catalog_item_id, c.name, c.sku, c.cost_cents, c.price_cents, c.is_active
            ORDER BY c.name
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list stock levels: {}", e))
        })?;

        timer.observe_duration();
        Ok(levels)
    }

    // -------------------------------------------------------------------------
    // Payments
    // -------------------------------------------------------------------------

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_payment"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO payments (
                payment_id, tenant_id, work_order_id, amount_cents, method,
                reference, paid_utc, created_by_user_id, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(payment.payment_id)
        .bind(payment.tenant_id)
        .bind(payment.work_order_id)
        .bind(payment.amount_cents)
        .bind(&payment.method)
        .bind(&payment.reference)
        .bind(payment.paid_utc)
        .bind(payment.created_by_user_id)
        .bind(payment.created_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert payment: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    async fn find_payment(
        &mut self,
        tenant_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Option<Payment>, AppError> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, tenant_id, work_order_id, amount_cents, method,
                   reference, paid_utc, created_by_user_id, created_utc
            FROM payments
            WHERE tenant_id = $1 AND payment_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(payment_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch payment: {}", e)))
    }

    async fn list_payments(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, tenant_id, work_order_id, amount_cents, method,
                   reference, paid_utc, created_by_user_id, created_utc
            FROM payments
            WHERE tenant_id = $1 AND work_order_id = $2
            ORDER BY paid_utc DESC
            "#,
        )
        .bind(tenant_id)
        .bind(work_order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))
    }

    async fn delete_payment(
        &mut self,
        tenant_id: Uuid,
        payment_id: Uuid,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_payment"])
            .start_timer();

        sqlx::query("DELETE FROM payments WHERE tenant_id = $1 AND payment_id = $2")
            .bind(tenant_id)
            .bind(payment_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete payment: {}", e))
            })?;

        timer.observe_duration();
        Ok(())
    }

    async fn sum_payments(
        &mut self,
        tenant_id: Uuid,
        work_order_id: Uuid,
    ) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sum_payments"])
            .start_timer();

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0)::BIGINT
            FROM payments
            WHERE tenant_id = $1 AND work_order_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(work_order_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum payments: {}", e)))?;

        timer.observe_duration();
        Ok(total)
    }

    async fn list_payments_in_window(
        &mut self,
        tenant_id: Uuid,
        from_utc: DateTime<Utc>,
        to_utc: DateTime<Utc>,
    ) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments_in_window"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, tenant_id, work_order_id, amount_cents, method,
                   reference, paid_utc, created_by_user_id, created_utc
            FROM payments
            WHERE tenant_id = $1 AND paid_utc >= $2 AND paid_utc < $3
            ORDER BY paid_utc
            "#,
        )
        .bind(tenant_id)
        .bind(from_utc)
        .bind(to_utc)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list payments in window: {}", e))
        })?;

        timer.observe_duration();
        Ok(payments)
    }

    // -------------------------------------------------------------------------
    // Purchases
    // -------------------------------------------------------------------------

    async fn insert_purchase(&mut self, purchase: &Purchase) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_purchase"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO purchases (
                purchase_id, tenant_id, supplier_id, status, total_cents,
                notes, created_by_user_id, created_utc, received_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(purchase.purchase_id)
        .bind(purchase.tenant_id)
        .bind(purchase.supplier_id)
        .bind(&purchase.status)
        .bind(purchase.total_cents)
        .bind(&purchase.notes)
        .bind(purchase.created_by_user_id)
        .bind(purchase.created_utc)
        .bind(purchase.received_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert purchase: {}", e))
        })?;

        timer.observe_duration();
        Ok(())
    }

    async fn find_purchase(
        &mut self,
        tenant_id: Uuid,
        purchase_id: Uuid,
    ) -> Result<Option<Purchase>, AppError> {
        sqlx::query_as::<_, Purchase>(
            r#"
            SELECT purchase_id, tenant_id, supplier_id, status, total_cents,
                   notes, created_by_user_id, created_utc, received_utc
            FROM purchases
            WHERE tenant_id = $1 AND purchase_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(purchase_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch purchase: {}", e)))
    }

    async fn list_purchases(&mut self, tenant_id: Uuid) -> Result<Vec<Purchase>, AppError> {
        sqlx::query_as::<_, Purchase>(
            r#"
            SELECT purchase_id, tenant_id, supplier_id, status, total_cents,
                   notes, created_by_user_id, created_utc, received_utc
            FROM purchases
            WHERE tenant_id = $1
            ORDER BY created_utc DESC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list purchases: {}", e)))
    }

    async fn update_purchase(&mut self, purchase: &Purchase) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_purchase"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE purchases
            SET status = $3, total_cents = $4, notes = $5, received_utc = $6
            WHERE tenant_id = $1 AND purchase_id = $2
            "#,
        )
        .bind(purchase.tenant_id)
        .bind(purchase.purchase_id)
        .bind(&purchase.status)
        .bind(purchase.total_cents)
        .bind(&purchase.notes)
        .bind(purchase.received_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update purchase: {}", e))
        })?;

        timer.observe_duration();
        Ok(())
    }

    async fn insert_purchase_item(&mut self, item: &PurchaseItem) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO purchase_items (
                item_id, tenant_id, purchase_id, catalog_item_id,
                qty, unit_cost_cents, line_total_cents, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.item_id)
        .bind(item.tenant_id)
        .bind(item.purchase_id)
        .bind(item.catalog_item_id)
        .bind(item.qty)
        .bind(item.unit_cost_cents)
        .bind(item.line_total_cents)
        .bind(item.created_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert purchase item: {}", e))
        })?;
        Ok(())
    }

    async fn find_purchase_item(
        &mut self,
        tenant_id: Uuid,
        purchase_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<PurchaseItem>, AppError> {
        sqlx::query_as::<_, PurchaseItem>(
            r#"
            SELECT item_id, tenant_id, purchase_id, catalog_item_id,
                   qty, unit_cost_cents, line_total_cents, created_utc
            FROM purchase_items
            WHERE tenant_id = $1 AND purchase_id = $2 AND item_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(purchase_id)
        .bind(item_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch purchase item: {}", e))
        })
    }

    async fn list_purchase_items(
        &mut self,
        tenant_id: Uuid,
        purchase_id: Uuid,
    ) -> Result<Vec<PurchaseItem>, AppError> {
        sqlx::query_as::<_, PurchaseItem>(
            r#"
            SELECT item_id, tenant_id, purchase_id, catalog_item_id,
                   qty, unit_cost_cents, line_total_cents, created_utc
            FROM purchase_items
            WHERE tenant_id = $1 AND purchase_id = $2
            ORDER BY created_utc
            "#,
        )
        .bind(tenant_id)
        .bind(purchase_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list purchase items: {}", e))
        })
    }

    async fn delete_purchase_item(
        &mut self,
        tenant_id: Uuid,
        purchase_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            "DELETE FROM purchase_items WHERE tenant_id = $1 AND purchase_id = $2 AND item_id = $3",
        )
        .bind(tenant_id)
        .bind(purchase_id)
        .bind(item_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to delete purchase item: {}", e))
        })?;
        Ok(())
    }

    async fn sum_purchase_items(
        &mut self,
        tenant_id: Uuid,
        purchase_id: Uuid,
    ) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sum_purchase_items"])
            .start_timer();

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(line_total_cents), 0)::BIGINT
            FROM purchase_items
            WHERE tenant_id = $1 AND purchase_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(purchase_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to sum purchase items: {}", e))
        })?;

        timer.observe_duration();
        Ok(total)
    }

    // -------------------------------------------------------------------------
    // Cash Closes
    // -------------------------------------------------------------------------

    async fn find_cash_close(
        &mut self,
        tenant_id: Uuid,
        close_date: NaiveDate,
    ) -> Result<Option<CashClose>, AppError> {
        sqlx::query_as::<_, CashClose>(
            r#"
            SELECT cash_close_id, tenant_id, close_date, total_cents, cash_cents,
                   card_cents, transfer_cents, notes, closed_by_user_id, created_utc
            FROM cash_closes
            WHERE tenant_id = $1 AND close_date = $2
            "#,
        )
        .bind(tenant_id)
        .bind(close_date)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch cash close: {}", e)))
    }

    async fn insert_cash_close(&mut self, close: &CashClose) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_cash_close"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO cash_closes (
                cash_close_id, tenant_id, close_date, total_cents, cash_cents,
                card_cents, transfer_cents, notes, closed_by_user_id, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(close.cash_close_id)
        .bind(close.tenant_id)
        .bind(close.close_date)
        .bind(close.total_cents)
        .bind(close.cash_cents)
        .bind(close.card_cents)
        .bind(close.transfer_cents)
        .bind(&close.notes)
        .bind(close.closed_by_user_id)
        .bind(close.created_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                // Race backstop behind the service-level duplicate check.
                AppError::BadRequest(anyhow::anyhow!(
                    "Cash close already exists for {}",
                    close.close_date
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to insert cash close: {}", e)),
        })?;

        timer.observe_duration();
        Ok(())
    }

    async fn list_cash_closes(
        &mut self,
        tenant_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<CashClose>, AppError> {
        sqlx::query_as::<_, CashClose>(
            r#"
            SELECT cash_close_id, tenant_id, close_date, total_cents, cash_cents,
                   card_cents, transfer_cents, notes, closed_by_user_id, created_utc
            FROM cash_closes
            WHERE tenant_id = $1
              AND ($2::date IS NULL OR close_date >= $2)
              AND ($3::date IS NULL OR close_date <= $3)
            ORDER BY close_date DESC
            "#,
        )
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list cash closes: {}", e)))
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })
    }
}
