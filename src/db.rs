//! # Database Module
//!
//! PostgreSQL access for inventory entries, customers, subscriptions and the
//! payment log. Every function takes the shared pool explicitly.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::model::{Customer, InventoryEntry, Payment, Subscription};
use crate::renewals::RenewalRow;

/// Customer as shown in listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerSummary {
    pub phone: String,
    pub name: String,
    pub subscription_count: i64,
}

/// Platform with free slots, as offered by the wizard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformAvailability {
    pub platform: String,
    pub free_slots: i64,
}

/// Result of selling one slot to a customer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaleOutcome {
    Sold {
        subscription: Subscription,
        entry: InventoryEntry,
    },
    /// No inventory entry for (email, platform)
    UnknownAccount,
    /// The entry is `llena`
    NoSlots,
    /// The customer already holds a profile on that account
    AlreadySubscribed,
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS inventory (
            email TEXT NOT NULL,
            platform TEXT NOT NULL,
            account_key TEXT NOT NULL,
            total INTEGER NOT NULL CHECK (total >= 0),
            disp INTEGER NOT NULL CHECK (disp >= 0),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (email, platform)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create inventory table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS customers (
            phone TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            seq BIGSERIAL NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create customers table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS subscriptions (
            id BIGSERIAL PRIMARY KEY,
            phone TEXT NOT NULL REFERENCES customers(phone) ON DELETE CASCADE,
            platform TEXT NOT NULL,
            email TEXT NOT NULL,
            renewal_date DATE NOT NULL,
            created_on DATE NOT NULL,
            UNIQUE (phone, platform, email)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create subscriptions table")?;

    // No foreign key: payments outlive the customer they belong to
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS payments (
            id BIGSERIAL PRIMARY KEY,
            phone TEXT NOT NULL,
            platform TEXT NOT NULL,
            amount BIGINT,
            paid_on DATE NOT NULL,
            period_start DATE NOT NULL,
            period_end DATE NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create payments table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_payments_phone ON payments(phone)")
        .execute(pool)
        .await
        .context("Failed to create payments index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

fn inventory_from_row(row: &PgRow) -> InventoryEntry {
    InventoryEntry {
        platform: row.get("platform"),
        email: row.get("email"),
        key: row.get("account_key"),
        total: row.get("total"),
        disp: row.get("disp"),
    }
}

fn subscription_from_row(row: &PgRow) -> Subscription {
    Subscription {
        platform: row.get("platform"),
        email: row.get("email"),
        renewal_date: row.get("renewal_date"),
        created_on: row.get("created_on"),
    }
}

fn payment_from_row(row: &PgRow) -> Payment {
    Payment {
        phone: row.get("phone"),
        platform: row.get("platform"),
        amount: row.get("amount"),
        paid_on: row.get("paid_on"),
        period_start: row.get("period_start"),
        period_end: row.get("period_end"),
    }
}

/// Insert an inventory entry or replace the key and slot count of an existing one
pub async fn upsert_inventory_entry(pool: &PgPool, entry: &InventoryEntry) -> Result<InventoryEntry> {
    info!(email = %entry.email, platform = %entry.platform, disp = entry.disp, "Upserting inventory entry");

    let row = sqlx::query(
        "INSERT INTO inventory (email, platform, account_key, total, disp)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (email, platform) DO UPDATE
         SET account_key = EXCLUDED.account_key,
             disp = EXCLUDED.disp,
             total = GREATEST(inventory.total, EXCLUDED.disp)
         RETURNING email, platform, account_key, total, disp",
    )
    .bind(&entry.email)
    .bind(&entry.platform)
    .bind(&entry.key)
    .bind(entry.total)
    .bind(entry.disp)
    .fetch_one(pool)
    .await
    .context("Failed to upsert inventory entry")?;

    Ok(inventory_from_row(&row))
}

/// Read one inventory entry by identity
pub async fn get_inventory_entry(
    pool: &PgPool,
    email: &str,
    platform: &str,
) -> Result<Option<InventoryEntry>> {
    debug!(email = %email, platform = %platform, "Reading inventory entry");

    let row = sqlx::query(
        "SELECT email, platform, account_key, total, disp
         FROM inventory WHERE email = $1 AND platform = $2",
    )
    .bind(email)
    .bind(platform)
    .fetch_optional(pool)
    .await
    .context("Failed to read inventory entry")?;

    Ok(row.as_ref().map(inventory_from_row))
}

/// All entries for an account email, across platforms
pub async fn find_inventory_by_email(pool: &PgPool, email: &str) -> Result<Vec<InventoryEntry>> {
    let rows = sqlx::query(
        "SELECT email, platform, account_key, total, disp
         FROM inventory WHERE email = $1 ORDER BY platform",
    )
    .bind(email)
    .fetch_all(pool)
    .await
    .context("Failed to read inventory by email")?;

    Ok(rows.iter().map(inventory_from_row).collect())
}

/// Persist the slot counters of an entry
pub async fn save_slots(pool: &PgPool, entry: &InventoryEntry) -> Result<bool> {
    info!(email = %entry.email, platform = %entry.platform, disp = entry.disp, "Saving slot count");

    let rows_affected = sqlx::query(
        "UPDATE inventory SET disp = $3, total = $4 WHERE email = $1 AND platform = $2",
    )
    .bind(&entry.email)
    .bind(&entry.platform)
    .bind(entry.disp)
    .bind(entry.total)
    .execute(pool)
    .await
    .context("Failed to save slot count")?
    .rows_affected();

    Ok(rows_affected > 0)
}

/// Replace the key of an entry
pub async fn update_inventory_key(
    pool: &PgPool,
    email: &str,
    platform: &str,
    key: &str,
) -> Result<bool> {
    info!(email = %email, platform = %platform, "Updating account key");

    let rows_affected =
        sqlx::query("UPDATE inventory SET account_key = $3 WHERE email = $1 AND platform = $2")
            .bind(email)
            .bind(platform)
            .bind(key)
            .execute(pool)
            .await
            .context("Failed to update account key")?
            .rows_affected();

    Ok(rows_affected > 0)
}

/// Delete an inventory entry
pub async fn delete_inventory_entry(pool: &PgPool, email: &str, platform: &str) -> Result<bool> {
    info!(email = %email, platform = %platform, "Deleting inventory entry");

    let rows_affected = sqlx::query("DELETE FROM inventory WHERE email = $1 AND platform = $2")
        .bind(email)
        .bind(platform)
        .execute(pool)
        .await
        .context("Failed to delete inventory entry")?
        .rows_affected();

    Ok(rows_affected > 0)
}

/// Count inventory entries, optionally for one platform
pub async fn count_inventory(pool: &PgPool, platform: Option<&str>) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM inventory WHERE ($1::TEXT IS NULL OR platform = $1)")
            .bind(platform)
            .fetch_one(pool)
            .await
            .context("Failed to count inventory")?;

    Ok(count)
}

/// One page of the inventory, ordered by platform then email
pub async fn list_inventory(
    pool: &PgPool,
    platform: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<InventoryEntry>> {
    debug!(platform = ?platform, limit, offset, "Listing inventory");

    let rows = sqlx::query(
        "SELECT email, platform, account_key, total, disp
         FROM inventory
         WHERE ($1::TEXT IS NULL OR platform = $1)
         ORDER BY platform, email
         LIMIT $2 OFFSET $3",
    )
    .bind(platform)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list inventory")?;

    Ok(rows.iter().map(inventory_from_row).collect())
}

/// Platforms that still have at least one free slot
pub async fn list_available_platforms(pool: &PgPool) -> Result<Vec<PlatformAvailability>> {
    let rows = sqlx::query(
        "SELECT platform, SUM(disp)::BIGINT AS free_slots
         FROM inventory WHERE disp > 0
         GROUP BY platform ORDER BY platform",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list available platforms")?;

    Ok(rows
        .iter()
        .map(|row| PlatformAvailability {
            platform: row.get("platform"),
            free_slots: row.get("free_slots"),
        })
        .collect())
}

/// Accounts of a platform that still have free slots
pub async fn list_available_accounts(pool: &PgPool, platform: &str) -> Result<Vec<InventoryEntry>> {
    let rows = sqlx::query(
        "SELECT email, platform, account_key, total, disp
         FROM inventory WHERE platform = $1 AND disp > 0
         ORDER BY disp DESC, email",
    )
    .bind(platform)
    .fetch_all(pool)
    .await
    .context("Failed to list available accounts")?;

    Ok(rows.iter().map(inventory_from_row).collect())
}

/// `LIKE` pattern matching `term` anywhere, with its wildcards taken literally
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Inventory entries whose email or platform contains `term`
pub async fn search_inventory(pool: &PgPool, term: &str) -> Result<Vec<InventoryEntry>> {
    let rows = sqlx::query(
        r"SELECT email, platform, account_key, total, disp
         FROM inventory
         WHERE email ILIKE $1 ESCAPE '\' OR platform ILIKE $1 ESCAPE '\'
         ORDER BY platform, email LIMIT 25",
    )
    .bind(contains_pattern(term))
    .fetch_all(pool)
    .await
    .context("Failed to search inventory")?;

    Ok(rows.iter().map(inventory_from_row).collect())
}

/// Read a customer with its subscriptions in creation order
pub async fn get_customer(pool: &PgPool, phone: &str) -> Result<Option<Customer>> {
    debug!(phone = %phone, "Reading customer");

    let row = sqlx::query("SELECT phone, name FROM customers WHERE phone = $1")
        .bind(phone)
        .fetch_optional(pool)
        .await
        .context("Failed to read customer")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let subscriptions = sqlx::query(
        "SELECT platform, email, renewal_date, created_on
         FROM subscriptions WHERE phone = $1 ORDER BY id",
    )
    .bind(phone)
    .fetch_all(pool)
    .await
    .context("Failed to read subscriptions")?;

    Ok(Some(Customer {
        phone: row.get("phone"),
        name: row.get("name"),
        subscriptions: subscriptions.iter().map(subscription_from_row).collect(),
    }))
}

pub async fn count_customers(pool: &PgPool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
        .fetch_one(pool)
        .await
        .context("Failed to count customers")?;

    Ok(count)
}

fn summary_from_row(row: &PgRow) -> CustomerSummary {
    CustomerSummary {
        phone: row.get("phone"),
        name: row.get("name"),
        subscription_count: row.get("subscription_count"),
    }
}

/// Customers in insertion order. `limit = None` returns all of them.
pub async fn list_customers(
    pool: &PgPool,
    limit: Option<i64>,
    offset: i64,
) -> Result<Vec<CustomerSummary>> {
    let rows = sqlx::query(
        "SELECT c.phone, c.name, COUNT(s.id) AS subscription_count
         FROM customers c
         LEFT JOIN subscriptions s ON s.phone = c.phone
         GROUP BY c.phone, c.name, c.seq
         ORDER BY c.seq
         LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list customers")?;

    Ok(rows.iter().map(summary_from_row).collect())
}

/// Customers whose phone or name contains `term`
pub async fn search_customers(pool: &PgPool, term: &str) -> Result<Vec<CustomerSummary>> {
    let rows = sqlx::query(
        r"SELECT c.phone, c.name, COUNT(s.id) AS subscription_count
         FROM customers c
         LEFT JOIN subscriptions s ON s.phone = c.phone
         WHERE c.phone LIKE $1 ESCAPE '\' OR c.name ILIKE $1 ESCAPE '\'
         GROUP BY c.phone, c.name, c.seq
         ORDER BY c.seq LIMIT 25",
    )
    .bind(contains_pattern(term))
    .fetch_all(pool)
    .await
    .context("Failed to search customers")?;

    Ok(rows.iter().map(summary_from_row).collect())
}

/// Delete a customer and, by cascade, all its subscriptions
pub async fn delete_customer(pool: &PgPool, phone: &str) -> Result<bool> {
    info!(phone = %phone, "Deleting customer");

    let rows_affected = sqlx::query("DELETE FROM customers WHERE phone = $1")
        .bind(phone)
        .execute(pool)
        .await
        .context("Failed to delete customer")?
        .rows_affected();

    Ok(rows_affected > 0)
}

/// Remove exactly one subscription
pub async fn delete_subscription(
    pool: &PgPool,
    phone: &str,
    platform: &str,
    email: &str,
) -> Result<bool> {
    info!(phone = %phone, platform = %platform, email = %email, "Deleting subscription");

    let rows_affected = sqlx::query(
        "DELETE FROM subscriptions WHERE phone = $1 AND platform = $2 AND email = $3",
    )
    .bind(phone)
    .bind(platform)
    .bind(email)
    .execute(pool)
    .await
    .context("Failed to delete subscription")?
    .rows_affected();

    Ok(rows_affected > 0)
}

/// Sell one slot of (email, platform) to a customer, creating the customer if needed
pub async fn sell_slot(
    pool: &PgPool,
    phone: &str,
    name: &str,
    platform: &str,
    email: &str,
    today: NaiveDate,
) -> Result<SaleOutcome> {
    info!(phone = %phone, platform = %platform, email = %email, "Selling slot");

    let mut tx = pool.begin().await.context("Failed to begin sale")?;

    sqlx::query("INSERT INTO customers (phone, name) VALUES ($1, $2) ON CONFLICT (phone) DO NOTHING")
        .bind(phone)
        .bind(name)
        .execute(&mut *tx)
        .await
        .context("Failed to create customer")?;

    let row = sqlx::query(
        "SELECT email, platform, account_key, total, disp
         FROM inventory WHERE email = $1 AND platform = $2 FOR UPDATE",
    )
    .bind(email)
    .bind(platform)
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to lock inventory entry")?;

    let Some(row) = row else {
        return Ok(SaleOutcome::UnknownAccount);
    };
    let mut entry = inventory_from_row(&row);
    if entry.take_slots(1) == 0 {
        return Ok(SaleOutcome::NoSlots);
    }

    let subscription = Subscription::new(platform, email, today);
    let inserted = sqlx::query(
        "INSERT INTO subscriptions (phone, platform, email, renewal_date, created_on)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (phone, platform, email) DO NOTHING",
    )
    .bind(phone)
    .bind(&subscription.platform)
    .bind(&subscription.email)
    .bind(subscription.renewal_date)
    .bind(subscription.created_on)
    .execute(&mut *tx)
    .await
    .context("Failed to insert subscription")?
    .rows_affected();

    if inserted == 0 {
        return Ok(SaleOutcome::AlreadySubscribed);
    }

    sqlx::query("UPDATE inventory SET disp = $3 WHERE email = $1 AND platform = $2")
        .bind(email)
        .bind(platform)
        .bind(entry.disp)
        .execute(&mut *tx)
        .await
        .context("Failed to take slot")?;

    tx.commit().await.context("Failed to commit sale")?;

    info!(phone = %phone, platform = %platform, disp = entry.disp, "Slot sold");
    Ok(SaleOutcome::Sold {
        subscription,
        entry,
    })
}

/// Renew the customer's earliest-due subscription on `platform`: append a
/// payment and move the renewal date one period forward.
pub async fn renew_subscription(
    pool: &PgPool,
    phone: &str,
    platform: &str,
    amount: Option<i64>,
    today: NaiveDate,
) -> Result<Option<Payment>> {
    info!(phone = %phone, platform = %platform, "Renewing subscription");

    let mut tx = pool.begin().await.context("Failed to begin renewal")?;

    let row = sqlx::query(
        "SELECT id, platform, email, renewal_date, created_on
         FROM subscriptions
         WHERE phone = $1 AND platform = $2
         ORDER BY renewal_date, id
         LIMIT 1
         FOR UPDATE",
    )
    .bind(phone)
    .bind(platform)
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to lock subscription")?;

    let Some(row) = row else {
        return Ok(None);
    };
    let id: i64 = row.get("id");
    let mut subscription = subscription_from_row(&row);
    let payment = subscription.renew(phone, amount, today);

    sqlx::query("UPDATE subscriptions SET renewal_date = $2 WHERE id = $1")
        .bind(id)
        .bind(subscription.renewal_date)
        .execute(&mut *tx)
        .await
        .context("Failed to advance renewal date")?;

    insert_payment(&mut tx, &payment).await?;

    tx.commit().await.context("Failed to commit renewal")?;

    info!(phone = %phone, platform = %platform, renewal_date = %subscription.renewal_date, "Subscription renewed");
    Ok(Some(payment))
}

async fn insert_payment(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, payment: &Payment) -> Result<()> {
    sqlx::query(
        "INSERT INTO payments (phone, platform, amount, paid_on, period_start, period_end)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(&payment.phone)
    .bind(&payment.platform)
    .bind(payment.amount)
    .bind(payment.paid_on)
    .bind(payment.period_start)
    .bind(payment.period_end)
    .execute(&mut **tx)
    .await
    .context("Failed to insert payment")?;

    Ok(())
}

/// Latest payments first, optionally for one customer
pub async fn list_payments(pool: &PgPool, phone: Option<&str>, limit: i64) -> Result<Vec<Payment>> {
    let rows = sqlx::query(
        "SELECT phone, platform, amount, paid_on, period_start, period_end
         FROM payments
         WHERE ($1::TEXT IS NULL OR phone = $1)
         ORDER BY id DESC
         LIMIT $2",
    )
    .bind(phone)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list payments")?;

    Ok(rows.iter().map(payment_from_row).collect())
}

/// Every subscription joined with its customer's name
pub async fn list_renewal_rows(pool: &PgPool) -> Result<Vec<RenewalRow>> {
    let rows = sqlx::query(
        "SELECT s.phone, c.name, s.platform, s.email, s.renewal_date
         FROM subscriptions s
         JOIN customers c ON c.phone = s.phone
         ORDER BY s.renewal_date",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list subscriptions")?;

    Ok(rows
        .iter()
        .map(|row| RenewalRow {
            phone: row.get("phone"),
            name: row.get("name"),
            platform: row.get("platform"),
            email: row.get("email"),
            renewal_date: row.get("renewal_date"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("ana"), "%ana%");
        assert_eq!(contains_pattern("a_b%c"), r"%a\_b\%c%");
        assert_eq!(contains_pattern(r"x\y"), r"%x\\y%");
    }
}
