//! Command Handler module: runs parsed commands against the store and
//! builds the reply. Nothing here talks to Telegram directly.

use chrono::NaiveDate;
use sqlx::postgres::PgPool;
use tracing::{debug, info};

use crate::commands::{CallbackAction, Command, RenewalFilter, TxtTarget};
use crate::config::BotConfig;
use crate::db;
use crate::errors::BotError;
use crate::localization::{t, t_args};
use crate::model::InventoryEntry;
use crate::renewals::due_within;

use super::ui_builder::{
    create_customer_keyboard, create_pagination_keyboard, format_customer_card,
    format_customer_txt, format_customers_page, format_customers_txt, format_inventory_page,
    format_inventory_txt, format_payments, format_renewals, format_renewals_txt, page_count, Reply,
};

/// Execute a data command and build its reply
pub async fn execute_command(
    pool: &PgPool,
    config: &BotConfig,
    command: Command,
    today: NaiveDate,
) -> Result<Reply, BotError> {
    debug!(command = ?command, "Executing command");

    match command {
        Command::Start => Ok(Reply::text(t("welcome"))),
        // Wizard commands are routed by the message handler; reaching here means help is due
        Command::Help | Command::NewCustomer | Command::Cancel => Ok(Reply::text(t("help"))),
        Command::Add {
            email,
            key,
            platform,
            disp,
        } => add_inventory_entry(pool, &email, &key, &platform, disp).await,
        Command::Delete { email, platform } => {
            if db::delete_inventory_entry(pool, &email, &platform).await? {
                Ok(Reply::text(t_args(
                    "inventory-deleted",
                    &[("email", &email), ("platform", &platform)],
                )))
            } else {
                Err(inventory_not_found(&email, &platform))
            }
        }
        Command::EditKey {
            email,
            platform,
            key,
        } => {
            if db::update_inventory_key(pool, &email, &platform, &key).await? {
                Ok(Reply::text(t_args(
                    "inventory-key-updated",
                    &[("email", &email), ("platform", &platform), ("key", &key)],
                )))
            } else {
                Err(inventory_not_found(&email, &platform))
            }
        }
        Command::TakeSlots {
            email,
            platform,
            amount,
        } => {
            let mut entry = resolve_entry(pool, &email, platform.as_deref()).await?;
            entry.take_slots(amount);
            db::save_slots(pool, &entry).await?;
            Ok(Reply::text(slots_message(&entry)))
        }
        Command::ReleaseSlots {
            email,
            platform,
            amount,
        } => {
            let mut entry = resolve_entry(pool, &email, platform.as_deref()).await?;
            entry.release_slots(amount);
            db::save_slots(pool, &entry).await?;
            Ok(Reply::text(slots_message(&entry)))
        }
        Command::ShowCustomer { phone } => customer_card(pool, &phone, today).await,
        Command::DeleteSubscription {
            phone,
            platform,
            email,
        } => {
            if db::get_customer(pool, &phone).await?.is_none() {
                return Err(customer_not_found(&phone));
            }
            if db::delete_subscription(pool, &phone, &platform, &email).await? {
                Ok(Reply::text(t_args(
                    "subscription-deleted",
                    &[("phone", &phone), ("platform", &platform), ("email", &email)],
                )))
            } else {
                Err(BotError::not_found(t_args(
                    "subscription-not-found",
                    &[("phone", &phone), ("platform", &platform), ("email", &email)],
                )))
            }
        }
        Command::Renewals(filter) => renewals(pool, config, &filter, today, false).await,
        Command::Txt(TxtTarget::Customer(phone)) => {
            let customer = db::get_customer(pool, &phone)
                .await?
                .ok_or_else(|| customer_not_found(&phone))?;
            Ok(Reply::text(format_customer_txt(&customer)))
        }
        Command::Txt(TxtTarget::Renewals(filter)) => {
            renewals(pool, config, &filter, today, true).await
        }
        Command::Txt(TxtTarget::Inventory(platform)) => {
            let entries = db::list_inventory(pool, platform.as_deref(), i64::MAX, 0).await?;
            Ok(Reply::text(format_inventory_txt(&entries)))
        }
        Command::CustomersTxt => {
            let customers = db::list_customers(pool, None, 0).await?;
            Ok(Reply::text(format_customers_txt(&customers)))
        }
        Command::Inventory { platform: None } => inventory_page(pool, config, 0).await,
        Command::Inventory {
            platform: Some(platform),
        } => {
            let entries = db::list_inventory(pool, Some(&platform), i64::MAX, 0).await?;
            Ok(Reply::text(format_inventory_page(&entries, 0, 1)))
        }
        Command::Payments { phone } => payments(pool, config, phone.as_deref()).await,
    }
}

async fn add_inventory_entry(
    pool: &PgPool,
    email: &str,
    key: &str,
    platform: &str,
    disp: i32,
) -> Result<Reply, BotError> {
    let entry = match db::get_inventory_entry(pool, email, platform).await? {
        Some(mut existing) => {
            existing.key = key.to_string();
            existing.set_available(disp);
            existing
        }
        None => InventoryEntry::new(email, key, platform, disp),
    };
    let saved = db::upsert_inventory_entry(pool, &entry).await?;
    info!(email = %saved.email, platform = %saved.platform, disp = saved.disp, "Inventory entry saved");

    Ok(Reply::text(t_args(
        "inventory-saved",
        &[
            ("platform", &saved.platform),
            ("email", &saved.email),
            ("disp", &saved.disp.to_string()),
            ("status", saved.status().as_str()),
        ],
    )))
}

/// Find the entry `/addp` or `/delp` refers to. Without a platform the email
/// must match exactly one entry.
pub async fn resolve_entry(
    pool: &PgPool,
    email: &str,
    platform: Option<&str>,
) -> Result<InventoryEntry, BotError> {
    if let Some(platform) = platform {
        return db::get_inventory_entry(pool, email, platform)
            .await?
            .ok_or_else(|| inventory_not_found(email, platform));
    }

    let mut entries = db::find_inventory_by_email(pool, email).await?;
    match entries.len() {
        0 => Err(BotError::not_found(t_args("email-not-found", &[("email", email)]))),
        1 => Ok(entries.remove(0)),
        _ => {
            let platforms = entries
                .iter()
                .map(|e| e.platform.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            Err(BotError::Validation(t_args(
                "error-ambiguous-platform",
                &[("email", email), ("platforms", &platforms)],
            )))
        }
    }
}

fn slots_message(entry: &InventoryEntry) -> String {
    t_args(
        "slots-updated",
        &[
            ("platform", &entry.platform),
            ("email", &entry.email),
            ("disp", &entry.disp.to_string()),
            ("total", &entry.total.to_string()),
            ("status", entry.status().as_str()),
        ],
    )
}

fn inventory_not_found(email: &str, platform: &str) -> BotError {
    BotError::not_found(t_args(
        "inventory-not-found",
        &[("email", email), ("platform", platform)],
    ))
}

pub fn customer_not_found(phone: &str) -> BotError {
    BotError::not_found(t_args("customer-not-found", &[("phone", phone)]))
}

/// Customer card with its Renovó/Eliminar buttons
pub async fn customer_card(pool: &PgPool, phone: &str, today: NaiveDate) -> Result<Reply, BotError> {
    let customer = db::get_customer(pool, phone)
        .await?
        .ok_or_else(|| customer_not_found(phone))?;

    Ok(Reply::text(format_customer_card(&customer, today))
        .with_keyboard(create_customer_keyboard(&customer)))
}

/// Renewals due inside the filter's window
pub async fn renewals(
    pool: &PgPool,
    config: &BotConfig,
    filter: &RenewalFilter,
    today: NaiveDate,
    plain: bool,
) -> Result<Reply, BotError> {
    let rows = db::list_renewal_rows(pool).await?;
    let window = filter.window_days(config.renewal_window_days);
    let due = due_within(rows, today, filter, config.renewal_window_days);
    debug!(due = due.len(), window, "Renewals selected");

    let text = if plain {
        format_renewals_txt(&due, today, window)
    } else {
        format_renewals(&due, today, window)
    };
    Ok(Reply::text(text))
}

/// One page of the whole inventory with pagination buttons
pub async fn inventory_page(pool: &PgPool, config: &BotConfig, page: usize) -> Result<Reply, BotError> {
    let page_size = config.inventory_page_size;
    let total = db::count_inventory(pool, None).await?;
    let total_pages = page_count(usize::try_from(total).unwrap_or(0), page_size);
    let page = page.min(total_pages - 1);

    let entries = db::list_inventory(
        pool,
        None,
        page_size as i64,
        (page * page_size) as i64,
    )
    .await?;

    let reply = Reply::text(format_inventory_page(&entries, page, total_pages));
    Ok(
        match create_pagination_keyboard(page, total_pages, CallbackAction::InventoryPage) {
            Some(keyboard) => reply.with_keyboard(keyboard),
            None => reply,
        },
    )
}

/// One page of the customer list with pagination buttons
pub async fn customers_page(pool: &PgPool, config: &BotConfig, page: usize) -> Result<Reply, BotError> {
    let page_size = config.inventory_page_size;
    let total = db::count_customers(pool).await?;
    let total_pages = page_count(usize::try_from(total).unwrap_or(0), page_size);
    let page = page.min(total_pages - 1);

    let customers =
        db::list_customers(pool, Some(page_size as i64), (page * page_size) as i64).await?;

    let reply = Reply::text(format_customers_page(&customers, page, page_size, total_pages));
    Ok(
        match create_pagination_keyboard(page, total_pages, CallbackAction::CustomersPage) {
            Some(keyboard) => reply.with_keyboard(keyboard),
            None => reply,
        },
    )
}

/// Latest payments, optionally for one customer
pub async fn payments(pool: &PgPool, config: &BotConfig, phone: Option<&str>) -> Result<Reply, BotError> {
    let payments = db::list_payments(pool, phone, config.payments_limit).await?;
    Ok(Reply::text(format_payments(&payments)))
}

/// Text shown in the chat for a failed command
pub fn error_reply(err: &BotError) -> String {
    match err {
        BotError::Validation(msg) | BotError::NotFound(msg) => msg.clone(),
        _ => t("error-generic"),
    }
}
