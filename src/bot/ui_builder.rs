//! UI Builder module for creating keyboards and formatting messages

use chrono::NaiveDate;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

// Import localization
use crate::localization::{t, t_args};

use crate::commands::{CallbackAction, MenuItem, MAX_CALLBACK_DATA_BYTES};
use crate::db::{CustomerSummary, PlatformAvailability};
use crate::model::{Customer, InventoryEntry, Payment};
use crate::renewals::RenewalRow;

/// A message ready to be sent or used to edit an existing one
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn format_amount(amount: Option<i64>) -> String {
    amount.map_or_else(|| "-".to_string(), |a| a.to_string())
}

/// Number of pages needed for `total` items, at least one
pub fn page_count(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    total.div_ceil(page_size).max(1)
}

/// Reply keyboard with the main menu
pub fn create_menu_keyboard() -> KeyboardMarkup {
    let labels: Vec<KeyboardButton> = MenuItem::ALL
        .iter()
        .map(|item| KeyboardButton::new(item.label()))
        .collect();
    let rows: Vec<Vec<KeyboardButton>> = labels.chunks(3).map(|row| row.to_vec()).collect();
    KeyboardMarkup::new(rows).resize_keyboard()
}

/// ◀️ page/total ▶️ buttons. `make` builds the callback for a page index.
pub fn create_pagination_keyboard(
    page: usize,
    total_pages: usize,
    make: fn(usize) -> CallbackAction,
) -> Option<InlineKeyboardMarkup> {
    if total_pages <= 1 {
        return None;
    }

    let mut row = Vec::new();
    if page > 0 {
        row.push(InlineKeyboardButton::callback("◀️", make(page - 1).to_data()));
    }
    row.push(InlineKeyboardButton::callback(
        format!("{}/{}", page + 1, total_pages),
        CallbackAction::Noop.to_data(),
    ));
    if page + 1 < total_pages {
        row.push(InlineKeyboardButton::callback("▶️", make(page + 1).to_data()));
    }

    Some(InlineKeyboardMarkup::new(vec![row]))
}

/// One inventory line, key in plain text
pub fn format_inventory_line(entry: &InventoryEntry) -> String {
    format!(
        "{} | {} | {} | {}/{} | {}",
        entry.platform,
        entry.email,
        entry.key,
        entry.disp,
        entry.total,
        entry.status()
    )
}

/// Inventory page with a heading
pub fn format_inventory_page(entries: &[InventoryEntry], page: usize, total_pages: usize) -> String {
    if entries.is_empty() {
        return t("inventory-empty");
    }

    let mut result = t_args(
        "inventory-title",
        &[
            ("page", &(page + 1).to_string()),
            ("pages", &total_pages.to_string()),
        ],
    );
    result.push_str("\n\n");
    for entry in entries {
        let icon = if entry.is_full() { "🔴" } else { "🟢" };
        result.push_str(&format!("{} {}\n", icon, format_inventory_line(entry)));
    }
    result
}

/// Inventory as a bare copy/paste block
pub fn format_inventory_txt(entries: &[InventoryEntry]) -> String {
    if entries.is_empty() {
        return t("inventory-empty");
    }
    entries
        .iter()
        .map(format_inventory_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Customer card body
pub fn format_customer_card(customer: &Customer, today: NaiveDate) -> String {
    let mut result = t_args(
        "customer-card-title",
        &[("name", &customer.name), ("phone", &customer.phone)],
    );
    result.push_str("\n\n");

    if customer.subscriptions.is_empty() {
        result.push_str(&t("customer-no-subscriptions"));
        return result;
    }

    for (i, sub) in customer.subscriptions.iter().enumerate() {
        let days = sub.days_until_due(today);
        let icon = if days < 0 {
            "🔴"
        } else if days <= 3 {
            "🟡"
        } else {
            "🟢"
        };
        result.push_str(&format!(
            "{}. {} {} ({})\n   {} {}\n",
            i + 1,
            icon,
            sub.platform,
            sub.email,
            t("renews-on"),
            format_date(sub.renewal_date)
        ));
    }
    result
}

/// Inline button for `action`, or `None` when Telegram would reject its payload
fn callback_button(label: String, action: CallbackAction) -> Option<InlineKeyboardButton> {
    let data = action.to_data();
    (data.len() <= MAX_CALLBACK_DATA_BYTES).then(|| InlineKeyboardButton::callback(label, data))
}

/// Renovó per subscribed platform, then Eliminar
pub fn create_customer_keyboard(customer: &Customer) -> InlineKeyboardMarkup {
    let mut platforms: Vec<&str> = Vec::new();
    for sub in &customer.subscriptions {
        if !platforms.contains(&sub.platform.as_str()) {
            platforms.push(&sub.platform);
        }
    }

    let mut buttons: Vec<Vec<InlineKeyboardButton>> = platforms
        .into_iter()
        .filter_map(|platform| {
            callback_button(
                format!("✅ Renovó {}", platform),
                CallbackAction::Renew {
                    phone: customer.phone.clone(),
                    platform: platform.to_string(),
                },
            )
        })
        .map(|button| vec![button])
        .collect();

    buttons.push(vec![InlineKeyboardButton::callback(
        "🗑 Eliminar",
        CallbackAction::DeleteCustomer {
            phone: customer.phone.clone(),
        }
        .to_data(),
    )]);

    InlineKeyboardMarkup::new(buttons)
}

/// Customer card as plain text
pub fn format_customer_txt(customer: &Customer) -> String {
    let mut lines = vec![format!("{} | {}", customer.name, customer.phone)];
    for sub in &customer.subscriptions {
        lines.push(format!(
            "{} | {} | {}",
            sub.platform,
            sub.email,
            format_date(sub.renewal_date)
        ));
    }
    lines.join("\n")
}

fn renewal_line(row: &RenewalRow, today: NaiveDate) -> String {
    let days = row.days_left(today);
    let when = if days < 0 {
        t_args("overdue-days", &[("days", &(-days).to_string())])
    } else if days == 0 {
        t("due-today")
    } else {
        t_args("due-in-days", &[("days", &days.to_string())])
    };
    format!(
        "{} | {} | {} | {} | {} ({})",
        row.name,
        row.phone,
        row.platform,
        row.email,
        format_date(row.renewal_date),
        when
    )
}

/// Renewal listing with a heading
pub fn format_renewals(rows: &[RenewalRow], today: NaiveDate, window_days: i64) -> String {
    if rows.is_empty() {
        return t_args("renewals-empty", &[("days", &window_days.to_string())]);
    }
    let mut result = t_args("renewals-title", &[("days", &window_days.to_string())]);
    result.push_str("\n\n");
    for row in rows {
        result.push_str(&renewal_line(row, today));
        result.push('\n');
    }
    result
}

/// Renewal listing as a bare copy/paste block
pub fn format_renewals_txt(rows: &[RenewalRow], today: NaiveDate, window_days: i64) -> String {
    if rows.is_empty() {
        return t_args("renewals-empty", &[("days", &window_days.to_string())]);
    }
    rows.iter()
        .map(|row| renewal_line(row, today))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `NN) Name | Phone`, numbered from `first_number`
pub fn format_customer_lines(customers: &[CustomerSummary], first_number: usize) -> String {
    customers
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:02}) {} | {}", first_number + i, c.name, c.phone))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Output of `/clientes_txt`
pub fn format_customers_txt(customers: &[CustomerSummary]) -> String {
    if customers.is_empty() {
        return t("customers-empty");
    }
    format_customer_lines(customers, 1)
}

/// "Clientes" menu page
pub fn format_customers_page(
    customers: &[CustomerSummary],
    page: usize,
    page_size: usize,
    total_pages: usize,
) -> String {
    if customers.is_empty() {
        return t("customers-empty");
    }
    let mut result = t_args(
        "customers-title",
        &[
            ("page", &(page + 1).to_string()),
            ("pages", &total_pages.to_string()),
        ],
    );
    result.push_str("\n\n");
    for (i, c) in customers.iter().enumerate() {
        result.push_str(&format!(
            "{:02}) {} | {} ({})\n",
            page * page_size + i + 1,
            c.name,
            c.phone,
            c.subscription_count
        ));
    }
    result.push('\n');
    result.push_str(&t("customers-hint"));
    result
}

pub fn format_payments(payments: &[Payment]) -> String {
    if payments.is_empty() {
        return t("payments-empty");
    }
    let mut result = t("payments-title");
    result.push_str("\n\n");
    for p in payments {
        result.push_str(&format!(
            "{} | {} | {} | {} | {} → {}\n",
            format_date(p.paid_on),
            p.phone,
            p.platform,
            format_amount(p.amount),
            format_date(p.period_start),
            format_date(p.period_end)
        ));
    }
    result
}

/// Search results for the "Buscar" prompt
pub fn format_search_results(
    term: &str,
    customers: &[CustomerSummary],
    entries: &[InventoryEntry],
) -> String {
    if customers.is_empty() && entries.is_empty() {
        return t_args("search-no-results", &[("term", term)]);
    }
    let mut result = t_args("search-title", &[("term", term)]);
    result.push_str("\n\n");
    if !customers.is_empty() {
        result.push_str(&t("search-customers"));
        result.push('\n');
        result.push_str(&format_customer_lines(customers, 1));
        result.push_str("\n\n");
    }
    if !entries.is_empty() {
        result.push_str(&t("search-inventory"));
        result.push('\n');
        result.push_str(&format_inventory_txt(entries));
    }
    result.trim_end().to_string()
}

/// Telegram rejects messages over 4096 characters
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Split a long text on line boundaries into chunks Telegram accepts.
/// A single line longer than the limit is cut by characters.
pub fn split_message(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let mut line_chars: Vec<char> = line.chars().collect();
        while line_chars.len() > MAX_MESSAGE_CHARS {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = line_chars.split_off(MAX_MESSAGE_CHARS);
            parts.push(line_chars.into_iter().collect());
            line_chars = rest;
        }

        let line_len = line_chars.len();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };
        if current_len + needed > MAX_MESSAGE_CHARS {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.extend(line_chars);
        current_len += line_len;
    }

    if !current.is_empty() || parts.is_empty() {
        parts.push(current);
    }
    parts
}

/// Platforms with free slots plus "Listo"
pub fn create_platform_choice_keyboard(platforms: &[PlatformAvailability]) -> InlineKeyboardMarkup {
    let mut buttons: Vec<Vec<InlineKeyboardButton>> = platforms
        .iter()
        .filter_map(|p| {
            callback_button(
                format!("{} ({})", p.platform, p.free_slots),
                CallbackAction::WizardPlatform(p.platform.clone()),
            )
        })
        .map(|button| vec![button])
        .collect();
    buttons.push(vec![InlineKeyboardButton::callback(
        format!("✅ {}", t("wizard-done-button")),
        CallbackAction::WizardDone.to_data(),
    )]);
    InlineKeyboardMarkup::new(buttons)
}

/// Accounts of the chosen platform with free slots
pub fn create_email_choice_keyboard(entries: &[InventoryEntry]) -> InlineKeyboardMarkup {
    let buttons: Vec<Vec<InlineKeyboardButton>> = entries
        .iter()
        .filter_map(|e| {
            callback_button(
                format!("{} ({})", e.email, e.disp),
                CallbackAction::WizardEmail(e.email.clone()),
            )
        })
        .map(|button| vec![button])
        .collect();
    InlineKeyboardMarkup::new(buttons)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 10), 1);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
    }

    #[test]
    fn test_pagination_keyboard_edges() {
        assert!(create_pagination_keyboard(0, 1, CallbackAction::InventoryPage).is_none());

        let first = create_pagination_keyboard(0, 3, CallbackAction::InventoryPage).unwrap();
        assert_eq!(first.inline_keyboard[0].len(), 2);

        let middle = create_pagination_keyboard(1, 3, CallbackAction::InventoryPage).unwrap();
        assert_eq!(middle.inline_keyboard[0].len(), 3);
    }

    #[test]
    fn test_inventory_line_shows_key() {
        let entry = InventoryEntry::new("a@x.com", "KEY1", "disney", 0);
        assert_eq!(format_inventory_line(&entry), "disney | a@x.com | KEY1 | 0/0 | llena");
    }

    #[test]
    fn test_split_message_keeps_short_text() {
        assert_eq!(split_message("hola\nmundo"), vec!["hola\nmundo".to_string()]);
        assert_eq!(split_message(""), vec![String::new()]);
    }

    #[test]
    fn test_split_message_on_line_boundaries() {
        let line = "x".repeat(1500);
        let text = vec![line.clone(); 4].join("\n");
        let parts = split_message(&text);

        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.chars().count() <= MAX_MESSAGE_CHARS));
        assert_eq!(parts.join("\n"), text);
    }

    #[test]
    fn test_split_message_cuts_oversized_line() {
        let text = "ñ".repeat(MAX_MESSAGE_CHARS + 10);
        let parts = split_message(&text);

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(parts[1].chars().count(), 10);
    }
}
