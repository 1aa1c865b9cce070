//! # Inventory and Customer Data Model
//!
//! This module defines the records the bot keeps for the reseller business:
//! shared streaming accounts with their free slots, customers, the
//! subscriptions that link a customer to an account, and the payment log.
//!
//! ## Core Concepts
//!
//! - **InventoryEntry**: one streaming account (email + platform) and how many
//!   of its profiles are still unsold (`disp`)
//! - **SlotStatus**: `activa` while at least one slot is free, `llena` at zero.
//!   Always derived from `disp`, never stored
//! - **Customer**: identified by phone number, owns subscriptions
//! - **Subscription**: a profile sold on one account, renewed every 30 days
//! - **Payment**: append-only record written on each renewal
//!
//! ## Usage
//!
//! ```rust
//! use streamslots::model::{InventoryEntry, SlotStatus};
//!
//! let mut entry = InventoryEntry::new("a@x.com", "KEY1", "disney", 6);
//! assert_eq!(entry.status(), SlotStatus::Activa);
//!
//! entry.take_slots(6);
//! assert_eq!(entry.status(), SlotStatus::Llena);
//! ```

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of one subscription period
pub const RENEWAL_PERIOD_DAYS: u64 = 30;

/// Availability of an inventory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    /// At least one slot left
    Activa,
    /// No slot left
    Llena,
}

impl SlotStatus {
    /// Status implied by an available slot count
    pub fn from_available(disp: i32) -> Self {
        if disp <= 0 {
            SlotStatus::Llena
        } else {
            SlotStatus::Activa
        }
    }

    /// Parse the status token accepted by `/add`
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "activa" => Some(SlotStatus::Activa),
            "llena" => Some(SlotStatus::Llena),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Activa => "activa",
            SlotStatus::Llena => "llena",
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shared streaming account and its unsold profiles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    /// Streaming platform, lower case (e.g., "disney", "netflix")
    pub platform: String,

    /// Account login, lower case
    pub email: String,

    /// Account password or key, kept verbatim
    pub key: String,

    /// Largest slot count the entry has been given
    pub total: i32,

    /// Available (unsold) slots
    pub disp: i32,
}

impl InventoryEntry {
    /// Create an entry with `disp` free slots out of `disp` total
    pub fn new(email: &str, key: &str, platform: &str, disp: i32) -> Self {
        let disp = disp.max(0);
        Self {
            platform: normalize_platform(platform),
            email: normalize_email(email),
            key: key.to_string(),
            total: disp,
            disp,
        }
    }

    /// Current status, derived from `disp`
    pub fn status(&self) -> SlotStatus {
        SlotStatus::from_available(self.disp)
    }

    pub fn is_full(&self) -> bool {
        self.status() == SlotStatus::Llena
    }

    /// Overwrite the available count, as `/add` does on an existing entry
    pub fn set_available(&mut self, disp: i32) {
        self.disp = disp.max(0);
        self.total = self.total.max(self.disp);
    }

    /// Sell `amount` slots. Clamps at zero and returns how many were actually taken.
    pub fn take_slots(&mut self, amount: i32) -> i32 {
        let taken = amount.max(0).min(self.disp);
        self.disp -= taken;
        taken
    }

    /// Give back `amount` slots
    pub fn release_slots(&mut self, amount: i32) {
        self.disp = self.disp.saturating_add(amount.max(0));
        self.total = self.total.max(self.disp);
    }
}

impl fmt::Display for InventoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | {}/{} | {}",
            self.platform,
            self.email,
            self.key,
            self.disp,
            self.total,
            self.status()
        )
    }
}

/// A customer and the profiles they are paying for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Phone number, used as identity
    pub phone: String,

    /// Display name
    pub name: String,

    /// Subscriptions in creation order
    pub subscriptions: Vec<Subscription>,
}

impl Customer {
    pub fn new(phone: &str, name: &str) -> Self {
        Self {
            phone: phone.to_string(),
            name: name.trim().to_string(),
            subscriptions: Vec::new(),
        }
    }
}

/// One sold profile on an inventory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub platform: String,

    /// Email of the inventory entry the profile belongs to
    pub email: String,

    /// Next due date
    pub renewal_date: NaiveDate,

    pub created_on: NaiveDate,
}

impl Subscription {
    /// A fresh subscription sold on `today`, due one period later
    pub fn new(platform: &str, email: &str, today: NaiveDate) -> Self {
        Self {
            platform: normalize_platform(platform),
            email: normalize_email(email),
            renewal_date: advance_renewal(today),
            created_on: today,
        }
    }

    /// Days left until the renewal date (negative when overdue)
    pub fn days_until_due(&self, today: NaiveDate) -> i64 {
        (self.renewal_date - today).num_days()
    }

    /// Apply a renewal: move the due date one period forward and
    /// return the payment that records it.
    pub fn renew(&mut self, phone: &str, amount: Option<i64>, today: NaiveDate) -> Payment {
        let period_start = self.renewal_date;
        self.renewal_date = advance_renewal(period_start);
        Payment {
            phone: phone.to_string(),
            platform: self.platform.clone(),
            amount,
            paid_on: today,
            period_start,
            period_end: self.renewal_date,
        }
    }
}

/// Payment log record, written once per renewal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub phone: String,
    pub platform: String,

    /// Amount from the configured price table, if the platform has one
    pub amount: Option<i64>,

    pub paid_on: NaiveDate,

    /// Renewal date before the payment
    pub period_start: NaiveDate,

    /// Renewal date after the payment
    pub period_end: NaiveDate,
}

/// Renewal date one period after `date`
pub fn advance_renewal(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(RENEWAL_PERIOD_DAYS))
        .unwrap_or(NaiveDate::MAX)
}

pub fn normalize_platform(platform: &str) -> String {
    platform.trim().to_lowercase()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_status_is_derived_from_disp() {
        assert_eq!(SlotStatus::from_available(0), SlotStatus::Llena);
        assert_eq!(SlotStatus::from_available(1), SlotStatus::Activa);
        assert_eq!(SlotStatus::from_available(-3), SlotStatus::Llena);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(SlotStatus::parse("ACTIVA"), Some(SlotStatus::Activa));
        assert_eq!(SlotStatus::parse("llena"), Some(SlotStatus::Llena));
        assert_eq!(SlotStatus::parse("full"), None);
    }

    #[test]
    fn test_take_slots_clamps_at_zero() {
        let mut entry = InventoryEntry::new("a@x.com", "k", "disney", 2);
        assert_eq!(entry.take_slots(5), 2);
        assert_eq!(entry.disp, 0);
        assert!(entry.is_full());
    }

    #[test]
    fn test_release_from_full_reactivates() {
        let mut entry = InventoryEntry::new("a@x.com", "k", "disney", 0);
        assert!(entry.is_full());
        entry.release_slots(1);
        assert_eq!(entry.status(), SlotStatus::Activa);
    }

    #[test]
    fn test_release_grows_total() {
        let mut entry = InventoryEntry::new("a@x.com", "k", "disney", 4);
        entry.release_slots(2);
        assert_eq!(entry.disp, 6);
        assert_eq!(entry.total, 6);
    }

    #[test]
    fn test_new_entry_normalizes_identity() {
        let entry = InventoryEntry::new(" A@X.com ", "KeY", "Disney", 3);
        assert_eq!(entry.email, "a@x.com");
        assert_eq!(entry.platform, "disney");
        assert_eq!(entry.key, "KeY");
    }

    #[test]
    fn test_renew_advances_thirty_days() {
        let mut sub = Subscription::new("disney", "a@x.com", date(2024, 1, 1));
        assert_eq!(sub.renewal_date, date(2024, 1, 31));

        let payment = sub.renew("555", Some(3500), date(2024, 2, 2));
        assert_eq!(payment.period_start, date(2024, 1, 31));
        assert_eq!(payment.period_end, date(2024, 3, 1));
        assert_eq!(sub.renewal_date, date(2024, 3, 1));
        assert_eq!(payment.paid_on, date(2024, 2, 2));
    }
}
