//! Selection of subscriptions that are due for renewal.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::commands::RenewalFilter;

/// A subscription joined with its customer, as listed by `/renovaciones`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalRow {
    pub phone: String,
    pub name: String,
    pub platform: String,
    pub email: String,
    pub renewal_date: NaiveDate,
}

impl RenewalRow {
    pub fn days_left(&self, today: NaiveDate) -> i64 {
        (self.renewal_date - today).num_days()
    }
}

/// Rows due on or before `today + window`, overdue ones included, soonest first
pub fn due_within(
    rows: Vec<RenewalRow>,
    today: NaiveDate,
    filter: &RenewalFilter,
    default_window_days: i64,
) -> Vec<RenewalRow> {
    let window = filter.window_days(default_window_days);
    let platform = filter.platform();

    let mut due: Vec<RenewalRow> = rows
        .into_iter()
        .filter(|row| row.days_left(today) <= window)
        .filter(|row| platform.map_or(true, |p| row.platform == p))
        .collect();
    due.sort_by(|a, b| {
        a.renewal_date
            .cmp(&b.renewal_date)
            .then_with(|| a.name.cmp(&b.name))
    });
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn row(name: &str, platform: &str, renewal_date: NaiveDate) -> RenewalRow {
        RenewalRow {
            phone: format!("{}-phone", name),
            name: name.to_string(),
            platform: platform.to_string(),
            email: "a@x.com".to_string(),
            renewal_date,
        }
    }

    #[test]
    fn test_window_includes_soon_excludes_far() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let soon = row("Ana", "disney", today + Days::new(5));
        let far = row("Luis", "disney", today + Days::new(40));

        let due = due_within(vec![far, soon.clone()], today, &RenewalFilter::Default, 7);
        assert_eq!(due, vec![soon]);
    }

    #[test]
    fn test_overdue_first_and_platform_filter() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let overdue = row("Ana", "netflix", today - Days::new(2));
        let due_today = row("Luis", "disney", today);

        let all = due_within(
            vec![due_today.clone(), overdue.clone()],
            today,
            &RenewalFilter::Default,
            7,
        );
        assert_eq!(all, vec![overdue.clone(), due_today.clone()]);

        let netflix = due_within(
            vec![due_today, overdue.clone()],
            today,
            &RenewalFilter::Platform("netflix".to_string()),
            7,
        );
        assert_eq!(netflix, vec![overdue]);
    }

    #[test]
    fn test_custom_window() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let far = row("Luis", "disney", today + Days::new(40));
        let due = due_within(vec![far.clone()], today, &RenewalFilter::Days(45), 7);
        assert_eq!(due, vec![far]);
    }
}
