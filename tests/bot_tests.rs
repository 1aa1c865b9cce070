use chrono::NaiveDate;
use streamslots::bot::ui_builder::{
    create_customer_keyboard, create_email_choice_keyboard, create_menu_keyboard,
    create_pagination_keyboard, create_platform_choice_keyboard, format_customer_card,
    format_customer_txt, format_customers_page, format_customers_txt, format_inventory_page,
    format_payments, format_renewals, format_renewals_txt, format_search_results,
};
use streamslots::commands::CallbackAction;
use streamslots::db::{CustomerSummary, PlatformAvailability};
use streamslots::model::{Customer, InventoryEntry, Subscription};
use streamslots::renewals::RenewalRow;
use teloxide::types::{InlineKeyboardButtonKind, InlineKeyboardMarkup};

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn summary(name: &str, phone: &str) -> CustomerSummary {
        CustomerSummary {
            phone: phone.to_string(),
            name: name.to_string(),
            subscription_count: 1,
        }
    }

    fn callback_data(keyboard: &InlineKeyboardMarkup) -> Vec<String> {
        keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| match &button.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Two customers listed in insertion order
    #[test]
    fn test_customers_txt_numbering() {
        let customers = vec![summary("Ana", "555"), summary("Luis", "777")];

        assert_eq!(format_customers_txt(&customers), "01) Ana | 555\n02) Luis | 777");
    }

    #[test]
    fn test_customers_page_continues_numbering() {
        let customers = vec![summary("Marta", "888")];

        let page = format_customers_page(&customers, 1, 10, 2);

        assert!(page.contains("11) Marta | 888"));
        assert!(page.contains("2/2"));
    }

    #[test]
    fn test_customer_card_lists_subscriptions() {
        let today = date(2024, 1, 1);
        let mut customer = Customer::new("555", "Ana");
        customer
            .subscriptions
            .push(Subscription::new("netflix", "a@x.com", today));

        let card = format_customer_card(&customer, today);

        assert!(card.contains("Ana"));
        assert!(card.contains("555"));
        assert!(card.contains("netflix"));
        assert!(card.contains("31/01/2024"));
    }

    #[test]
    fn test_customer_keyboard_has_renew_per_platform_and_delete() {
        let today = date(2024, 1, 1);
        let mut customer = Customer::new("555", "Ana");
        customer
            .subscriptions
            .push(Subscription::new("netflix", "a@x.com", today));
        customer
            .subscriptions
            .push(Subscription::new("netflix", "b@x.com", today));
        customer
            .subscriptions
            .push(Subscription::new("disney", "c@x.com", today));

        let keyboard = create_customer_keyboard(&customer);
        let data = callback_data(&keyboard);

        assert_eq!(
            data,
            vec![
                CallbackAction::Renew {
                    phone: "555".to_string(),
                    platform: "netflix".to_string()
                }
                .to_data(),
                CallbackAction::Renew {
                    phone: "555".to_string(),
                    platform: "disney".to_string()
                }
                .to_data(),
                CallbackAction::DeleteCustomer {
                    phone: "555".to_string()
                }
                .to_data(),
            ]
        );
    }

    #[test]
    fn test_customer_txt_has_no_headings() {
        let today = date(2024, 1, 1);
        let mut customer = Customer::new("555", "Ana");
        customer
            .subscriptions
            .push(Subscription::new("disney", "a@x.com", today));

        assert_eq!(
            format_customer_txt(&customer),
            "Ana | 555\ndisney | a@x.com | 31/01/2024"
        );
    }

    #[test]
    fn test_inventory_page_marks_full_accounts() {
        let entries = vec![
            InventoryEntry::new("a@x.com", "KEY1", "disney", 2),
            InventoryEntry::new("b@x.com", "KEY2", "netflix", 0),
        ];

        let page = format_inventory_page(&entries, 0, 1);

        assert!(page.contains("🟢 disney | a@x.com | KEY1 | 2/2 | activa"));
        assert!(page.contains("🔴 netflix | b@x.com | KEY2 | 0/0 | llena"));
    }

    #[test]
    fn test_renewals_text_variants() {
        let today = date(2024, 6, 1);
        let rows = vec![RenewalRow {
            phone: "555".to_string(),
            name: "Ana".to_string(),
            platform: "netflix".to_string(),
            email: "a@x.com".to_string(),
            renewal_date: date(2024, 6, 6),
        }];

        let listing = format_renewals(&rows, today, 7);
        let plain = format_renewals_txt(&rows, today, 7);

        assert!(listing.contains("Ana | 555 | netflix | a@x.com | 06/06/2024"));
        assert!(plain.starts_with("Ana | 555 | netflix"));
        assert!(!plain.contains('\n'));
    }

    #[test]
    fn test_empty_listings_have_messages() {
        assert!(!format_customers_txt(&[]).is_empty());
        assert!(!format_payments(&[]).is_empty());
        assert!(!format_renewals(&[], date(2024, 1, 1), 7).is_empty());
        assert!(format_search_results("zzz", &[], &[]).contains("zzz"));
    }

    #[test]
    fn test_menu_keyboard_has_every_entry() {
        let keyboard = create_menu_keyboard();
        let labels: Vec<&str> = keyboard
            .keyboard
            .iter()
            .flatten()
            .map(|button| button.text.as_str())
            .collect();

        assert_eq!(
            labels,
            vec!["Inventario", "Clientes", "Pagos", "Renovaciones", "Buscar"]
        );
    }

    #[test]
    fn test_pagination_callbacks() {
        let keyboard = create_pagination_keyboard(1, 3, CallbackAction::CustomersPage).unwrap();
        let data = callback_data(&keyboard);

        assert_eq!(data.first().map(String::as_str), Some("CLI:0"));
        assert_eq!(data.last().map(String::as_str), Some("CLI:2"));
    }

    #[test]
    fn test_wizard_keyboards() {
        let platforms = vec![PlatformAvailability {
            platform: "disney".to_string(),
            free_slots: 3,
        }];
        let data = callback_data(&create_platform_choice_keyboard(&platforms));
        assert_eq!(
            data,
            vec![
                CallbackAction::WizardPlatform("disney".to_string()).to_data(),
                CallbackAction::WizardDone.to_data(),
            ]
        );

        let entries = vec![InventoryEntry::new("a@x.com", "KEY1", "disney", 3)];
        let data = callback_data(&create_email_choice_keyboard(&entries));
        assert_eq!(
            data,
            vec![CallbackAction::WizardEmail("a@x.com".to_string()).to_data()]
        );
    }

    #[test]
    fn test_buttons_with_oversized_payloads_are_left_out() {
        let long_email = format!("{}@x.com", "a".repeat(64));
        let entries = vec![
            InventoryEntry::new(&long_email, "KEY1", "disney", 3),
            InventoryEntry::new("b@x.com", "KEY2", "disney", 1),
        ];
        let data = callback_data(&create_email_choice_keyboard(&entries));
        assert_eq!(
            data,
            vec![CallbackAction::WizardEmail("b@x.com".to_string()).to_data()]
        );

        let today = date(2024, 1, 1);
        let mut customer = Customer::new("555", "Ana");
        customer
            .subscriptions
            .push(Subscription::new(&"x".repeat(60), "a@x.com", today));
        let data = callback_data(&create_customer_keyboard(&customer));
        assert_eq!(
            data,
            vec![CallbackAction::DeleteCustomer {
                phone: "555".to_string()
            }
            .to_data()]
        );
        assert!(data.iter().all(|d| d.len() <= 64));
    }
}
