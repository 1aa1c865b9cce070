//! Dialogue Manager module for the new-customer wizard
//!
//! `/nuevo` asks for a phone and a name, then loops over platform and
//! account choices, selling one slot per choice, until the operator
//! presses "Listo" or sends `/cancelar`.

use chrono::NaiveDate;
use sqlx::postgres::PgPool;
use teloxide::prelude::*;
use tracing::{debug, info, warn};

// Import localization
use crate::localization::{t, t_args};

use crate::commands::parse_email;
use crate::db::{self, SaleOutcome};
use crate::errors::BotError;
use crate::dialogue::{validate_name, validate_phone, WizardDialogue, WizardSale, WizardState, MAX_NAME_LENGTH};
use crate::model::normalize_platform;

use super::command_handler::customer_card;
use super::message_handler::send_reply;
use super::ui_builder::{create_email_choice_keyboard, create_platform_choice_keyboard, format_date};

/// Word that ends the wizard when typed instead of pressing the button
const DONE_WORD: &str = "listo";

/// Customer being registered by the wizard
#[derive(Debug, Clone)]
pub struct Draft {
    pub phone: String,
    pub name: String,
    pub sales: Vec<WizardSale>,
}

impl Draft {
    /// Draft carried by a state that already knows phone and name
    pub fn from_state(state: &WizardState) -> Option<(Draft, Option<String>)> {
        match state {
            WizardState::AwaitingPlatformChoice { phone, name, sales } => Some((
                Draft {
                    phone: phone.clone(),
                    name: name.clone(),
                    sales: sales.clone(),
                },
                None,
            )),
            WizardState::AwaitingEmailChoice {
                phone,
                name,
                platform,
                sales,
            } => Some((
                Draft {
                    phone: phone.clone(),
                    name: name.clone(),
                    sales: sales.clone(),
                },
                Some(platform.clone()),
            )),
            _ => None,
        }
    }
}

/// Start the wizard, dropping any previous one
pub async fn start_wizard(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: &WizardDialogue,
) -> Result<(), BotError> {
    info!(chat_id = %chat_id, "Starting new-customer wizard");
    dialogue.update(WizardState::AwaitingPhone).await?;
    bot.send_message(chat_id, t("wizard-ask-phone")).await?;
    Ok(())
}

/// Handle plain text typed while the wizard waits for input
pub async fn handle_wizard_text(
    bot: &Bot,
    chat_id: ChatId,
    pool: &PgPool,
    dialogue: &WizardDialogue,
    state: WizardState,
    text: &str,
    today: NaiveDate,
) -> Result<(), BotError> {
    debug!(chat_id = %chat_id, state = ?state, "Wizard input");

    match state {
        WizardState::AwaitingPhone => handle_phone_input(bot, chat_id, pool, dialogue, text).await,
        WizardState::AwaitingName { phone } => {
            handle_name_input(bot, chat_id, pool, dialogue, phone, text).await
        }
        WizardState::AwaitingPlatformChoice { .. } | WizardState::AwaitingEmailChoice { .. } => {
            let Some((draft, platform)) = Draft::from_state(&state) else {
                return Ok(());
            };
            if text.trim().eq_ignore_ascii_case(DONE_WORD) {
                return finish_wizard(bot, chat_id, pool, dialogue, draft, today).await;
            }
            match platform {
                None => {
                    let platform = normalize_platform(text);
                    choose_platform(bot, chat_id, pool, dialogue, draft, &platform).await
                }
                Some(platform) => match parse_email(text.trim()) {
                    Ok(email) => {
                        choose_email(bot, chat_id, pool, dialogue, draft, &platform, &email, today).await
                    }
                    Err(e) => {
                        bot.send_message(chat_id, e.user_message()).await?;
                        Ok(())
                    }
                },
            }
        }
        // Idle and search are not wizard states
        WizardState::Idle | WizardState::AwaitingSearchTerm => Ok(()),
    }
}

async fn handle_phone_input(
    bot: &Bot,
    chat_id: ChatId,
    pool: &PgPool,
    dialogue: &WizardDialogue,
    text: &str,
) -> Result<(), BotError> {
    let phone = match validate_phone(text) {
        Ok(phone) => phone,
        Err(_) => {
            bot.send_message(chat_id, t_args("wizard-invalid-phone", &[("input", text.trim())]))
                .await?;
            // Keep dialogue active, operator can try again
            return Ok(());
        }
    };

    match db::get_customer(pool, &phone).await? {
        Some(customer) => {
            bot.send_message(
                chat_id,
                t_args(
                    "wizard-existing-customer",
                    &[("name", &customer.name), ("phone", &customer.phone)],
                ),
            )
            .await?;
            let draft = Draft {
                phone: customer.phone,
                name: customer.name,
                sales: Vec::new(),
            };
            prompt_platforms(bot, chat_id, pool, dialogue, draft).await
        }
        None => {
            dialogue.update(WizardState::AwaitingName { phone }).await?;
            bot.send_message(chat_id, t("wizard-ask-name")).await?;
            Ok(())
        }
    }
}

async fn handle_name_input(
    bot: &Bot,
    chat_id: ChatId,
    pool: &PgPool,
    dialogue: &WizardDialogue,
    phone: String,
    text: &str,
) -> Result<(), BotError> {
    match validate_name(text) {
        Ok(name) => {
            let draft = Draft {
                phone,
                name,
                sales: Vec::new(),
            };
            prompt_platforms(bot, chat_id, pool, dialogue, draft).await
        }
        Err("too_long") => {
            bot.send_message(
                chat_id,
                t_args("wizard-name-too-long", &[("max", &MAX_NAME_LENGTH.to_string())]),
            )
            .await?;
            Ok(())
        }
        Err(_) => {
            bot.send_message(chat_id, t("wizard-name-invalid")).await?;
            Ok(())
        }
    }
}

/// Offer the platforms that still have free slots
pub async fn prompt_platforms(
    bot: &Bot,
    chat_id: ChatId,
    pool: &PgPool,
    dialogue: &WizardDialogue,
    draft: Draft,
) -> Result<(), BotError> {
    let platforms = db::list_available_platforms(pool).await?;
    let text = if platforms.is_empty() {
        t("wizard-no-stock")
    } else {
        t_args("wizard-choose-platform", &[("name", &draft.name)])
    };

    bot.send_message(chat_id, text)
        .reply_markup(create_platform_choice_keyboard(&platforms))
        .await?;

    dialogue
        .update(WizardState::AwaitingPlatformChoice {
            phone: draft.phone,
            name: draft.name,
            sales: draft.sales,
        })
        .await?;
    Ok(())
}

/// Offer the accounts of `platform` with free slots
pub async fn choose_platform(
    bot: &Bot,
    chat_id: ChatId,
    pool: &PgPool,
    dialogue: &WizardDialogue,
    draft: Draft,
    platform: &str,
) -> Result<(), BotError> {
    let accounts = db::list_available_accounts(pool, platform).await?;
    if accounts.is_empty() {
        bot.send_message(
            chat_id,
            t_args("wizard-platform-unavailable", &[("platform", platform)]),
        )
        .await?;
        return prompt_platforms(bot, chat_id, pool, dialogue, draft).await;
    }

    bot.send_message(
        chat_id,
        t_args("wizard-choose-email", &[("platform", platform)]),
    )
    .reply_markup(create_email_choice_keyboard(&accounts))
    .await?;

    dialogue
        .update(WizardState::AwaitingEmailChoice {
            phone: draft.phone,
            name: draft.name,
            platform: platform.to_string(),
            sales: draft.sales,
        })
        .await?;
    Ok(())
}

/// Sell one slot of the chosen account and go back to the platform list
#[allow(clippy::too_many_arguments)]
pub async fn choose_email(
    bot: &Bot,
    chat_id: ChatId,
    pool: &PgPool,
    dialogue: &WizardDialogue,
    mut draft: Draft,
    platform: &str,
    email: &str,
    today: NaiveDate,
) -> Result<(), BotError> {
    let outcome = db::sell_slot(pool, &draft.phone, &draft.name, platform, email, today).await?;
    let args = [("platform", platform), ("email", email)];

    match outcome {
        SaleOutcome::Sold {
            subscription,
            entry,
        } => {
            info!(
                chat_id = %chat_id,
                phone = %draft.phone,
                platform = %platform,
                email = %email,
                "Wizard sale recorded"
            );
            bot.send_message(
                chat_id,
                t_args(
                    "wizard-sold",
                    &[
                        ("platform", platform),
                        ("email", email),
                        ("key", &entry.key),
                        ("date", &format_date(subscription.renewal_date)),
                        ("disp", &entry.disp.to_string()),
                    ],
                ),
            )
            .await?;
            draft.sales.push(WizardSale {
                platform: platform.to_string(),
                email: email.to_string(),
            });
            prompt_platforms(bot, chat_id, pool, dialogue, draft).await
        }
        SaleOutcome::NoSlots => {
            bot.send_message(chat_id, t_args("wizard-no-slots", &args)).await?;
            choose_platform(bot, chat_id, pool, dialogue, draft, platform).await
        }
        SaleOutcome::UnknownAccount => {
            bot.send_message(chat_id, t_args("wizard-unknown-account", &args))
                .await?;
            choose_platform(bot, chat_id, pool, dialogue, draft, platform).await
        }
        SaleOutcome::AlreadySubscribed => {
            bot.send_message(chat_id, t_args("wizard-already-subscribed", &args))
                .await?;
            prompt_platforms(bot, chat_id, pool, dialogue, draft).await
        }
    }
}

/// End the wizard and show the resulting customer card
pub async fn finish_wizard(
    bot: &Bot,
    chat_id: ChatId,
    pool: &PgPool,
    dialogue: &WizardDialogue,
    draft: Draft,
    today: NaiveDate,
) -> Result<(), BotError> {
    dialogue.update(WizardState::Idle).await?;

    if draft.sales.is_empty() {
        bot.send_message(chat_id, t("wizard-finished-empty")).await?;
        return Ok(());
    }

    info!(chat_id = %chat_id, phone = %draft.phone, sales = draft.sales.len(), "Wizard finished");
    bot.send_message(
        chat_id,
        t_args(
            "wizard-finished",
            &[
                ("name", &draft.name),
                ("count", &draft.sales.len().to_string()),
            ],
        ),
    )
    .await?;

    match customer_card(pool, &draft.phone, today).await {
        Ok(card) => send_reply(bot, chat_id, card).await?,
        Err(e) => warn!(chat_id = %chat_id, error = %e, "Customer card unavailable after wizard"),
    }
    Ok(())
}
