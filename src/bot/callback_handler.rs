//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use sqlx::postgres::PgPool;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::MessageId;
use tracing::{debug, info, warn};

// Import localization
use crate::localization::{t, t_args};

use crate::commands::CallbackAction;
use crate::config::BotConfig;
use crate::db;
use crate::dialogue::WizardDialogue;
use crate::errors::BotError;

use super::command_handler::{customer_card, customers_page, error_reply, inventory_page};
use super::dialogue_manager::{choose_email, choose_platform, finish_wizard, Draft};
use super::message_handler::{edit_reply, log_failure, today};
use super::ui_builder::{format_date, Reply};

/// Toast shown on the pressed button, if any
type Toast = Option<String>;

async fn handle_renew(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    pool: &PgPool,
    config: &BotConfig,
    phone: &str,
    platform: &str,
) -> Result<Toast, BotError> {
    let today = today();
    let amount = config.price_for(platform);

    match db::renew_subscription(pool, phone, platform, amount, today).await? {
        Some(payment) => {
            info!(
                chat_id = %chat_id,
                phone = %phone,
                platform = %platform,
                period_end = %payment.period_end,
                "Renewal recorded"
            );
            match customer_card(pool, phone, today).await {
                Ok(card) => edit_reply(bot, chat_id, message_id, card).await,
                Err(e) => warn!(chat_id = %chat_id, error = %e, "Could not refresh customer card"),
            }
            Ok(Some(t_args(
                "renewed-toast",
                &[
                    ("platform", platform),
                    ("date", &format_date(payment.period_end)),
                ],
            )))
        }
        None => Ok(Some(t_args(
            "renew-not-found",
            &[("phone", phone), ("platform", platform)],
        ))),
    }
}

async fn handle_delete_customer(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    pool: &PgPool,
    phone: &str,
) -> Result<Toast, BotError> {
    if db::delete_customer(pool, phone).await? {
        info!(chat_id = %chat_id, phone = %phone, "Customer deleted");
        let text = t_args("customer-deleted", &[("phone", phone)]);
        edit_reply(bot, chat_id, message_id, Reply::text(text)).await;
        Ok(None)
    } else {
        Ok(Some(t_args("customer-not-found", &[("phone", phone)])))
    }
}

/// Edit the message in place with a fresh page
async fn show_page(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    page: Result<Reply, BotError>,
) -> Result<Toast, BotError> {
    edit_reply(bot, chat_id, message_id, page?).await;
    Ok(None)
}

/// Toast for the outcome of a button press. Failures become the error text.
pub fn callback_toast(chat_id: ChatId, result: Result<Toast, BotError>) -> Toast {
    match result {
        Ok(toast) => toast,
        Err(err) => {
            log_failure(chat_id, &err);
            Some(error_reply(&err))
        }
    }
}

async fn handle_wizard_action(
    bot: &Bot,
    chat_id: ChatId,
    pool: &PgPool,
    dialogue: &WizardDialogue,
    action: CallbackAction,
) -> Result<Toast, BotError> {
    let state = dialogue.get().await?.unwrap_or_default();
    let Some((draft, chosen_platform)) = Draft::from_state(&state) else {
        debug!(chat_id = %chat_id, state = ?state, "Wizard button pressed outside the wizard");
        return Ok(Some(t("callback-expired")));
    };

    match (action, chosen_platform) {
        (CallbackAction::WizardDone, _) => {
            finish_wizard(bot, chat_id, pool, dialogue, draft, today()).await?;
        }
        (CallbackAction::WizardPlatform(platform), _) => {
            choose_platform(bot, chat_id, pool, dialogue, draft, &platform).await?;
        }
        (CallbackAction::WizardEmail(email), Some(platform)) => {
            choose_email(bot, chat_id, pool, dialogue, draft, &platform, &email, today()).await?;
        }
        _ => return Ok(Some(t("callback-expired"))),
    }
    Ok(None)
}

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: teloxide::types::CallbackQuery,
    pool: Arc<PgPool>,
    config: Arc<BotConfig>,
    dialogue: WizardDialogue,
) -> Result<()> {
    debug!(user_id = %q.from.id, data = ?q.data, "Received callback query from user");

    let Some(msg) = &q.message else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    let chat_id = msg.chat().id;
    let message_id = msg.id();

    if !config.is_allowed(chat_id) {
        warn!(chat_id = %chat_id, "Callback from chat outside the allow-list");
        bot.answer_callback_query(q.id.clone())
            .text(t("access-denied"))
            .await?;
        return Ok(());
    }

    let action = q.data.as_deref().and_then(CallbackAction::parse);
    let result = match action {
        Some(CallbackAction::Renew { phone, platform }) => {
            handle_renew(&bot, chat_id, message_id, &pool, &config, &phone, &platform).await
        }
        Some(CallbackAction::DeleteCustomer { phone }) => {
            handle_delete_customer(&bot, chat_id, message_id, &pool, &phone).await
        }
        Some(CallbackAction::InventoryPage(page)) => {
            let page = inventory_page(&pool, &config, page).await;
            show_page(&bot, chat_id, message_id, page).await
        }
        Some(CallbackAction::CustomersPage(page)) => {
            let page = customers_page(&pool, &config, page).await;
            show_page(&bot, chat_id, message_id, page).await
        }
        Some(
            action @ (CallbackAction::WizardPlatform(_)
            | CallbackAction::WizardEmail(_)
            | CallbackAction::WizardDone),
        ) => handle_wizard_action(&bot, chat_id, &pool, &dialogue, action).await,
        Some(CallbackAction::Noop) => Ok(None),
        None => {
            warn!(chat_id = %chat_id, data = ?q.data, "Unknown callback data");
            Ok(Some(t("callback-unknown")))
        }
    };
    let toast = callback_toast(chat_id, result);

    // Always answer so the button stops spinning
    let answer = bot.answer_callback_query(q.id.clone());
    match toast {
        Some(text) => answer.text(text).await?,
        None => answer.await?,
    };

    Ok(())
}
