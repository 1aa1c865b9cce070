//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::postgres::PgPool;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::MessageId;
use tracing::{debug, error, info, warn};

// Import localization
use crate::localization::{t, t_args};

use crate::commands::{parse_input, Command, Input, MenuItem, RenewalFilter};
use crate::config::BotConfig;
use crate::db;
use crate::dialogue::{WizardDialogue, WizardState};
use crate::errors::BotError;

use super::command_handler::{
    customers_page, error_reply, execute_command, inventory_page, payments, renewals,
};
use super::dialogue_manager::{handle_wizard_text, start_wizard};
use super::ui_builder::{create_menu_keyboard, format_search_results, split_message, Reply};

/// Date used for renewals and new subscriptions
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Send a reply, splitting long texts. The keyboard goes on the last part.
pub async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> Result<(), BotError> {
    let mut parts = split_message(&reply.text);
    let last = parts.pop().unwrap_or_default();
    for part in parts {
        bot.send_message(chat_id, part).await?;
    }

    let request = bot.send_message(chat_id, last);
    match reply.keyboard {
        Some(keyboard) => request.reply_markup(keyboard).await?,
        None => request.await?,
    };
    Ok(())
}

/// Replace the text and buttons of a message the bot sent earlier
pub async fn edit_reply(bot: &Bot, chat_id: ChatId, message_id: MessageId, reply: Reply) {
    let request = bot.edit_message_text(chat_id, message_id, reply.text);
    let result = match reply.keyboard {
        Some(keyboard) => request.reply_markup(keyboard).await,
        None => request.await,
    };
    if let Err(e) = result {
        // Telegram rejects edits that change nothing; the message is still correct
        warn!(chat_id = %chat_id, error = %e, "Failed to edit message");
    }
}

/// User errors are expected traffic; anything else is logged as a failure
pub fn log_failure(chat_id: ChatId, err: &BotError) {
    if err.is_user_error() {
        debug!(chat_id = %chat_id, error = %err, "Request rejected");
    } else {
        error!(chat_id = %chat_id, error = %err, "Request failed");
    }
}

/// Tell the chat about a failed step. Successful steps already replied.
pub async fn report(bot: &Bot, chat_id: ChatId, result: Result<(), BotError>) -> Result<()> {
    if let Err(err) = result {
        log_failure(chat_id, &err);
        bot.send_message(chat_id, error_reply(&err)).await?;
    }
    Ok(())
}

/// Send the outcome of a command: the reply, or the error as chat text
pub async fn respond(bot: &Bot, chat_id: ChatId, result: Result<Reply, BotError>) -> Result<()> {
    let result = match result {
        Ok(reply) => send_reply(bot, chat_id, reply).await,
        Err(err) => Err(err),
    };
    report(bot, chat_id, result).await
}

async fn send_with_menu(bot: &Bot, chat_id: ChatId, text: String) -> Result<()> {
    bot.send_message(chat_id, text)
        .reply_markup(create_menu_keyboard())
        .await?;
    Ok(())
}

async fn handle_menu(
    bot: &Bot,
    chat_id: ChatId,
    item: MenuItem,
    pool: &PgPool,
    config: &BotConfig,
    dialogue: &WizardDialogue,
    today: NaiveDate,
) -> Result<()> {
    debug!(chat_id = %chat_id, menu = ?item, "Menu selected");

    // Picking a menu entry leaves any wizard or search in progress
    dialogue.update(WizardState::Idle).await?;

    let result = match item {
        MenuItem::Inventario => inventory_page(pool, config, 0).await,
        MenuItem::Clientes => customers_page(pool, config, 0).await,
        MenuItem::Pagos => payments(pool, config, None).await,
        MenuItem::Renovaciones => renewals(pool, config, &RenewalFilter::Default, today, false).await,
        MenuItem::Buscar => {
            dialogue.update(WizardState::AwaitingSearchTerm).await?;
            Ok(Reply::text(t("search-prompt")))
        }
    };
    respond(bot, chat_id, result).await
}

/// Customers and inventory entries matching `term`
async fn search(pool: &PgPool, term: &str) -> Result<Reply, BotError> {
    let customers = db::search_customers(pool, term).await?;
    let entries = db::search_inventory(pool, &term.to_lowercase()).await?;
    info!(customers = customers.len(), entries = entries.len(), "Search completed");
    Ok(Reply::text(format_search_results(term, &customers, &entries)))
}

async fn handle_search(
    bot: &Bot,
    chat_id: ChatId,
    pool: &PgPool,
    dialogue: &WizardDialogue,
    term: &str,
) -> Result<()> {
    let term = term.trim();
    if term.is_empty() {
        bot.send_message(chat_id, t("search-prompt")).await?;
        return Ok(());
    }

    let result = search(pool, term).await;
    dialogue.update(WizardState::Idle).await?;
    respond(bot, chat_id, result).await
}

async fn handle_text_message(
    bot: &Bot,
    msg: &Message,
    text: &str,
    pool: Arc<PgPool>,
    config: Arc<BotConfig>,
    dialogue: WizardDialogue,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let today = today();
    debug!(chat_id = %chat_id, message_length = text.len(), "Received text message");

    let input = match parse_input(text) {
        Ok(input) => input,
        Err(e) => {
            debug!(chat_id = %chat_id, error = %e, "Unparseable command");
            bot.send_message(chat_id, e.user_message()).await?;
            return Ok(());
        }
    };

    match input {
        Input::Command(Command::Start) => {
            dialogue.update(WizardState::Idle).await?;
            send_with_menu(bot, chat_id, t("welcome")).await
        }
        Input::Command(Command::Help) => send_with_menu(bot, chat_id, t("help")).await,
        Input::Command(Command::NewCustomer) => {
            report(bot, chat_id, start_wizard(bot, chat_id, &dialogue).await).await
        }
        Input::Command(Command::Cancel) => {
            let state = dialogue.get().await?.unwrap_or_default();
            dialogue.update(WizardState::Idle).await?;
            let key = if state == WizardState::Idle {
                "nothing-to-cancel"
            } else {
                "wizard-cancelled"
            };
            send_with_menu(bot, chat_id, t(key)).await
        }
        Input::Command(command) => {
            let result = execute_command(&pool, &config, command, today).await;
            respond(bot, chat_id, result).await
        }
        Input::Menu(item) => handle_menu(bot, chat_id, item, &pool, &config, &dialogue, today).await,
        Input::Text(text) => {
            let state = dialogue.get().await?.unwrap_or_default();
            match state {
                WizardState::Idle => {
                    bot.send_message(chat_id, t_args("text-not-understood", &[("text", &text)]))
                        .await?;
                    Ok(())
                }
                WizardState::AwaitingSearchTerm => {
                    handle_search(bot, chat_id, &pool, &dialogue, &text).await
                }
                state => {
                    let result =
                        handle_wizard_text(bot, chat_id, &pool, &dialogue, state, &text, today).await;
                    report(bot, chat_id, result).await
                }
            }
        }
    }
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    pool: Arc<PgPool>,
    config: Arc<BotConfig>,
    dialogue: WizardDialogue,
) -> Result<()> {
    if !config.is_allowed(msg.chat.id) {
        warn!(chat_id = %msg.chat.id, "Message from chat outside the allow-list");
        bot.send_message(msg.chat.id, t("access-denied")).await?;
        return Ok(());
    }

    match msg.text() {
        Some(text) => {
            let text = text.to_string();
            handle_text_message(&bot, &msg, &text, pool, config, dialogue).await?;
        }
        None => {
            debug!(chat_id = %msg.chat.id, "Received non-text message");
            bot.send_message(msg.chat.id, t("unsupported-message")).await?;
        }
    }

    Ok(())
}
