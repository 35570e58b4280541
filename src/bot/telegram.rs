//! Telegram client using teloxide.

use teloxide::prelude::*;
use teloxide::types::{
    BotCommand, CallbackQuery, InlineKeyboardMarkup, MenuButton, MessageId, ParseMode,
};
use tracing::warn;

/// Thin wrapper over the Bot API for the calls this bot makes.
///
/// Every method is a single request with no retry; failures are logged
/// and surfaced as strings for the caller to ignore or report.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Send an HTML-formatted message, optionally with an inline keyboard.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<i64, String> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);

        if let Some(markup) = keyboard {
            request = request.reply_markup(markup);
        }

        request.await.map(|msg| msg.id.0 as i64).map_err(|e| {
            let msg = format!("Failed to send message: {e}");
            warn!("{}", msg);
            msg
        })
    }

    /// Replace the text (and keyboard) of a previously sent message.
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), String> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id as i32), text)
            .parse_mode(ParseMode::Html);

        if let Some(markup) = keyboard {
            request = request.reply_markup(markup);
        }

        request.await.map(|_| ()).map_err(|e| {
            let msg = format!("Failed to edit message: {e}");
            warn!("{}", msg);
            msg
        })
    }

    /// Acknowledge a callback query, optionally showing a short notice.
    pub async fn answer_callback_query(
        &self,
        query: &CallbackQuery,
        text: Option<&str>,
    ) -> Result<(), String> {
        let mut request = self.bot.answer_callback_query(query.id.clone());

        if let Some(text) = text {
            request = request.text(text);
        }

        request.await.map(|_| ()).map_err(|e| {
            let msg = format!("Failed to answer callback query: {e}");
            warn!("{}", msg);
            msg
        })
    }

    /// Point the platform's webhook at the given URL.
    pub async fn set_webhook(&self, url: &str) -> Result<(), String> {
        let url = reqwest::Url::parse(url).map_err(|e| format!("Invalid webhook URL: {e}"))?;

        self.bot.set_webhook(url).await.map(|_| ()).map_err(|e| {
            let msg = format!("Failed to set webhook: {e}");
            warn!("{}", msg);
            msg
        })
    }

    /// Publish the command table shown in the client UI.
    pub async fn set_my_commands(&self, commands: Vec<BotCommand>) -> Result<(), String> {
        self.bot
            .set_my_commands(commands)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to set commands: {e}");
                warn!("{}", msg);
                msg
            })
    }

    /// Show the command list as the chat menu button.
    pub async fn set_chat_menu_button(&self) -> Result<(), String> {
        self.bot
            .set_chat_menu_button()
            .menu_button(MenuButton::Commands)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to set menu button: {e}");
                warn!("{}", msg);
                msg
            })
    }
}
