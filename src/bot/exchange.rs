//! Currency exchange flow: pick a currency, type an amount, get CNY.

use std::collections::HashMap;

use serde::Deserialize;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, UserId};
use tracing::error;

use crate::bot::format::{currency_name, currency_symbol};
use crate::bot::session::{Session, SessionStore};
use crate::bot::telegram::TelegramClient;

pub const SUPPORTED_CURRENCIES: [&str; 3] = ["USD", "EUR", "CAD"];

const DEFAULT_BASE_URL: &str = "https://api.frankfurter.app";

/// Client for the exchange-rate API.
pub struct RatesClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

#[derive(Debug)]
pub enum Error {
    Http(String),
    Api(String),
    Parse(String),
    MissingRate,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Api(e) => write!(f, "API error: {e}"),
            Error::Parse(e) => write!(f, "Parse error: {e}"),
            Error::MissingRate => write!(f, "CNY rate missing from response"),
        }
    }
}

impl std::error::Error for Error {}

impl RatesClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Latest `from -> CNY` rate.
    pub async fn latest_cny_rate(&self, from: &str) -> Result<f64, Error> {
        let url = format!("{}/latest?from={}&to=CNY", self.base_url, from);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Api(response.status().to_string()));
        }

        let data: RatesResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        data.rates.get("CNY").copied().ok_or(Error::MissingRate)
    }
}

impl Default for RatesClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse user-typed text as a positive, finite amount.
pub fn parse_amount(text: &str) -> Option<f64> {
    match text.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount > 0.0 => Some(amount),
        _ => None,
    }
}

/// Render the conversion result message.
pub fn render_conversion(currency: &str, amount: f64, rate: f64) -> String {
    let cny_amount = amount * rate;
    format!(
        "💱 <b>汇率转换结果</b>\n\n\
         <b>原始金额：</b>{}{:.2}\n\
         <b>目标金额：</b>{}{:.2}\n\n\
         <b>汇率：</b>1 {} = {:.4} CNY\n\
         <b>货币：</b>{} → 人民币\n\n\
         <i>数据来源：Frankfurter API</i>",
        currency_symbol(currency),
        amount,
        currency_symbol("CNY"),
        cny_amount,
        currency,
        rate,
        currency_name(currency),
    )
}

fn currency_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("🇺🇸 美元 (USD)", "ex_USD"),
            InlineKeyboardButton::callback("🇪🇺 欧元 (EUR)", "ex_EUR"),
        ],
        vec![InlineKeyboardButton::callback("🇨🇦 加元 (CAD)", "ex_CAD")],
    ])
}

/// `/exchange`: present the currency menu. No session is stored yet.
pub async fn handle_exchange_command(telegram: &TelegramClient, chat_id: i64) {
    telegram
        .send_message(
            chat_id,
            "💱 <b>汇率转换</b>\n\n请选择要转换为人民币的货币：",
            Some(currency_keyboard()),
        )
        .await
        .ok();
}

/// Currency chosen from the menu. Returns the alert text when the code is
/// rejected, for the dispatcher to attach to the callback answer.
pub async fn handle_currency_callback(
    telegram: &TelegramClient,
    sessions: &dyn SessionStore,
    chat_id: i64,
    message_id: i64,
    user_id: UserId,
    currency: &str,
) -> Option<&'static str> {
    if !SUPPORTED_CURRENCIES.contains(&currency) {
        return Some("不支持的货币");
    }

    sessions.set(
        user_id,
        Session::AwaitingAmount {
            currency: currency.to_string(),
        },
    );

    let name = currency_name(currency);
    telegram
        .edit_message_text(
            chat_id,
            message_id,
            &format!(
                "💱 <b>汇率转换</b>\n\n已选择：{name} ({currency})\n\n请输入 {name} 金额（例如：100）："
            ),
            None,
        )
        .await
        .ok();

    None
}

/// Free-text amount while awaiting one. Returns whether the message was
/// consumed by this flow.
pub async fn handle_amount_input(
    telegram: &TelegramClient,
    sessions: &dyn SessionStore,
    rates: &RatesClient,
    chat_id: i64,
    user_id: UserId,
    text: &str,
) -> bool {
    let Some(Session::AwaitingAmount { currency }) = sessions.get(user_id) else {
        return false;
    };

    let Some(amount) = parse_amount(text) else {
        telegram
            .send_message(chat_id, "❌ 请输入有效的数字金额（例如：100）", None)
            .await
            .ok();
        return true;
    };

    // A valid amount is the point of no return: the session is cleared
    // whether or not the rate lookup succeeds.
    sessions.delete(user_id);

    telegram
        .send_message(chat_id, "⏳ 正在查询汇率...", None)
        .await
        .ok();

    match rates.latest_cny_rate(&currency).await {
        Ok(rate) => {
            telegram
                .send_message(chat_id, &render_conversion(&currency, amount, rate), None)
                .await
                .ok();
        }
        Err(e) => {
            error!("Exchange rate lookup for {currency} failed: {e}");
            telegram
                .send_message(chat_id, "❌ 获取汇率失败，请稍后重试", None)
                .await
                .ok();
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_valid() {
        assert_eq!(parse_amount("100"), Some(100.0));
        assert_eq!(parse_amount("  3.5 "), Some(3.5));
        assert_eq!(parse_amount("0.01"), Some(0.01));
    }

    #[test]
    fn test_parse_amount_rejects_non_numeric() {
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("100元"), None);
    }

    #[test]
    fn test_parse_amount_rejects_non_positive() {
        assert_eq!(parse_amount("0"), None);
        assert_eq!(parse_amount("-5"), None);
        assert_eq!(parse_amount("NaN"), None);
        assert_eq!(parse_amount("inf"), None);
    }

    #[test]
    fn test_render_conversion_two_decimals() {
        let message = render_conversion("EUR", 100.0, 7.85);
        assert!(message.contains("¥785.00"));
        assert!(message.contains("€100.00"));
        assert!(message.contains("1 EUR = 7.8500 CNY"));
        assert!(message.contains("欧元 → 人民币"));
    }

    #[test]
    fn test_currency_keyboard_payloads() {
        let keyboard = currency_keyboard();
        let payloads: Vec<String> = keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| match &button.kind {
                teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => {
                    Some(data.clone())
                }
                _ => None,
            })
            .collect();
        assert_eq!(payloads, vec!["ex_USD", "ex_EUR", "ex_CAD"]);
    }
}
