//! Reminder flow and the periodic sweep that fires due reminders.
//!
//! Disabled by default; the dispatcher only routes here when the
//! capability is enabled in configuration.

use chrono::{NaiveDateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, UserId};
use tracing::{info, warn};

use crate::bot::format::format_beijing;
use crate::bot::session::{Session, SessionStore, TimeMode};
use crate::bot::store::ReminderStore;
use crate::bot::telegram::TelegramClient;

/// Repeat mode of a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    None,
    Daily,
    Weekly,
}

/// A reminder record, stored as one JSON document per key.
///
/// Field names follow the persisted format (`user_<userId>_<reminderId>`
/// keys, camelCase values).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub user_id: i64,
    pub chat_id: i64,
    pub message: String,
    /// Trigger time in Unix seconds (UTC).
    pub trigger_time: i64,
    pub repeat: Repeat,
    pub created_at: i64,
}

const DAY_SECS: i64 = 86_400;
const WEEK_SECS: i64 = 604_800;

/// Relative-time grammar: `<N>分钟|小时|天|周`, with an optional trailing 后.
const RELATIVE_PATTERNS: [(&str, i64); 4] = [
    (r"^(\d+)\s*分钟?后?$", 60),
    (r"^(\d+)\s*小时后?$", 3600),
    (r"^(\d+)\s*天后?$", DAY_SECS),
    (r"^(\d+)\s*周后?$", WEEK_SECS),
];

/// Parse a relative time expression against `now` (Unix seconds).
pub fn parse_relative_time(text: &str, now: i64) -> Option<i64> {
    let text = text.trim().to_lowercase();

    for (pattern, multiplier) in RELATIVE_PATTERNS {
        let re = Regex::new(pattern).unwrap();
        if let Some(caps) = re.captures(&text) {
            let value: i64 = caps[1].parse().ok()?;
            return Some(now + value * multiplier);
        }
    }

    None
}

/// Parse `YYYY-MM-DD HH:mm[:ss]` as Beijing (UTC+8) wall-clock time into
/// Unix seconds.
pub fn parse_absolute_time(text: &str) -> Option<i64> {
    let text = text.trim();

    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M"))
        .ok()?;

    Some(naive.and_utc().timestamp() - 8 * 3600)
}

/// New reminder id: `reminder_<epoch millis>_<random base36 suffix>`.
pub fn generate_id(now_millis: i64) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..7)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("reminder_{now_millis}_{suffix}")
}

fn storage_key(user_id: i64, reminder_id: &str) -> String {
    format!("user_{user_id}_{reminder_id}")
}

fn repeat_label(repeat: Repeat) -> &'static str {
    match repeat {
        Repeat::None => "一次性",
        Repeat::Daily => "每天重复",
        Repeat::Weekly => "每周重复",
    }
}

/// All reminders of one user, ascending by trigger time.
fn user_reminders(store: &ReminderStore, user_id: i64) -> Vec<Reminder> {
    let mut reminders: Vec<Reminder> = store
        .list_prefix(&format!("user_{user_id}_"))
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_str(&value) {
            Ok(reminder) => Some(reminder),
            Err(e) => {
                warn!("Skipping unparseable reminder record {key}: {e}");
                None
            }
        })
        .collect();
    reminders.sort_by_key(|r| r.trigger_time);
    reminders
}

/// Render the enumerated reminder list. A one-shot reminder whose time has
/// passed is shown as completed; the listing never deletes anything.
pub fn render_reminder_list(reminders: &[Reminder], now: i64) -> String {
    if reminders.is_empty() {
        return "📋 <b>提醒列表</b>\n\n暂无提醒事项".to_string();
    }

    let mut message = String::from("📋 <b>提醒列表</b>\n\n");
    for (index, reminder) in reminders.iter().enumerate() {
        let repeat_suffix = match reminder.repeat {
            Repeat::None => "",
            Repeat::Daily => " 🔄每天",
            Repeat::Weekly => " 🔄每周",
        };
        let is_past = reminder.trigger_time <= now && reminder.repeat == Repeat::None;
        let status = if is_past { "✅" } else { "⏰" };

        message.push_str(&format!(
            "{}. {} {}{}\n   {}\n\n",
            index + 1,
            status,
            format_beijing(reminder.trigger_time),
            repeat_suffix,
            reminder.message,
        ));
    }
    message
}

/// `/reminder`: present the management menu.
pub async fn handle_reminder_command(telegram: &TelegramClient, chat_id: i64) {
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("➕ 添加提醒", "rem_add")],
        vec![InlineKeyboardButton::callback("📋 查看提醒", "rem_list")],
        vec![InlineKeyboardButton::callback("🗑️ 删除提醒", "rem_delete")],
    ]);

    telegram
        .send_message(chat_id, "⏰ <b>提醒管理</b>\n\n请选择操作：", Some(keyboard))
        .await
        .ok();
}

/// "Add" chosen: ask how the trigger time will be given.
pub async fn handle_add_reminder(telegram: &TelegramClient, chat_id: i64, message_id: i64) {
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "📅 绝对时间",
            "rem_time_absolute",
        )],
        vec![InlineKeyboardButton::callback(
            "⏱️ 相对时间",
            "rem_time_relative",
        )],
    ]);

    telegram
        .edit_message_text(
            chat_id,
            message_id,
            "⏰ <b>添加提醒</b>\n\n请选择时间设置方式：",
            Some(keyboard),
        )
        .await
        .ok();
}

/// Time grammar chosen: open the session and prompt for the time.
pub async fn handle_time_mode_selection(
    telegram: &TelegramClient,
    sessions: &dyn SessionStore,
    chat_id: i64,
    message_id: i64,
    user_id: UserId,
    mode: TimeMode,
) {
    sessions.set(user_id, Session::AwaitingReminderTime { mode });

    let mut message = String::from("⏰ <b>设置提醒时间</b>\n\n");
    match mode {
        TimeMode::Absolute => {
            message.push_str("请输入具体日期时间（北京时间），格式：\n");
            message.push_str("<code>YYYY-MM-DD HH:mm</code>\n\n");
            message.push_str("例如：<code>2025-12-25 18:00</code>");
        }
        TimeMode::Relative => {
            message.push_str("请输入相对时间，例如：\n");
            message.push_str("• <code>30分钟</code>\n");
            message.push_str("• <code>2小时</code>\n");
            message.push_str("• <code>1天</code>\n");
            message.push_str("• <code>1周</code>");
        }
    }

    telegram
        .edit_message_text(chat_id, message_id, &message, None)
        .await
        .ok();
}

/// Free-text trigger time while awaiting one. Returns whether the message
/// was consumed by this flow. Parse failures and past times re-prompt and
/// leave the session unchanged.
pub async fn handle_time_input(
    telegram: &TelegramClient,
    sessions: &dyn SessionStore,
    chat_id: i64,
    user_id: UserId,
    text: &str,
) -> bool {
    let Some(Session::AwaitingReminderTime { mode }) = sessions.get(user_id) else {
        return false;
    };

    let now = Utc::now().timestamp();
    let timestamp = match mode {
        TimeMode::Absolute => match parse_absolute_time(text) {
            Some(ts) => ts,
            None => {
                telegram
                    .send_message(
                        chat_id,
                        "❌ 时间格式错误，请使用格式：<code>YYYY-MM-DD HH:mm</code>\n例如：<code>2025-12-25 18:00</code>",
                        None,
                    )
                    .await
                    .ok();
                return true;
            }
        },
        TimeMode::Relative => match parse_relative_time(text, now) {
            Some(ts) => ts,
            None => {
                telegram
                    .send_message(
                        chat_id,
                        "❌ 时间格式错误，请使用例如：<code>30分钟</code>、<code>2小时</code>、<code>1天</code>",
                        None,
                    )
                    .await
                    .ok();
                return true;
            }
        },
    };

    if timestamp <= now {
        telegram
            .send_message(chat_id, "❌ 提醒时间必须在未来", None)
            .await
            .ok();
        return true;
    }

    sessions.set(
        user_id,
        Session::AwaitingReminderMessage {
            trigger_time: timestamp,
            repeat: None,
        },
    );

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("一次性", "rem_repeat_none")],
        vec![InlineKeyboardButton::callback("每天重复", "rem_repeat_daily")],
        vec![InlineKeyboardButton::callback("每周重复", "rem_repeat_weekly")],
    ]);

    telegram
        .send_message(
            chat_id,
            &format!(
                "✅ 提醒时间：{}\n\n请选择重复方式：",
                format_beijing(timestamp)
            ),
            Some(keyboard),
        )
        .await
        .ok();

    true
}

/// Repeat mode chosen. Ignored unless the session is waiting for it.
pub async fn handle_repeat_selection(
    telegram: &TelegramClient,
    sessions: &dyn SessionStore,
    chat_id: i64,
    message_id: i64,
    user_id: UserId,
    repeat: Repeat,
) {
    let Some(Session::AwaitingReminderMessage { trigger_time, .. }) = sessions.get(user_id) else {
        return;
    };

    sessions.set(
        user_id,
        Session::AwaitingReminderMessage {
            trigger_time,
            repeat: Some(repeat),
        },
    );

    telegram
        .edit_message_text(
            chat_id,
            message_id,
            &format!(
                "✅ 重复方式：{}\n\n请输入提醒内容（消息）：",
                repeat_label(repeat)
            ),
            None,
        )
        .await
        .ok();
}

/// Free-text reminder content, the final step: persist the record and
/// clear the session. Returns whether the message was consumed.
pub async fn handle_message_input(
    telegram: &TelegramClient,
    sessions: &dyn SessionStore,
    store: &ReminderStore,
    chat_id: i64,
    user_id: UserId,
    text: &str,
) -> bool {
    let Some(Session::AwaitingReminderMessage {
        trigger_time,
        repeat: Some(repeat),
    }) = sessions.get(user_id)
    else {
        return false;
    };

    let now = Utc::now();
    let reminder = Reminder {
        id: generate_id(now.timestamp_millis()),
        user_id: user_id.0 as i64,
        chat_id,
        message: text.to_string(),
        trigger_time,
        repeat,
        created_at: now.timestamp(),
    };

    match serde_json::to_string(&reminder) {
        Ok(json) => store.put(&storage_key(reminder.user_id, &reminder.id), &json),
        Err(e) => warn!("Failed to serialize reminder {}: {e}", reminder.id),
    }

    sessions.delete(user_id);

    telegram
        .send_message(
            chat_id,
            &format!(
                "✅ <b>提醒已创建</b>\n\n📝 内容：{}\n⏰ 时间：{}\n🔄 重复：{}",
                text,
                format_beijing(trigger_time),
                repeat_label(repeat)
            ),
            None,
        )
        .await
        .ok();

    true
}

/// "List" chosen: replace the menu with the rendered list.
pub async fn handle_list_reminders(
    telegram: &TelegramClient,
    store: &ReminderStore,
    chat_id: i64,
    message_id: i64,
    user_id: UserId,
) {
    let reminders = user_reminders(store, user_id.0 as i64);
    let message = render_reminder_list(&reminders, Utc::now().timestamp());

    telegram
        .edit_message_text(chat_id, message_id, &message, None)
        .await
        .ok();
}

/// "Delete" chosen: replace the menu with one button per reminder.
pub async fn handle_delete_prompt(
    telegram: &TelegramClient,
    store: &ReminderStore,
    chat_id: i64,
    message_id: i64,
    user_id: UserId,
) {
    let reminders = user_reminders(store, user_id.0 as i64);

    if reminders.is_empty() {
        telegram
            .edit_message_text(chat_id, message_id, "📋 <b>删除提醒</b>\n\n暂无提醒事项", None)
            .await
            .ok();
        return;
    }

    let keyboard = InlineKeyboardMarkup::new(reminders.iter().enumerate().map(
        |(index, reminder)| {
            let preview: String = reminder.message.chars().take(30).collect();
            vec![InlineKeyboardButton::callback(
                format!("{}. {}", index + 1, preview),
                format!("rem_del_{}", reminder.id),
            )]
        },
    ));

    telegram
        .edit_message_text(
            chat_id,
            message_id,
            "🗑️ <b>删除提醒</b>\n\n请选择要删除的提醒：",
            Some(keyboard),
        )
        .await
        .ok();
}

/// Deletion confirmed. Deletes unconditionally; a missing record is not
/// distinguished for the user.
pub async fn handle_delete_confirm(
    telegram: &TelegramClient,
    store: &ReminderStore,
    chat_id: i64,
    message_id: i64,
    user_id: UserId,
    reminder_id: &str,
) {
    store.delete(&storage_key(user_id.0 as i64, reminder_id));

    telegram
        .edit_message_text(chat_id, message_id, "✅ 提醒已删除", None)
        .await
        .ok();
}

/// Whether a trigger time falls in the one-minute lookback window ending
/// at `now`. A sweep interval coarser than the window can miss reminders.
pub fn due_within_window(trigger_time: i64, now: i64) -> bool {
    trigger_time <= now && trigger_time > now - 60
}

/// Scan every stored reminder and fire the ones due in the last minute.
/// Daily and weekly reminders are advanced and rewritten; one-shot
/// reminders are deleted after firing.
///
/// The due check is stateless: overlapping sweeps can both read a record
/// before either rewrites it, and will both send it.
pub async fn sweep(telegram: &TelegramClient, store: &ReminderStore, now: i64) {
    for (key, value) in store.list_all() {
        let mut reminder: Reminder = match serde_json::from_str(&value) {
            Ok(reminder) => reminder,
            Err(e) => {
                warn!("Skipping unparseable reminder record {key}: {e}");
                continue;
            }
        };

        if !due_within_window(reminder.trigger_time, now) {
            continue;
        }

        info!("⏰ Firing reminder {} for chat {}", reminder.id, reminder.chat_id);
        telegram
            .send_message(
                reminder.chat_id,
                &format!("⏰ <b>提醒</b>\n\n{}", reminder.message),
                None,
            )
            .await
            .ok();

        match reminder.repeat {
            Repeat::Daily => {
                reminder.trigger_time += DAY_SECS;
                if let Ok(json) = serde_json::to_string(&reminder) {
                    store.put(&key, &json);
                }
            }
            Repeat::Weekly => {
                reminder.trigger_time += WEEK_SECS;
                if let Ok(json) = serde_json::to_string(&reminder) {
                    store.put(&key, &json);
                }
            }
            Repeat::None => store.delete(&key),
        }
    }
}
