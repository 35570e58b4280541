//! Inbound update routing: authorization, commands, callbacks, free text.

use teloxide::types::{BotCommand, CallbackQuery, Message, Update, UpdateKind};
use tracing::info;

use crate::bot::exchange::{self, RatesClient};
use crate::bot::reminders::{self, Repeat};
use crate::bot::session::{SessionStore, TimeMode};
use crate::bot::store::ReminderStore;
use crate::bot::telegram::TelegramClient;
use crate::bot::vps::{self, VpsClient};
use crate::config::Config;

const REJECTION_TEXT: &str = "❌ 你没有权限使用此 Bot";
const UNKNOWN_COMMAND_TEXT: &str = "❓ 未知命令，请使用 /help 查看可用命令";

/// Everything the handlers need, shared across webhook requests.
pub struct BotContext {
    pub config: Config,
    pub telegram: TelegramClient,
    pub sessions: Box<dyn SessionStore>,
    pub rates: RatesClient,
    pub vps: VpsClient,
    /// Present only when the reminder capability is enabled.
    pub reminders: Option<ReminderStore>,
}

/// A decoded callback payload. Decoding happens once, here; handlers
/// never see raw payload strings.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackAction {
    SelectCurrency(String),
    ReminderMenuAdd,
    ReminderMenuList,
    ReminderMenuDelete,
    ReminderTimeMode(TimeMode),
    ReminderRepeat(Repeat),
    ReminderDelete(String),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(currency) = data.strip_prefix("ex_") {
            return Some(Self::SelectCurrency(currency.to_string()));
        }

        match data {
            "rem_add" => Some(Self::ReminderMenuAdd),
            "rem_list" => Some(Self::ReminderMenuList),
            "rem_delete" => Some(Self::ReminderMenuDelete),
            "rem_time_absolute" => Some(Self::ReminderTimeMode(TimeMode::Absolute)),
            "rem_time_relative" => Some(Self::ReminderTimeMode(TimeMode::Relative)),
            "rem_repeat_none" => Some(Self::ReminderRepeat(Repeat::None)),
            "rem_repeat_daily" => Some(Self::ReminderRepeat(Repeat::Daily)),
            "rem_repeat_weekly" => Some(Self::ReminderRepeat(Repeat::Weekly)),
            _ => data
                .strip_prefix("rem_del_")
                .map(|id| Self::ReminderDelete(id.to_string())),
        }
    }
}

/// The command table published via `/setCommands`. The reminder entry is
/// only advertised when the capability is enabled.
pub fn command_table(reminders_enabled: bool) -> Vec<BotCommand> {
    let mut commands = vec![
        BotCommand::new("start", "开始使用，显示欢迎信息"),
        BotCommand::new("help", "显示帮助信息"),
        BotCommand::new("exchange", "汇率转换（美元、欧元、加元）"),
        BotCommand::new("vps", "查询搬瓦工 VPS 状态"),
    ];
    if reminders_enabled {
        commands.push(BotCommand::new("reminder", "提醒事项管理"));
    }
    commands
}

fn welcome_text(reminders_enabled: bool) -> String {
    let mut text = String::from(
        "👋 <b>欢迎使用多功能 Bot！</b>\n\n\
         📋 <b>可用命令：</b>\n\n\
         💱 /exchange 或 /汇率\n   汇率转换（支持美元、欧元、加元）\n\n\
         🖥️ /vps 或 /bwh\n   查询搬瓦工 VPS 状态\n\n",
    );
    if reminders_enabled {
        text.push_str("⏰ /reminder 或 /提醒\n   提醒事项管理\n\n");
    }
    text.push_str("❓ /help\n   显示帮助信息");
    text
}

fn help_text(reminders_enabled: bool) -> String {
    let mut text = String::from(
        "📖 <b>帮助信息</b>\n\n\
         <b>汇率转换：</b>\n1. 发送 /exchange 或 /汇率\n2. 选择货币类型\n3. 输入金额\n\n\
         <b>VPS 监控：</b>\n发送 /vps 或 /bwh 查询服务器状态\n\n",
    );
    if reminders_enabled {
        text.push_str("<b>提醒事项：</b>\n发送 /reminder 或 /提醒 管理提醒\n\n");
    }
    text.push_str("<b>支持的货币：</b>\n🇺🇸 USD (美元)\n🇪🇺 EUR (欧元)\n🇨🇦 CAD (加元)");
    text
}

/// Route one inbound update. All handler failures are logged and swallowed;
/// nothing here is fatal to the process.
pub async fn handle_update(ctx: &BotContext, update: Update) {
    match update.kind {
        UpdateKind::Message(message) => handle_message(ctx, &message).await,
        UpdateKind::CallbackQuery(query) => handle_callback(ctx, &query).await,
        _ => {}
    }
}

async fn handle_message(ctx: &BotContext, message: &Message) {
    let Some(user) = message.from.as_ref() else {
        return;
    };
    let chat_id = message.chat.id.0;
    let text = message.text().unwrap_or("");

    if user.id != ctx.config.allowed_user_id {
        info!("Rejecting message from unauthorized user {}", user.id);
        ctx.telegram
            .send_message(chat_id, REJECTION_TEXT, None)
            .await
            .ok();
        return;
    }

    if text.starts_with('/') {
        dispatch_command(ctx, chat_id, text).await;
        return;
    }

    // Offer free text to the stateful flows in fixed order; the first one
    // whose session state matches consumes it.
    let sessions = ctx.sessions.as_ref();
    if exchange::handle_amount_input(&ctx.telegram, sessions, &ctx.rates, chat_id, user.id, text)
        .await
    {
        return;
    }
    if let Some(store) = ctx.reminders.as_ref() {
        if reminders::handle_time_input(&ctx.telegram, sessions, chat_id, user.id, text).await {
            return;
        }
        if reminders::handle_message_input(&ctx.telegram, sessions, store, chat_id, user.id, text)
            .await
        {
            return;
        }
    }

    ctx.telegram
        .send_message(chat_id, UNKNOWN_COMMAND_TEXT, None)
        .await
        .ok();
}

async fn dispatch_command(ctx: &BotContext, chat_id: i64, text: &str) {
    let reminders_enabled = ctx.reminders.is_some();
    let command = text
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase();

    match command.as_str() {
        "/start" => {
            ctx.telegram
                .send_message(chat_id, &welcome_text(reminders_enabled), None)
                .await
                .ok();
        }
        "/help" => {
            ctx.telegram
                .send_message(chat_id, &help_text(reminders_enabled), None)
                .await
                .ok();
        }
        "/exchange" | "/汇率" => exchange::handle_exchange_command(&ctx.telegram, chat_id).await,
        "/vps" | "/bwh" => vps::handle_vps_command(&ctx.telegram, &ctx.vps, chat_id).await,
        "/reminder" | "/提醒" if reminders_enabled => {
            reminders::handle_reminder_command(&ctx.telegram, chat_id).await;
        }
        _ => {
            ctx.telegram
                .send_message(chat_id, UNKNOWN_COMMAND_TEXT, None)
                .await
                .ok();
        }
    }
}

async fn handle_callback(ctx: &BotContext, query: &CallbackQuery) {
    let Some((chat_id, message_id)) = query
        .message
        .as_ref()
        .map(|message| (message.chat().id.0, i64::from(message.id().0)))
    else {
        return;
    };
    let user_id = query.from.id;

    if user_id != ctx.config.allowed_user_id {
        info!("Rejecting callback from unauthorized user {user_id}");
        ctx.telegram
            .answer_callback_query(query, Some(REJECTION_TEXT))
            .await
            .ok();
        return;
    }

    let data = query.data.as_deref().unwrap_or("");
    let Some(action) = CallbackAction::parse(data) else {
        // Unknown payload: acknowledge so the client stops its spinner.
        ctx.telegram.answer_callback_query(query, None).await.ok();
        return;
    };

    let sessions = ctx.sessions.as_ref();
    let mut alert = None;

    match action {
        CallbackAction::SelectCurrency(currency) => {
            alert = exchange::handle_currency_callback(
                &ctx.telegram,
                sessions,
                chat_id,
                message_id,
                user_id,
                &currency,
            )
            .await;
        }
        // Reminder callbacks are only routed when the capability is enabled;
        // otherwise they are acknowledged and dropped.
        action => {
            if let Some(store) = ctx.reminders.as_ref() {
                match action {
                    CallbackAction::ReminderMenuAdd => {
                        reminders::handle_add_reminder(&ctx.telegram, chat_id, message_id).await;
                    }
                    CallbackAction::ReminderMenuList => {
                        reminders::handle_list_reminders(
                            &ctx.telegram,
                            store,
                            chat_id,
                            message_id,
                            user_id,
                        )
                        .await;
                    }
                    CallbackAction::ReminderMenuDelete => {
                        reminders::handle_delete_prompt(
                            &ctx.telegram,
                            store,
                            chat_id,
                            message_id,
                            user_id,
                        )
                        .await;
                    }
                    CallbackAction::ReminderTimeMode(mode) => {
                        reminders::handle_time_mode_selection(
                            &ctx.telegram,
                            sessions,
                            chat_id,
                            message_id,
                            user_id,
                            mode,
                        )
                        .await;
                    }
                    CallbackAction::ReminderRepeat(repeat) => {
                        reminders::handle_repeat_selection(
                            &ctx.telegram,
                            sessions,
                            chat_id,
                            message_id,
                            user_id,
                            repeat,
                        )
                        .await;
                    }
                    CallbackAction::ReminderDelete(reminder_id) => {
                        reminders::handle_delete_confirm(
                            &ctx.telegram,
                            store,
                            chat_id,
                            message_id,
                            user_id,
                            &reminder_id,
                        )
                        .await;
                    }
                    CallbackAction::SelectCurrency(_) => {}
                }
            }
        }
    }

    ctx.telegram
        .answer_callback_query(query, alert)
        .await
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_currency_callback() {
        assert_eq!(
            CallbackAction::parse("ex_EUR"),
            Some(CallbackAction::SelectCurrency("EUR".to_string()))
        );
        // Validation of the code itself happens in the flow handler.
        assert_eq!(
            CallbackAction::parse("ex_XXX"),
            Some(CallbackAction::SelectCurrency("XXX".to_string()))
        );
    }

    #[test]
    fn test_parse_reminder_menu_callbacks() {
        assert_eq!(
            CallbackAction::parse("rem_add"),
            Some(CallbackAction::ReminderMenuAdd)
        );
        assert_eq!(
            CallbackAction::parse("rem_list"),
            Some(CallbackAction::ReminderMenuList)
        );
        assert_eq!(
            CallbackAction::parse("rem_delete"),
            Some(CallbackAction::ReminderMenuDelete)
        );
    }

    #[test]
    fn test_parse_rem_delete_is_not_a_deletion_target() {
        // "rem_delete" opens the menu; only "rem_del_<id>" deletes.
        assert_eq!(
            CallbackAction::parse("rem_del_reminder_17_abc"),
            Some(CallbackAction::ReminderDelete("reminder_17_abc".to_string()))
        );
        assert_ne!(
            CallbackAction::parse("rem_delete"),
            Some(CallbackAction::ReminderDelete("ete".to_string()))
        );
    }

    #[test]
    fn test_parse_time_and_repeat_callbacks() {
        assert_eq!(
            CallbackAction::parse("rem_time_absolute"),
            Some(CallbackAction::ReminderTimeMode(TimeMode::Absolute))
        );
        assert_eq!(
            CallbackAction::parse("rem_time_relative"),
            Some(CallbackAction::ReminderTimeMode(TimeMode::Relative))
        );
        assert_eq!(
            CallbackAction::parse("rem_repeat_daily"),
            Some(CallbackAction::ReminderRepeat(Repeat::Daily))
        );
    }

    #[test]
    fn test_parse_unknown_payloads() {
        assert_eq!(CallbackAction::parse(""), None);
        assert_eq!(CallbackAction::parse("rem_unknown"), None);
        assert_eq!(CallbackAction::parse("other_thing"), None);
    }

    #[test]
    fn test_command_table_gates_reminder_entry() {
        let without = command_table(false);
        assert_eq!(without.len(), 4);
        assert!(!without.iter().any(|c| c.command == "reminder"));

        let with = command_table(true);
        assert_eq!(with.len(), 5);
        assert!(with.iter().any(|c| c.command == "reminder"));
    }

    #[test]
    fn test_help_text_gates_reminder_section() {
        assert!(!help_text(false).contains("/reminder"));
        assert!(help_text(true).contains("/reminder"));
        assert!(welcome_text(true).contains("/提醒"));
        assert!(!welcome_text(false).contains("/提醒"));
    }
}
