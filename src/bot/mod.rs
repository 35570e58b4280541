//! Bot module - webhook update dispatch and the conversational flows.

pub mod dispatch;
pub mod exchange;
pub mod format;
pub mod reminders;
pub mod session;
pub mod store;
pub mod telegram;
pub mod vps;

pub use dispatch::BotContext;
pub use session::{MemorySessionStore, Session, SessionStore, TimeMode};
pub use store::ReminderStore;
pub use telegram::TelegramClient;
