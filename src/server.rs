//! HTTP surface: health check, webhook management and the webhook receiver.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde_json::json;
use teloxide::types::Update;
use tracing::error;

use crate::bot::{BotContext, dispatch};

pub fn build_router(ctx: Arc<BotContext>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/registerWebhook", get(register_webhook).post(register_webhook))
        .route("/setCommands", get(set_commands).post(set_commands))
        .route("/webhook", post(webhook))
        .with_state(ctx)
}

async fn health() -> &'static str {
    "OK"
}

/// Register `<public_url>/webhook` with the chat platform.
async fn register_webhook(State(ctx): State<Arc<BotContext>>) -> impl IntoResponse {
    let webhook_url = format!(
        "{}/webhook",
        ctx.config.public_url.trim_end_matches('/')
    );

    match ctx.telegram.set_webhook(&webhook_url).await {
        Ok(()) => (
            StatusCode::OK,
            axum::Json(json!({ "ok": true, "url": webhook_url })),
        ),
        Err(e) => {
            error!("Webhook registration failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({ "error": "Failed to set webhook" })),
            )
        }
    }
}

/// Push the command table and the commands menu button.
async fn set_commands(State(ctx): State<Arc<BotContext>>) -> impl IntoResponse {
    let commands = dispatch::command_table(ctx.reminders.is_some());
    let commands_result = ctx.telegram.set_my_commands(commands).await;
    let menu_result = ctx.telegram.set_chat_menu_button().await;

    match (&commands_result, &menu_result) {
        (Ok(()), Ok(())) => (
            StatusCode::OK,
            axum::Json(json!({
                "commands": { "ok": true },
                "menuButton": { "ok": true },
            })),
        ),
        _ => {
            error!(
                "Command registration failed: commands={commands_result:?} menu={menu_result:?}"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({ "error": "Failed to set commands" })),
            )
        }
    }
}

/// Receive one update. Returns 200 once dispatched, 500 when the payload
/// does not parse.
async fn webhook(State(ctx): State<Arc<BotContext>>, body: String) -> StatusCode {
    match serde_json::from_str::<Update>(&body) {
        Ok(update) => {
            dispatch::handle_update(&ctx, update).await;
            StatusCode::OK
        }
        Err(e) => {
            error!("Failed to parse update payload: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
