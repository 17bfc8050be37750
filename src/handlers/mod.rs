pub mod callback;
pub mod command;
pub mod message;

use std::sync::Arc;

use teloxide::{
    adaptors::Throttle,
    dispatching::{
        dialogue::{self, InMemStorage},
        HandlerExt, UpdateFilterExt, UpdateHandler,
    },
    dptree,
    prelude::*,
    types::{Update, UserId},
    Bot,
};

use crate::services::dialogue::DialogueState;
use crate::services::user::UserProfile;
use crate::state::AppState;
use crate::utils::keyboard;

/// Per-update context assembled before dispatch: the sender, plus the
/// resolved authorization flags.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub user_id: UserId,
    pub first_name: String,
    pub username: Option<String>,
    /// Static allowlist or dynamic `is_admin` flag.
    pub is_admin: bool,
    /// Static allowlist only; `/broadcast` requires this.
    pub is_allowlisted: bool,
}

impl RequestContext {
    pub fn handle(&self) -> String {
        match &self.username {
            Some(username) => format!("@{username}"),
            None => self.first_name.clone(),
        }
    }
}

pub fn get_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    dialogue::enter::<Update, InMemStorage<DialogueState>, DialogueState, _>()
        .filter_map_async(|update: Update, state: Arc<AppState>| async move {
            let user = update.from()?.clone();
            if user.is_bot {
                return None;
            }

            // Registry upsert on every inbound update; reactivates opted-out
            // users and refreshes last_active.
            let profile = UserProfile::from(&user);
            if let Err(e) = state.users.upsert_on_contact(&profile).await {
                error!("Failed to upsert user {}: {}", user.id, e);
            }

            let is_allowlisted = state.config.admin.is_allowlisted(user.id);
            let is_admin = is_allowlisted
                || match state.users.is_dynamic_admin(user.id).await {
                    Ok(flag) => flag,
                    Err(e) => {
                        error!("Failed to read admin flag for {}: {}", user.id, e);
                        false
                    }
                };

            Some(RequestContext {
                user_id: user.id,
                first_name: user.first_name,
                username: user.username,
                is_admin,
                is_allowlisted,
            })
        })
        .branch(
            Update::filter_message()
                .filter_command::<crate::command::Command>()
                .endpoint(command::handle_command),
        )
        .branch(get_message_handler())
        .branch(Update::filter_callback_query().endpoint(callback::handle_callback))
}

/// Text resolution order: pending transient state first, then literal menu
/// labels, then AI relay mode, and finally the submission fallback.
fn get_message_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    Update::filter_message()
        .branch(dptree::case![DialogueState::AwaitingAdminIdToAdd].endpoint(message::handle_admin_id_to_add))
        .branch(dptree::case![DialogueState::AwaitingAdminIdToRemove].endpoint(message::handle_admin_id_to_remove))
        .branch(dptree::case![DialogueState::AwaitingBroadcastText].endpoint(message::handle_broadcast_text))
        .branch(
            dptree::filter(|msg: Message| msg.text().map(keyboard::is_menu_label).unwrap_or(false))
                .endpoint(message::handle_menu_label),
        )
        .branch(dptree::case![DialogueState::AiChat].endpoint(message::handle_ai_prompt))
        .endpoint(message::handle_submission)
}

/// Authorization guard for admin-only handlers; replies and reports `false`
/// when the caller lacks the flag.
pub async fn ensure_admin(bot: &Throttle<Bot>, msg: &Message, ctx: &RequestContext) -> crate::error::HandlerResult<bool> {
    if ctx.is_admin {
        return Ok(true);
    }
    bot.send_message(msg.chat.id, "Bu funksiya faqat adminlar uchun.").await?;
    Ok(false)
}
