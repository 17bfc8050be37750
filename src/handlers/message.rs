use std::sync::Arc;

use teloxide::adaptors::Throttle;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, UserId};
use teloxide::Bot;

use crate::config::AdminConfig;
use crate::error::HandlerResult;
use crate::services::dialogue::{BotDialogue, DialogueState};
use crate::state::AppState;
use crate::utils::keyboard;

use super::{ensure_admin, RequestContext};

/// Single expected input for "add admin". The transient state is cleared
/// before anything else so no retry loop stays open.
pub async fn handle_admin_id_to_add(
    bot: Throttle<Bot>,
    msg: Message,
    dialogue: BotDialogue,
    state: Arc<AppState>,
    ctx: RequestContext,
) -> HandlerResult<()> {
    dialogue.update(DialogueState::Idle).await?;
    if !ensure_admin(&bot, &msg, &ctx).await? {
        return Ok(());
    }

    let target = match parse_user_id(msg.text()) {
        Some(id) => id,
        None => {
            bot.send_message(msg.chat.id, "Noto'g'ri ID raqam kiritildi.").await?;
            return Ok(());
        }
    };

    if !state.users.is_registered(target).await? {
        bot.send_message(
            msg.chat.id,
            "Bu ID raqamli foydalanuvchi topilmadi. Foydalanuvchi avval botdan foydalangan bo'lishi kerak.",
        )
        .await?;
        return Ok(());
    }

    state.users.set_admin(target, true).await?;
    bot.send_message(
        msg.chat.id,
        format!("Foydalanuvchi (ID: {}) admin qilib tayinlandi.", target.0),
    )
    .await?;

    Ok(())
}

pub async fn handle_admin_id_to_remove(
    bot: Throttle<Bot>,
    msg: Message,
    dialogue: BotDialogue,
    state: Arc<AppState>,
    ctx: RequestContext,
) -> HandlerResult<()> {
    dialogue.update(DialogueState::Idle).await?;
    if !ensure_admin(&bot, &msg, &ctx).await? {
        return Ok(());
    }

    let target = match parse_user_id(msg.text()) {
        Some(id) => id,
        None => {
            bot.send_message(msg.chat.id, "Noto'g'ri ID raqam kiritildi.").await?;
            return Ok(());
        }
    };

    match check_demotion(target, ctx.user_id, &state.config.admin) {
        DemotionCheck::SelfDemotion => {
            bot.send_message(msg.chat.id, "Siz o'zingizni adminlikdan olib tashlay olmaysiz.")
                .await?;
            return Ok(());
        }
        DemotionCheck::Allowlisted => {
            bot.send_message(msg.chat.id, "Asosiy adminlarni olib tashlab bo'lmaydi.").await?;
            return Ok(());
        }
        DemotionCheck::Allowed => {}
    }

    if !state.users.set_admin(target, false).await? {
        bot.send_message(msg.chat.id, "Bu ID raqamli foydalanuvchi topilmadi.").await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, format!("Foydalanuvchi (ID: {}) adminlikdan olindi.", target.0))
        .await?;

    Ok(())
}

pub async fn handle_broadcast_text(
    bot: Throttle<Bot>,
    msg: Message,
    dialogue: BotDialogue,
    state: Arc<AppState>,
    ctx: RequestContext,
) -> HandlerResult<()> {
    dialogue.update(DialogueState::Idle).await?;
    if !ensure_admin(&bot, &msg, &ctx).await? {
        return Ok(());
    }

    let text = msg.text().map(str::trim).unwrap_or_default().to_string();
    if text.is_empty() {
        bot.send_message(msg.chat.id, "Xabar matni topilmadi.").await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "Xabar yuborish boshlandi...").await?;
    super::command::spawn_admin_broadcast(bot, state, msg.chat.id, text);

    Ok(())
}

pub async fn handle_menu_label(
    bot: Throttle<Bot>,
    msg: Message,
    dialogue: BotDialogue,
    state: Arc<AppState>,
    ctx: RequestContext,
) -> HandlerResult<()> {
    match msg.text().unwrap_or_default() {
        keyboard::HELP_BUTTON => super::command::send_help(&bot, &msg, &ctx).await,
        keyboard::ABOUT_BUTTON => super::command::send_about(&bot, &msg, &ctx).await,
        keyboard::CHANNEL_BUTTON => {
            bot.send_message(msg.chat.id, format!("Kanal: {}", state.config.membership.channel_url))
                .await?;
            Ok(())
        }
        keyboard::GROUP_BUTTON => {
            bot.send_message(msg.chat.id, format!("Guruh: {}", state.config.membership.group_url))
                .await?;
            Ok(())
        }
        keyboard::WEBSITE_BUTTON | keyboard::SITE_LINK_BUTTON => {
            if !state.gate.check(&bot, ctx.user_id).await {
                bot.send_message(msg.chat.id, "Botdan foydalanish uchun kanal va guruhga a'zo bo'ling:")
                    .reply_markup(keyboard::get_membership_keyboard(&state.config.membership))
                    .await?;
                return Ok(());
            }
            bot.send_message(msg.chat.id, "Saytimizga tashrif buyuring:")
                .reply_markup(keyboard::get_website_keyboard(&state.config.website.url))
                .await?;
            Ok(())
        }
        keyboard::ADMIN_PANEL_BUTTON => {
            if ctx.is_admin {
                bot.send_message(msg.chat.id, "Admin paneliga xush kelibsiz!")
                    .reply_markup(keyboard::get_admin_keyboard())
                    .await?;
            } else {
                bot.send_message(msg.chat.id, "Siz admin emassiz.").await?;
            }
            Ok(())
        }
        keyboard::ADMIN_STATS_BUTTON => {
            if !ensure_admin(&bot, &msg, &ctx).await? {
                return Ok(());
            }
            let stats = state.users.stats().await?;
            let conversations = state.conversations.count().await?;
            bot.send_message(
                msg.chat.id,
                format!(
                    "📊 Bot statistikasi:\n\n\
                     👥 Jami foydalanuvchilar: {}\n\
                     🔄 Faol foydalanuvchilar (24 soat): {}\n\
                     💬 Jami suhbatlar: {}",
                    stats.total, stats.active_last_day, conversations
                ),
            )
            .await?;
            Ok(())
        }
        keyboard::ADD_ADMIN_BUTTON => {
            if !ensure_admin(&bot, &msg, &ctx).await? {
                return Ok(());
            }
            dialogue.update(DialogueState::AwaitingAdminIdToAdd).await?;
            bot.send_message(msg.chat.id, "Yangi admin ID raqamini kiriting:").await?;
            Ok(())
        }
        keyboard::REMOVE_ADMIN_BUTTON => {
            if !ensure_admin(&bot, &msg, &ctx).await? {
                return Ok(());
            }
            dialogue.update(DialogueState::AwaitingAdminIdToRemove).await?;
            bot.send_message(
                msg.chat.id,
                "Adminlikdan olib tashlanadigan foydalanuvchi ID raqamini kiriting:",
            )
            .await?;
            Ok(())
        }
        keyboard::ADMIN_BROADCAST_BUTTON => {
            if !ensure_admin(&bot, &msg, &ctx).await? {
                return Ok(());
            }
            dialogue.update(DialogueState::AwaitingBroadcastText).await?;
            bot.send_message(msg.chat.id, "Barcha foydalanuvchilarga yuboriladigan xabarni kiriting:")
                .await?;
            Ok(())
        }
        keyboard::USER_MODE_BUTTON => {
            // Also serves as the explicit AI chat exit.
            dialogue.update(DialogueState::Idle).await?;
            bot.send_message(msg.chat.id, "Siz oddiy foydalanuvchi rejimiga o'tdingiz.")
                .reply_markup(keyboard::get_main_keyboard(ctx.is_admin))
                .await?;
            Ok(())
        }
        _ => Ok(()),
    }
}

/// AI relay: the prompt goes out verbatim, the raw reply comes back. Errors
/// surface one generic message and keep the chat mode on.
pub async fn handle_ai_prompt(
    bot: Throttle<Bot>,
    msg: Message,
    state: Arc<AppState>,
    ctx: RequestContext,
) -> HandlerResult<()> {
    let Some(prompt) = msg.text() else {
        return Ok(());
    };

    if let Err(e) = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await {
        warn!("Failed to send typing action: {}", e);
    }

    match state.ai.complete(prompt).await {
        Ok(response) => {
            bot.send_message(msg.chat.id, &response).await?;
            if let Err(e) = state.conversations.record(ctx.user_id, prompt, &response).await {
                error!("Failed to log conversation turn for {}: {}", ctx.user_id, e);
            }
        }
        Err(e) => {
            error!("Completion request for {} failed: {}", ctx.user_id, e);
            bot.send_message(msg.chat.id, "Xatolik yuz berdi. Iltimos, keyinroq qayta urinib ko'ring.")
                .await?;
        }
    }

    Ok(())
}

/// Fallback for free text: a new motivation submission, surfaced to the
/// moderation chat with action buttons.
pub async fn handle_submission(
    bot: Throttle<Bot>,
    msg: Message,
    state: Arc<AppState>,
    ctx: RequestContext,
) -> HandlerResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if !is_submission_text(text) {
        return Ok(());
    }

    if !state.gate.check(&bot, ctx.user_id).await {
        bot.send_message(msg.chat.id, "Botdan foydalanish uchun kanal va guruhga a'zo bo'ling:")
            .reply_markup(keyboard::get_membership_keyboard(&state.config.membership))
            .await?;
        return Ok(());
    }

    let submission_id = state.submissions.create(text, ctx.user_id).await?;

    bot.send_message(
        state.config.moderation.chat.clone(),
        format!("Yangi motivatsiya:\n{}\nYuboruvchi: {}", text, ctx.handle()),
    )
    .reply_markup(keyboard::get_moderation_keyboard(submission_id))
    .await?;

    bot.send_message(msg.chat.id, "Motivatsiyangiz adminga yuborildi. Tasdiqlanishini kuting.")
        .await?;

    Ok(())
}

fn parse_user_id(text: Option<&str>) -> Option<UserId> {
    text?.trim().parse::<u64>().ok().map(UserId)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DemotionCheck {
    SelfDemotion,
    Allowlisted,
    Allowed,
}

/// Self-demotion is always refused; allowlisted admins come from
/// configuration and cannot be demoted from chat.
fn check_demotion(target: UserId, caller: UserId, admin: &AdminConfig) -> DemotionCheck {
    if target == caller {
        DemotionCheck::SelfDemotion
    } else if admin.is_allowlisted(target) {
        DemotionCheck::Allowlisted
    } else {
        DemotionCheck::Allowed
    }
}

/// Slash-commands that reach the fallback are unknown commands, not
/// motivation texts.
fn is_submission_text(text: &str) -> bool {
    !text.starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_input_is_trimmed_and_validated() {
        assert_eq!(parse_user_id(Some(" 12345 ")), Some(UserId(12345)));
        assert_eq!(parse_user_id(Some("12345")), Some(UserId(12345)));
        assert_eq!(parse_user_id(Some("-5")), None);
        assert_eq!(parse_user_id(Some("abc")), None);
        assert_eq!(parse_user_id(None), None);
    }

    fn admin(allowlist: &[u64]) -> AdminConfig {
        AdminConfig {
            allowlist: allowlist.iter().copied().map(UserId).collect(),
        }
    }

    #[test]
    fn self_demotion_is_rejected() {
        assert_eq!(
            check_demotion(UserId(7), UserId(7), &admin(&[1])),
            DemotionCheck::SelfDemotion
        );
        // Even for an allowlisted caller the self check wins.
        assert_eq!(
            check_demotion(UserId(1), UserId(1), &admin(&[1])),
            DemotionCheck::SelfDemotion
        );
    }

    #[test]
    fn allowlisted_admins_cannot_be_demoted() {
        assert_eq!(
            check_demotion(UserId(1), UserId(2), &admin(&[1, 2])),
            DemotionCheck::Allowlisted
        );
    }

    #[test]
    fn dynamic_admins_can_be_demoted() {
        assert_eq!(
            check_demotion(UserId(7), UserId(2), &admin(&[1, 2])),
            DemotionCheck::Allowed
        );
    }

    #[test]
    fn unknown_commands_are_not_submissions() {
        assert!(!is_submission_text("/unknown"));
        assert!(!is_submission_text("/start@motivabot"));
        assert!(is_submission_text("Never give up"));
        assert!(is_submission_text("a / b"));
    }
}
