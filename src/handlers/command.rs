use std::sync::Arc;

use teloxide::adaptors::Throttle;
use teloxide::prelude::*;
use teloxide::Bot;

use crate::command::Command;
use crate::error::HandlerResult;
use crate::services::broadcast::{broadcast, OutgoingMessage};
use crate::services::dialogue::{BotDialogue, DialogueState};
use crate::state::AppState;
use crate::utils::keyboard;

use super::RequestContext;

pub async fn handle_command(
    bot: Throttle<Bot>,
    msg: Message,
    cmd: Command,
    dialogue: BotDialogue,
    state: Arc<AppState>,
    ctx: RequestContext,
) -> HandlerResult<()> {
    match cmd {
        Command::Start => handle_start(bot, msg, dialogue, state, ctx).await,
        Command::Stop => handle_stop(bot, msg, dialogue, state, ctx).await,
        Command::Help => send_help(&bot, &msg, &ctx).await,
        Command::About => send_about(&bot, &msg, &ctx).await,
        Command::Ai => handle_ai(bot, msg, dialogue, state, ctx).await,
        Command::Broadcast(text) => handle_broadcast(bot, msg, state, ctx, text).await,
    }
}

async fn handle_start(
    bot: Throttle<Bot>,
    msg: Message,
    dialogue: BotDialogue,
    state: Arc<AppState>,
    ctx: RequestContext,
) -> HandlerResult<()> {
    dialogue.update(DialogueState::Idle).await?;

    if state.gate.check(&bot, ctx.user_id).await {
        bot.send_message(
            msg.chat.id,
            format!(
                "Assalomu alaykum, {}!\nBotimizga xush kelibsiz. Quyidagi tugmalardan foydalaning:",
                ctx.first_name
            ),
        )
        .reply_markup(keyboard::get_main_keyboard(ctx.is_admin))
        .await?;
    } else {
        bot.send_message(msg.chat.id, "Botdan foydalanish uchun kanal va guruhga a'zo bo'ling:")
            .reply_markup(keyboard::get_membership_keyboard(&state.config.membership))
            .await?;
    }

    Ok(())
}

async fn handle_stop(
    bot: Throttle<Bot>,
    msg: Message,
    dialogue: BotDialogue,
    state: Arc<AppState>,
    ctx: RequestContext,
) -> HandlerResult<()> {
    state.users.deactivate(ctx.user_id).await?;
    dialogue.update(DialogueState::Idle).await?;

    bot.send_message(
        msg.chat.id,
        "Bot to'xtatildi. Qayta boshlash uchun /start buyrug'ini yuboring.",
    )
    .await?;

    Ok(())
}

pub(super) async fn send_help(bot: &Throttle<Bot>, msg: &Message, ctx: &RequestContext) -> HandlerResult<()> {
    let help_text = "Bot buyruqlari:\n\
        /start - Botni boshlash\n\
        /stop - Botni to'xtatish\n\
        /help - Yordam\n\
        /ai - Sun'iy intellekt bilan suhbat\n\
        /about - Biz haqimizda\n\n\
        Motivatsiya yuborish uchun oddiy xabar sifatida yozing.";

    bot.send_message(msg.chat.id, help_text)
        .reply_markup(keyboard::get_main_keyboard(ctx.is_admin))
        .await?;

    Ok(())
}

pub(super) async fn send_about(bot: &Throttle<Bot>, msg: &Message, ctx: &RequestContext) -> HandlerResult<()> {
    bot.send_message(
        msg.chat.id,
        "Bizning loyiha haqida: Bu Telegram bot foydalanuvchilarga motivatsiya, yangiliklar va AI bilan suhbat imkonini beradi.",
    )
    .reply_markup(keyboard::get_main_keyboard(ctx.is_admin))
    .await?;

    Ok(())
}

async fn handle_ai(
    bot: Throttle<Bot>,
    msg: Message,
    dialogue: BotDialogue,
    state: Arc<AppState>,
    ctx: RequestContext,
) -> HandlerResult<()> {
    if !state.gate.check(&bot, ctx.user_id).await {
        bot.send_message(
            msg.chat.id,
            "AI bilan suhbatlashish uchun kanal va guruhga a'zo bo'ling:",
        )
        .reply_markup(keyboard::get_membership_keyboard(&state.config.membership))
        .await?;
        return Ok(());
    }

    dialogue.update(DialogueState::AiChat).await?;
    bot.send_message(msg.chat.id, "Gemini AI bilan suhbat boshlandi. Savolingizni yozing:")
        .await?;

    Ok(())
}

/// `/broadcast <text>` is restricted to the static allowlist; dynamically
/// promoted admins use the menu flow instead.
async fn handle_broadcast(
    bot: Throttle<Bot>,
    msg: Message,
    state: Arc<AppState>,
    ctx: RequestContext,
    text: String,
) -> HandlerResult<()> {
    if !ctx.is_allowlisted {
        bot.send_message(msg.chat.id, "Bu buyruq faqat adminlar uchun.").await?;
        return Ok(());
    }

    let text = text.trim().to_string();
    if text.is_empty() {
        bot.send_message(msg.chat.id, "Xabar yuborish uchun matn kiriting: /broadcast Xabar matni")
            .await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "Xabar yuborish boshlandi...").await?;
    spawn_admin_broadcast(bot, state, msg.chat.id, text);

    Ok(())
}

/// Fan-out runs as a background task so the dispatcher keeps serving other
/// users; the final counts go back to the issuing admin.
pub(super) fn spawn_admin_broadcast(bot: Throttle<Bot>, state: Arc<AppState>, report_to: ChatId, text: String) {
    tokio::spawn(async move {
        let recipients = match state.users.active_user_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Broadcast aborted, could not list recipients: {}", e);
                return;
            }
        };

        let body = format!("📢 ADMIN XABARI:\n\n{text}");
        let report = broadcast(&bot, &recipients, |_| OutgoingMessage::text(body.clone())).await;
        info!(
            "Admin broadcast finished: {} sent, {} failed",
            report.sent, report.failed
        );

        let summary = format!(
            "Xabar yuborish yakunlandi.\n✅ Yuborildi: {}\n❌ Xatolik: {}",
            report.sent, report.failed
        );
        if let Err(e) = bot.send_message(report_to, summary).await {
            error!("Failed to report broadcast result: {}", e);
        }
    });
}
