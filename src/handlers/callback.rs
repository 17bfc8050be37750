use std::sync::Arc;

use chrono::Local;
use teloxide::adaptors::Throttle;
use teloxide::payloads::EditMessageTextSetters;
use teloxide::prelude::*;
use teloxide::types::MaybeInaccessibleMessage;
use teloxide::Bot;

use crate::error::HandlerResult;
use crate::services::broadcast::{broadcast, OutgoingMessage};
use crate::services::submission::SubmissionError;
use crate::state::AppState;
use crate::utils::{keyboard, user_chat};

use super::RequestContext;

/// Namespaced callback tokens carried by the inline buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    CheckMembership,
    Approve(i64),
    Reject(i64),
    Schedule { id: i64, days: i64 },
    Like(i64),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        if data == "check_membership" {
            return Some(CallbackAction::CheckMembership);
        }
        if let Some(id) = data.strip_prefix("approve_") {
            return id.parse().ok().map(CallbackAction::Approve);
        }
        if let Some(id) = data.strip_prefix("reject_") {
            return id.parse().ok().map(CallbackAction::Reject);
        }
        if let Some(payload) = data.strip_prefix("schedule_") {
            let (id, days) = payload.split_once('_')?;
            return Some(CallbackAction::Schedule {
                id: id.parse().ok()?,
                days: days.parse().ok()?,
            });
        }
        if let Some(id) = data.strip_prefix("like_") {
            return id.parse().ok().map(CallbackAction::Like);
        }
        None
    }
}

pub async fn handle_callback(
    bot: Throttle<Bot>,
    q: CallbackQuery,
    state: Arc<AppState>,
    ctx: RequestContext,
) -> HandlerResult<()> {
    // Acknowledge receipt before performing any effect.
    bot.answer_callback_query(&q.id).await?;

    let Some(data) = q.data else {
        return Ok(());
    };
    let Some(action) = CallbackAction::parse(&data) else {
        warn!("Unknown callback token: {}", data);
        return Ok(());
    };
    let Some(message) = q.message else {
        return Ok(());
    };

    match action {
        CallbackAction::CheckMembership => handle_check_membership(bot, message, state, ctx).await,
        CallbackAction::Approve(id) => handle_approve(bot, message, state, ctx, id).await,
        CallbackAction::Reject(id) => handle_reject(bot, message, state, ctx, id).await,
        CallbackAction::Schedule { id, days } => handle_schedule(bot, message, state, ctx, id, days).await,
        CallbackAction::Like(_) => handle_like(bot, message).await,
    }
}

async fn handle_check_membership(
    bot: Throttle<Bot>,
    message: MaybeInaccessibleMessage,
    state: Arc<AppState>,
    ctx: RequestContext,
) -> HandlerResult<()> {
    if state.gate.check(&bot, ctx.user_id).await {
        bot.edit_message_text(
            message.chat().id,
            message.id(),
            "Tabriklaymiz! Endi botdan foydalanishingiz mumkin.",
        )
        .await?;
        bot.send_message(user_chat(ctx.user_id), "Botga xush kelibsiz!")
            .reply_markup(keyboard::get_main_keyboard(ctx.is_admin))
            .await?;
    } else {
        bot.edit_message_text(message.chat().id, message.id(), "Iltimos, kanal va guruhga a'zo bo'ling:")
            .reply_markup(keyboard::get_membership_keyboard(&state.config.membership))
            .await?;
    }

    Ok(())
}

async fn handle_approve(
    bot: Throttle<Bot>,
    message: MaybeInaccessibleMessage,
    state: Arc<AppState>,
    ctx: RequestContext,
    id: i64,
) -> HandlerResult<()> {
    if !ensure_moderator(&bot, &message, &ctx).await? {
        return Ok(());
    }

    let submission = match state.submissions.approve(id).await {
        Ok(submission) => submission,
        Err(e) => return report_transition_error(&bot, &message, e).await,
    };

    bot.edit_message_text(
        message.chat().id,
        message.id(),
        format!("Motivatsiya tasdiqlandi va yuborildi:\n{}", submission.text),
    )
    .await?;

    // Fan-out happens off the handler so other updates keep flowing.
    tokio::spawn(async move {
        let recipients = match state.users.active_user_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Approval fan-out aborted, could not list recipients: {}", e);
                return;
            }
        };
        let report = broadcast(&bot, &recipients, |_| {
            OutgoingMessage::with_keyboard(
                submission.text.clone(),
                keyboard::get_reaction_keyboard(submission.id, &submission.text),
            )
        })
        .await;
        info!(
            "Motivation {} delivered: {} sent, {} failed",
            submission.id, report.sent, report.failed
        );
    });

    Ok(())
}

async fn handle_reject(
    bot: Throttle<Bot>,
    message: MaybeInaccessibleMessage,
    state: Arc<AppState>,
    ctx: RequestContext,
    id: i64,
) -> HandlerResult<()> {
    if !ensure_moderator(&bot, &message, &ctx).await? {
        return Ok(());
    }

    if let Err(e) = state.submissions.reject(id).await {
        return report_transition_error(&bot, &message, e).await;
    }

    bot.edit_message_text(message.chat().id, message.id(), "Motivatsiya bekor qilindi.")
        .await?;

    Ok(())
}

async fn handle_schedule(
    bot: Throttle<Bot>,
    message: MaybeInaccessibleMessage,
    state: Arc<AppState>,
    ctx: RequestContext,
    id: i64,
    days: i64,
) -> HandlerResult<()> {
    if !ensure_moderator(&bot, &message, &ctx).await? {
        return Ok(());
    }

    let today = Local::now().date_naive();
    if let Err(e) = state.submissions.schedule(id, days, today).await {
        return report_transition_error(&bot, &message, e).await;
    }

    bot.edit_message_text(
        message.chat().id,
        message.id(),
        format!("Motivatsiya {days} kundan keyin yuboriladi."),
    )
    .await?;

    Ok(())
}

async fn handle_like(bot: Throttle<Bot>, message: MaybeInaccessibleMessage) -> HandlerResult<()> {
    let Some(text) = message.regular_message().and_then(|m| m.text()) else {
        return Ok(());
    };

    bot.edit_message_text(message.chat().id, message.id(), format!("{text}\n👍 Sizga yoqdi!"))
        .await?;

    Ok(())
}

async fn ensure_moderator(
    bot: &Throttle<Bot>,
    message: &MaybeInaccessibleMessage,
    ctx: &RequestContext,
) -> HandlerResult<bool> {
    if ctx.is_admin {
        return Ok(true);
    }
    bot.send_message(message.chat().id, "Bu funksiya faqat adminlar uchun.").await?;
    Ok(false)
}

async fn report_transition_error(
    bot: &Throttle<Bot>,
    message: &MaybeInaccessibleMessage,
    error: SubmissionError,
) -> HandlerResult<()> {
    let reply = match error {
        SubmissionError::NotPending(_) => "Bu motivatsiya allaqachon ko'rib chiqilgan.",
        SubmissionError::NotFound(_) => "Motivatsiya topilmadi.",
        SubmissionError::Storage(e) => return Err(e.into()),
    };
    bot.send_message(message.chat().id, reply).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_namespaced_token() {
        assert_eq!(
            CallbackAction::parse("check_membership"),
            Some(CallbackAction::CheckMembership)
        );
        assert_eq!(CallbackAction::parse("approve_17"), Some(CallbackAction::Approve(17)));
        assert_eq!(CallbackAction::parse("reject_3"), Some(CallbackAction::Reject(3)));
        assert_eq!(
            CallbackAction::parse("schedule_5_2"),
            Some(CallbackAction::Schedule { id: 5, days: 2 })
        );
        assert_eq!(CallbackAction::parse("like_9"), Some(CallbackAction::Like(9)));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert_eq!(CallbackAction::parse(""), None);
        assert_eq!(CallbackAction::parse("approve_"), None);
        assert_eq!(CallbackAction::parse("approve_x"), None);
        assert_eq!(CallbackAction::parse("schedule_5"), None);
        assert_eq!(CallbackAction::parse("schedule_5_two"), None);
        assert_eq!(CallbackAction::parse("delete_5"), None);
    }
}
