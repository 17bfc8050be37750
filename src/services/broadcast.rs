use async_trait::async_trait;
use std::time::Duration;
use teloxide::adaptors::Throttle;
use teloxide::prelude::*;
use teloxide::types::InlineKeyboardMarkup;

use crate::utils::user_chat;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct OutgoingMessage {
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: InlineKeyboardMarkup) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// Delivery seam shared by admin broadcasts, approval fan-out and the daily
/// digest.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn deliver(&self, user_id: UserId, message: &OutgoingMessage) -> anyhow::Result<()>;
}

#[async_trait]
impl Messenger for Throttle<Bot> {
    async fn deliver(&self, user_id: UserId, message: &OutgoingMessage) -> anyhow::Result<()> {
        let mut request = self.send_message(user_chat(user_id), message.text.as_str());
        if let Some(keyboard) = &message.keyboard {
            request = request.reply_markup(keyboard.clone());
        }
        request.await?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: usize,
}

/// Sequential best-effort delivery. Every recipient is attempted; failures
/// and per-send timeouts are logged, counted and skipped.
pub async fn broadcast<M, F>(messenger: &M, user_ids: &[UserId], render: F) -> BroadcastReport
where
    M: Messenger + ?Sized,
    F: Fn(UserId) -> OutgoingMessage,
{
    let mut report = BroadcastReport::default();
    for &user_id in user_ids {
        let message = render(user_id);
        match tokio::time::timeout(SEND_TIMEOUT, messenger.deliver(user_id, &message)).await {
            Ok(Ok(())) => report.sent += 1,
            Ok(Err(e)) => {
                report.failed += 1;
                error!("Broadcast delivery to {} failed: {}", user_id, e);
            }
            Err(_) => {
                report.failed += 1;
                error!("Broadcast delivery to {} timed out", user_id);
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingMessenger {
        attempted: Mutex<Vec<UserId>>,
        fail_for: HashSet<UserId>,
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn deliver(&self, user_id: UserId, _message: &OutgoingMessage) -> anyhow::Result<()> {
            self.attempted.lock().unwrap().push(user_id);
            if self.fail_for.contains(&user_id) {
                anyhow::bail!("blocked by recipient");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn reports_exact_counts_and_attempts_everyone() {
        let messenger = RecordingMessenger {
            fail_for: HashSet::from([UserId(2)]),
            ..Default::default()
        };
        let recipients = [UserId(1), UserId(2), UserId(3)];

        let report = broadcast(&messenger, &recipients, |_| OutgoingMessage::text("Hello")).await;

        assert_eq!(report, BroadcastReport { sent: 2, failed: 1 });
        assert_eq!(
            *messenger.attempted.lock().unwrap(),
            vec![UserId(1), UserId(2), UserId(3)]
        );
    }

    #[tokio::test]
    async fn all_failures_still_complete_the_batch() {
        let messenger = RecordingMessenger {
            fail_for: HashSet::from([UserId(1), UserId(2)]),
            ..Default::default()
        };

        let report = broadcast(&messenger, &[UserId(1), UserId(2)], |_| {
            OutgoingMessage::text("Hello")
        })
        .await;

        assert_eq!(report, BroadcastReport { sent: 0, failed: 2 });
        assert_eq!(messenger.attempted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_recipient_list_is_a_noop() {
        let messenger = RecordingMessenger::default();
        let report = broadcast(&messenger, &[], |_| OutgoingMessage::text("Hello")).await;
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn render_sees_each_recipient() {
        let messenger = RecordingMessenger::default();
        let recipients = [UserId(7), UserId(8)];
        let rendered = Mutex::new(Vec::new());

        broadcast(&messenger, &recipients, |user_id| {
            rendered.lock().unwrap().push(user_id);
            OutgoingMessage::text(format!("Hello {user_id}"))
        })
        .await;

        assert_eq!(*rendered.lock().unwrap(), recipients);
    }
}
