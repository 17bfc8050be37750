use async_trait::async_trait;
use std::time::Duration;
use teloxide::adaptors::Throttle;
use teloxide::prelude::*;
use teloxide::types::{ChatMemberStatus, Recipient};

use crate::config::MembershipConfig;

const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Seam over `get_chat_member`, so the gate can be exercised without a live
/// Telegram connection.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn member_status(&self, chat: Recipient, user_id: UserId) -> anyhow::Result<ChatMemberStatus>;
}

#[async_trait]
impl ChatApi for Throttle<Bot> {
    async fn member_status(&self, chat: Recipient, user_id: UserId) -> anyhow::Result<ChatMemberStatus> {
        let member = self.get_chat_member(chat, user_id).await?;
        Ok(member.status())
    }
}

/// Both the broadcast channel and the discussion group must report an active
/// membership before any gated feature runs.
#[derive(Clone, Debug)]
pub struct MembershipGate {
    channel: Recipient,
    group: Recipient,
}

impl MembershipGate {
    pub fn new(membership: &MembershipConfig) -> Self {
        Self {
            channel: Recipient::ChannelUsername(membership.channel.clone()),
            group: Recipient::ChannelUsername(membership.group.clone()),
        }
    }

    /// Fail closed: a lookup error or timeout in either chat counts as "not a
    /// member" and is only logged.
    pub async fn check<A: ChatApi + ?Sized>(&self, api: &A, user_id: UserId) -> bool {
        status_is_active(api, self.channel.clone(), user_id).await
            && status_is_active(api, self.group.clone(), user_id).await
    }
}

async fn status_is_active<A: ChatApi + ?Sized>(api: &A, chat: Recipient, user_id: UserId) -> bool {
    match tokio::time::timeout(STATUS_TIMEOUT, api.member_status(chat.clone(), user_id)).await {
        Ok(Ok(status)) => matches!(
            status,
            ChatMemberStatus::Member | ChatMemberStatus::Administrator | ChatMemberStatus::Owner
        ),
        Ok(Err(e)) => {
            error!("Membership lookup for user {} in {:?} failed: {}", user_id, chat, e);
            false
        }
        Err(_) => {
            error!("Membership lookup for user {} in {:?} timed out", user_id, chat);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Chats absent from the map respond with a transport error.
    struct StubApi {
        statuses: HashMap<String, ChatMemberStatus>,
    }

    fn chat_key(chat: &Recipient) -> String {
        match chat {
            Recipient::ChannelUsername(name) => name.clone(),
            Recipient::Id(id) => id.to_string(),
        }
    }

    #[async_trait]
    impl ChatApi for StubApi {
        async fn member_status(&self, chat: Recipient, _user_id: UserId) -> anyhow::Result<ChatMemberStatus> {
            self.statuses
                .get(&chat_key(&chat))
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("chat not found"))
        }
    }

    fn gate() -> MembershipGate {
        let config = crate::config::AppConfig::from_source(&|key| {
            Some(
                match key {
                    "TELEGRAM_BOT_TOKEN" => "t",
                    "GEMINI_API_KEY" => "g",
                    "CHANNEL_ID" => "@channel",
                    "GROUP_ID" => "@group",
                    "WEBSITE_URL" => "https://example.com",
                    "ADMIN_IDS" => "1",
                    "MOTIVATION_GROUP_ID" => "-100",
                    _ => return None,
                }
                .to_string(),
            )
        })
        .unwrap();
        MembershipGate::new(&config.membership)
    }

    fn api(channel: Option<ChatMemberStatus>, group: Option<ChatMemberStatus>) -> StubApi {
        let mut statuses = HashMap::new();
        if let Some(status) = channel {
            statuses.insert("@channel".to_string(), status);
        }
        if let Some(status) = group {
            statuses.insert("@group".to_string(), status);
        }
        StubApi { statuses }
    }

    #[tokio::test]
    async fn member_of_both_passes() {
        let api = api(Some(ChatMemberStatus::Member), Some(ChatMemberStatus::Administrator));
        assert!(gate().check(&api, UserId(1)).await);
    }

    #[tokio::test]
    async fn owner_counts_as_active() {
        let api = api(Some(ChatMemberStatus::Owner), Some(ChatMemberStatus::Member));
        assert!(gate().check(&api, UserId(1)).await);
    }

    #[tokio::test]
    async fn leaving_either_chat_fails() {
        let api = api(Some(ChatMemberStatus::Left), Some(ChatMemberStatus::Member));
        assert!(!gate().check(&api, UserId(1)).await);

        let api = self::api(Some(ChatMemberStatus::Member), Some(ChatMemberStatus::Banned));
        assert!(!gate().check(&api, UserId(1)).await);
    }

    #[tokio::test]
    async fn restricted_status_is_not_active() {
        let api = api(Some(ChatMemberStatus::Restricted), Some(ChatMemberStatus::Member));
        assert!(!gate().check(&api, UserId(1)).await);
    }

    #[tokio::test]
    async fn lookup_error_fails_closed() {
        // Group lookup errors even though the channel membership is fine.
        let api = api(Some(ChatMemberStatus::Member), None);
        assert!(!gate().check(&api, UserId(1)).await);

        let api = self::api(None, None);
        assert!(!gate().check(&api, UserId(1)).await);
    }
}
