pub mod keyboard;

use teloxide::types::{ChatId, Recipient, UserId};

/// Accepts either a public `@name` handle or a numeric chat id.
pub fn parse_recipient(value: &str) -> Option<Recipient> {
    let value = value.trim();
    if let Some(name) = value.strip_prefix('@') {
        if name.is_empty() {
            return None;
        }
        return Some(Recipient::ChannelUsername(value.to_string()));
    }
    value.parse::<i64>().ok().map(|id| Recipient::Id(ChatId(id)))
}

/// Private chats share their id with the user.
pub fn user_chat(user_id: UserId) -> ChatId {
    ChatId(user_id.0 as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_public_handles_and_numeric_ids() {
        assert_eq!(
            parse_recipient("@moderators"),
            Some(Recipient::ChannelUsername("@moderators".to_string()))
        );
        assert_eq!(
            parse_recipient("-1001234567890"),
            Some(Recipient::Id(ChatId(-1001234567890)))
        );
        assert_eq!(parse_recipient(" 42 "), Some(Recipient::Id(ChatId(42))));
        assert_eq!(parse_recipient("@"), None);
        assert_eq!(parse_recipient("moderators"), None);
    }

    #[test]
    fn user_chat_preserves_id() {
        assert_eq!(user_chat(UserId(777)), ChatId(777));
    }
}
