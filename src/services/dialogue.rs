use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

/// Per-user transient state. Held in memory only; a restart drops every
/// pending prompt, which is the intended behavior.
#[derive(Clone, Default, Debug, PartialEq)]
pub enum DialogueState {
    #[default]
    Idle,
    /// Admin panel asked for a user id to promote.
    AwaitingAdminIdToAdd,
    /// Admin panel asked for a user id to demote.
    AwaitingAdminIdToRemove,
    /// Admin panel asked for the broadcast text.
    AwaitingBroadcastText,
    /// Free text is relayed to the completion service until the user leaves.
    AiChat,
}

pub type BotDialogue = Dialogue<DialogueState, InMemStorage<DialogueState>>;
