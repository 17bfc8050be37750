pub mod ai;
pub mod broadcast;
pub mod conversation;
pub mod dialogue;
pub mod membership;
pub mod submission;
pub mod user;
