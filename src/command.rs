use teloxide::adaptors::Throttle;
use teloxide::macros::BotCommands;
use teloxide::prelude::Requester;
use teloxide::utils::command::BotCommands as _;
use teloxide::Bot;

use crate::error::HandlerResult;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Bot buyruqlari:")]
pub enum Command {
    #[command(description = "Botni boshlash")]
    Start,
    #[command(description = "Botni to'xtatish")]
    Stop,
    #[command(description = "Yordam")]
    Help,
    #[command(description = "Biz haqimizda")]
    About,
    #[command(description = "Sun'iy intellekt bilan suhbat")]
    Ai,
    #[command(description = "Barcha faol foydalanuvchilarga xabar yuborish")]
    Broadcast(String),
}

pub async fn setup_commands(bot: &Throttle<Bot>) -> HandlerResult<()> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use teloxide::utils::command::BotCommands as _;

    use super::*;

    #[test]
    fn broadcast_keeps_the_whole_message_text() {
        let parsed = Command::parse("/broadcast Salom hammaga!", "motivabot").unwrap();
        assert_eq!(parsed, Command::Broadcast("Salom hammaga!".to_string()));
    }

    #[test]
    fn plain_commands_parse() {
        assert_eq!(Command::parse("/start", "motivabot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/ai", "motivabot").unwrap(), Command::Ai);
    }
}
