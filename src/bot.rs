use std::sync::Arc;

use dptree;
use teloxide::adaptors::throttle::Limits;
use teloxide::adaptors::Throttle;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use teloxide::Bot;

use crate::config::AppConfig;
use crate::error::{BotResult, HandlerResult};
use crate::handlers::get_handler;
use crate::scheduler::DigestScheduler;
use crate::services::dialogue::DialogueState;
use crate::state::AppState;

pub struct BotService {
    pub bot: Throttle<Bot>,
    pub state: Arc<AppState>,
}

impl BotService {
    pub async fn new(config: AppConfig) -> BotResult<Self> {
        info!("Initializing AppState...");
        let state = Arc::new(AppState::new(config).await?);
        info!("AppState initialized");

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(10))
            .pool_idle_timeout(std::time::Duration::from_secs(60))
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        let bot = Bot::with_client(state.config.telegram.0.clone(), client).throttle(Limits::default());

        Ok(Self { bot, state })
    }

    pub async fn start(&self) -> HandlerResult<()> {
        info!("Testing connection to Telegram API...");
        match self.bot.get_me().await {
            Ok(me) => info!("Connected to Telegram API as @{}", me.username()),
            Err(e) => {
                error!("Failed to connect to Telegram API: {:?}", e);
                return Err(anyhow::anyhow!("Failed to connect to Telegram API: {}", e).into());
            }
        }

        crate::command::setup_commands(&self.bot).await?;

        let scheduler = DigestScheduler::spawn(self.bot.clone(), Arc::clone(&self.state));

        let handler = get_handler();

        Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![
                InMemStorage::<DialogueState>::new(),
                Arc::clone(&self.state)
            ])
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        scheduler.shutdown().await;

        Ok(())
    }
}
