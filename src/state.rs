use crate::config::AppConfig;
use crate::error::BotResult;
use crate::services::ai::GeminiClient;
use crate::services::conversation::ConversationService;
use crate::services::membership::MembershipGate;
use crate::services::submission::SubmissionService;
use crate::services::user::UserService;
use crate::storage::DbClient;

/// Explicitly constructed application context. Handlers receive it through
/// the dispatcher's dependency injection instead of reaching for globals.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub users: UserService,
    pub submissions: SubmissionService,
    pub conversations: ConversationService,
    pub gate: MembershipGate,
    pub ai: GeminiClient,
}

impl AppState {
    pub async fn new(config: AppConfig) -> BotResult<Self> {
        let db = DbClient::open(&config.database.path).await?;

        Ok(Self {
            users: UserService::new(db.clone()),
            submissions: SubmissionService::new(db.clone()),
            conversations: ConversationService::new(db),
            gate: MembershipGate::new(&config.membership),
            ai: GeminiClient::new(&config.gemini)?,
            config,
        })
    }
}
