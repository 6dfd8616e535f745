use crate::assistants::VoicePlatform;
use crate::core::config::AppConfig;
use crate::email::Notifier;
use crate::core::shared::utils::DbPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub conn: DbPool,
    pub config: Arc<AppConfig>,
    /// `None` when no voice platform API key is configured.
    pub voice_platform: Option<Arc<dyn VoicePlatform>>,
    pub notifier: Arc<Notifier>,
}
