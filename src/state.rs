use crate::config::AppConfig;
use crate::db::Database;

pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
}
