use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::{DbConn, DbPool};
use crate::error::ApiError;
use crate::mailer::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub pool: DbPool,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn db(&self) -> Result<DbConn, ApiError> {
        Ok(self.pool.get()?)
    }
}
