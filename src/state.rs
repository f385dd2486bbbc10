use std::sync::Arc;

use crate::config::AppConfig;
use crate::db;
use crate::users::repo::{PgUserRepo, UserRepo};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepo>,
}

impl AppState {
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect(&config.database).await?;
        Ok(Self::from_parts(Arc::new(PgUserRepo::new(pool))))
    }

    pub fn from_parts(users: Arc<dyn UserRepo>) -> Self {
        Self { users }
    }
}
