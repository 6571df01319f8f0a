use redis::{Client, aio::ConnectionManager};
use tracing::info;

use crate::utilities::{config::Config, errors::AppError};

#[derive(Clone)]
pub struct Redis {
    pub(crate) connection: ConnectionManager,
}

impl Redis {
    pub async fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::open(config.redis_url.as_str())?;
        let connection = ConnectionManager::new(client).await?;

        info!("connected to redis");

        Ok(Self { connection })
    }
}
