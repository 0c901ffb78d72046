use thiserror::Error;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub primary_url: String,
}

#[derive(Debug, Error)]
pub enum DbConfigError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, DbConfigError> {
        let primary_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(DbConfigError::MissingDatabaseUrl)?;

        Ok(Self { primary_url })
    }
}
