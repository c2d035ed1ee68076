use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::path::PathBuf;

#[derive(Deserialize, Clone)]
pub struct Config {
    pub application: ApplicationConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
    pub storage: StorageConfig,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationConfig {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub debug_mode: String,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub username: String,
    pub password: Secret<String>,
    pub database_name: String,
    #[serde(default)]
    pub require_ssl: bool,
}

impl DatabaseConfig {
    pub fn get_connect_options(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(self.password.expose_secret())
            .database(&self.database_name)
            .ssl_mode(ssl_mode)
    }
}

#[derive(Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub iss: String,
    /// token lifetime in seconds
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub exp: u64,
}

#[derive(Deserialize, Clone)]
pub struct CookieConfig {
    pub name: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_age_days: i64,
    #[serde(default)]
    pub secure: bool,
}

#[derive(Deserialize, Clone)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub default_avatar: String,
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

/// Reads `configuration/base.yaml`, then the environment specific file picked by
/// `APP_ENVIRONMENT`, then `APP_*` variables (`APP_JWT__SECRET=...`).
pub fn get_config() -> Result<Config, ::config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| ::config::ConfigError::Message(e.to_string()))?;
    let config_dir = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(::config::ConfigError::Message)?;
    let environment_file = format!("{}.yaml", environment.as_str());

    ::config::Config::builder()
        .add_source(::config::File::from(config_dir.join("base.yaml")))
        .add_source(::config::File::from(config_dir.join(environment_file)))
        .add_source(
            ::config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?
        .try_deserialize::<Config>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parsing_is_case_insensitive() {
        assert!(matches!(
            Environment::try_from("Production".to_string()),
            Ok(Environment::Production)
        ));
        assert!(matches!(
            Environment::try_from("LOCAL".to_string()),
            Ok(Environment::Local)
        ));
        assert!(Environment::try_from("staging".to_string()).is_err());
    }
}
