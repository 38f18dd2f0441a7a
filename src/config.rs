use std::env;
use std::net::SocketAddr;

use thiserror::Error;
use uuid::Uuid;

use crate::session::Session;
use crate::store::RestConfig;

pub mod env_vars {
    pub const ADDR: &str = "PLANNER_ADDR";
    pub const STORE_BACKEND: &str = "STORE_BACKEND";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const SUPABASE_URL: &str = "SUPABASE_URL";
    pub const SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
    pub const CHANGE_BUFFER: &str = "CHANGE_BUFFER";
    /// Signs this user in at startup when set.
    pub const USER_ID: &str = "PLANNER_USER_ID";
    pub const ACCESS_TOKEN: &str = "PLANNER_ACCESS_TOKEN";
}

pub mod defaults {
    pub const ADDR: &str = "127.0.0.1:3000";
    pub const DATABASE_URL: &str = "sqlite://planner.db?mode=rwc";
    pub const CHANGE_BUFFER: usize = crate::notify::DEFAULT_CAPACITY;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub enum StoreBackend {
    Sqlite { database_url: String },
    Rest(RestConfig),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub backend: StoreBackend,
    pub change_buffer: usize,
    pub session: Option<Session>,
}

impl Config {
    /// Reads `.env` if present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr_raw = lookup(env_vars::ADDR).unwrap_or_else(|| defaults::ADDR.to_string());
        let addr = addr_raw.parse().map_err(|_| ConfigError::Invalid {
            name: env_vars::ADDR,
            value: addr_raw.clone(),
        })?;

        let backend = match lookup(env_vars::STORE_BACKEND).as_deref() {
            None | Some("sqlite") => StoreBackend::Sqlite {
                database_url: lookup(env_vars::DATABASE_URL)
                    .unwrap_or_else(|| defaults::DATABASE_URL.to_string()),
            },
            Some("rest") => StoreBackend::Rest(RestConfig {
                base_url: lookup(env_vars::SUPABASE_URL)
                    .ok_or(ConfigError::Missing(env_vars::SUPABASE_URL))?,
                api_key: lookup(env_vars::SUPABASE_ANON_KEY)
                    .ok_or(ConfigError::Missing(env_vars::SUPABASE_ANON_KEY))?,
            }),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: env_vars::STORE_BACKEND,
                    value: other.to_string(),
                });
            }
        };

        let change_buffer = match lookup(env_vars::CHANGE_BUFFER) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: env_vars::CHANGE_BUFFER,
                value: raw.clone(),
            })?,
            None => defaults::CHANGE_BUFFER,
        };

        let session = match lookup(env_vars::USER_ID) {
            Some(raw) => {
                let user_id = Uuid::parse_str(&raw).map_err(|_| ConfigError::Invalid {
                    name: env_vars::USER_ID,
                    value: raw.clone(),
                })?;
                Some(Session {
                    user_id,
                    access_token: lookup(env_vars::ACCESS_TOKEN),
                })
            }
            None => None,
        };

        Ok(Self {
            addr,
            backend,
            change_buffer,
            session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_local_sqlite() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.addr.to_string(), defaults::ADDR);
        assert!(matches!(config.backend, StoreBackend::Sqlite { .. }));
        assert_eq!(config.change_buffer, defaults::CHANGE_BUFFER);
        assert!(config.session.is_none());
    }

    #[test]
    fn rest_backend_requires_credentials() {
        let err = config_from(&[("STORE_BACKEND", "rest")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SUPABASE_URL")));

        let config = config_from(&[
            ("STORE_BACKEND", "rest"),
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
        ])
        .unwrap();
        assert!(matches!(config.backend, StoreBackend::Rest(_)));
    }

    #[test]
    fn startup_user_must_be_a_uuid() {
        assert!(config_from(&[("PLANNER_USER_ID", "alice")]).is_err());

        let id = Uuid::new_v4().to_string();
        let config = config_from(&[("PLANNER_USER_ID", id.as_str())]).unwrap();
        assert_eq!(config.session.unwrap().user_id.to_string(), id);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(config_from(&[("STORE_BACKEND", "mongo")]).is_err());
    }
}
