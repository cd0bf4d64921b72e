use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub port: u16,
    pub default_page_size: i64,
    pub max_page_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub session_cookie: String,
    pub bcrypt_cost: u32,
    pub audit_value_cap: usize,
    pub recent_window_days: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("PORT") {
            self.http.port = v.parse().unwrap_or(self.http.port);
        }
        if let Ok(v) = env::var("HTTP_DEFAULT_PAGE_SIZE") {
            self.http.default_page_size = v.parse().unwrap_or(self.http.default_page_size);
        }
        if let Ok(v) = env::var("HTTP_MAX_PAGE_SIZE") {
            self.http.max_page_size = v.parse().unwrap_or(self.http.max_page_size);
        }

        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout_secs =
                v.parse().unwrap_or(self.database.connection_timeout_secs);
        }

        if let Ok(v) = env::var("SECURITY_SESSION_COOKIE") {
            self.security.session_cookie = v;
        }
        if let Ok(v) = env::var("SECURITY_BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            http: HttpConfig {
                port: 3000,
                default_page_size: 20,
                max_page_size: 100,
            },
            database: DatabaseConfig {
                url: "sqlite:realty.db".to_string(),
                max_connections: 5,
                connection_timeout_secs: 30,
            },
            security: SecurityConfig {
                session_cookie: "rsid".to_string(),
                // Low cost keeps the dev loop and the test suite fast
                bcrypt_cost: 4,
                audit_value_cap: 100,
                recent_window_days: 7,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            http: HttpConfig {
                port: 3000,
                default_page_size: 20,
                max_page_size: 100,
            },
            database: DatabaseConfig {
                url: "sqlite:realty.db".to_string(),
                max_connections: 20,
                connection_timeout_secs: 5,
            },
            security: SecurityConfig {
                session_cookie: "rsid".to_string(),
                bcrypt_cost: bcrypt::DEFAULT_COST,
                audit_value_cap: 100,
                recent_window_days: 7,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
