use std::env;

pub const DEFAULT_JWT_SECRET: &str = "default-secret-key";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// How long a worker waits for the ledger lock before giving up.
    pub lock_timeout_ms: u64,
    pub request_timeout_secs: u64,
    pub admin_username: String,
    pub admin_password: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: parse_var("PORT", 8080),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "hotel_beds.db".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string()),
            token_ttl_hours: parse_var("TOKEN_TTL_HOURS", 24),
            lock_timeout_ms: parse_var("LOCK_TIMEOUT_MS", 5000),
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 30),
            admin_username: env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string()),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
