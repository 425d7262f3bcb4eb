//! Configuration loading and representation.
//!
//! Everything comes from environment variables with local-development
//! defaults, so a bare `cargo test` needs no setup.

const LOCALHOST: &str = "localhost";

/// Runtime settings for the allocation service and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationConfig {
    pub db_host: String,
    pub db_password: String,
    pub api_host: String,
    /// Where out-of-stock notifications go.
    pub stock_notification_address: String,
}

impl AllocationConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_password = lookup("DB_PASSWORD").unwrap_or_else(|| {
            tracing::warn!("DB_PASSWORD not set; using insecure dev default");
            "abc123".to_string()
        });

        Self {
            db_host: lookup("DB_HOST").unwrap_or_else(|| LOCALHOST.to_string()),
            db_password,
            api_host: lookup("API_HOST").unwrap_or_else(|| LOCALHOST.to_string()),
            stock_notification_address: lookup("STOCK_NOTIFICATION_ADDRESS")
                .unwrap_or_else(|| "stock@example.com".to_string()),
        }
    }

    /// Postgres connection string. The local dev database listens on a
    /// non-standard port.
    pub fn postgres_uri(&self) -> String {
        let port = if self.db_host == LOCALHOST { 54321 } else { 5432 };
        format!(
            "postgresql://allocation:{}@{}:{}/allocation",
            self.db_password, self.db_host, port
        )
    }

    pub fn api_url(&self) -> String {
        let port = if self.api_host == LOCALHOST { 5005 } else { 80 };
        format!("http://{}:{}", self.api_host, port)
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
