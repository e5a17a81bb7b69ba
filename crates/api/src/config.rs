use std::time::Duration;

use beacon_delivery::{DispatchConfig, ExpoConfig};

use crate::auth::jwt::JwtConfig;

/// Seconds of the request budget kept back for audience resolution and
/// delivery bookkeeping around a dispatch.
pub const SEND_OVERHEAD_SECS: u64 = 5;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `60`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background jobs, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Monthly quota reset sweep interval in seconds (default: `3600`).
    pub quota_reset_interval_secs: u64,
    /// JWT validation settings.
    pub jwt: JwtConfig,
    /// Push provider endpoint and credentials.
    pub push: ExpoConfig,
    /// Chunk dispatch pool, timeout and deadline.
    pub dispatch: DispatchConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `HOST`                      | `0.0.0.0`               |
    /// | `PORT`                      | `3000`                  |
    /// | `CORS_ORIGINS`              | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`      | `60`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                    |
    /// | `QUOTA_RESET_INTERVAL_SECS` | `3600`                  |
    /// | `PUSH_MAX_CONCURRENCY`      | `4`                     |
    /// | `PUSH_CHUNK_TIMEOUT_SECS`   | `30`                    |
    /// | `DISPATCH_DEADLINE_SECS`    | derived, see below      |
    ///
    /// The dispatch deadline is fitted inside the request timeout by
    /// [`fit_dispatch_deadline`]; startup panics if they cannot be fitted.
    ///
    /// See [`JwtConfig::from_env`] and [`ExpoConfig::from_env`] for the rest.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = env_u64("REQUEST_TIMEOUT_SECS", 60);
        let shutdown_timeout_secs = env_u64("SHUTDOWN_TIMEOUT_SECS", 30);
        let quota_reset_interval_secs = env_u64("QUOTA_RESET_INTERVAL_SECS", 3600);
        assert!(quota_reset_interval_secs > 0, "QUOTA_RESET_INTERVAL_SECS must be positive");

        let max_concurrency: usize = std::env::var("PUSH_MAX_CONCURRENCY")
            .unwrap_or_else(|_| "4".into())
            .parse()
            .expect("PUSH_MAX_CONCURRENCY must be a valid usize");
        let deadline = std::env::var("DISPATCH_DEADLINE_SECS").ok().map(|v| {
            Duration::from_secs(v.parse().expect("DISPATCH_DEADLINE_SECS must be a valid u64"))
        });
        let mut dispatch = DispatchConfig {
            max_concurrency: max_concurrency.max(1),
            chunk_timeout: Duration::from_secs(env_u64("PUSH_CHUNK_TIMEOUT_SECS", 30)),
            deadline,
        };
        fit_dispatch_deadline(request_timeout_secs, &mut dispatch)
            .unwrap_or_else(|e| panic!("{e}"));

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            quota_reset_interval_secs,
            jwt: JwtConfig::from_env(),
            push: ExpoConfig::from_env(),
            dispatch,
        }
    }
}

/// Bound the dispatch deadline so a send finishes inside the request timeout.
///
/// A chunk started just before the deadline can still run for
/// `chunk_timeout`, so `deadline + chunk_timeout + SEND_OVERHEAD_SECS` must
/// not exceed the request timeout. An unset deadline takes the largest value
/// that fits; an explicit one that does not fit is an error.
pub fn fit_dispatch_deadline(request_timeout_secs: u64, dispatch: &mut DispatchConfig) -> Result<(), String> {
    let budget = Duration::from_secs(request_timeout_secs.saturating_sub(SEND_OVERHEAD_SECS));
    let Some(max_deadline) = budget
        .checked_sub(dispatch.chunk_timeout)
        .filter(|d| !d.is_zero())
    else {
        return Err(format!(
            "REQUEST_TIMEOUT_SECS ({request_timeout_secs}) must exceed PUSH_CHUNK_TIMEOUT_SECS ({}) by more than {SEND_OVERHEAD_SECS}",
            dispatch.chunk_timeout.as_secs()
        ));
    };

    match dispatch.deadline {
        Some(deadline) if deadline > max_deadline => Err(format!(
            "DISPATCH_DEADLINE_SECS ({}) leaves no room for a chunk within REQUEST_TIMEOUT_SECS ({request_timeout_secs}); at most {} allowed",
            deadline.as_secs(),
            max_deadline.as_secs()
        )),
        Some(_) => Ok(()),
        None => {
            dispatch.deadline = Some(max_deadline);
            Ok(())
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid u64")),
        Err(_) => default,
    }
}
