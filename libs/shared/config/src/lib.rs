use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Supabase,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in-memory" | "inmemory" => Ok(StoreBackend::Memory),
            "supabase" | "postgrest" => Ok(StoreBackend::Supabase),
            other => Err(format!("Unknown store backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub supabase_jwt_secret: String,
    pub scheduling: SchedulingSettings,
}

/// Appointment rules that operators tune per deployment.
#[derive(Debug, Clone)]
pub struct SchedulingSettings {
    pub default_duration_minutes: i64,
    pub max_duration_minutes: i64,
    pub cancellation_window_hours: i64,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            default_duration_minutes: 30,
            max_duration_minutes: 480,
            cancellation_window_hours: 24,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = SchedulingSettings::default();

        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });

        let store_backend = match env::var("STORE_BACKEND") {
            Ok(value) => value.parse().unwrap_or_else(|e: String| {
                warn!("{}, falling back to in-memory store", e);
                StoreBackend::Memory
            }),
            Err(_) => StoreBackend::Memory,
        };

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env("PORT", 3000),
            store_backend,
            supabase_url,
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            scheduling: SchedulingSettings {
                default_duration_minutes: parse_env(
                    "DEFAULT_APPOINTMENT_MINUTES",
                    defaults.default_duration_minutes,
                ),
                max_duration_minutes: parse_env(
                    "MAX_APPOINTMENT_MINUTES",
                    defaults.max_duration_minutes,
                ),
                cancellation_window_hours: parse_env(
                    "CANCELLATION_WINDOW_HOURS",
                    defaults.cancellation_window_hours,
                ),
            },
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        if self.supabase_jwt_secret.is_empty() {
            return false;
        }
        match self.store_backend {
            StoreBackend::Memory => true,
            StoreBackend::Supabase => self.is_supabase_configured(),
        }
    }

    pub fn is_supabase_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parses_known_names() {
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("Supabase".parse::<StoreBackend>(), Ok(StoreBackend::Supabase));
        assert!("mongo".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn memory_backend_only_needs_jwt_secret() {
        let config = AppConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            store_backend: StoreBackend::Memory,
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            supabase_jwt_secret: "secret".to_string(),
            scheduling: SchedulingSettings::default(),
        };
        assert!(config.is_configured());

        let supabase = AppConfig { store_backend: StoreBackend::Supabase, ..config };
        assert!(!supabase.is_configured());
    }
}
