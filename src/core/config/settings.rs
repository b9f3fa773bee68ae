use std::net::SocketAddr;

use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_environment, parse_socket_addr, parse_u16,
    parse_u32, parse_u64, parse_usize,
};
use super::types::{
    AiSettings, ConfigError, DatabaseSettings, RuntimeSettings, S3Settings, Settings,
    TelemetrySettings, WorkerSettings,
};

const MAX_WORKER_CONCURRENCY: usize = 64;

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let environment =
            parse_environment(env_optional("GRADER_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("GRADER_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "appuser");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "appdb");
        let database_url = env_optional("DATABASE_URL");
        let max_connections =
            parse_u32("DATABASE_MAX_CONNECTIONS", env_or_default("DATABASE_MAX_CONNECTIONS", "10"))?;

        let openai_api_key = env_optional("OPENAI_API_KEY")
            .or_else(|| env_optional("grader_api_key"))
            .unwrap_or_default();
        let openai_base_url = env_or_default("OPENAI_BASE_URL", "https://api.openai.com/v1");
        let ai_model = env_or_default("AI_MODEL", "gpt-5");
        let ai_request_timeout =
            parse_u64("AI_REQUEST_TIMEOUT", env_or_default("AI_REQUEST_TIMEOUT", "600"))?;

        let s3_endpoint = env_optional("S3_ENDPOINT");
        let s3_access_key = env_optional("S3_ACCESS_KEY")
            .or_else(|| env_optional("AWS_ACCESS_KEY_ID"))
            .unwrap_or_default();
        let s3_secret_key = env_optional("S3_SECRET_KEY")
            .or_else(|| env_optional("AWS_SECRET_ACCESS_KEY"))
            .unwrap_or_default();
        let s3_bucket = env_or_default("S3_BUCKET", "pdf-stasher");
        let s3_region = env_or_default("S3_REGION", "us-east-1");

        let concurrency =
            parse_usize("WORKER_CONCURRENCY", env_or_default("WORKER_CONCURRENCY", "1"))?;
        let poll_interval_ms = parse_u64(
            "WORKER_POLL_INTERVAL_MS",
            env_or_default("WORKER_POLL_INTERVAL_MS", "1000"),
        )?;
        let defer_seconds =
            parse_u64("WORKER_DEFER_SECONDS", env_or_default("WORKER_DEFER_SECONDS", "5"))?;
        let http_addr: Option<SocketAddr> =
            parse_socket_addr("WORKER_HTTP_ADDR", env_optional("WORKER_HTTP_ADDR"))?;

        let log_level = env_or_default("GRADER_LOG_LEVEL", "info");
        let json = env_optional("GRADER_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            runtime: RuntimeSettings { environment, strict_config },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
                max_connections,
            },
            ai: AiSettings { openai_api_key, openai_base_url, ai_model, ai_request_timeout },
            s3: S3Settings {
                endpoint: s3_endpoint,
                access_key: s3_access_key,
                secret_key: s3_secret_key,
                bucket: s3_bucket,
                region: s3_region,
            },
            worker: WorkerSettings { concurrency, poll_interval_ms, defer_seconds, http_addr },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub(crate) fn s3(&self) -> &S3Settings {
        &self.s3
    }

    pub(crate) fn worker(&self) -> &WorkerSettings {
        &self.worker
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.concurrency == 0 || self.worker.concurrency > MAX_WORKER_CONCURRENCY {
            return Err(ConfigError::InvalidValue {
                field: "WORKER_CONCURRENCY",
                value: self.worker.concurrency.to_string(),
            });
        }

        if self.worker.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "WORKER_POLL_INTERVAL_MS",
                value: "0".to_string(),
            });
        }

        if self.worker.defer_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "WORKER_DEFER_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.ai.openai_api_key.is_empty() {
            return Err(ConfigError::MissingSecret("OPENAI_API_KEY"));
        }
        if !self.s3.is_configured() {
            return Err(ConfigError::MissingSecret("S3_ACCESS_KEY/S3_SECRET_KEY"));
        }

        Ok(())
    }
}
