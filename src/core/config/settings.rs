use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_environment, parse_f64, parse_num,
};
use super::types::{
    ApiSettings, ConfigError, DatabaseSettings, GradingSettings, RuntimeSettings, SandboxSettings,
    ServerHost, ServerPort, ServerSettings, Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("GRADECELL_HOST", "0.0.0.0");
        let port = env_or_default("GRADECELL_PORT", "8000");

        let environment = parse_environment(
            env_optional("GRADECELL_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("GRADECELL_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Gradecell API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let database = DatabaseSettings {
            host: env_or_default("POSTGRES_SERVER", "localhost"),
            port: parse_num::<u16>("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?,
            user: env_or_default("POSTGRES_USER", "gradecell"),
            password: env_or_default("POSTGRES_PASSWORD", ""),
            name: env_or_default("POSTGRES_DB", "gradecell_db"),
            url_override: env_optional("DATABASE_URL"),
            max_connections: parse_num::<u32>(
                "DATABASE_MAX_CONNECTIONS",
                env_or_default("DATABASE_MAX_CONNECTIONS", "30"),
            )?,
        };

        let sandbox = SandboxSettings {
            docker_bin: env_or_default("SANDBOX_DOCKER_BIN", "docker"),
            image_prefix: env_or_default("SANDBOX_IMAGE_PREFIX", "code-runner-"),
            workspace_root: env_or_default("SANDBOX_WORKSPACE_ROOT", "submissions"),
            wall_timeout_secs: parse_num::<u64>(
                "SANDBOX_WALL_TIMEOUT_SECS",
                env_or_default("SANDBOX_WALL_TIMEOUT_SECS", "10"),
            )?,
            memory_limit_mb: parse_num::<u64>(
                "SANDBOX_MEMORY_LIMIT_MB",
                env_or_default("SANDBOX_MEMORY_LIMIT_MB", "256"),
            )?,
            cpu_limit: parse_f64("SANDBOX_CPU_LIMIT", env_or_default("SANDBOX_CPU_LIMIT", "0.5"))?,
            pids_limit: parse_num::<u64>(
                "SANDBOX_PIDS_LIMIT",
                env_or_default("SANDBOX_PIDS_LIMIT", "64"),
            )?,
            max_concurrent: parse_num::<u64>(
                "SANDBOX_MAX_CONCURRENT",
                env_or_default("SANDBOX_MAX_CONCURRENT", "4"),
            )?,
        };

        let max_code_bytes = parse_num::<u64>(
            "GRADING_MAX_CODE_BYTES",
            env_or_default("GRADING_MAX_CODE_BYTES", "65536"),
        )?;

        let log_level = env_or_default("GRADECELL_LOG_LEVEL", "info");
        let json = env_optional("GRADECELL_LOG_JSON")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);
        let prometheus_enabled = env_optional("PROMETHEUS_ENABLED")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            database,
            sandbox,
            grading: GradingSettings { max_code_bytes },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn sandbox(&self) -> &SandboxSettings {
        &self.sandbox
    }

    pub(crate) fn grading(&self) -> &GradingSettings {
        &self.grading
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sandbox.docker_bin.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "SANDBOX_DOCKER_BIN",
                value: String::from("<empty>"),
            });
        }

        if self.sandbox.image_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "SANDBOX_IMAGE_PREFIX",
                value: String::from("<empty>"),
            });
        }

        if self.sandbox.workspace_root.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "SANDBOX_WORKSPACE_ROOT",
                value: String::from("<empty>"),
            });
        }

        if self.sandbox.wall_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SANDBOX_WALL_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }

        if self.sandbox.memory_limit_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SANDBOX_MEMORY_LIMIT_MB",
                value: "0".to_string(),
            });
        }

        if !(self.sandbox.cpu_limit > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "SANDBOX_CPU_LIMIT",
                value: self.sandbox.cpu_limit.to_string(),
            });
        }

        if self.sandbox.pids_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SANDBOX_PIDS_LIMIT",
                value: "0".to_string(),
            });
        }

        if self.sandbox.max_concurrent == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SANDBOX_MAX_CONCURRENT",
                value: "0".to_string(),
            });
        }

        if self.grading.max_code_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "GRADING_MAX_CODE_BYTES",
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

        if self.database.url_override.is_none() && self.database.password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }

        if !std::path::Path::new(&self.sandbox.workspace_root).is_dir() {
            return Err(ConfigError::WorkspaceRootMissing(self.sandbox.workspace_root.clone()));
        }

        Ok(())
    }
}
