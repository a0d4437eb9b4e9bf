use crate::errors::BuilderError;
use crate::runtime::FileSystem;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MIN_PASSWORD_LENGTH: u32 = 8;
pub const MAX_PASSWORD_LENGTH: u32 = 128;

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub output: OutputConfig,
    pub generator: GeneratorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub script_file: String,
    pub payload_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Length of the password the generated script draws from /dev/urandom.
    pub password_length: u32,
    pub replay_command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub path: String,
    pub max_payload_bytes: usize,
    pub budget_bytes: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            script_file: "custom_logic.sh".to_string(),
            payload_file: "payload.json".to_string(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            password_length: 15,
            replay_command: "npx @puppeteer/replay".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: ".ui-webhook-builder/logs/run.jsonl".to_string(),
            max_payload_bytes: 4096,
            budget_bytes: crate::logging::DEFAULT_DISK_BUDGET_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialAppConfig {
    output: Option<PartialOutputConfig>,
    generator: Option<PartialGeneratorConfig>,
    logging: Option<PartialLoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialOutputConfig {
    dir: Option<PathBuf>,
    script_file: Option<String>,
    payload_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialGeneratorConfig {
    password_length: Option<u32>,
    replay_command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialLoggingConfig {
    enabled: Option<bool>,
    path: Option<String>,
    max_payload_bytes: Option<usize>,
    budget_bytes: Option<u64>,
}

/// Defaults, then the optional TOML file, then CLI flags. The output
/// directory is returned absolute against `process_cwd`.
pub fn load_config(
    overrides: &CliOverrides,
    process_cwd: &Path,
    fs: &dyn FileSystem,
) -> Result<AppConfig, BuilderError> {
    let mut cfg = AppConfig::default();

    if let Some(path) = &overrides.config_path {
        let file_contents = fs.read_to_string(path)?;
        let partial: PartialAppConfig = toml::from_str(&file_contents)
            .map_err(|e| BuilderError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
    }

    apply_cli_overrides(&mut cfg, overrides);
    cfg.output.dir = absolutize_path(process_cwd, &cfg.output.dir);

    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut AppConfig, partial: PartialAppConfig) {
    if let Some(output) = partial.output {
        if let Some(value) = output.dir {
            cfg.output.dir = value;
        }
        if let Some(value) = output.script_file {
            cfg.output.script_file = value;
        }
        if let Some(value) = output.payload_file {
            cfg.output.payload_file = value;
        }
    }

    if let Some(generator) = partial.generator {
        if let Some(value) = generator.password_length {
            cfg.generator.password_length = value;
        }
        if let Some(value) = generator.replay_command {
            cfg.generator.replay_command = value;
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(value) = logging.enabled {
            cfg.logging.enabled = value;
        }
        if let Some(value) = logging.path {
            cfg.logging.path = value;
        }
        if let Some(value) = logging.max_payload_bytes {
            cfg.logging.max_payload_bytes = value;
        }
        if let Some(value) = logging.budget_bytes {
            cfg.logging.budget_bytes = value;
        }
    }
}

fn apply_cli_overrides(cfg: &mut AppConfig, overrides: &CliOverrides) {
    if let Some(dir) = &overrides.output_dir {
        cfg.output.dir = dir.clone();
    }
}

fn absolutize_path(base: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base.join(value).components().collect()
    }
}

impl OutputConfig {
    pub fn script_path(&self) -> PathBuf {
        self.dir.join(&self.script_file)
    }

    pub fn payload_path(&self) -> PathBuf {
        self.dir.join(&self.payload_file)
    }
}

fn validate_config(cfg: &AppConfig) -> Result<(), BuilderError> {
    for (key, name) in [
        ("output.script_file", &cfg.output.script_file),
        ("output.payload_file", &cfg.output.payload_file),
    ] {
        if name.trim().is_empty() {
            return Err(BuilderError::InvalidConfig(format!("{key} must not be empty")));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(BuilderError::InvalidConfig(format!(
                "{key} must be a file name, not a path (use output.dir)"
            )));
        }
    }

    if cfg.output.script_file == cfg.output.payload_file {
        return Err(BuilderError::InvalidConfig(
            "output.script_file and output.payload_file must differ".to_string(),
        ));
    }

    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&cfg.generator.password_length) {
        return Err(BuilderError::InvalidConfig(format!(
            "generator.password_length must be between {MIN_PASSWORD_LENGTH} and {MAX_PASSWORD_LENGTH}"
        )));
    }

    if cfg.generator.replay_command.trim().is_empty() {
        return Err(BuilderError::InvalidConfig(
            "generator.replay_command must not be empty".to_string(),
        ));
    }

    if cfg.logging.enabled && cfg.logging.path.trim().is_empty() {
        return Err(BuilderError::InvalidConfig(
            "logging.path is required when logging is enabled".to_string(),
        ));
    }

    Ok(())
}
