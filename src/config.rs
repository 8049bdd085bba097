use crate::error::{AppResult, ConfigError};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "exam_session.toml";

/// 程序配置
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    // --- 后端 API 配置 ---
    pub api_base_url: String,
    pub api_token: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 影子存储目录（相当于浏览器的 localStorage）
    pub shadow_dir: String,
    /// 答案批量同步的防抖时间（毫秒）
    pub flush_debounce_ms: u64,
    /// 倒计时步长（毫秒）
    pub countdown_tick_ms: u64,
    /// 同时运行的考试会话数量
    pub max_concurrent_sessions: usize,
    /// 考试脚本存放目录
    pub script_folder: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            api_token: String::new(),
            request_timeout_secs: 30,
            shadow_dir: "shadow".to_string(),
            flush_debounce_ms: 500,
            countdown_tick_ms: 1000,
            max_concurrent_sessions: 4,
            script_folder: "exam_scripts".to_string(),
            verbose_logging: false,
            output_log_file: "exam_session.log".to_string(),
        }
    }
}

impl Config {
    /// 按 默认值 → 配置文件 → 环境变量 的顺序加载配置
    pub fn load() -> AppResult<Self> {
        let path = std::env::var("EXAM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let base = if Path::new(&path).exists() {
            Self::from_toml_file(&path)?
        } else {
            Self::default()
        };
        base.with_env_overrides(|name| std::env::var(name).ok())
    }

    /// 从 TOML 文件读取配置，缺失字段使用默认值
    pub fn from_toml_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    fn from_toml_str(content: &str, origin: &str) -> AppResult<Self> {
        let config = toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: origin.to_string(),
            source,
        })?;
        Ok(config)
    }

    /// 用环境变量覆盖配置
    ///
    /// # 参数
    /// - `lookup`: 环境变量读取函数（测试时可注入）
    pub fn with_env_overrides<F>(mut self, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("EXAM_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = lookup("EXAM_API_TOKEN") {
            self.api_token = v;
        }
        if let Some(v) = lookup("EXAM_SHADOW_DIR") {
            self.shadow_dir = v;
        }
        if let Some(v) = lookup("EXAM_SCRIPT_FOLDER") {
            self.script_folder = v;
        }
        if let Some(v) = lookup("OUTPUT_LOG_FILE") {
            self.output_log_file = v;
        }
        self.request_timeout_secs =
            parse_env(&lookup, "EXAM_REQUEST_TIMEOUT_SECS", "u64")?.unwrap_or(self.request_timeout_secs);
        self.flush_debounce_ms =
            parse_env(&lookup, "EXAM_FLUSH_DEBOUNCE_MS", "u64")?.unwrap_or(self.flush_debounce_ms);
        self.countdown_tick_ms =
            parse_env(&lookup, "EXAM_COUNTDOWN_TICK_MS", "u64")?.unwrap_or(self.countdown_tick_ms);
        self.max_concurrent_sessions = parse_env(&lookup, "EXAM_MAX_CONCURRENT_SESSIONS", "usize")?
            .unwrap_or(self.max_concurrent_sessions);
        self.verbose_logging =
            parse_env(&lookup, "VERBOSE_LOGGING", "bool")?.unwrap_or(self.verbose_logging);
        Ok(self)
    }

    pub fn flush_debounce(&self) -> Duration {
        Duration::from_millis(self.flush_debounce_ms)
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_env<T, F>(lookup: &F, var_name: &str, expected_type: &str) -> AppResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var_name) {
        None => Ok(None),
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }
            .into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn toml_file_fills_missing_fields_with_defaults() {
        let config = Config::from_toml_str(
            "api_base_url = \"https://exam.example.com/api\"\nflush_debounce_ms = 250\n",
            "inline",
        )
        .unwrap();

        assert_eq!(config.api_base_url, "https://exam.example.com/api");
        assert_eq!(config.flush_debounce(), Duration::from_millis(250));
        assert_eq!(config.countdown_tick_ms, 1000);
        assert_eq!(config.shadow_dir, "shadow");
    }

    #[test]
    fn env_overrides_take_precedence() {
        let config = Config::default()
            .with_env_overrides(env(&[
                ("EXAM_API_TOKEN", "secret"),
                ("EXAM_MAX_CONCURRENT_SESSIONS", "9"),
                ("VERBOSE_LOGGING", "true"),
            ]))
            .unwrap();

        assert_eq!(config.api_token, "secret");
        assert_eq!(config.max_concurrent_sessions, 9);
        assert!(config.verbose_logging);
        assert_eq!(config.flush_debounce_ms, 500);
    }

    #[test]
    fn bad_numeric_env_value_is_a_config_error() {
        let err = Config::default()
            .with_env_overrides(env(&[("EXAM_FLUSH_DEBOUNCE_MS", "soon")]))
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Config(ConfigError::EnvVarParseFailed { ref var_name, .. }) if var_name == "EXAM_FLUSH_DEBOUNCE_MS"
        ));
    }

    #[test]
    fn invalid_toml_reports_origin() {
        let err = Config::from_toml_str("flush_debounce_ms = \"fast\"", "broken.toml").unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
