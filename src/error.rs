use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 本地影子存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 考试会话错误
    #[error("考试错误: {0}")]
    Exam(#[from] ExamError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// API 返回错误响应
    #[error("API返回错误响应 ({endpoint}): status={status:?}, message={message}")]
    BadResponse {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },
    /// API 返回空结果
    #[error("API返回空结果: {endpoint}")]
    EmptyResponse { endpoint: String },
    /// JSON 解析失败
    #[error("JSON解析失败: {source}")]
    JsonParseFailed {
        #[source]
        source: serde_json::Error,
    },
    /// 后端数据无法规整为标准结构
    #[error("无法解析{what}: {reason}")]
    Malformed { what: &'static str, reason: String },
}

/// 影子存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 读取失败
    #[error("读取影子数据失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入失败
    #[error("写入影子数据失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 后台写入任务已退出
    #[error("影子数据写入任务已停止 ({path})")]
    WriterClosed { path: String },
    /// 影子数据损坏
    #[error("影子数据损坏 ({key}): {source}")]
    Corrupted {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 考试会话错误
#[derive(Debug, Error)]
pub enum ExamError {
    /// 试题元数据为空
    #[error("考试 {exam_id} 没有任何试题")]
    EmptyMeta { exam_id: i64 },
    /// 尚未获得作答记录ID
    #[error("考试 {exam_id} 尚未开始作答")]
    NoAttempt { exam_id: i64 },
    /// 提交前的答案同步失败
    #[error("交卷前同步 {pending} 条答案失败: {reason}")]
    FlushBeforeSubmitFailed { pending: usize, reason: String },
    /// 交卷失败
    #[error("交卷失败: {reason}")]
    SubmitFailed { reason: String },
    /// 控制器已关闭
    #[error("考试会话已关闭")]
    Closed,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed { source: err })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(StorageError::ReadFailed {
            path: String::new(),
            source: err,
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(ConfigError::TomlParseFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            source: err,
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source,
        })
    }

    /// 创建后端错误响应
    pub fn bad_response(
        endpoint: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        AppError::Api(ApiError::BadResponse {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        })
    }

    /// 创建数据格式错误
    pub fn malformed(what: &'static str, reason: impl Into<String>) -> Self {
        AppError::Api(ApiError::Malformed {
            what,
            reason: reason.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
