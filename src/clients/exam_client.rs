//! 考试后端 API 客户端
//!
//! 封装所有与考试后端相关的调用逻辑，返回值均已规整为标准结构
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::normalize;
use crate::models::{AttemptStart, QuestionId, QuestionMeta, QuestionPayload, SaveBatch};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// 作答控制器依赖的后端能力
#[async_trait]
pub trait ExamBackend: Send + Sync {
    /// 获取考试的有序试题元数据
    async fn fetch_questions_meta(&self, exam_id: i64) -> AppResult<Vec<QuestionMeta>>;

    /// 获取单道试题的完整内容
    async fn fetch_question(&self, question_id: QuestionId) -> AppResult<QuestionPayload>;

    /// 开始或恢复作答
    async fn start_attempt(&self, exam_id: i64) -> AppResult<AttemptStart>;

    /// 批量保存答案
    async fn save_answers(&self, batch: &SaveBatch) -> AppResult<()>;

    /// 交卷
    async fn submit_attempt(&self, attempt_id: &str) -> AppResult<()>;
}

/// 后端统一响应外壳 `{status, data, error, errorMessage}`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope {
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ApiEnvelope {
    /// 外壳中的业务状态码（可能是数字或数字字符串）
    pub fn status_code(&self) -> Option<u16> {
        match self.status.as_ref()? {
            Value::Number(n) => n.as_u64().and_then(|c| u16::try_from(c).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// 检查响应是否成功
    pub fn is_success(&self) -> bool {
        let status_ok = self
            .status_code()
            .map_or(true, |code| (200..300).contains(&code));
        let error_flag = match &self.error {
            None | Some(Value::Null) | Some(Value::Bool(false)) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        };
        status_ok && !error_flag
    }

    /// 提取可读的错误信息
    pub fn error_text(&self) -> String {
        if let Some(msg) = self.error_message.as_deref().filter(|m| !m.is_empty()) {
            return msg.to_string();
        }
        if let Some(Value::String(msg)) = &self.error {
            if !msg.is_empty() {
                return msg.clone();
            }
        }
        match self.status_code() {
            Some(code) => format!("后端返回状态 {}", code),
            None => "后端返回错误".to_string(),
        }
    }
}

/// 考试后端 HTTP 客户端
pub struct ExamClient {
    http: Client,
    base_url: String,
    token: String,
}

impl ExamClient {
    /// 创建新的考试客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::api_request_failed("client", e))?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        })
    }

    /// 发送请求并解出外壳中的 data
    ///
    /// # 参数
    /// - `method`: HTTP 方法
    /// - `endpoint`: 相对路径
    /// - `body`: 请求体（可选）
    async fn call(&self, method: Method, endpoint: &str, body: Option<&Value>) -> AppResult<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("调用后端: {} {}", method, url);

        let mut request = self
            .http
            .request(method, &url)
            .header("Accept", "application/json, text/plain, */*");
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;
        let http_status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;

        debug!("后端响应 ({}): {}", http_status, crate::utils::truncate_text(&text, 200));
        parse_envelope(endpoint, http_status, &text)
    }
}

/// 解析响应外壳
fn parse_envelope(endpoint: &str, http_status: StatusCode, text: &str) -> AppResult<Value> {
    if text.trim().is_empty() {
        if http_status.is_success() {
            return Ok(Value::Null);
        }
        return Err(AppError::bad_response(
            endpoint,
            Some(http_status.as_u16()),
            http_status.canonical_reason().unwrap_or("empty body"),
        ));
    }

    let envelope: ApiEnvelope = serde_json::from_str(text)?;
    if !http_status.is_success() || !envelope.is_success() {
        let status = envelope.status_code().or(Some(http_status.as_u16()));
        return Err(AppError::bad_response(endpoint, status, envelope.error_text()));
    }
    Ok(envelope.data)
}

fn require_data<'a>(endpoint: &str, data: &'a Value) -> AppResult<&'a Value> {
    if data.is_null() {
        return Err(crate::error::ApiError::EmptyResponse {
            endpoint: endpoint.to_string(),
        }
        .into());
    }
    Ok(data)
}

#[async_trait]
impl ExamBackend for ExamClient {
    async fn fetch_questions_meta(&self, exam_id: i64) -> AppResult<Vec<QuestionMeta>> {
        let endpoint = format!("Exams/{}/QuestionsMeta", exam_id);
        let data = self.call(Method::GET, &endpoint, None).await?;
        normalize::normalize_meta_list(require_data(&endpoint, &data)?)
    }

    async fn fetch_question(&self, question_id: QuestionId) -> AppResult<QuestionPayload> {
        let endpoint = format!("Questions/{}", question_id);
        let data = self.call(Method::GET, &endpoint, None).await?;
        normalize::normalize_question(require_data(&endpoint, &data)?, question_id)
    }

    async fn start_attempt(&self, exam_id: i64) -> AppResult<AttemptStart> {
        let endpoint = format!("Exams/{}/Attempts/StartOrResume", exam_id);
        let body = json!({ "examId": exam_id });
        let data = self.call(Method::POST, &endpoint, Some(&body)).await?;
        normalize::normalize_attempt_start(require_data(&endpoint, &data)?)
    }

    async fn save_answers(&self, batch: &SaveBatch) -> AppResult<()> {
        let endpoint = format!("Attempts/{}/Answers", batch.attempt_id);
        let body = serde_json::to_value(batch)?;
        self.call(Method::POST, &endpoint, Some(&body)).await?;
        Ok(())
    }

    async fn submit_attempt(&self, attempt_id: &str) -> AppResult<()> {
        let endpoint = format!("Attempts/{}/Submit", attempt_id);
        let body = json!({ "attemptId": attempt_id });
        self.call(Method::POST, &endpoint, Some(&body)).await?;
        Ok(())
    }
}
