//! 集成测试公共工具：记录调用的假后端

#![allow(dead_code)]

use async_trait::async_trait;
use exam_session::clients::ExamBackend;
use exam_session::error::{AppError, AppResult};
use exam_session::infrastructure::MemoryShadowStore;
use exam_session::models::{AttemptItem, AttemptStart, QuestionId, QuestionMeta, QuestionPayload, SaveBatch};
use exam_session::ExamController;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const EXAM_ID: i64 = 42;
pub const ATTEMPT_ID: &str = "attempt-42";

/// 后端收到的一次调用
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Meta(i64),
    Question(QuestionId),
    Start(i64),
    Save(SaveBatch),
    Submit(String),
}

/// 可编排失败的假后端
pub struct FakeBackend {
    question_ids: Vec<QuestionId>,
    start: AttemptStart,
    fail_meta: bool,
    fail_questions: bool,
    save_failures: AtomicUsize,
    fail_submit: AtomicBool,
    submit_delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
}

impl FakeBackend {
    pub fn new(question_ids: &[QuestionId]) -> Self {
        Self {
            question_ids: question_ids.to_vec(),
            start: AttemptStart {
                attempt_id: ATTEMPT_ID.to_string(),
                time_left_ms: None,
                answers: None,
            },
            fail_meta: false,
            fail_questions: false,
            save_failures: AtomicUsize::new(0),
            fail_submit: AtomicBool::new(false),
            submit_delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_time_left(mut self, ms: u64) -> Self {
        self.start.time_left_ms = Some(ms);
        self
    }

    pub fn with_server_answers(mut self, answers: Vec<AttemptItem>) -> Self {
        self.start.answers = Some(answers);
        self
    }

    /// 交卷请求耗时
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = Some(delay);
        self
    }

    pub fn failing_meta(mut self) -> Self {
        self.fail_meta = true;
        self
    }

    pub fn failing_questions(mut self) -> Self {
        self.fail_questions = true;
        self
    }

    /// 接下来 `n` 次批量保存失败
    pub fn fail_next_saves(&self, n: usize) {
        self.save_failures.store(n, Ordering::SeqCst);
    }

    pub fn set_fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn saves(&self) -> Vec<SaveBatch> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Save(batch) => Some(batch),
                _ => None,
            })
            .collect()
    }

    pub fn submit_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Submit(_)))
            .count()
    }

    /// 只保留写操作（保存与交卷），用于比较调用顺序
    pub fn outbound(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Save(_) | Call::Submit(_)))
            .collect()
    }

    pub fn fetched_questions(&self) -> Vec<QuestionId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Question(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn offline(endpoint: &str) -> AppError {
    AppError::bad_response(endpoint, Some(503), "offline")
}

#[async_trait]
impl ExamBackend for FakeBackend {
    async fn fetch_questions_meta(&self, exam_id: i64) -> AppResult<Vec<QuestionMeta>> {
        self.record(Call::Meta(exam_id));
        if self.fail_meta {
            return Err(offline("meta"));
        }
        Ok(self.question_ids.iter().copied().map(QuestionMeta::new).collect())
    }

    async fn fetch_question(&self, question_id: QuestionId) -> AppResult<QuestionPayload> {
        self.record(Call::Question(question_id));
        if self.fail_questions {
            return Err(offline("question"));
        }
        Ok(QuestionPayload {
            question_id,
            text: format!("第 {} 题", question_id),
            options: json!(["A", "B", "C", "D"]),
            kind: "single".to_string(),
            user_answer: None,
        })
    }

    async fn start_attempt(&self, exam_id: i64) -> AppResult<AttemptStart> {
        self.record(Call::Start(exam_id));
        Ok(self.start.clone())
    }

    async fn save_answers(&self, batch: &SaveBatch) -> AppResult<()> {
        self.record(Call::Save(batch.clone()));
        let failing = self
            .save_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(offline("save"));
        }
        Ok(())
    }

    async fn submit_attempt(&self, attempt_id: &str) -> AppResult<()> {
        self.record(Call::Submit(attempt_id.to_string()));
        if let Some(delay) = self.submit_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(offline("submit"));
        }
        Ok(())
    }
}

/// 构造控制器，防抖时间 500ms
pub fn controller(
    backend: &Arc<FakeBackend>,
    shadow: &Arc<MemoryShadowStore>,
) -> ExamController {
    ExamController::new(
        EXAM_ID,
        backend.clone(),
        shadow.clone(),
        Duration::from_millis(500),
    )
}

/// 挂载一场没有历史作答的考试
pub async fn mounted(ids: &[QuestionId]) -> (ExamController, Arc<FakeBackend>, Arc<MemoryShadowStore>) {
    let backend = Arc::new(FakeBackend::new(ids));
    let shadow = Arc::new(MemoryShadowStore::new());
    let controller = controller(&backend, &shadow);
    controller.mount().await.expect("挂载失败");
    (controller, backend, shadow)
}
