//! 作答控制器 - 引擎层
//!
//! ## 职责
//!
//! 持有一场考试的全部作答状态，并负责与后端同步：
//!
//! 1. **加载**：试题元数据 + 开始/恢复作答（服务器答案优先，其次本地影子）
//! 2. **导航**：下标夹紧；切题时加载当前题、补一条“已查看”记录、预取下一题
//! 3. **作答**：保存 / 清除 / 标记复查，本地立即生效，再经回写队列批量同步
//! 4. **影子**：每次改动把整份作答记录写入影子存储
//! 5. **交卷**：先同步剩余改动再交卷；倒计时结束走同一条路径，只会交一次

use crate::clients::ExamBackend;
use crate::config::Config;
use crate::engine::state::{ExamState, Position};
use crate::engine::status::{apply_action, AttemptAction};
use crate::engine::sync_queue::WriteBehindQueue;
use crate::error::{AppError, AppResult, ExamError, StorageError};
use crate::infrastructure::{shadow_key, ShadowStore};
use crate::models::{Attempt, AttemptItem, QuestionId, QuestionStatus, SaveBatch, StatusCounts};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 交卷结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 本次调用完成交卷
    Submitted,
    /// 之前已经交过卷，本次没有任何请求
    AlreadySubmitted,
}

struct Shared {
    exam_id: i64,
    backend: Arc<dyn ExamBackend>,
    shadow: Arc<dyn ShadowStore>,
    state: Mutex<ExamState>,
    queue: WriteBehindQueue,
    submit_guard: tokio::sync::Mutex<()>,
    closed: AtomicBool,
}

/// 作答控制器，克隆后共享同一份状态
#[derive(Clone)]
pub struct ExamController {
    shared: Arc<Shared>,
}

impl ExamController {
    /// 创建控制器
    ///
    /// # 参数
    /// - `exam_id`: 考试ID
    /// - `backend`: 后端能力
    /// - `shadow`: 影子存储
    /// - `debounce`: 批量同步防抖时间
    pub fn new(
        exam_id: i64,
        backend: Arc<dyn ExamBackend>,
        shadow: Arc<dyn ShadowStore>,
        debounce: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                exam_id,
                backend,
                shadow,
                state: Mutex::new(ExamState::new(exam_id)),
                queue: WriteBehindQueue::new(debounce),
                submit_guard: tokio::sync::Mutex::new(()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn from_config(
        exam_id: i64,
        backend: Arc<dyn ExamBackend>,
        shadow: Arc<dyn ShadowStore>,
        config: &Config,
    ) -> Self {
        Self::new(exam_id, backend, shadow, config.flush_debounce())
    }

    fn state(&self) -> MutexGuard<'_, ExamState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.is_closed() {
            debug!("[考试 {}] 会话已关闭，丢弃异步结果", self.shared.exam_id);
            return Err(ExamError::Closed.into());
        }
        Ok(())
    }

    /// 记录错误信息并原样返回错误
    fn record_error(&self, err: AppError) -> AppError {
        let mut state = self.state();
        state.error = Some(err.to_string());
        state.loading = false;
        err
    }

    // ========== 只读访问 ==========

    pub fn exam_id(&self) -> i64 {
        self.shared.exam_id
    }

    /// 当前状态的快照
    pub fn snapshot(&self) -> ExamState {
        self.state().clone()
    }

    pub fn counts(&self) -> StatusCounts {
        self.state().counts()
    }

    pub fn current(&self) -> Option<Position> {
        self.state().current
    }

    pub fn attempt(&self, question_id: QuestionId) -> Option<Attempt> {
        self.state().attempt(question_id).cloned()
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    pub fn time_left_ms(&self) -> Option<u64> {
        self.state().time_left_ms
    }

    pub fn is_submitted(&self) -> bool {
        self.state().submitted
    }

    /// 尚未同步到服务器的题目
    pub fn pending_ids(&self) -> Vec<QuestionId> {
        self.shared.queue.pending_ids()
    }

    /// 作答记录的影子序列化结果
    pub fn shadow_snapshot(&self) -> AppResult<String> {
        Ok(serde_json::to_string(&self.state().attempts)?)
    }

    // ========== 加载 ==========

    /// 挂载：并发加载元数据和作答记录，然后定位到第一题
    pub async fn mount(&self) -> AppResult<()> {
        info!("[考试 {}] 📥 正在加载考试...", self.shared.exam_id);
        let (meta, start) = tokio::join!(self.load_meta(), self.start_or_resume());
        meta?;
        // 作答记录恢复后再触发切题，避免“已查看”覆盖恢复的数据
        self.on_current_changed().await;
        start?;
        info!(
            "[考试 {}] ✓ 加载完成: {}",
            self.shared.exam_id,
            self.counts()
        );
        Ok(())
    }

    /// 加载有序试题元数据，成功后当前题指向第一题
    pub async fn load_meta(&self) -> AppResult<()> {
        self.state().loading = true;
        let exam_id = self.shared.exam_id;
        let result = self.shared.backend.fetch_questions_meta(exam_id).await;
        self.ensure_open()?;

        let meta = match result {
            Ok(meta) if meta.is_empty() => {
                return Err(self.record_error(ExamError::EmptyMeta { exam_id }.into()));
            }
            Ok(meta) => meta,
            Err(e) => {
                error!("[考试 {}] ❌ 加载试题元数据失败: {}", exam_id, e);
                return Err(self.record_error(e));
            }
        };

        let mut state = self.state();
        info!("[考试 {}] ✓ 共 {} 道题", exam_id, meta.len());
        state.meta = meta;
        let first = state.clamped_position(0);
        state.current = first;
        state.loading = false;
        Ok(())
    }

    /// 开始或恢复作答
    ///
    /// 服务器返回了已保存答案时以服务器为准；否则从影子存储恢复
    pub async fn start_or_resume(&self) -> AppResult<()> {
        let exam_id = self.shared.exam_id;
        let result = self.shared.backend.start_attempt(exam_id).await;
        self.ensure_open()?;

        let start = match result {
            Ok(start) => start,
            Err(e) => {
                error!("[考试 {}] ❌ 开始作答失败: {}", exam_id, e);
                return Err(self.record_error(e));
            }
        };

        // 未访问的记录等同于没有记录
        let server_answers = start
            .answers
            .map(|answers| {
                answers
                    .into_iter()
                    .filter(|item| item.status != QuestionStatus::NotVisited)
                    .collect::<Vec<_>>()
            })
            .filter(|answers| !answers.is_empty());
        let shadow = match server_answers {
            Some(_) => None,
            None => self.read_shadow(),
        };

        let snapshot = {
            let mut state = self.state();
            state.attempt_id = Some(start.attempt_id.clone());
            if start.time_left_ms.is_some() {
                state.time_left_ms = start.time_left_ms;
            }
            match (server_answers, shadow) {
                (Some(items), _) => {
                    info!("[考试 {}] ↺ 从服务器恢复 {} 条作答记录", exam_id, items.len());
                    state
                        .attempts
                        .extend(items.into_iter().map(AttemptItem::into_attempt));
                    Some(serde_json::to_string(&state.attempts))
                }
                (None, Some(local)) => {
                    info!("[考试 {}] ↺ 从影子存储恢复 {} 条作答记录", exam_id, local.len());
                    state.attempts.extend(local);
                    None
                }
                (None, None) => None,
            }
        };
        if let Some(snapshot) = snapshot {
            self.mirror(snapshot);
        }

        info!("[考试 {}] ✓ 作答记录ID: {}", exam_id, start.attempt_id);
        Ok(())
    }

    /// 按需加载试题内容，已缓存时不发请求
    ///
    /// 失败只记录错误，不影响导航
    pub async fn ensure_loaded(&self, question_id: QuestionId) -> AppResult<()> {
        if self.state().questions.contains_key(&question_id) {
            return Ok(());
        }

        let result = self.shared.backend.fetch_question(question_id).await;
        self.ensure_open()?;

        match result {
            Ok(mut payload) => {
                let mut state = self.state();
                if let Some(attempt) = state.attempts.get(&question_id) {
                    payload.user_answer = Some(attempt.answer.clone());
                }
                state.questions.insert(question_id, payload);
                Ok(())
            }
            Err(e) => {
                warn!(
                    "[考试 {}] ⚠️ 加载题目 {} 失败: {}",
                    self.shared.exam_id, question_id, e
                );
                Err(self.record_error(e))
            }
        }
    }

    // ========== 导航 ==========

    /// 下一题，最后一题时不动
    pub async fn next(&self) {
        let target = self.current().map(|c| c.index + 1);
        if let Some(index) = target {
            self.jump_to(index).await;
        }
    }

    /// 上一题，第一题时不动
    pub async fn previous(&self) {
        let target = self.current().map(|c| c.index.saturating_sub(1));
        if let Some(index) = target {
            self.jump_to(index).await;
        }
    }

    /// 跳到指定下标，越界时夹到边界
    pub async fn jump_to(&self, index: usize) {
        let changed = {
            let mut state = self.state();
            let target = state.clamped_position(index);
            match target {
                Some(position) if state.current != Some(position) => {
                    state.current = Some(position);
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.on_current_changed().await;
        }
    }

    /// 切题副作用：补“已查看”记录、加载当前题、预取下一题
    async fn on_current_changed(&self) {
        let (current, next, snapshot) = {
            let mut state = self.state();
            let Some(position) = state.current else {
                return;
            };
            let mut snapshot = None;
            let unvisited = state
                .attempts
                .get(&position.question_id)
                .map_or(true, |a| a.status == QuestionStatus::NotVisited);
            if !state.submitted && unvisited {
                let existing = state.attempts.get(&position.question_id);
                let seeded = apply_action(existing, &AttemptAction::Visit);
                state.attempts.insert(position.question_id, seeded);
                snapshot = Some(serde_json::to_string(&state.attempts));
            }
            (position.question_id, state.next_question_id(), snapshot)
        };
        if let Some(snapshot) = snapshot {
            self.mirror(snapshot);
        }

        let prefetch = async {
            if let Some(next) = next {
                if let Err(e) = self.ensure_loaded(next).await {
                    debug!("[考试 {}] 预取题目 {} 失败: {}", self.shared.exam_id, next, e);
                }
            }
        };
        let (loaded, ()) = tokio::join!(self.ensure_loaded(current), prefetch);
        if let Err(e) = loaded {
            debug!("[考试 {}] 当前题 {} 未加载: {}", self.shared.exam_id, current, e);
        }
    }

    // ========== 作答 ==========

    /// 保存答案
    pub fn save_answer(&self, question_id: QuestionId, answer: impl Into<String>) {
        self.apply(question_id, AttemptAction::Save(answer.into()));
    }

    /// 清除答案
    pub fn clear_answer(&self, question_id: QuestionId) {
        self.apply(question_id, AttemptAction::Clear);
    }

    /// 标记复查
    pub fn mark_for_review(&self, question_id: QuestionId) {
        self.apply(question_id, AttemptAction::MarkForReview);
    }

    /// 本地立即生效 → 写影子 → 进入待同步表 → 重启防抖定时器
    fn apply(&self, question_id: QuestionId, action: AttemptAction) {
        if self.is_closed() {
            warn!("[考试 {}] 会话已关闭，忽略操作 {:?}", self.shared.exam_id, action);
            return;
        }

        let (attempt, snapshot) = {
            let mut state = self.state();
            if state.submitted || state.submitting {
                warn!("[考试 {}] 已交卷，忽略操作 {:?}", self.shared.exam_id, action);
                return;
            }
            let next = apply_action(state.attempts.get(&question_id), &action);
            state.attempts.insert(question_id, next.clone());
            if let Some(payload) = state.questions.get_mut(&question_id) {
                payload.user_answer = Some(next.answer.clone());
            }
            (next, serde_json::to_string(&state.attempts))
        };

        debug!(
            "[考试 {}] 题目 {} → {}",
            self.shared.exam_id, question_id, attempt.status
        );
        self.mirror(snapshot);
        self.shared
            .queue
            .stage(AttemptItem::from_attempt(question_id, &attempt));
        self.schedule_flush();
    }

    fn schedule_flush(&self) {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        self.shared.queue.schedule(move || async move {
            if let Some(shared) = weak.upgrade() {
                let controller = ExamController { shared };
                // 失败的条目留在表中，下一次刷新时重试
                let _ = controller.flush().await;
            }
        });
    }

    /// 立即把待同步条目作为一批保存
    ///
    /// # 返回
    /// 本批条目数；失败时条目保留
    pub async fn flush(&self) -> AppResult<usize> {
        let exam_id = self.shared.exam_id;
        let attempt_id = self
            .state()
            .attempt_id
            .clone()
            .ok_or(ExamError::NoAttempt { exam_id })?;
        let backend = self.shared.backend.clone();

        let result = self
            .shared
            .queue
            .flush_with(|items| async move {
                let batch = SaveBatch { attempt_id, items };
                backend.save_answers(&batch).await
            })
            .await;

        match &result {
            Ok(0) => {}
            Ok(n) => debug!("[考试 {}] ✓ 已同步 {} 条答案", exam_id, n),
            Err(e) => warn!(
                "[考试 {}] ⚠️ 答案同步失败，{} 条待下次重试: {}",
                exam_id,
                self.shared.queue.len(),
                e
            ),
        }
        result
    }

    // ========== 交卷 ==========

    /// 交卷
    ///
    /// 有未同步改动时先同步再交卷。交卷进行中的改动一律忽略。
    /// 失败不会自动重试，由调用方提示用户。
    pub async fn submit(&self) -> AppResult<SubmitOutcome> {
        let _guard = self.shared.submit_guard.lock().await;
        let exam_id = self.shared.exam_id;

        if self.state().submitted {
            debug!("[考试 {}] 已交卷，跳过重复交卷", exam_id);
            return Ok(SubmitOutcome::AlreadySubmitted);
        }
        self.ensure_open()?;

        let attempt_id = {
            let mut state = self.state();
            let attempt_id = state
                .attempt_id
                .clone()
                .ok_or(ExamError::NoAttempt { exam_id })?;
            state.submitting = true;
            attempt_id
        };
        self.shared.queue.cancel_timer();

        let result = self.finish_submit(&attempt_id).await;
        {
            let mut state = self.state();
            state.submitting = false;
            if result.is_ok() {
                state.submitted = true;
            }
        }

        match result {
            Ok(()) => {
                // 交卷后不再同步任何改动
                self.shared.queue.discard();
                info!("[考试 {}] ✓ 交卷成功: {}", exam_id, self.counts());
                Ok(SubmitOutcome::Submitted)
            }
            Err(e) => {
                error!("[考试 {}] ❌ {}", exam_id, e);
                Err(e)
            }
        }
    }

    /// 同步剩余改动并调用远端交卷
    async fn finish_submit(&self, attempt_id: &str) -> AppResult<()> {
        if !self.shared.queue.is_empty() {
            if let Err(e) = self.flush().await {
                return Err(ExamError::FlushBeforeSubmitFailed {
                    pending: self.shared.queue.len(),
                    reason: e.to_string(),
                }
                .into());
            }
        }

        info!("[考试 {}] 📋 交卷...", self.shared.exam_id);
        self.shared
            .backend
            .submit_attempt(attempt_id)
            .await
            .map_err(|e| {
                ExamError::SubmitFailed {
                    reason: e.to_string(),
                }
                .into()
            })
    }

    /// 倒计时结束，与手动交卷走同一路径
    pub async fn timeout(&self) -> AppResult<SubmitOutcome> {
        info!("[考试 {}] ⏰ 时间到，自动交卷", self.shared.exam_id);
        self.submit().await
    }

    /// 倒计时前进 `elapsed_ms`，返回剩余时间；不限时的考试返回 `None`
    pub fn tick(&self, elapsed_ms: u64) -> Option<u64> {
        let mut state = self.state();
        let left = state.time_left_ms?.saturating_sub(elapsed_ms);
        state.time_left_ms = Some(left);
        Some(left)
    }

    /// 关闭控制器：取消定时器，之后到达的异步结果一律丢弃
    pub fn shutdown(&self) {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            self.shared.queue.cancel_timer();
            debug!("[考试 {}] 会话已关闭", self.shared.exam_id);
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.is_closed()
    }

    // ========== 影子存储 ==========

    fn read_shadow(&self) -> Option<BTreeMap<QuestionId, Attempt>> {
        let key = shadow_key(self.shared.exam_id);
        let raw = match self.shared.shadow.read(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("[考试 {}] ⚠️ 读取影子数据失败: {}", self.shared.exam_id, e);
                return None;
            }
        };
        match serde_json::from_str::<BTreeMap<QuestionId, Attempt>>(&raw) {
            Ok(mut attempts) => {
                attempts.retain(|_, a| a.status != QuestionStatus::NotVisited);
                Some(attempts)
            }
            Err(source) => {
                let err = StorageError::Corrupted { key, source };
                warn!("[考试 {}] ⚠️ 忽略: {}", self.shared.exam_id, err);
                None
            }
        }
    }

    fn mirror(&self, snapshot: serde_json::Result<String>) {
        let key = shadow_key(self.shared.exam_id);
        let result = snapshot
            .map_err(AppError::from)
            .and_then(|json| self.shared.shadow.write(&key, &json));
        if let Err(e) = result {
            warn!("[考试 {}] ⚠️ 写入影子数据失败: {}", self.shared.exam_id, e);
        }
    }
}
