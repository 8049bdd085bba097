//! 答案回写队列
//!
//! 写后缓存：本地改动先进入待同步表，由唯一的防抖定时器合并成一次批量保存。
//! - 新改动会取消并重启定时器，不会排出第二个定时器
//! - 取消只作用于定时器本身，已经发出的请求不会被中断
//! - 同一时间最多一个批量保存在进行
//! - 保存失败时条目留在表中，下一次刷新整体重试

use crate::error::AppResult;
use crate::models::{AttemptItem, QuestionId};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Default)]
struct QueueInner {
    pending: BTreeMap<QuestionId, AttemptItem>,
    timer: Option<JoinHandle<()>>,
}

/// 待同步表 + 防抖定时器
pub struct WriteBehindQueue {
    debounce: Duration,
    inner: Mutex<QueueInner>,
    in_flight: tokio::sync::Mutex<()>,
}

impl WriteBehindQueue {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            inner: Mutex::new(QueueInner::default()),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 暂存一条改动，同一道题只保留最新值
    pub fn stage(&self, item: AttemptItem) {
        self.lock().pending.insert(item.question_id, item);
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn pending_ids(&self) -> Vec<QuestionId> {
        self.lock().pending.keys().copied().collect()
    }

    /// 是否有尚未触发的定时器
    pub fn has_scheduled_timer(&self) -> bool {
        self.lock().timer.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 重启防抖定时器，到期后在独立任务中执行 `on_fire`
    ///
    /// 必须在 tokio 运行时内调用
    pub fn schedule<F, Fut>(&self, on_fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let debounce = self.debounce;
        let mut inner = self.lock();
        if let Some(previous) = inner.timer.take() {
            previous.abort();
        }
        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            // 刷新放在独立任务里，之后再取消定时器也不会打断请求
            tokio::spawn(on_fire());
        }));
    }

    /// 取消尚未触发的定时器
    pub fn cancel_timer(&self) {
        if let Some(timer) = self.lock().timer.take() {
            timer.abort();
        }
    }

    /// 取消定时器并丢弃所有待同步条目
    pub fn discard(&self) {
        let mut inner = self.lock();
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        inner.pending.clear();
    }

    /// 把当前所有待同步条目作为一批交给 `send`
    ///
    /// # 返回
    /// 成功时返回本批条目数；失败时条目保留，错误原样返回
    pub async fn flush_with<F, Fut>(&self, send: F) -> AppResult<usize>
    where
        F: FnOnce(Vec<AttemptItem>) -> Fut,
        Fut: Future<Output = AppResult<()>>,
    {
        let _flight = self.in_flight.lock().await;

        let batch: Vec<AttemptItem> = self.lock().pending.values().cloned().collect();
        if batch.is_empty() {
            return Ok(0);
        }

        let size = batch.len();
        debug!("批量同步 {} 条答案", size);
        send(batch.clone()).await?;

        // 请求期间又改过的题保持待同步
        let mut inner = self.lock();
        for sent in &batch {
            if inner.pending.get(&sent.question_id) == Some(sent) {
                inner.pending.remove(&sent.question_id);
            }
        }
        Ok(size)
    }
}

impl Drop for WriteBehindQueue {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
