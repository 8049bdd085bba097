//! 考试倒计时
//!
//! 每个步长扣减剩余时间，归零时调用一次 `timeout()`

use crate::engine::controller::{ExamController, SubmitOutcome};
use crate::error::AppResult;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// 倒计时结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEnd {
    /// 时间到并触发了交卷
    Expired(SubmitOutcome),
    /// 考试不限时
    Untimed,
    /// 已交卷或会话已关闭
    Stopped,
}

/// 启动倒计时任务
///
/// # 参数
/// - `controller`: 作答控制器
/// - `tick`: 步长
pub fn spawn_countdown(controller: ExamController, tick: Duration) -> JoinHandle<AppResult<CountdownEnd>> {
    tokio::spawn(run_countdown(controller, tick))
}

/// 倒计时主循环
pub async fn run_countdown(controller: ExamController, tick: Duration) -> AppResult<CountdownEnd> {
    let exam_id = controller.exam_id();
    let Some(start) = controller.time_left_ms() else {
        debug!("[考试 {}] 不限时，不启动倒计时", exam_id);
        return Ok(CountdownEnd::Untimed);
    };
    info!("[考试 {}] ⏳ 倒计时开始: {}", exam_id, crate::engine::palette::format_countdown(start));

    let tick = tick.max(Duration::from_millis(1));
    let step_ms = u64::try_from(tick.as_millis()).unwrap_or(u64::MAX).max(1);
    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval 第一次立即返回
    ticker.tick().await;

    let mut left = start;
    while left > 0 {
        ticker.tick().await;
        if controller.is_submitted() || controller.is_shut_down() {
            return Ok(CountdownEnd::Stopped);
        }
        left = controller.tick(step_ms).unwrap_or(0);
    }

    let outcome = controller.timeout().await?;
    Ok(CountdownEnd::Expired(outcome))
}
