//! 单场考试会话执行器 - 编排层
//!
//! ## 职责
//!
//! 按脚本驱动一个 `ExamController`：
//!
//! 1. **挂载**：加载试题与作答记录
//! 2. **倒计时**：限时考试启动倒计时任务，时间到自动交卷
//! 3. **执行步骤**：作答 / 清除 / 标记 / 导航 / 等待 / 交卷
//! 4. **兜底交卷**：脚本没有交卷步骤时，执行完毕后交卷
//! 5. **统计输出**：记录各状态题目数量

use crate::clients::ExamBackend;
use crate::config::Config;
use crate::engine::{render_text, spawn_countdown, ExamController, SubmitOutcome, TemplatePreset};
use crate::infrastructure::ShadowStore;
use crate::models::{ExamScript, QuestionId, ScriptStep, StatusCounts};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 单场会话结果
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub exam_id: i64,
    pub submitted: bool,
    pub counts: StatusCounts,
    pub steps_run: usize,
}

/// 执行一个考试脚本
///
/// # 参数
/// - `backend`: 后端能力
/// - `shadow`: 影子存储
/// - `script`: 考试脚本
/// - `session_index`: 会话序号（仅用于日志）
/// - `config`: 配置
///
/// # 返回
/// 返回会话统计
pub async fn run_session(
    backend: Arc<dyn ExamBackend>,
    shadow: Arc<dyn ShadowStore>,
    script: ExamScript,
    session_index: usize,
    config: &Config,
) -> Result<SessionReport> {
    log_session_start(session_index, &script);

    let controller = ExamController::from_config(script.exam_id, backend, shadow, config);
    controller
        .mount()
        .await
        .with_context(|| format!("考试 {} 加载失败", script.exam_id))?;

    let countdown = spawn_countdown(controller.clone(), config.countdown_tick());
    let preset = TemplatePreset::standard(script.name.clone());

    let mut steps_run = 0;
    for step in &script.steps {
        if controller.is_submitted() {
            warn!("[会话 {}] ⚠️ 已交卷，跳过剩余步骤", session_index);
            break;
        }
        run_step(&controller, step, session_index).await;
        steps_run += 1;

        if config.verbose_logging {
            debug!("[会话 {}]\n{}", session_index, render_text(&controller.snapshot(), &preset));
        }
    }

    if !controller.is_submitted() {
        info!("[会话 {}] 📤 脚本结束，自动交卷", session_index);
        submit_with_alert(&controller, session_index).await;
    }

    controller.shutdown();
    match countdown.await {
        Ok(Ok(end)) => debug!("[会话 {}] 倒计时结束: {:?}", session_index, end),
        Ok(Err(e)) => warn!("[会话 {}] 倒计时交卷失败: {}", session_index, e),
        Err(e) => error!("[会话 {}] 倒计时任务异常: {}", session_index, e),
    }

    let report = SessionReport {
        exam_id: script.exam_id,
        submitted: controller.is_submitted(),
        counts: controller.counts(),
        steps_run,
    };
    log_session_complete(session_index, &report);
    Ok(report)
}

/// 执行单个步骤
async fn run_step(controller: &ExamController, step: &ScriptStep, session_index: usize) {
    match step {
        ScriptStep::Answer {
            question_id,
            answer,
        } => {
            if let Some(qid) = target(controller, *question_id) {
                controller.save_answer(qid, answer.clone());
            }
        }
        ScriptStep::Clear { question_id } => {
            if let Some(qid) = target(controller, *question_id) {
                controller.clear_answer(qid);
            }
        }
        ScriptStep::Mark { question_id } => {
            if let Some(qid) = target(controller, *question_id) {
                controller.mark_for_review(qid);
            }
        }
        ScriptStep::Next => controller.next().await,
        ScriptStep::Previous => controller.previous().await,
        ScriptStep::Jump { index } => controller.jump_to(*index).await,
        ScriptStep::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
        ScriptStep::Submit => submit_with_alert(controller, session_index).await,
    }
}

/// 省略题目ID时作用于当前题
fn target(controller: &ExamController, question_id: Option<QuestionId>) -> Option<QuestionId> {
    question_id.or_else(|| controller.current().map(|c| c.question_id))
}

/// 交卷失败只提示，不自动重试
async fn submit_with_alert(controller: &ExamController, session_index: usize) {
    match controller.submit().await {
        Ok(SubmitOutcome::Submitted) => info!("[会话 {}] ✓ 交卷成功", session_index),
        Ok(SubmitOutcome::AlreadySubmitted) => debug!("[会话 {}] 已交过卷", session_index),
        Err(e) => error!("[会话 {}] ❌ 交卷失败，请重新提交: {}", session_index, e),
    }
}

// ========== 日志辅助函数 ==========

fn log_session_start(session_index: usize, script: &ExamScript) {
    info!("[会话 {}] 开始执行", session_index);
    info!("[会话 {}] 名称: {}", session_index, script.name);
    info!("[会话 {}] 考试ID: {}", session_index, script.exam_id);
    info!("[会话 {}] 步骤总数: {}", session_index, script.steps.len());
    if !script.has_submit() {
        info!("[会话 {}] 脚本没有交卷步骤，执行完毕后自动交卷", session_index);
    }
}

fn log_session_complete(session_index: usize, report: &SessionReport) {
    info!("[会话 {}] 题目统计: {}", session_index, report.counts);
    if report.submitted {
        info!("\n[会话 {}] ✅ 会话完成\n", session_index);
    } else {
        warn!("\n[会话 {}] ⚠️ 会话结束但未交卷\n", session_index);
    }
}
