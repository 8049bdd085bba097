//! 作答状态机
//!
//! 纯函数：(已有记录, 动作) → 新记录。没有非法转换，任何输入都得到确定结果。

use crate::models::{has_answer, Attempt, QuestionMeta, QuestionId, QuestionStatus, StatusCounts};
use std::collections::BTreeMap;

/// 作用在单题上的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptAction {
    /// 题目第一次成为当前题
    Visit,
    /// 保存答案
    Save(String),
    /// 清除答案
    Clear,
    /// 标记复查
    MarkForReview,
}

/// 计算动作后的作答记录
pub fn apply_action(existing: Option<&Attempt>, action: &AttemptAction) -> Attempt {
    match action {
        AttemptAction::Visit => match existing {
            Some(attempt) if attempt.status != QuestionStatus::NotVisited => attempt.clone(),
            Some(attempt) => Attempt::new(attempt.answer.clone(), QuestionStatus::Viewed),
            None => Attempt::new("", QuestionStatus::Viewed),
        },
        // 只有空白的答案按空答案保存
        AttemptAction::Save(answer) if has_answer(answer) => {
            Attempt::new(answer.clone(), QuestionStatus::Answered)
        }
        AttemptAction::Save(_) => Attempt::new("", QuestionStatus::NotAnswered),
        AttemptAction::Clear => Attempt::new("", QuestionStatus::NotAnswered),
        AttemptAction::MarkForReview => {
            let answer = existing.map(|a| a.answer.clone()).unwrap_or_default();
            let status = if has_answer(&answer) {
                QuestionStatus::AnsweredMarkedForReview
            } else {
                QuestionStatus::MarkedForReview
            };
            Attempt::new(answer, status)
        }
    }
}

/// 由元数据和作答记录推导各状态数量
///
/// 只统计属于本场考试的题目，六项之和恒等于 `meta.len()`
pub fn derive_counts(meta: &[QuestionMeta], attempts: &BTreeMap<QuestionId, Attempt>) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for item in meta {
        match attempts.get(&item.question_id) {
            Some(attempt) => counts.bump(attempt.status),
            None => counts.bump(QuestionStatus::NotVisited),
        }
    }
    counts
}
