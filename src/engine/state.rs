use crate::engine::status::derive_counts;
use crate::models::{Attempt, QuestionId, QuestionMeta, QuestionPayload, StatusCounts};
use std::collections::{BTreeMap, HashMap};

/// 当前题位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub index: usize,
    pub question_id: QuestionId,
}

/// 考试会话的完整状态
///
/// 各状态数量不单独保存，始终由 `meta` 和 `attempts` 推导
#[derive(Debug, Clone, Default)]
pub struct ExamState {
    pub exam_id: i64,
    pub attempt_id: Option<String>,
    pub meta: Vec<QuestionMeta>,
    pub questions: HashMap<QuestionId, QuestionPayload>,
    pub attempts: BTreeMap<QuestionId, Attempt>,
    pub current: Option<Position>,
    pub time_left_ms: Option<u64>,
    pub loading: bool,
    pub error: Option<String>,
    /// 交卷请求进行中
    pub submitting: bool,
    pub submitted: bool,
}

impl ExamState {
    pub fn new(exam_id: i64) -> Self {
        Self {
            exam_id,
            loading: true,
            ..Self::default()
        }
    }

    pub fn counts(&self) -> StatusCounts {
        derive_counts(&self.meta, &self.attempts)
    }

    /// 按下标取位置，越界时夹到边界；没有题目时返回 `None`
    pub fn clamped_position(&self, index: usize) -> Option<Position> {
        let last = self.meta.len().checked_sub(1)?;
        let index = index.min(last);
        Some(Position {
            index,
            question_id: self.meta[index].question_id,
        })
    }

    /// 当前题的下一题ID（预取用）
    pub fn next_question_id(&self) -> Option<QuestionId> {
        let current = self.current?;
        self.meta.get(current.index + 1).map(|m| m.question_id)
    }

    pub fn attempt(&self, question_id: QuestionId) -> Option<&Attempt> {
        self.attempts.get(&question_id)
    }

    pub fn is_ready(&self) -> bool {
        !self.loading && self.error.is_none() && !self.meta.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(ids: &[QuestionId]) -> ExamState {
        let mut state = ExamState::new(1);
        state.meta = ids.iter().copied().map(QuestionMeta::new).collect();
        state
    }

    #[test]
    fn clamped_position_stays_in_bounds() {
        let state = state_with(&[10, 20, 30]);
        assert_eq!(state.clamped_position(7), Some(Position { index: 2, question_id: 30 }));
        assert_eq!(state.clamped_position(0), Some(Position { index: 0, question_id: 10 }));
        assert_eq!(state_with(&[]).clamped_position(0), None);
    }

    #[test]
    fn next_question_is_none_at_the_end() {
        let mut state = state_with(&[10, 20]);
        state.current = state.clamped_position(0);
        assert_eq!(state.next_question_id(), Some(20));
        state.current = state.clamped_position(1);
        assert_eq!(state.next_question_id(), None);
    }
}
