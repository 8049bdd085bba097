use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// 试题ID
pub type QuestionId = i64;

/// 试题元数据
///
/// 加载后不再变化，只描述试题在考试中的位置和分值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionMeta {
    pub question_id: QuestionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<i64>,
    #[serde(default)]
    pub marks: f64,
    #[serde(default)]
    pub neg: f64,
}

impl QuestionMeta {
    pub fn new(question_id: QuestionId) -> Self {
        Self {
            question_id,
            section_id: None,
            marks: 0.0,
            neg: 0.0,
        }
    }
}

/// 试题完整内容，按需加载并按ID缓存
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub question_id: QuestionId,
    pub text: String,
    /// 选项（已解析的 JSON）
    pub options: JsonValue,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<String>,
}

/// 试题作答状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestionStatus {
    NotVisited,
    Viewed,
    Answered,
    NotAnswered,
    MarkedForReview,
    AnsweredMarkedForReview,
}

impl QuestionStatus {
    pub const ALL: [QuestionStatus; 6] = [
        QuestionStatus::NotVisited,
        QuestionStatus::Viewed,
        QuestionStatus::Answered,
        QuestionStatus::NotAnswered,
        QuestionStatus::MarkedForReview,
        QuestionStatus::AnsweredMarkedForReview,
    ];

    /// 与后端约定的状态字符串
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionStatus::NotVisited => "notVisited",
            QuestionStatus::Viewed => "viewed",
            QuestionStatus::Answered => "answered",
            QuestionStatus::NotAnswered => "notAnswered",
            QuestionStatus::MarkedForReview => "markedForReview",
            QuestionStatus::AnsweredMarkedForReview => "answeredMarkedForReview",
        }
    }

    /// 宽松解析：兼容 camelCase / PascalCase / snake_case
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let folded: String = raw
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        QuestionStatus::ALL
            .into_iter()
            .find(|status| status.as_str().to_lowercase() == folded)
    }
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单题作答记录，是持久化的基本单位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub answer: String,
    pub status: QuestionStatus,
}

impl Attempt {
    pub fn new(answer: impl Into<String>, status: QuestionStatus) -> Self {
        Self {
            answer: answer.into(),
            status,
        }
    }

    pub fn has_answer(&self) -> bool {
        has_answer(&self.answer)
    }
}

/// 判断答案是否非空
pub fn has_answer(answer: &str) -> bool {
    !answer.trim().is_empty()
}

/// 批量同步时的一条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptItem {
    pub question_id: QuestionId,
    pub answer: String,
    pub status: QuestionStatus,
}

impl AttemptItem {
    pub fn from_attempt(question_id: QuestionId, attempt: &Attempt) -> Self {
        Self {
            question_id,
            answer: attempt.answer.clone(),
            status: attempt.status,
        }
    }

    pub fn into_attempt(self) -> (QuestionId, Attempt) {
        (self.question_id, Attempt::new(self.answer, self.status))
    }
}

/// 批量保存请求体
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveBatch {
    pub attempt_id: String,
    pub items: Vec<AttemptItem>,
}

/// 开始/恢复作答的返回
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttemptStart {
    pub attempt_id: String,
    pub time_left_ms: Option<u64>,
    /// 服务器保存的答案；`None` 表示服务器未提供
    pub answers: Option<Vec<AttemptItem>>,
}

/// 各状态的题目数量，完全由作答记录推导
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub not_visited: usize,
    pub viewed: usize,
    pub answered: usize,
    pub not_answered: usize,
    pub marked_for_review: usize,
    pub answered_marked_for_review: usize,
}

impl StatusCounts {
    pub fn get(&self, status: QuestionStatus) -> usize {
        match status {
            QuestionStatus::NotVisited => self.not_visited,
            QuestionStatus::Viewed => self.viewed,
            QuestionStatus::Answered => self.answered,
            QuestionStatus::NotAnswered => self.not_answered,
            QuestionStatus::MarkedForReview => self.marked_for_review,
            QuestionStatus::AnsweredMarkedForReview => self.answered_marked_for_review,
        }
    }

    pub(crate) fn bump(&mut self, status: QuestionStatus) {
        let slot = match status {
            QuestionStatus::NotVisited => &mut self.not_visited,
            QuestionStatus::Viewed => &mut self.viewed,
            QuestionStatus::Answered => &mut self.answered,
            QuestionStatus::NotAnswered => &mut self.not_answered,
            QuestionStatus::MarkedForReview => &mut self.marked_for_review,
            QuestionStatus::AnsweredMarkedForReview => &mut self.answered_marked_for_review,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        QuestionStatus::ALL.iter().map(|s| self.get(*s)).sum()
    }
}

impl fmt::Display for StatusCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "未访问 {} | 已查看 {} | 已作答 {} | 未作答 {} | 待复查 {} | 已答待复查 {}",
            self.not_visited,
            self.viewed,
            self.answered,
            self.not_answered,
            self.marked_for_review,
            self.answered_marked_for_review
        )
    }
}
