//! 答题卡视图模型
//!
//! 模板只消费状态，不持有状态：这里把 `ExamState` 转成答题卡格子、倒计时文本，
//! 以及日志里使用的纯文本渲染。

use crate::engine::state::ExamState;
use crate::models::{QuestionId, QuestionStatus};
use std::fmt::Write;

/// 答题卡位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalettePosition {
    Left,
    Right,
    Bottom,
}

/// 模板预设
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePreset {
    pub name: &'static str,
    pub palette_position: PalettePosition,
    pub brand_title: String,
}

impl TemplatePreset {
    /// 标准布局：答题卡在右侧
    pub fn standard(brand_title: impl Into<String>) -> Self {
        Self {
            name: "standard",
            palette_position: PalettePosition::Right,
            brand_title: brand_title.into(),
        }
    }

    /// 紧凑布局：答题卡在底部
    pub fn compact(brand_title: impl Into<String>) -> Self {
        Self {
            name: "compact",
            palette_position: PalettePosition::Bottom,
            brand_title: brand_title.into(),
        }
    }
}

/// 答题卡中的一个格子
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteCell {
    /// 题号（从1开始）
    pub number: usize,
    pub question_id: QuestionId,
    pub status: QuestionStatus,
    pub is_current: bool,
}

/// 每道题一个格子，按状态着色并标出当前题
pub fn palette_cells(state: &ExamState) -> Vec<PaletteCell> {
    let current = state.current.map(|c| c.index);
    state
        .meta
        .iter()
        .enumerate()
        .map(|(index, meta)| PaletteCell {
            number: index + 1,
            question_id: meta.question_id,
            status: state
                .attempt(meta.question_id)
                .map_or(QuestionStatus::NotVisited, |a| a.status),
            is_current: current == Some(index),
        })
        .collect()
}

/// 格式化剩余时间为 HH:MM:SS
pub fn format_countdown(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!(
        "{:02}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60
    )
}

/// 状态对应的答题卡符号
pub fn status_symbol(status: QuestionStatus) -> char {
    match status {
        QuestionStatus::NotVisited => '·',
        QuestionStatus::Viewed => 'o',
        QuestionStatus::Answered => '●',
        QuestionStatus::NotAnswered => 'x',
        QuestionStatus::MarkedForReview => '?',
        QuestionStatus::AnsweredMarkedForReview => '!',
    }
}

/// 纯文本渲染：标题、倒计时、答题卡、统计
pub fn render_text(state: &ExamState, preset: &TemplatePreset) -> String {
    let mut out = String::new();
    let timer = state
        .time_left_ms
        .map(format_countdown)
        .unwrap_or_else(|| "--:--:--".to_string());
    let _ = writeln!(out, "{} | 考试 {} | ⏳ {}", preset.brand_title, state.exam_id, timer);

    let cells: Vec<String> = palette_cells(state)
        .iter()
        .map(|cell| {
            if cell.is_current {
                format!("[{}{}]", cell.number, status_symbol(cell.status))
            } else {
                format!(" {}{} ", cell.number, status_symbol(cell.status))
            }
        })
        .collect();
    let separator = match preset.palette_position {
        PalettePosition::Bottom => "",
        PalettePosition::Left | PalettePosition::Right => "\n",
    };
    let _ = writeln!(out, "{}{}", separator, cells.join(""));
    let _ = write!(out, "{}", state.counts());
    out
}
