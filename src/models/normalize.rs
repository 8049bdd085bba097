//! 后端数据规整 - 边界适配层
//!
//! 后端字段命名并不稳定（`QuestionId` / `questionId` / `id` ...），
//! 所有“原始 JSON → 标准结构”的映射都集中在这里，调用方只接触标准类型。

use crate::error::{AppError, AppResult};
use crate::models::question::{
    has_answer, AttemptItem, AttemptStart, QuestionId, QuestionMeta, QuestionPayload,
    QuestionStatus,
};
use phf::phf_map;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

/// 标准字段名 → 后端可能使用的字段名（按优先级）
static FIELD_ALIASES: phf::Map<&'static str, &'static [&'static str]> = phf_map! {
    "questionId" => &["questionId", "QuestionId", "questionID", "id", "Id"],
    "sectionId" => &["sectionId", "SectionId", "section_id"],
    "marks" => &["marks", "Marks", "mark", "score"],
    "neg" => &["neg", "Neg", "negativeMarks", "NegativeMarks", "negMarks"],
    "text" => &["questionText", "QuestionText", "text", "Text", "question", "Question"],
    "options" => &["options", "Options", "optionsJson", "OptionsJson", "questionOptions"],
    "kind" => &["questionType", "QuestionType", "type", "Type", "questionTypeName"],
    "userAnswer" => &["userAnswer", "UserAnswer", "answer", "Answer"],
    "status" => &["status", "Status", "attemptStatus"],
    "attemptId" => &["attemptId", "AttemptId", "id", "Id"],
    "timeLeftMs" => &["timeLeftMs", "TimeLeftMs", "remainingMs"],
    "timeLeftSeconds" => &["timeLeftSeconds", "remainingSeconds"],
    "answers" => &["answers", "Answers", "savedAnswers", "items"],
};

/// 列表数据可能被包在这些字段里（OData 的 `value` 等）
const LIST_WRAPPERS: [&str; 3] = ["value", "items", "data"];

/// 按别名表取字段，跳过 null
pub fn pick<'a>(raw: &'a JsonValue, field: &str) -> Option<&'a JsonValue> {
    let aliases = FIELD_ALIASES.get(field).copied().unwrap_or(&[]);
    aliases
        .iter()
        .filter_map(|alias| raw.get(*alias))
        .find(|v| !v.is_null())
}

fn as_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// 取出列表：裸数组，或包在 `value` / `items` / `data` 里的数组
pub fn unwrap_list(data: &JsonValue) -> Option<&Vec<JsonValue>> {
    if let Some(list) = data.as_array() {
        return Some(list);
    }
    LIST_WRAPPERS
        .iter()
        .find_map(|key| data.get(*key).and_then(JsonValue::as_array))
}

/// 规整试题元数据列表，缺少ID的条目会被跳过
pub fn normalize_meta_list(data: &JsonValue) -> AppResult<Vec<QuestionMeta>> {
    let list = unwrap_list(data)
        .ok_or_else(|| AppError::malformed("试题元数据", format!("不是列表: {}", preview(data))))?;

    let mut metas = Vec::with_capacity(list.len());
    for item in list {
        let Some(question_id) = pick(item, "questionId").and_then(as_i64) else {
            warn!("跳过缺少题目ID的元数据: {}", preview(item));
            continue;
        };
        metas.push(QuestionMeta {
            question_id,
            section_id: pick(item, "sectionId").and_then(as_i64),
            marks: pick(item, "marks").and_then(as_f64).unwrap_or(0.0),
            neg: pick(item, "neg").and_then(as_f64).unwrap_or(0.0),
        });
    }
    debug!("规整试题元数据 {} 条", metas.len());
    Ok(metas)
}

/// 规整单道试题
///
/// # 参数
/// - `raw`: 后端原始数据（可能是对象，也可能是只含一项的列表）
/// - `requested_id`: 请求时使用的题目ID，原始数据缺ID时使用
pub fn normalize_question(raw: &JsonValue, requested_id: QuestionId) -> AppResult<QuestionPayload> {
    let item = match unwrap_list(raw) {
        Some(list) => list
            .first()
            .ok_or_else(|| AppError::malformed("试题", format!("题目 {} 返回空列表", requested_id)))?,
        None => raw,
    };
    if !item.is_object() {
        return Err(AppError::malformed("试题", format!("不是对象: {}", preview(item))));
    }

    Ok(QuestionPayload {
        question_id: pick(item, "questionId").and_then(as_i64).unwrap_or(requested_id),
        text: pick(item, "text").and_then(as_string).unwrap_or_default(),
        options: pick(item, "options").map(normalize_options).unwrap_or(JsonValue::Null),
        kind: pick(item, "kind").and_then(as_string).unwrap_or_default(),
        user_answer: pick(item, "userAnswer").and_then(as_string),
    })
}

/// 选项可能是 JSON 字符串，能解析就解析
fn normalize_options(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::String(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

/// 规整一条已保存的作答记录
pub fn normalize_attempt_item(raw: &JsonValue) -> Option<AttemptItem> {
    let question_id = pick(raw, "questionId").and_then(as_i64)?;
    let answer = pick(raw, "userAnswer").and_then(as_string).unwrap_or_default();
    let status = pick(raw, "status")
        .and_then(JsonValue::as_str)
        .and_then(QuestionStatus::parse_loose)
        .unwrap_or(if has_answer(&answer) {
            QuestionStatus::Answered
        } else {
            QuestionStatus::NotAnswered
        });
    Some(AttemptItem {
        question_id,
        answer,
        status,
    })
}

/// 规整开始/恢复作答的返回
pub fn normalize_attempt_start(raw: &JsonValue) -> AppResult<AttemptStart> {
    let attempt_id = pick(raw, "attemptId")
        .and_then(as_string)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::malformed("作答记录", format!("缺少 attemptId: {}", preview(raw))))?;

    let time_left_ms = pick(raw, "timeLeftMs")
        .and_then(as_i64)
        .or_else(|| pick(raw, "timeLeftSeconds").and_then(as_i64).map(|s| s * 1000))
        .map(|ms| ms.max(0) as u64);

    let answers = pick(raw, "answers")
        .and_then(unwrap_list)
        .map(|list| list.iter().filter_map(normalize_attempt_item).collect());

    Ok(AttemptStart {
        attempt_id,
        time_left_ms,
        answers,
    })
}

fn preview(value: &JsonValue) -> String {
    crate::utils::logging::truncate_text(&value.to_string(), 120)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn meta_list_accepts_odata_wrapper_and_pascal_case() {
        let raw = json!({
            "value": [
                { "QuestionId": 11, "SectionId": 2, "Marks": 4, "NegativeMarks": "1" },
                { "questionId": "12", "marks": 2.5 },
                { "Text": "no id" }
            ]
        });

        let metas = normalize_meta_list(&raw).unwrap();
        assert_eq!(metas.len(), 2);
        assert_eq!(metas[0].question_id, 11);
        assert_eq!(metas[0].section_id, Some(2));
        assert_eq!(metas[0].neg, 1.0);
        assert_eq!(metas[1].question_id, 12);
        assert_eq!(metas[1].marks, 2.5);
    }

    #[test]
    fn meta_that_is_not_a_list_is_malformed() {
        let err = normalize_meta_list(&json!({ "foo": 1 })).unwrap_err();
        assert!(err.to_string().contains("试题元数据"));
    }

    #[test]
    fn question_variants_map_to_same_payload() {
        let camel = json!({
            "questionId": 5,
            "questionText": "2 + 2 = ?",
            "options": "[\"3\",\"4\"]",
            "questionType": "single",
        });
        let pascal = json!([{
            "QuestionId": "5",
            "QuestionText": "2 + 2 = ?",
            "OptionsJson": ["3", "4"],
            "QuestionType": "single",
        }]);

        let a = normalize_question(&camel, 5).unwrap();
        let b = normalize_question(&pascal, 5).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.options, json!(["3", "4"]));
        assert_eq!(a.user_answer, None);
    }

    #[test]
    fn question_falls_back_to_requested_id_and_keeps_raw_option_text() {
        let payload = normalize_question(&json!({ "text": "Essay", "options": "free text" }), 9).unwrap();
        assert_eq!(payload.question_id, 9);
        assert_eq!(payload.options, json!("free text"));
    }

    #[test]
    fn attempt_start_reads_seconds_and_saved_answers() {
        let raw = json!({
            "AttemptId": 77,
            "remainingSeconds": 90,
            "Answers": [
                { "QuestionId": 1, "Answer": "B", "Status": "Answered" },
                { "questionId": 2, "answer": "" },
                { "answer": "orphan" }
            ]
        });

        let start = normalize_attempt_start(&raw).unwrap();
        assert_eq!(start.attempt_id, "77");
        assert_eq!(start.time_left_ms, Some(90_000));
        let answers = start.answers.unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].status, QuestionStatus::Answered);
        assert_eq!(answers[1].status, QuestionStatus::NotAnswered);
    }

    #[test]
    fn attempt_start_without_answers_reports_none() {
        let start = normalize_attempt_start(&json!({ "attemptId": "a-1" })).unwrap();
        assert_eq!(start.answers, None);
        assert_eq!(start.time_left_ms, None);
    }

    #[test]
    fn attempt_start_requires_an_id() {
        assert!(normalize_attempt_start(&json!({ "timeLeftMs": 10 })).is_err());
    }
}
