use crate::models::QuestionId;
use serde::{Deserialize, Serialize};

/// 考试脚本：一名考生在一场考试中的操作序列
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamScript {
    pub name: String,
    pub exam_id: i64,
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
    #[serde(skip_serializing, skip_deserializing)]
    pub file_path: Option<String>,
}

impl ExamScript {
    /// 脚本是否包含显式交卷
    pub fn has_submit(&self) -> bool {
        self.steps.iter().any(|s| matches!(s, ScriptStep::Submit))
    }

    pub fn with_file_path(mut self, file_path: String) -> Self {
        self.file_path = Some(file_path);
        self
    }
}

/// 脚本中的一步；省略 `question_id` 时作用于当前题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptStep {
    Answer {
        #[serde(default)]
        question_id: Option<QuestionId>,
        answer: String,
    },
    Clear {
        #[serde(default)]
        question_id: Option<QuestionId>,
    },
    Mark {
        #[serde(default)]
        question_id: Option<QuestionId>,
    },
    Next,
    Previous,
    Jump {
        index: usize,
    },
    Wait {
        ms: u64,
    },
    Submit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_parse_from_toml() {
        let script: ExamScript = toml::from_str(
            r#"
name = "期中模拟"
exam_id = 12

[[steps]]
action = "answer"
answer = "B"

[[steps]]
action = "mark"
question_id = 3

[[steps]]
action = "jump"
index = 4

[[steps]]
action = "submit"
"#,
        )
        .unwrap();

        assert_eq!(script.exam_id, 12);
        assert_eq!(
            script.steps[0],
            ScriptStep::Answer {
                question_id: None,
                answer: "B".to_string()
            }
        );
        assert_eq!(script.steps[1], ScriptStep::Mark { question_id: Some(3) });
        assert_eq!(script.steps[2], ScriptStep::Jump { index: 4 });
        assert!(script.has_submit());
        assert_eq!(script.file_path, None);
    }

    #[test]
    fn unknown_action_is_rejected() {
        let parsed = toml::from_str::<ExamScript>(
            "name = \"x\"\nexam_id = 1\n[[steps]]\naction = \"cheat\"\n",
        );
        assert!(parsed.is_err());
    }
}
