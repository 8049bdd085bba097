pub mod loaders;
pub mod normalize;
pub mod question;
pub mod script;

pub use loaders::{load_all_toml_files, load_toml_to_exam_script};
pub use question::{
    has_answer, Attempt, AttemptItem, AttemptStart, QuestionId, QuestionMeta, QuestionPayload,
    QuestionStatus, SaveBatch, StatusCounts,
};
pub use script::{ExamScript, ScriptStep};
