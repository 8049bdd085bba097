//! 作答引擎（Engine Layer）
//!
//! - `status` - 单题状态机与状态统计（纯函数）
//! - `state` - 考试会话状态
//! - `sync_queue` - 答案回写队列（待同步表 + 防抖定时器）
//! - `controller` - 作答控制器，对外暴露全部操作
//! - `countdown` - 倒计时与自动交卷
//! - `palette` - 答题卡视图模型

pub mod controller;
pub mod countdown;
pub mod palette;
pub mod state;
pub mod status;
pub mod sync_queue;

pub use controller::{ExamController, SubmitOutcome};
pub use countdown::{run_countdown, spawn_countdown, CountdownEnd};
pub use palette::{format_countdown, palette_cells, render_text, PaletteCell, PalettePosition, TemplatePreset};
pub use state::{ExamState, Position};
pub use status::{apply_action, derive_counts, AttemptAction};
pub use sync_queue::WriteBehindQueue;
