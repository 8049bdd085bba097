//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `batch_runner` - 批量会话执行器
//! - 管理应用生命周期（初始化、运行）
//! - 批量加载考试脚本（Vec<ExamScript>）
//! - 控制并发数量（Semaphore）
//! - 输出全局统计信息
//!
//! ### `session_runner` - 单场会话执行器
//! - 挂载控制器、启动倒计时
//! - 依次执行脚本步骤
//! - 交卷并输出单场统计
//!
//! ## 层次关系
//!
//! ```text
//! batch_runner (处理 Vec<ExamScript>)
//!     ↓
//! session_runner (处理单个 ExamScript)
//!     ↓
//! engine::ExamController (单场考试的状态与同步)
//!     ↓
//! clients / infrastructure (后端 API、影子存储)
//! ```

pub mod batch_runner;
pub mod session_runner;

pub use batch_runner::{App, RunStats};
pub use session_runner::{run_session, SessionReport};
