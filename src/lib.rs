//! # Exam Session
//!
//! 在线考试作答会话控制器：单题状态机、防抖批量回写、本地影子存储与倒计时自动交卷。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 数据层（Models）
//! - `models/` - 题目、作答记录、状态枚举、考试脚本
//! - `normalize` - 把后端各种字段命名归一为内部结构
//!
//! ### ② 基础设施层（Clients / Infrastructure）
//! - `clients/` - `ExamBackend` 能力接口与 HTTP 实现 `ExamClient`
//! - `infrastructure/` - `ShadowStore` 本地影子存储（文件 / 内存）
//!
//! ### ③ 引擎层（Engine）
//! - `engine/status` - 状态转换纯函数与统计
//! - `engine/sync_queue` - 待同步表 + 防抖定时器
//! - `engine/controller` - `ExamController`，对外暴露全部作答操作
//! - `engine/countdown` - 倒计时，时间到自动交卷
//! - `engine/palette` - 答题卡视图模型
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_runner` - 批量执行考试脚本，管理资源和并发
//! - `orchestrator/session_runner` - 单场会话，按脚本驱动控制器
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod engine;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod utils;

// 重新导出常用类型
pub use clients::{ExamBackend, ExamClient};
pub use config::Config;
pub use engine::{CountdownEnd, ExamController, ExamState, Position, SubmitOutcome};
pub use error::{AppError, AppResult};
pub use infrastructure::{FileShadowStore, MemoryShadowStore, ShadowStore};
pub use models::{Attempt, ExamScript, QuestionId, QuestionStatus, StatusCounts};
pub use orchestrator::{run_session, App, SessionReport};
