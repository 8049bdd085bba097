//! 批量会话执行器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量考试脚本的执行和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：写日志文件头、创建后端客户端与影子存储
//! 2. **批量加载**：扫描并加载所有考试脚本（`Vec<ExamScript>`）
//! 3. **并发控制**：使用 Semaphore 限制同时运行的会话数
//! 4. **全局统计**：汇总所有会话的交卷结果
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有后端客户端和影子存储的模块
//! - **向下委托**：单场会话交给 `session_runner`

use crate::clients::{ExamBackend, ExamClient};
use crate::config::Config;
use crate::infrastructure::{FileShadowStore, ShadowStore};
use crate::models::ExamScript;
use crate::orchestrator::session_runner;
use crate::utils::logging;
use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    backend: Arc<dyn ExamBackend>,
    shadow: Arc<dyn ShadowStore>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        logging::init_log_file(&config.output_log_file)?;

        logging::log_startup(config.max_concurrent_sessions, &config.api_base_url);

        let backend: Arc<dyn ExamBackend> = Arc::new(ExamClient::new(&config)?);
        let shadow: Arc<dyn ShadowStore> = Arc::new(FileShadowStore::new(&config.shadow_dir));

        Ok(Self::with_parts(config, backend, shadow))
    }

    /// 使用给定的后端和影子存储创建应用
    pub fn with_parts(config: Config, backend: Arc<dyn ExamBackend>, shadow: Arc<dyn ShadowStore>) -> Self {
        Self {
            config,
            backend,
            shadow,
        }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunStats> {
        let scripts = self.load_scripts().await?;

        if scripts.is_empty() {
            warn!("⚠️ 没有找到考试脚本，程序结束");
            return Ok(RunStats::default());
        }

        logging::log_scripts_loaded(scripts.len(), self.config.max_concurrent_sessions);

        let stats = self.run_all(scripts).await;

        logging::print_final_stats(
            stats.success,
            stats.failed,
            stats.total,
            &self.config.output_log_file,
        );

        Ok(stats)
    }

    /// 加载脚本
    async fn load_scripts(&self) -> Result<Vec<ExamScript>> {
        info!("\n📁 正在扫描考试脚本...");
        crate::models::load_all_toml_files(&self.config.script_folder).await
    }

    /// 并发执行所有会话
    pub async fn run_all(&self, scripts: Vec<ExamScript>) -> RunStats {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_sessions.max(1)));
        let total = scripts.len();

        let handles = scripts.into_iter().enumerate().map(|(idx, script)| {
            let session_index = idx + 1;
            let semaphore = semaphore.clone();
            let backend = self.backend.clone();
            let shadow = self.shadow.clone();
            let config = self.config.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await?;
                session_runner::run_session(backend, shadow, script, session_index, &config).await
            });
            async move { (session_index, handle.await) }
        });

        let mut stats = RunStats {
            total,
            ..Default::default()
        };
        for (session_index, joined) in join_all(handles).await {
            match joined {
                Ok(Ok(report)) if report.submitted => stats.success += 1,
                Ok(Ok(_)) => stats.failed += 1,
                Ok(Err(e)) => {
                    error!("[会话 {}] ❌ 执行过程中发生错误: {:#}", session_index, e);
                    stats.failed += 1;
                }
                Err(e) => {
                    error!("[会话 {}] 任务执行失败: {}", session_index, e);
                    stats.failed += 1;
                }
            }
        }
        stats
    }
}

/// 执行统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}
