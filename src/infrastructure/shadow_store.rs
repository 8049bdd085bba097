//! 影子存储 - 基础设施层
//!
//! 相当于浏览器的 localStorage：按 key 保存一段字符串。
//! 作答控制器把整份作答记录镜像到这里，用于崩溃/重启后的恢复。
//! 没有跨进程锁，同一考试的多个会话会互相覆盖（后写者胜）。

use crate::error::{AppResult, StorageError};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// 影子数据 key
pub fn shadow_key(exam_id: i64) -> String {
    format!("evalus-examnew-shadow-{}", exam_id)
}

/// 键值字符串存储
pub trait ShadowStore: Send + Sync {
    /// 读取，不存在时返回 `None`
    fn read(&self, key: &str) -> AppResult<Option<String>>;

    /// 覆盖写入
    fn write(&self, key: &str, value: &str) -> AppResult<()>;
}

/// 后台写入任务的指令
enum WriteJob {
    Write { path: PathBuf, value: String },
    /// 之前的写入全部落盘后回复
    Barrier(oneshot::Sender<()>),
}

/// 基于文件的影子存储，每个 key 对应目录下的一个 json 文件
///
/// 写入只更新内存中的最新值，由后台任务按顺序用 `tokio::fs` 落盘，
/// 调用方（同步的作答操作）不会阻塞在文件 IO 上。
pub struct FileShadowStore {
    dir: PathBuf,
    latest: Mutex<HashMap<String, String>>,
    jobs: mpsc::UnboundedSender<WriteJob>,
}

impl FileShadowStore {
    /// 创建存储并启动后台写入任务
    ///
    /// 必须在 tokio 运行时内调用
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let (jobs, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(dir.clone(), rx));
        Self {
            dir,
            latest: Mutex::new(HashMap::new()),
            jobs,
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// 等待此前提交的写入全部落盘
    pub async fn settled(&self) {
        let (done, wait) = oneshot::channel();
        if self.jobs.send(WriteJob::Barrier(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

async fn run_writer(dir: PathBuf, mut jobs: mpsc::UnboundedReceiver<WriteJob>) {
    while let Some(job) = jobs.recv().await {
        match job {
            WriteJob::Write { path, value } => {
                if let Err(e) = write_atomically(&dir, &path, &value).await {
                    warn!("⚠️ {}", e);
                }
            }
            WriteJob::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
}

/// 先写临时文件再改名，避免半截文件
async fn write_atomically(dir: &Path, path: &Path, value: &str) -> AppResult<()> {
    let write_failed = |source| StorageError::WriteFailed {
        path: path.display().to_string(),
        source,
    };
    fs::create_dir_all(dir).await.map_err(write_failed)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, value).await.map_err(write_failed)?;
    fs::rename(&tmp, path).await.map_err(write_failed)?;
    debug!("影子数据已写入: {}", path.display());
    Ok(())
}

impl ShadowStore for FileShadowStore {
    /// 只在恢复作答时读取一次；本进程写过的 key 直接取内存中的最新值
    fn read(&self, key: &str) -> AppResult<Option<String>> {
        if let Some(value) = self.latest.lock().ok().and_then(|l| l.get(key).cloned()) {
            return Ok(Some(value));
        }
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::ReadFailed {
                path: path.display().to_string(),
                source,
            }
            .into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> AppResult<()> {
        if let Ok(mut latest) = self.latest.lock() {
            latest.insert(key.to_string(), value.to_string());
        }
        let path = self.path_for(key);
        self.jobs
            .send(WriteJob::Write {
                path: path.clone(),
                value: value.to_string(),
            })
            .map_err(|_| StorageError::WriterClosed {
                path: path.display().to_string(),
            })?;
        Ok(())
    }
}

/// 内存影子存储
#[derive(Default)]
pub struct MemoryShadowStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryShadowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一条数据
    pub fn with_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.into(), value.into());
        }
        self
    }

    /// 当前保存的值
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }
}

impl ShadowStore for MemoryShadowStore {
    fn read(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.get(key))
    }

    fn write(&self, key: &str, value: &str) -> AppResult<()> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_follows_browser_naming() {
        assert_eq!(shadow_key(42), "evalus-examnew-shadow-42");
    }

    #[tokio::test]
    async fn file_store_writes_in_background_and_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("exam-shadow-test-{}", std::process::id()));
        let store = FileShadowStore::new(&dir);

        assert_eq!(store.read("missing").unwrap(), None);

        store.write("k", r#"{"1":{"answer":"A","status":"answered"}}"#).unwrap();
        store.write("k", r#"{}"#).unwrap();
        // 落盘前也能读到最新值
        assert_eq!(store.read("k").unwrap().as_deref(), Some("{}"));

        store.settled().await;
        let on_disk = fs::read_to_string(dir.join("k.json")).await.unwrap();
        assert_eq!(on_disk, "{}");

        let reopened = FileShadowStore::new(&dir);
        assert_eq!(reopened.read("k").unwrap().as_deref(), Some("{}"));

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[test]
    fn memory_store_overwrites() {
        let store = MemoryShadowStore::new().with_entry("k", "old");
        store.write("k", "new").unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some("new"));
    }
}
