use crate::models::script::ExamScript;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载考试脚本
pub async fn load_toml_to_exam_script(toml_file_path: &Path) -> Result<ExamScript> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let script: ExamScript = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    Ok(script.with_file_path(toml_file_path.to_string_lossy().to_string()))
}

/// 从文件夹中加载所有考试脚本，按文件名排序
///
/// 解析失败的文件只记录警告，不影响其他脚本
pub async fn load_all_toml_files(folder_path: &str) -> Result<Vec<ExamScript>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut toml_files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml_files.push(path);
        }
    }
    toml_files.sort();

    let mut scripts = Vec::new();
    for path in toml_files {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_toml_to_exam_script(&path).await {
            Ok(script) => {
                tracing::info!("成功加载 {} 个步骤 (考试 {})", script.steps.len(), script.exam_id);
                scripts.push(script);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(scripts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_valid_scripts_and_skips_broken_ones() {
        let dir = std::env::temp_dir().join(format!("exam-scripts-test-{}", std::process::id()));
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("a.toml"), "name = \"A\"\nexam_id = 1\n[[steps]]\naction = \"next\"\n")
            .await
            .unwrap();
        fs::write(dir.join("b.toml"), "name = ").await.unwrap();
        fs::write(dir.join("notes.txt"), "ignored").await.unwrap();

        let scripts = load_all_toml_files(dir.to_str().unwrap()).await.unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].name, "A");
        assert!(scripts[0].file_path.as_deref().unwrap().ends_with("a.toml"));

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn missing_folder_is_an_error() {
        assert!(load_all_toml_files("/definitely/not/here").await.is_err());
    }
}
