use anyhow::{Result, Context as AnyhowContext};
use std::fs;
use std::path::Path;
use crate::dsl::ScriptLibrary;

/// 从 JSON 或 YAML 文件加载脚本库 (文章类型 -> 步骤脚本)
pub fn load_script_library(file_path: &Path) -> Result<ScriptLibrary> {
    let content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read script library from {}", file_path.display()))?;

    let is_yaml = file_path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "yaml" || e == "yml");

    let library: ScriptLibrary = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to deserialize YAML content from {}", file_path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to deserialize JSON content from {}", file_path.display()))?
    };

    Ok(library)
}

/// Loads the script library if the file exists; an absent file is an empty library.
pub fn load_script_library_if_present(file_path: &Path) -> Result<ScriptLibrary> {
    if !file_path.exists() {
        return Ok(ScriptLibrary::new());
    }
    load_script_library(file_path)
}

/// 读取可选的文本文件 (规则 / 站点片段)
pub fn read_optional_text(file_path: &Path) -> Result<Option<String>> {
    if !file_path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read {}", file_path.display()))?;
    Ok(Some(text))
}
