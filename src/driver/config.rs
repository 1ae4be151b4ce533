use anyhow::{Result, Context as AnyhowContext};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use crate::actions::wordpress::SiteConfig;
use crate::compiler::loader::read_optional_text;
use crate::dsl::ScriptLibrary;
use crate::runtime::storage::TaskStore;

pub const BASE_RULES_FILE: &str = "common_rules.md";

/// 站点名 -> 站点专用片段文件 (位于 instructions 目录下)
pub const SITE_FRAGMENTS: [(&str, &str); 1] = [("麻布十番", "parts_azabu.md")];

/// 批处理配置
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Local script overrides keyed by article type
    pub manual_scripts: ScriptLibrary,
    /// Manual shared-rules override; suppresses the base file and the remote rules tab
    pub manual_rules: Option<String>,
    pub instructions_dir: PathBuf,
    pub sites: HashMap<String, SiteConfig>,
    pub dry_run: bool,
    pub dry_run_delay: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            manual_scripts: ScriptLibrary::new(),
            manual_rules: None,
            instructions_dir: PathBuf::from("instructions"),
            sites: HashMap::new(),
            dry_run: false,
            dry_run_delay: Duration::from_secs(1),
        }
    }
}

impl DriverConfig {
    pub fn site_fragment_path(&self, site_name: &str) -> Option<PathBuf> {
        SITE_FRAGMENTS
            .iter()
            .find(|(name, _)| *name == site_name)
            .map(|(_, file)| self.instructions_dir.join(file))
    }

    /// Builds the system instruction text for one task.
    ///
    /// Order: manual rules OR (base rules file, then the remote shared rules), then the
    /// site fragment. A manual override suppresses the remote rules entirely.
    pub async fn resolve_instructions(&self, store: &dyn TaskStore, site_name: &str) -> Result<String> {
        let mut text = String::new();

        match self.manual_rules.as_deref().filter(|r| !r.is_empty()) {
            Some(manual) => {
                text.push_str(manual);
                text.push_str("\n\n");
            }
            None => {
                if let Some(base) = read_optional_text(&self.instructions_dir.join(BASE_RULES_FILE))? {
                    text.push_str(&base);
                    text.push_str("\n\n");
                }

                let shared = match store.get_shared_rules().await {
                    Ok(rules) => rules,
                    Err(e) => {
                        warn!("Could not read shared rules tab, continuing without it: {:#}", e);
                        String::new()
                    }
                };
                if !shared.is_empty() {
                    info!("Loaded additional rules from shared rules tab.");
                    text.push_str("\n\n");
                    text.push_str(&shared);
                    text.push_str("\n\n");
                }
            }
        }

        if let Some(path) = self.site_fragment_path(site_name) {
            if let Some(fragment) = read_optional_text(&path)? {
                info!("Loading parts list from {}...", path.display());
                text.push_str(&fragment);
            }
        }

        Ok(text)
    }
}

/// 加载 sites.json；文件不存在时返回空表
pub fn load_sites_config(path: &Path) -> Result<HashMap<String, SiteConfig>> {
    if !path.exists() {
        warn!("No {} found. WordPress submission will be skipped.", path.display());
        return Ok(HashMap::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let sites: HashMap<String, SiteConfig> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    if sites.is_empty() {
        warn!("{} is empty. WordPress submission will be skipped.", path.display());
    }
    Ok(sites)
}
