pub mod builder;

use indexmap::IndexMap;
use serde::{Serialize, Deserialize};
use serde_json::Value;
use tracing::{debug, warn};
use crate::error::ScriptError;

pub const INITIAL_KEY: &str = "Initial";
pub const MAPPINGS_KEY: &str = "mappings";
pub const STEP_PREFIX: &str = "STEP";

/// 旧格式中分隔 exec / check 的标记
pub const LEGACY_CHECK_MARKER: &str = "**【自己チェック】**";
pub const LEGACY_EXEC_LABEL: &str = "**【実行内容】**";

/// 单个步骤定义 (加载时统一为 exec + check 两个字段)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepDefinition {
    pub exec: String,
    #[serde(default)]
    pub check: String,
}

impl StepDefinition {
    pub fn new(exec: impl Into<String>, check: impl Into<String>) -> Self {
        Self {
            exec: exec.into(),
            check: check.into(),
        }
    }

    /// Splits a legacy single-blob definition on the self-check marker.
    pub fn from_legacy(blob: &str) -> Self {
        match blob.split_once(LEGACY_CHECK_MARKER) {
            Some((exec, rest)) => {
                // A second marker belongs to neither half, matching a plain split.
                let check = rest.split(LEGACY_CHECK_MARKER).next().unwrap_or("");
                Self {
                    exec: exec.replace(LEGACY_EXEC_LABEL, "").trim().to_string(),
                    check: check.trim().to_string(),
                }
            }
            None => Self {
                exec: blob.to_string(),
                check: String::new(),
            },
        }
    }

    /// A blank check means the step has no refine phase.
    pub fn has_check(&self) -> bool {
        !self.check.trim().is_empty()
    }
}

/// 输出路由目标
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnTarget {
    pub col: usize,
}

/// 步骤 ID -> 目标列
pub type OutputMapping = IndexMap<String, ColumnTarget>;

/// 已加载的步骤脚本
#[derive(Debug, Clone, PartialEq)]
pub struct StepScript {
    pub initial: String,
    /// 按编写顺序排列的步骤 (执行顺序)
    pub steps: Vec<(String, StepDefinition)>,
    pub mappings: OutputMapping,
}

/// 文章类型 -> 原始脚本定义
pub type ScriptLibrary = IndexMap<String, Value>;

impl StepScript {
    /// Parses the persisted form: an ordered JSON/YAML mapping of step keys.
    pub fn from_value(value: &Value) -> Result<Self, ScriptError> {
        let obj = value.as_object().ok_or(ScriptError::NotAMapping)?;

        let initial = obj
            .get(INITIAL_KEY)
            .map(coerce_text)
            .filter(|s| !s.is_empty())
            .ok_or(ScriptError::MissingInitial)?;

        let mut steps = Vec::new();
        let mut mappings = OutputMapping::new();

        for (key, raw) in obj {
            if key == INITIAL_KEY {
                continue;
            }
            if key == MAPPINGS_KEY {
                mappings = parse_mappings(raw)?;
                continue;
            }
            if !key.starts_with(STEP_PREFIX) {
                debug!(key = %key, "Ignoring non-step key in script");
                continue;
            }
            steps.push((key.clone(), parse_step(key, raw)));
        }

        Ok(Self { initial, steps, mappings })
    }

    /// Builds a script from the Key/Value pairs of a remote tab.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, ScriptError> {
        let mut obj = serde_json::Map::new();
        for (k, v) in pairs {
            if k.is_empty() {
                continue;
            }
            // The mappings row holds JSON; everything else is plain text.
            let value = if k == MAPPINGS_KEY {
                serde_json::from_str(v).map_err(|e| ScriptError::InvalidMapping {
                    step: MAPPINGS_KEY.to_string(),
                    reason: e.to_string(),
                })?
            } else {
                Value::String(v.clone())
            };
            obj.insert(k.clone(), value);
        }
        Self::from_value(&Value::Object(obj))
    }

    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|(k, _)| k == id).map(|(_, d)| d)
    }
}

fn parse_step(key: &str, raw: &Value) -> StepDefinition {
    match raw {
        Value::Object(fields) => {
            let exec = fields.get("exec").map(coerce_text).unwrap_or_default();
            let check = fields.get("check").map(coerce_text).unwrap_or_default();
            if fields.get("exec").is_some_and(|v| !v.is_string()) {
                warn!(step = %key, "exec is not text, using its textual form");
            }
            if fields.get("check").is_some_and(|v| !v.is_string() && !v.is_null()) {
                warn!(step = %key, "check is not text, using its textual form");
            }
            StepDefinition { exec, check }
        }
        Value::String(blob) => StepDefinition::from_legacy(blob),
        other => {
            warn!(step = %key, "Step definition is not text, using its textual form");
            StepDefinition::from_legacy(&other.to_string())
        }
    }
}

fn parse_mappings(raw: &Value) -> Result<OutputMapping, ScriptError> {
    let obj = match raw {
        Value::Object(o) => o,
        Value::Null => return Ok(OutputMapping::new()),
        _ => {
            return Err(ScriptError::InvalidMapping {
                step: MAPPINGS_KEY.to_string(),
                reason: "expected a mapping".to_string(),
            });
        }
    };

    let mut out = OutputMapping::new();
    for (step, target) in obj {
        let col = target
            .get("col")
            .and_then(|c| c.as_u64().or_else(|| c.as_str().and_then(|s| s.trim().parse().ok())))
            .ok_or_else(|| ScriptError::InvalidMapping {
                step: step.clone(),
                reason: "missing numeric 'col'".to_string(),
            })?;
        if col == 0 {
            return Err(ScriptError::InvalidMapping {
                step: step.clone(),
                reason: "column ordinals start at 1".to_string(),
            });
        }
        out.insert(step.clone(), ColumnTarget { col: col as usize });
    }
    Ok(out)
}

/// 非文本值转为文本表示
fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_steps_keep_authored_order() {
        let script = StepScript::from_value(&json!({
            "Initial": "plan {main_kw}",
            "STEP 2": {"exec": "b"},
            "STEP 1.5": {"exec": "a"},
            "STEP 1": {"exec": "c"},
        }))
        .unwrap();
        let ids: Vec<_> = script.steps.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(ids, vec!["STEP 2", "STEP 1.5", "STEP 1"]);
    }

    #[test]
    fn test_legacy_blob_is_split() {
        let def = StepDefinition::from_legacy("**【実行内容】**\nwrite it\n**【自己チェック】**\ncheck it");
        assert_eq!(def.exec, "write it");
        assert_eq!(def.check, "check it");

        let plain = StepDefinition::from_legacy("just do it");
        assert_eq!(plain.exec, "just do it");
        assert!(!plain.has_check());
        assert!(!StepDefinition::new("x", " \n\t").has_check());
    }

    #[test]
    fn test_missing_initial_is_rejected() {
        let err = StepScript::from_value(&json!({"STEP 1": "x"})).unwrap_err();
        assert_eq!(err, ScriptError::MissingInitial);
    }

    #[test]
    fn test_mappings_are_not_steps() {
        let script = StepScript::from_value(&json!({
            "Initial": "go",
            "STEP 1": "x",
            "mappings": {"STEP 1": {"col": 12}, "STEP 1 (Draft)": {"col": "9"}},
            "notes": "ignored",
        }))
        .unwrap();
        assert_eq!(script.steps.len(), 1);
        assert_eq!(script.mappings.get("STEP 1"), Some(&ColumnTarget { col: 12 }));
        assert_eq!(script.mappings.get("STEP 1 (Draft)"), Some(&ColumnTarget { col: 9 }));
    }

    #[test]
    fn test_non_text_exec_is_coerced() {
        let script = StepScript::from_value(&json!({
            "Initial": "go",
            "STEP 1": {"exec": {"nested": true}, "check": 3},
        }))
        .unwrap();
        let def = script.step("STEP 1").unwrap();
        assert_eq!(def.exec, r#"{"nested":true}"#);
        assert_eq!(def.check, "3");
    }

    #[test]
    fn test_from_pairs_parses_mappings_row() {
        let pairs = vec![
            ("Initial".to_string(), "go".to_string()),
            ("STEP 1".to_string(), "do".to_string()),
            ("mappings".to_string(), r#"{"STEP 1": {"col": 10}}"#.to_string()),
        ];
        let script = StepScript::from_pairs(&pairs).unwrap();
        assert_eq!(script.mappings.get("STEP 1").map(|t| t.col), Some(10));
    }
}
