use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    /// e.g. "STEP 2 - Draft"; none for the initial exchange
    pub label: Option<String>,
    pub text: String,
}

/// 一次运行的对话记录 (只追加)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_exchange(&mut self, label: Option<String>, prompt: &str, response: &str) {
        self.turns.push(Turn {
            role: Role::User,
            label,
            text: prompt.to_string(),
        });
        self.turns.push(Turn {
            role: Role::Model,
            label: None,
            text: response.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Renders the log the extractor scans.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            match (turn.role, &turn.label) {
                (Role::User, Some(label)) => out.push_str(&format!("\n\n--- User ({}) ---\n", label)),
                (Role::User, None) => out.push_str("\n\n--- User ---\n"),
                (Role::Model, _) => out.push_str("\n\n--- Gemini ---\n"),
            }
            out.push_str(&turn.text);
        }
        out
    }
}
