#![allow(dead_code)]

use async_trait::async_trait;
use autowriter::actions::{ChatBackend, ChatSession, Publisher};
use autowriter::error::ModelError;
use autowriter::runtime::channel::Sleeper;
use autowriter::runtime::observer::RunObserver;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared call log and canned replies; replies run out into "reply #n".
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub replies: Arc<Mutex<VecDeque<Result<String, ModelError>>>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, text: &str) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(&self, err: ModelError) -> &Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[derive(Debug)]
pub struct ScriptedSession {
    pub script: Script,
}

#[async_trait]
impl ChatSession for ScriptedSession {
    async fn send_message(&mut self, content: &str) -> Result<String, ModelError> {
        let n = {
            let mut prompts = self.script.prompts.lock().unwrap();
            prompts.push(content.to_string());
            prompts.len()
        };
        self.script
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("reply #{}", n)))
    }
}

pub struct ScriptedBackend {
    pub script: Script,
    pub instructions: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBackend {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            instructions: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ChatBackend for ScriptedBackend {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn start_chat(&self, system_instruction: &str) -> Box<dyn ChatSession> {
        self.instructions.lock().unwrap().push(system_instruction.to_string());
        Box::new(ScriptedSession { script: self.script.clone() })
    }
}

#[derive(Debug, Default)]
pub struct CountingSleeper {
    pub sleeps: Mutex<Vec<Duration>>,
}

impl CountingSleeper {
    pub fn count(&self) -> usize {
        self.sleeps.lock().unwrap().len()
    }
}

#[async_trait]
impl Sleeper for CountingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub progress: Vec<String>,
    pub results: Vec<(String, String)>,
}

#[async_trait]
impl RunObserver for RecordingObserver {
    async fn on_progress(&mut self, text: &str) {
        self.progress.push(text.to_string());
    }

    async fn on_step_result(&mut self, step_id: &str, text: &str) {
        self.results.push((step_id.to_string(), text.to_string()));
    }
}

#[derive(Debug, Default)]
pub struct FakePublisher {
    pub posts: Mutex<Vec<(String, String, String)>>,
    pub link: Option<String>,
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn post_draft(&self, title: &str, content: &str, slug: &str) -> Option<String> {
        self.posts
            .lock()
            .unwrap()
            .push((title.to_string(), content.to_string(), slug.to_string()));
        self.link.clone()
    }
}
