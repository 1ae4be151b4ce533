//! 任务队列驱动
//!
//! 逐个处理待办行：解析脚本与指令、运行解释器、按映射即时写入步骤输出，
//! 最后写回未被映射覆盖的字段并标记完成。任务之间严格串行。

pub mod config;

use anyhow::{Result, Context as AnyhowContext};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, warn};
use crate::actions::{ChatBackend, Publisher};
use crate::actions::wordpress::WordPressPublisher;
use crate::dsl::{StepScript, OutputMapping};
use crate::extract::GeneratedArticle;
use crate::runtime::channel::CallChannel;
use crate::runtime::context::RunContext;
use crate::runtime::engine::{RunReport, StepInterpreter};
use crate::runtime::observer::RunObserver;
use crate::runtime::storage::{Column, Task, TaskStore, STATUS_COMPLETE};

pub use config::DriverConfig;

pub const STATUS_STARTED: &str = "開始: AI生成中";
pub const DRY_RUN_DRAFT_URL: &str = "http://example.com/draft-preview";
/// Cells above this length may be rejected by the sheet.
pub const CELL_LENGTH_WARNING: usize = 49_000;

const CONTENT_COLUMNS: [Column; 4] = [Column::ImagePrompts, Column::Title, Column::Description, Column::Content];

#[derive(Debug)]
pub enum TaskOutcome {
    Skipped { reason: String },
    /// No article body was produced; the row keeps its last progress status.
    NoContent { report: Option<RunReport> },
    Completed { report: Option<RunReport>, draft_url: String },
    Failed { error: String },
}

#[derive(Debug)]
pub struct TaskResult {
    pub row: usize,
    pub outcome: TaskOutcome,
}

/// 运行期间把进度写入状态列、把映射的步骤输出写入目标列
pub struct TaskObserver<'a> {
    store: &'a dyn TaskStore,
    row: usize,
    mappings: &'a OutputMapping,
    written: HashSet<usize>,
}

impl<'a> TaskObserver<'a> {
    pub fn new(store: &'a dyn TaskStore, row: usize, mappings: &'a OutputMapping) -> Self {
        Self {
            store,
            row,
            mappings,
            written: HashSet::new(),
        }
    }

    pub fn into_written_columns(self) -> HashSet<usize> {
        self.written
    }
}

#[async_trait]
impl RunObserver for TaskObserver<'_> {
    async fn on_progress(&mut self, text: &str) {
        info!(row = self.row, "Status Update: {}", text);
        if let Err(e) = self.store.set_status(self.row, text).await {
            error!(row = self.row, "Failed to update sheet status: {}", e);
        }
    }

    async fn on_step_result(&mut self, step_id: &str, text: &str) {
        let Some(target) = self.mappings.get(step_id) else {
            return;
        };
        match self.store.write_cell(self.row, target.col, text).await {
            Ok(()) => {
                info!(row = self.row, step = %step_id, col = target.col, "Routed step output");
                self.written.insert(target.col);
            }
            Err(e) => error!(row = self.row, step = %step_id, col = target.col, "Failed to write mapped output: {}", e),
        }
    }
}

pub struct BatchDriver {
    store: Arc<dyn TaskStore>,
    backend: Arc<dyn ChatBackend>,
    channel: CallChannel,
    config: DriverConfig,
    publishers: HashMap<String, Arc<dyn Publisher>>,
    script_cache: HashMap<String, StepScript>,
}

impl BatchDriver {
    pub fn new(store: Arc<dyn TaskStore>, backend: Arc<dyn ChatBackend>, channel: CallChannel, config: DriverConfig) -> Self {
        let publishers = config
            .sites
            .iter()
            .map(|(name, site)| (name.clone(), Arc::new(WordPressPublisher::new(site)) as Arc<dyn Publisher>))
            .collect();
        Self {
            store,
            backend,
            channel,
            config,
            publishers,
            script_cache: HashMap::new(),
        }
    }

    pub fn register_publisher(&mut self, site_name: &str, publisher: Arc<dyn Publisher>) {
        self.publishers.insert(site_name.to_string(), publisher);
    }

    pub async fn run_batch(&mut self) -> Result<Vec<TaskResult>> {
        info!("Fetching pending tasks...");
        let tasks = self.store.list_pending().await.context("Failed to list pending tasks")?;
        info!("Found {} pending tasks.", tasks.len());

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            let outcome = match self.process_task(&task).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(row = task.row_index, error = ?e, "Task failed");
                    TaskOutcome::Failed { error: format!("{:#}", e) }
                }
            };
            results.push(TaskResult { row: task.row_index, outcome });
        }

        info!("All tasks processed.");
        Ok(results)
    }

    async fn resolve_script(&mut self, article_type: &str) -> Result<Option<StepScript>> {
        if let Some(script) = self.script_cache.get(article_type) {
            return Ok(Some(script.clone()));
        }

        let script = match self.config.manual_scripts.get(article_type) {
            Some(raw) => {
                info!("Loading '{}' prompts from Local Config...", article_type);
                Some(StepScript::from_value(raw).with_context(|| format!("Invalid local script '{}'", article_type))?)
            }
            None => {
                info!("Loading prompts for type '{}' from Sheet...", article_type);
                self.store
                    .get_script(article_type)
                    .await
                    .with_context(|| format!("Invalid script tab '{}'", article_type))?
            }
        };

        if let Some(s) = &script {
            self.script_cache.insert(article_type.to_string(), s.clone());
        }
        Ok(script)
    }

    pub async fn process_task(&mut self, task: &Task) -> Result<TaskOutcome> {
        let row = task.row_index;
        if task.main_keyword.is_empty() {
            info!("Skipping row {}: No MainKW.", row);
            return Ok(TaskOutcome::Skipped { reason: "no main keyword".to_string() });
        }

        let article_type = task.article_type_or_default().to_string();
        info!(
            "Processing Row {}: {} (Site: {}, Type: {})",
            row, task.main_keyword, task.site_name, article_type
        );

        let Some(script) = self.resolve_script(&article_type).await? else {
            error!("Error: Prompt tab '{}' not found or empty. Skipping.", article_type);
            return Ok(TaskOutcome::Skipped { reason: format!("no script for '{}'", article_type) });
        };

        let instructions = self.config.resolve_instructions(self.store.as_ref(), &task.site_name).await?;
        let ctx = RunContext::new(
            &task.main_keyword,
            &task.sub_keyword_1,
            &task.sub_keyword_2,
            &task.goal,
            &task.slug,
            instructions,
        );

        let (article, report, written) = if self.config.dry_run {
            info!("[DRY RUN] Would generate article via Gemini...");
            tokio::time::sleep(self.config.dry_run_delay).await;
            (dry_run_article(&task.main_keyword), None, HashSet::new())
        } else {
            let mut observer = TaskObserver::new(self.store.as_ref(), row, &script.mappings);
            observer.on_progress(STATUS_STARTED).await;

            let mut session = self.backend.start_chat(&ctx.instructions);
            let mut interpreter = StepInterpreter::new(&self.channel);
            let report = interpreter.run(&script, &ctx, session.as_mut(), &mut observer).await;
            info!(row, run_id = %report.run_id, calls = report.calls, state = ?report.state, "Generation finished");
            (report.article.clone(), Some(report), observer.into_written_columns())
        };

        if !article.has_content() && !written.contains(&Column::Content.ordinal()) {
            error!(row, "Error: Failed to generate content.");
            return Ok(TaskOutcome::NoContent { report });
        }

        let draft_url = self.publish(task, &article).await;

        if self.config.dry_run {
            info!(
                "[DRY RUN] Would update sheet row {} -> Status: {}, URL: {}, Content Length: {}",
                row,
                STATUS_COMPLETE,
                draft_url,
                article.content.chars().count()
            );
        } else {
            self.write_completion(row, &draft_url, &article, &written).await;
            info!("Updated Sheet Row {}.", row);
        }

        Ok(TaskOutcome::Completed { report, draft_url })
    }

    async fn publish(&self, task: &Task, article: &GeneratedArticle) -> String {
        let Some(publisher) = self.publishers.get(&task.site_name).filter(|_| !task.site_name.is_empty()) else {
            warn!("Site '{}' not configured or empty. Skipping WP upload.", task.site_name);
            return String::new();
        };

        if self.config.dry_run {
            info!("[DRY RUN] Would post to {} with slug {}", task.site_name, task.slug);
            return DRY_RUN_DRAFT_URL.to_string();
        }

        match publisher.post_draft(&article.title, &article.content, &task.slug).await {
            Some(link) => link,
            None => {
                warn!("WP Upload failed (continuing to sheet save)");
                String::new()
            }
        }
    }

    /// Writes the completion status and outputs; content columns already written by a
    /// mapped step are left alone. Each write is independent.
    async fn write_completion(&self, row: usize, draft_url: &str, article: &GeneratedArticle, written: &HashSet<usize>) {
        let mut cells = vec![(Column::Status, STATUS_COMPLETE), (Column::DraftUrl, draft_url)];
        for column in CONTENT_COLUMNS {
            if written.contains(&column.ordinal()) {
                info!(row, col = column.ordinal(), "Keeping mapped output for {}", column.header());
                continue;
            }
            cells.push((column, content_for(column, article)));
        }

        for (column, value) in cells {
            if column == Column::Content && value.chars().count() > CELL_LENGTH_WARNING {
                warn!(row, "Content length {} may exceed cell limit.", value.chars().count());
            }
            if let Err(e) = self.store.write_cell(row, column.ordinal(), value).await {
                error!(row, col = column.ordinal(), "Error updating {}: {}", column.header(), e);
            }
        }
    }
}

fn content_for(column: Column, article: &GeneratedArticle) -> &str {
    match column {
        Column::ImagePrompts => &article.image_prompts,
        Column::Title => &article.title,
        Column::Description => &article.description,
        Column::Content => &article.content,
        _ => "",
    }
}

/// 干跑时使用的固定输出
pub fn dry_run_article(main_keyword: &str) -> GeneratedArticle {
    GeneratedArticle {
        title: format!("Test Title for {}", main_keyword),
        description: "Test Description".to_string(),
        content: "Test <img src='test.jpg'> Content".to_string(),
        image_prompts: "Test Prompts".to_string(),
    }
}
