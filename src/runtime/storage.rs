use async_trait::async_trait;
use anyhow::Result;
use dashmap::DashMap;
use indexmap::IndexMap;
use std::sync::Mutex;
use crate::dsl::StepScript;
use crate::error::StoreError;

// --- Schema ---

/// 任务表的列 (1 起始)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Status = 1,
    MainKw = 2,
    SubKw1 = 3,
    SubKw2 = 4,
    Goal = 5,
    SiteName = 6,
    Slug = 7,
    DraftUrl = 8,
    ImagePrompts = 9,
    Title = 10,
    Description = 11,
    Content = 12,
}

impl Column {
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn header(self) -> &'static str {
        match self {
            Column::Status => "Status",
            Column::MainKw => "MainKW",
            Column::SubKw1 => "SubKW1",
            Column::SubKw2 => "SubKW2",
            Column::Goal => "Goal",
            Column::SiteName => "SiteName",
            Column::Slug => "Slug",
            Column::DraftUrl => "DraftURL",
            Column::ImagePrompts => "ImagePrompts",
            Column::Title => "Title",
            Column::Description => "Description",
            Column::Content => "Content",
        }
    }
}

pub const ARTICLE_TYPE_HEADER: &str = "ArticleType";
pub const DEFAULT_ARTICLE_TYPE: &str = "Default";
pub const SHARED_RULES_TAB: &str = "共通ルール";
pub const STATUS_COMPLETE: &str = "完了";
pub const PENDING_STATUSES: [&str; 5] = ["", "未着手", ",", "待機中", "指示待ち"];

pub fn is_pending(status: &str) -> bool {
    PENDING_STATUSES.contains(&status.trim())
}

/// 任务表中的一行
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Task {
    /// Sheet row number (header is row 1, so the first task is row 2)
    pub row_index: usize,
    pub status: String,
    pub main_keyword: String,
    pub sub_keyword_1: String,
    pub sub_keyword_2: String,
    pub goal: String,
    pub site_name: String,
    pub slug: String,
    pub article_type: String,
}

impl Task {
    /// Builds a task from a header -> cell record.
    pub fn from_record(row_index: usize, record: &IndexMap<String, String>) -> Self {
        let get = |key: &str| record.get(key).map(|v| v.trim().to_string()).unwrap_or_default();
        Self {
            row_index,
            status: get(Column::Status.header()),
            main_keyword: get(Column::MainKw.header()),
            sub_keyword_1: get(Column::SubKw1.header()),
            sub_keyword_2: get(Column::SubKw2.header()),
            goal: get(Column::Goal.header()),
            site_name: get(Column::SiteName.header()),
            slug: get(Column::Slug.header()),
            article_type: get(ARTICLE_TYPE_HEADER),
        }
    }

    pub fn article_type_or_default(&self) -> &str {
        if self.article_type.is_empty() {
            DEFAULT_ARTICLE_TYPE
        } else {
            &self.article_type
        }
    }
}

// --- Interfaces ---

/// 任务存储接口 (行 / 列寻址的表格)
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn list_pending(&self) -> Result<Vec<Task>>;

    /// Key/Value pairs of a companion tab, in sheet order. `None` if the tab does not exist.
    async fn get_key_values(&self, tab: &str) -> Result<Option<Vec<(String, String)>>>;

    async fn set_status(&self, row: usize, text: &str) -> Result<(), StoreError> {
        self.write_cell(row, Column::Status.ordinal(), text).await
    }

    async fn write_cell(&self, row: usize, column: usize, value: &str) -> Result<(), StoreError>;

    /// Remote step script for an article type: the Key/Value tab of the same name.
    async fn get_script(&self, article_type: &str) -> Result<Option<StepScript>> {
        match self.get_key_values(article_type).await? {
            Some(pairs) if !pairs.is_empty() => Ok(Some(StepScript::from_pairs(&pairs)?)),
            _ => Ok(None),
        }
    }

    /// Shared rules: values of the shared-rules tab joined by blank lines.
    async fn get_shared_rules(&self) -> Result<String> {
        let pairs = self.get_key_values(SHARED_RULES_TAB).await?.unwrap_or_default();
        Ok(pairs
            .into_iter()
            .map(|(_, v)| v)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

// --- In-Memory Implementation ---

/// 内存任务表 (测试与嵌入使用)
pub struct InMemoryStore {
    // Map<Row, Map<Column, Value>>
    cells: DashMap<usize, DashMap<usize, String>>,
    article_types: DashMap<usize, String>,
    tabs: DashMap<String, Vec<(String, String)>>,
    // Every write in order, for inspection
    writes: Mutex<Vec<(usize, usize, String)>>,
    failing_columns: DashMap<usize, ()>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            cells: DashMap::new(),
            article_types: DashMap::new(),
            tabs: DashMap::new(),
            writes: Mutex::new(Vec::new()),
            failing_columns: DashMap::new(),
        }
    }

    pub fn add_task(&self, task: &Task) {
        let row = DashMap::new();
        row.insert(Column::Status.ordinal(), task.status.clone());
        row.insert(Column::MainKw.ordinal(), task.main_keyword.clone());
        row.insert(Column::SubKw1.ordinal(), task.sub_keyword_1.clone());
        row.insert(Column::SubKw2.ordinal(), task.sub_keyword_2.clone());
        row.insert(Column::Goal.ordinal(), task.goal.clone());
        row.insert(Column::SiteName.ordinal(), task.site_name.clone());
        row.insert(Column::Slug.ordinal(), task.slug.clone());
        self.cells.insert(task.row_index, row);
        self.article_types.insert(task.row_index, task.article_type.clone());
    }

    pub fn add_tab(&self, name: &str, pairs: Vec<(String, String)>) {
        self.tabs.insert(name.to_string(), pairs);
    }

    /// Makes every write to `column` fail.
    pub fn fail_column(&self, column: usize) {
        self.failing_columns.insert(column, ());
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<String> {
        self.cells.get(&row).and_then(|r| r.get(&column).map(|v| v.value().clone()))
    }

    pub fn writes(&self) -> Vec<(usize, usize, String)> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn writes_to(&self, row: usize, column: usize) -> Vec<String> {
        self.writes()
            .into_iter()
            .filter(|(r, c, _)| *r == row && *c == column)
            .map(|(_, _, v)| v)
            .collect()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn list_pending(&self) -> Result<Vec<Task>> {
        let mut rows: Vec<usize> = self.cells.iter().map(|r| *r.key()).collect();
        rows.sort_unstable();

        let mut pending = Vec::new();
        for row in rows {
            let get = |c: Column| self.cell(row, c.ordinal()).unwrap_or_default();
            let task = Task {
                row_index: row,
                status: get(Column::Status).trim().to_string(),
                main_keyword: get(Column::MainKw),
                sub_keyword_1: get(Column::SubKw1),
                sub_keyword_2: get(Column::SubKw2),
                goal: get(Column::Goal),
                site_name: get(Column::SiteName),
                slug: get(Column::Slug),
                article_type: self.article_types.get(&row).map(|v| v.value().clone()).unwrap_or_default(),
            };
            if is_pending(&task.status) {
                pending.push(task);
            }
        }
        Ok(pending)
    }

    async fn get_key_values(&self, tab: &str) -> Result<Option<Vec<(String, String)>>> {
        Ok(self.tabs.get(tab).map(|t| t.value().clone()))
    }

    async fn write_cell(&self, row: usize, column: usize, value: &str) -> Result<(), StoreError> {
        if self.failing_columns.contains_key(&column) {
            return Err(StoreError::Write {
                row,
                column,
                reason: "injected failure".to_string(),
            });
        }
        self.cells
            .entry(row)
            .or_insert_with(DashMap::new)
            .insert(column, value.to_string());
        if let Ok(mut w) = self.writes.lock() {
            w.push((row, column, value.to_string()));
        }
        Ok(())
    }
}
