use uuid::Uuid;

pub const DEFAULT_GOAL: &str = "検索意図を満たし、成約につなげる";
pub const DEFAULT_SLUG: &str = "article";

/// 运行上下文 (Run Context)
/// 一次任务的不可变参数，只被一次运行消费
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub run_id: Uuid,
    pub main_keyword: String,
    pub sub_keywords: String,
    pub goal: String,
    pub slug: String,
    pub instructions: String,
}

impl RunContext {
    pub fn new(main_keyword: &str, sub_keyword_1: &str, sub_keyword_2: &str, goal: &str, slug: &str, instructions: String) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            main_keyword: main_keyword.to_string(),
            sub_keywords: format!("{}, {}", sub_keyword_1, sub_keyword_2),
            goal: if goal.is_empty() { DEFAULT_GOAL.to_string() } else { goal.to_string() },
            slug: if slug.is_empty() { DEFAULT_SLUG.to_string() } else { slug.to_string() },
            instructions,
        }
    }

    /// Fields available to the `Initial` template.
    pub fn initial_fields(&self) -> [(&str, &str); 4] {
        [
            ("main_kw", self.main_keyword.as_str()),
            ("sub_kws", self.sub_keywords.as_str()),
            ("goal", self.goal.as_str()),
            ("slug", self.slug.as_str()),
        ]
    }

    /// Fields available to step templates.
    pub fn step_fields(&self) -> [(&str, &str); 2] {
        [
            ("slug", self.slug.as_str()),
            ("main_kw", self.main_keyword.as_str()),
        ]
    }
}
