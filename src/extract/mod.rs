//! 从完整对话记录中提取文章结果
//!
//! 每个字段独立提取：某个标记缺失只影响对应字段，不会中断其它字段。

pub mod markup;

use regex::Regex;
use serde::{Serialize, Deserialize};
use std::sync::LazyLock;

pub const TITLE_NOT_FOUND: &str = "タイトル取得失敗";
pub const DESCRIPTION_NOT_FOUND: &str = "ディスクリプション取得失敗";

/// Late step whose trailing text is taken verbatim as image prompts.
pub const IMAGE_PROMPT_STEP: &str = "STEP 6";
pub const IMAGE_PROMPT_CLOSERS: [&str; 3] = ["**【作業完了】**", "これ以上の工程は", "引き続きのご承認"];

static IMAGE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)---IMAGE_START---(.*?)---IMAGE_END---").expect("valid regex"));
static TITLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)---TITLE_START---(.*?)---TITLE_END---").expect("valid regex"));
static DESC_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)---DESC_START---(.*?)---DESC_END---").expect("valid regex"));
static HTML_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```html(.*?)```").expect("valid regex"));
static ANY_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```(.*?)```").expect("valid regex"));

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedArticle {
    pub title: String,
    pub description: String,
    pub content: String,
    pub image_prompts: String,
}

impl GeneratedArticle {
    /// Result of a run whose initial step failed.
    pub fn empty() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            content: String::new(),
            image_prompts: String::new(),
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}

pub fn extract(transcript: &str) -> GeneratedArticle {
    let content = longest_fenced_block(transcript)
        .map(|block| markup::normalize(block.trim()))
        .unwrap_or_default();

    GeneratedArticle {
        title: marker_block(&TITLE_BLOCK, transcript).unwrap_or_else(|| TITLE_NOT_FOUND.to_string()),
        description: marker_block(&DESC_BLOCK, transcript).unwrap_or_else(|| DESCRIPTION_NOT_FOUND.to_string()),
        content,
        image_prompts: image_prompts(transcript),
    }
}

fn marker_block(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn image_prompts(text: &str) -> String {
    let mut prompts = marker_block(&IMAGE_BLOCK, text).unwrap_or_default();

    if let Some(pos) = text.rfind(IMAGE_PROMPT_STEP) {
        let mut tail = text[pos + IMAGE_PROMPT_STEP.len()..].trim();
        for closer in IMAGE_PROMPT_CLOSERS {
            if let Some(cut) = tail.find(closer) {
                tail = &tail[..cut];
            }
        }
        prompts = tail.trim().to_string();
    }

    prompts
}

/// The longest `html` fenced block, or the longest fenced block of any kind when
/// there is no `html` block. Ties keep the earliest block.
pub fn longest_fenced_block(text: &str) -> Option<&str> {
    let mut candidates: Vec<&str> = HTML_FENCE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    if candidates.is_empty() {
        candidates = ANY_FENCE
            .captures_iter(text)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
    }

    let mut best: Option<(&str, usize)> = None;
    for candidate in candidates {
        let len = candidate.chars().count();
        if best.is_none_or(|(_, best_len)| len > best_len) {
            best = Some((candidate, len));
        }
    }
    best.map(|(block, _)| block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_and_description_markers() {
        let text = "x ---TITLE_START--- My Title ---TITLE_END--- y ---DESC_START---\nDesc\n---DESC_END---";
        let article = extract(text);
        assert_eq!(article.title, "My Title");
        assert_eq!(article.description, "Desc");
    }

    #[test]
    fn test_missing_markers_use_sentinels() {
        let article = extract("nothing here");
        assert_eq!(article.title, TITLE_NOT_FOUND);
        assert_eq!(article.description, DESCRIPTION_NOT_FOUND);
        assert_eq!(article.content, "");
        assert_eq!(article.image_prompts, "");
    }

    #[test]
    fn test_extracted_empty_title_is_not_the_sentinel() {
        let article = extract("---TITLE_START---   ---TITLE_END---");
        assert_eq!(article.title, "");
    }

    #[test]
    fn test_html_blocks_win_over_untagged() {
        let text = "```html\n<p>short</p>\n```\n```\nthis untagged block is much much longer\n```";
        assert_eq!(extract(text).content, "<p>short</p>");
    }

    #[test]
    fn test_untagged_fallback() {
        let text = "```\nplain\n```";
        assert_eq!(extract(text).content, "plain");
    }

    #[test]
    fn test_length_counts_characters() {
        // 4 multibyte chars (12 bytes) vs 10 ascii chars
        let text = "```html日本語文```\n```html0123456789```";
        assert_eq!(longest_fenced_block(text), Some("0123456789"));
    }

    #[test]
    fn test_image_marker_block() {
        let text = "---IMAGE_START---\nprompt a\nprompt b\n---IMAGE_END---";
        assert_eq!(extract(text).image_prompts, "prompt a\nprompt b");
    }

    #[test]
    fn test_step_six_overrides_markers() {
        let text = "---IMAGE_START---old---IMAGE_END---\nSTEP 6 first\nSTEP 6\n1. sunset\n2. beach\n**【作業完了】** bye";
        assert_eq!(extract(text).image_prompts, "1. sunset\n2. beach");
    }

    #[test]
    fn test_step_six_cut_at_earliest_closer() {
        let text = "STEP 6 prompts 引き続きのご承認 x これ以上の工程は y";
        assert_eq!(extract(text).image_prompts, "prompts");
    }
}
