use regex::Regex;
use std::sync::LazyLock;

/// 自定义伪标签 -> 带同名 class 的容器
const PSEUDO_TAGS: [(&str, &str); 8] = [
    ("<numlist>", r#"<div class="numlist">"#),
    ("</numlist>", "</div>"),
    ("<normalBox>", r#"<div class="normalBox">"#),
    ("</normalBox>", "</div>"),
    ("<flow>", r#"<div class="flow">"#),
    ("</flow>", "</div>"),
    ("<qa-box01>", r#"<div class="qa-box01">"#),
    ("</qa-box01>", "</div>"),
];

pub const IMAGE_WRAPPER_CLASS: &str = "img-100";

static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid regex"));
static P_CLASS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"<p class="[^"]*">"#).expect("valid regex"));
static IMG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(<img\s+[^>]*>)").expect("valid regex"));

/// Normalizes the extracted article body.
///
/// Each pass is idempotent on its own, but running the whole normalizer twice
/// wraps already wrapped images again.
pub fn normalize(html: &str) -> String {
    let mut out = html.to_string();
    for (from, to) in PSEUDO_TAGS {
        out = out.replace(from, to);
    }

    let out = BOLD.replace_all(&out, "<strong>$1</strong>");
    let out = P_CLASS.replace_all(&out, "<p>");
    let out = IMG.replace_all(&out, format!(r#"<div class="{}">$1</div>"#, IMAGE_WRAPPER_CLASS).as_str());
    out.into_owned()
}
