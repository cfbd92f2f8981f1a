//! Markdown 代码围栏提取

use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_BLOCK: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)```(?:\w+)?\n(.*?)```").ok());

/// 返回第一个 ```` ```lang ... ``` ```` 代码块的内容；没有代码块时原样返回
pub fn strip_md_fence(text: &str) -> String {
    let body = FENCED_BLOCK
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1));
    match body {
        Some(body) => body.as_str().to_string(),
        None => text.to_string(),
    }
}
