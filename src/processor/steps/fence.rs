//! 代码围栏剥离
//!
//! 删除模型输出中的 Markdown 代码围栏（```python、```py、```、~~~），
//! 再删除残留的成对围栏块。

use super::traits::{StepContext, TextStep};
use once_cell::sync::Lazy;
use regex::Regex;

/// 按顺序删除的字面量围栏（大小写不敏感）
pub const FENCES: &[&str] = &["```python", "```py", "```", "~~~"];

/// 有序规则表：(模式, 替换)
static FENCE_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    let mut rules: Vec<(Regex, &'static str)> = FENCES
        .iter()
        .filter_map(|fence| Regex::new(&format!("(?i){}", regex::escape(fence))).ok())
        .map(|re| (re, ""))
        .collect();
    // 成对的围栏块（非贪婪，跨行）
    for pattern in [r"(?s)```.*?```", r"(?s)~~~.*?~~~"] {
        if let Ok(re) = Regex::new(pattern) {
            rules.push((re, ""));
        }
    }
    rules
});

fn strip_once(text: &str) -> String {
    let mut t = text.trim().to_string();
    for (re, replacement) in FENCE_RULES.iter() {
        t = re.replace_all(&t, *replacement).into_owned();
    }
    t.trim().to_string()
}

/// 剥离围栏
///
/// 重复执行直到文本不再变化：删除一个围栏可能把两侧的字符拼成新的围栏（如 "``~~~`"）。
pub fn strip_fences(text: &str) -> String {
    let mut current = strip_once(text);
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// 围栏剥离步骤
#[derive(Debug, Default, Clone, Copy)]
pub struct FenceStripStep;

impl TextStep for FenceStripStep {
    fn apply(&self, _ctx: &StepContext<'_>, text: String) -> String {
        strip_fences(&text)
    }

    fn name(&self) -> &'static str {
        "fence_strip"
    }
}
