//! 首行缩进归一化

use super::traits::{StepContext, TextStep};

/// prefix 最后一行的行首空格数
///
/// 按行切分时末尾换行不产生新行，所以 `"if x:\n"` 的最后一行是 `"if x:"`。
pub fn last_line_indent(prefix: &str) -> usize {
    prefix
        .lines()
        .last()
        .map(|line| line.len() - line.trim_start_matches(' ').len())
        .unwrap_or(0)
}

/// 只重写补全的第一行：去掉其自身缩进，换成 prefix 最后一行的缩进
pub fn normalize_indent(prefix: &str, completion: &str) -> String {
    let base = " ".repeat(last_line_indent(prefix));
    completion
        .lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 && !line.trim().is_empty() {
                format!("{}{}", base, line.trim_start())
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 缩进归一化步骤
#[derive(Debug, Default, Clone, Copy)]
pub struct IndentNormalizeStep;

impl TextStep for IndentNormalizeStep {
    fn apply(&self, ctx: &StepContext<'_>, text: String) -> String {
        normalize_indent(ctx.prefix, &text)
    }

    fn name(&self) -> &'static str {
        "indent_normalize"
    }
}
