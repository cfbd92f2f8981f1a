//! 缩进分析
//!
//! 从 prefix 推断缩进单位（TAB 或 2~8 个空格），并在块开头（以 `:` 结尾的行）
//! 之后为 prefix "预填"正确的缩进，让模型从正确的层级开始续写。
//!
//! 只做启发式判断，不解析语法树。CRLF 风格会在输出时还原。

/// 比较宽度时 TAB 按 4 个空格计算
const TAB_WIDTH: usize = 4;
/// 推断失败时的默认步长
const DEFAULT_STEP: usize = 4;
const MIN_STEP: usize = 2;
const MAX_STEP: usize = 8;

/// 缩进单位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentUnit {
    /// 单个 TAB
    Tab,
    /// N 个空格（2..=8）
    Spaces(usize),
}

impl Default for IndentUnit {
    fn default() -> Self {
        Self::Spaces(DEFAULT_STEP)
    }
}

impl IndentUnit {
    /// 转换为实际插入的字符串
    pub fn as_string(&self) -> String {
        match self {
            Self::Tab => "\t".to_string(),
            Self::Spaces(n) => " ".repeat(*n),
        }
    }
}

/// 行首的空白（只包含空格和 TAB，不包含换行符）
pub fn leading_ws(line: &str) -> &str {
    let end = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..end]
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn indent_width(line: &str) -> usize {
    leading_ws(line)
        .chars()
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

/// 推断缩进单位
///
/// - 任意非空行的缩进中出现 TAB → `Tab`
/// - 否则取相邻非空行之间最常见的正向缩进差（并列时取最先出现者），限制在 [2, 8]
/// - 无法推断时返回 4 个空格
pub fn infer_indent_unit(text: &str) -> IndentUnit {
    let normalized = text.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.split('\n').filter(|l| !is_blank(l)).collect();

    if lines.is_empty() {
        return IndentUnit::default();
    }

    if lines.iter().any(|l| leading_ws(l).contains('\t')) {
        return IndentUnit::Tab;
    }

    let widths: Vec<usize> = lines.iter().map(|l| indent_width(l)).collect();

    // (步长, 出现次数)，保持首次出现顺序
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for pair in widths.windows(2) {
        if pair[1] > pair[0] {
            let diff = pair[1] - pair[0];
            match counts.iter_mut().find(|(step, _)| *step == diff) {
                Some((_, n)) => *n += 1,
                None => counts.push((diff, 1)),
            }
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for &(step, n) in &counts {
        if best.map_or(true, |(_, best_n)| n > best_n) {
            best = Some((step, n));
        }
    }

    match best {
        Some((step, _)) => IndentUnit::Spaces(step.clamp(MIN_STEP, MAX_STEP)),
        None => IndentUnit::default(),
    }
}

/// 在块开头之后预填缩进
///
/// 最后一个非空行不以 `:` 结尾时原样返回。
pub fn prime_prefix(prefix: &str) -> String {
    if prefix.is_empty() {
        return String::new();
    }

    let uses_crlf = prefix.contains("\r\n");
    let mut p = prefix.replace("\r\n", "\n");

    let last = match p.split('\n').rev().find(|l| !is_blank(l)) {
        Some(line) => line,
        None => return prefix.to_string(),
    };
    if !last.trim_end().ends_with(':') {
        return prefix.to_string();
    }

    let needed = format!("{}{}", leading_ws(last), infer_indent_unit(&p).as_string());

    match p.rfind('\n') {
        // 光标已在新行且只有空白：用正确缩进覆盖
        Some(pos) if p[pos + 1..].trim().is_empty() => {
            p.truncate(pos + 1);
            p.push_str(&needed);
        }
        _ => {
            if !p.ends_with('\n') {
                p.push('\n');
            }
            p.push_str(&needed);
        }
    }

    if uses_crlf {
        p.replace('\n', "\r\n")
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_four_spaces() {
        let text = "def f():\n    if x:\n        return 1\n    return 2\n";
        assert_eq!(infer_indent_unit(text), IndentUnit::Spaces(4));
    }

    #[test]
    fn test_infer_two_spaces() {
        let text = "a:\n  b:\n    c\n  d\n";
        assert_eq!(infer_indent_unit(text), IndentUnit::Spaces(2));
    }

    #[test]
    fn test_infer_tab_wins_over_spaces() {
        let text = "a:\n    b\n\tc\n        d\n";
        assert_eq!(infer_indent_unit(text), IndentUnit::Tab);
    }

    #[test]
    fn test_infer_tie_keeps_first_seen() {
        // 差值 3 和 2 各出现一次，3 先出现
        let text = "a\n   b\nc\n  d\n";
        assert_eq!(infer_indent_unit(text), IndentUnit::Spaces(3));
    }

    #[test]
    fn test_infer_clamped() {
        let text = "a\n                b\n";
        assert_eq!(infer_indent_unit(text), IndentUnit::Spaces(8));
        let text = "a\n b\n";
        assert_eq!(infer_indent_unit(text), IndentUnit::Spaces(2));
    }

    #[test]
    fn test_infer_defaults() {
        assert_eq!(infer_indent_unit(""), IndentUnit::Spaces(4));
        assert_eq!(infer_indent_unit("x = 1\ny = 2\n"), IndentUnit::Spaces(4));
        assert_eq!(infer_indent_unit("   \n\n"), IndentUnit::Spaces(4));
    }

    #[test]
    fn test_prime_after_colon_with_newline() {
        assert_eq!(prime_prefix("if x:\n"), "if x:\n    ");
    }

    #[test]
    fn test_prime_without_newline() {
        assert_eq!(prime_prefix("if x:"), "if x:\n    ");
    }

    #[test]
    fn test_prime_overwrites_whitespace_tail() {
        assert_eq!(prime_prefix("def f():\n  "), "def f():\n    ");
    }

    #[test]
    fn test_prime_keeps_base_indent() {
        let prefix = "class A:\n  def f(self):";
        assert_eq!(prime_prefix(prefix), "class A:\n  def f(self):\n    ");
    }

    #[test]
    fn test_prime_with_tabs() {
        assert_eq!(prime_prefix("if a:\n\tif b:\n"), "if a:\n\tif b:\n\t\t");
    }

    #[test]
    fn test_prime_not_a_block_opener() {
        assert_eq!(prime_prefix("x = 1\n"), "x = 1\n");
        assert_eq!(prime_prefix(""), "");
        assert_eq!(prime_prefix("\n   \n"), "\n   \n");
    }

    #[test]
    fn test_prime_preserves_crlf() {
        assert_eq!(prime_prefix("if x:\r\n"), "if x:\r\n    ");
        assert_eq!(
            prime_prefix("def f():\r\n  if y:\r\n"),
            "def f():\r\n  if y:\r\n    "
        );
    }

    #[test]
    fn test_prime_trailing_text_after_colon_line() {
        // 最后一行有内容（注释后空格）但仍以 ':' 结尾
        assert_eq!(prime_prefix("for i in r:   "), "for i in r:   \n    ");
    }
}
