//! prefix / suffix 重叠去重
//!
//! 模型经常把光标前后的已有代码重复输出一遍。在窗口范围内从最长候选长度开始
//! 向下扫描，第一个（最长的）匹配即为重叠部分。长度均按字符计算。

use super::traits::{StepContext, TextStep};

/// 默认检查窗口
pub const DEFAULT_OVERLAP_WINDOW: usize = 120;

/// 前 n 个字符对应的字节偏移
fn byte_offset(s: &str, n_chars: usize) -> usize {
    s.char_indices().nth(n_chars).map_or(s.len(), |(i, _)| i)
}

/// 最后 n 个字符
fn tail_chars(s: &str, n_chars: usize) -> &str {
    let total = s.chars().count();
    &s[byte_offset(s, total.saturating_sub(n_chars))..]
}

/// 去掉补全开头与 prefix 结尾重叠的部分
pub fn dedupe_with_prefix(prefix: &str, completion: &str, window: usize) -> String {
    let tail = tail_chars(prefix, window);
    let max_k = tail.chars().count().min(completion.chars().count());

    for k in (1..=max_k).rev() {
        let cut = byte_offset(completion, k);
        if tail.ends_with(&completion[..cut]) {
            return completion[cut..].to_string();
        }
    }
    completion.to_string()
}

/// 去掉补全结尾与 suffix 开头重叠的部分
pub fn dedupe_with_suffix(completion: &str, suffix: &str, window: usize) -> String {
    let head = &suffix[..byte_offset(suffix, window)];
    let completion_len = completion.chars().count();
    let max_k = head.chars().count().min(completion_len);

    for k in (1..=max_k).rev() {
        let candidate = &head[..byte_offset(head, k)];
        if completion.ends_with(candidate) {
            let keep = byte_offset(completion, completion_len - k);
            return completion[..keep].to_string();
        }
    }
    completion.to_string()
}

/// prefix 重叠去重步骤
#[derive(Debug, Default, Clone, Copy)]
pub struct PrefixOverlapStep;

impl TextStep for PrefixOverlapStep {
    fn apply(&self, ctx: &StepContext<'_>, text: String) -> String {
        dedupe_with_prefix(ctx.prefix, &text, ctx.window)
    }

    fn name(&self) -> &'static str {
        "prefix_overlap"
    }
}

/// suffix 重叠去重步骤
#[derive(Debug, Default, Clone, Copy)]
pub struct SuffixOverlapStep;

impl TextStep for SuffixOverlapStep {
    fn apply(&self, ctx: &StepContext<'_>, text: String) -> String {
        dedupe_with_suffix(&text, ctx.suffix, ctx.window)
    }

    fn name(&self) -> &'static str {
        "suffix_overlap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_overlap() {
        assert_eq!(dedupe_with_prefix("xyzabc", "abcdef", 120), "def");
    }

    #[test]
    fn test_prefix_overlap_prefers_longest() {
        // "aa" 和 "a" 都匹配，取最长
        assert_eq!(dedupe_with_prefix("baa", "aab", 120), "b");
    }

    #[test]
    fn test_prefix_no_overlap() {
        assert_eq!(dedupe_with_prefix("abc", "xyz", 120), "xyz");
        assert_eq!(dedupe_with_prefix("", "xyz", 120), "xyz");
    }

    #[test]
    fn test_prefix_overlap_window() {
        // 窗口只有 2 个字符，"abc" 无法整体匹配
        assert_eq!(dedupe_with_prefix("abc", "abcd", 2), "abcd");
        assert_eq!(dedupe_with_prefix("xbc", "bcd", 2), "d");
    }

    #[test]
    fn test_suffix_overlap() {
        assert_eq!(dedupe_with_suffix("x = 1\n)", ")\nprint(x)", 120), "x = 1\n");
        assert_eq!(dedupe_with_suffix("abc", "xyz", 120), "abc");
        assert_eq!(dedupe_with_suffix("abc", "", 120), "abc");
    }

    #[test]
    fn test_overlap_multibyte() {
        assert_eq!(dedupe_with_prefix("# 你好", "你好世界", 120), "世界");
        assert_eq!(dedupe_with_suffix("世界你好", "你好!", 120), "世界");
    }
}
