//! Prompt 构建器
//!
//! 纯函数式的模板拼接：相同输入必须得到逐字节相同的输出。

/// 默认规则，`{language}` 会被替换为首字母大写的语言名
pub const DEFAULT_RULES: &[&str] = &[
    "Return ONLY the missing {language} code.",
    "Never output backticks or any Markdown.",
    "Do not add explanations, comments, or docstrings unless strictly required for correctness.",
    "Respect indentation from the last line before the cursor.",
    "Do not repeat any code that already exists in the prefix or suffix.",
    "Prefer the shortest syntactically valid completion; close any open blocks/brackets.",
    "Stop at a natural boundary (end of statement/block).",
];

/// FIM 风格的 prompt 构建器
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    rules: Vec<String>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::with_rules(DEFAULT_RULES.iter().map(|r| r.to_string()).collect())
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义规则列表
    pub fn with_rules(rules: Vec<String>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    /// 构建 prompt
    ///
    /// `primed_prefix` 应该已经经过 [`crate::prompt::prime_prefix`] 处理。
    pub fn build(&self, primed_prefix: &str, suffix: &str, language: &str) -> String {
        let language = display_language(language);
        let rules: Vec<String> = self
            .rules
            .iter()
            .map(|r| r.replace("{language}", &language))
            .collect();

        let mut prompt = String::with_capacity(primed_prefix.len() + suffix.len() + 768);
        prompt.push_str(&format!("You are a {language} code completion engine.\n"));
        prompt.push_str("Follow ALL rules strictly.\n");
        prompt.push_str("Rules:\n");
        for rule in &rules {
            prompt.push_str("- ");
            prompt.push_str(rule);
            prompt.push('\n');
        }
        prompt.push_str("Complete at the cursor using the surrounding context.\n");
        prompt.push_str("---\n");
        prompt.push_str(&format!("<prefix>\n{primed_prefix}\n</prefix>\n"));
        prompt.push_str(&format!("<suffix>\n{suffix}\n</suffix>\n"));
        prompt.push_str("<cursor/>\n");
        prompt
    }
}

/// 语言名首字母大写，空语言名退化为 "source"
fn display_language(language: &str) -> String {
    let trimmed = language.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "source".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOLDEN: &str = "You are a Python code completion engine.\n\
Follow ALL rules strictly.\n\
Rules:\n\
- Return ONLY the missing Python code.\n\
- Never output backticks or any Markdown.\n\
- Do not add explanations, comments, or docstrings unless strictly required for correctness.\n\
- Respect indentation from the last line before the cursor.\n\
- Do not repeat any code that already exists in the prefix or suffix.\n\
- Prefer the shortest syntactically valid completion; close any open blocks/brackets.\n\
- Stop at a natural boundary (end of statement/block).\n\
Complete at the cursor using the surrounding context.\n\
---\n\
<prefix>\n\
def add(a, b):\n    \n\
</prefix>\n\
<suffix>\n\
\n\
</suffix>\n\
<cursor/>\n";

    #[test]
    fn test_build_golden() {
        let builder = PromptBuilder::new();
        let prompt = builder.build("def add(a, b):\n    ", "", "python");
        assert_eq!(prompt, GOLDEN);
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = PromptBuilder::new();
        let a = builder.build("x = 1", "y = 2", "rust");
        let b = builder.build("x = 1", "y = 2", "rust");
        assert_eq!(a, b);
        assert!(a.starts_with("You are a Rust code completion engine.\n"));
    }

    #[test]
    fn test_custom_rules() {
        let builder = PromptBuilder::with_rules(vec!["Be brief.".to_string()]);
        let prompt = builder.build("a", "b", "go");
        assert!(prompt.contains("Rules:\n- Be brief.\nComplete at the cursor"));
    }

    #[test]
    fn test_display_language() {
        assert_eq!(display_language("python"), "Python");
        assert_eq!(display_language(""), "source");
    }
}
