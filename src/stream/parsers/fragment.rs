//! 字段提取
//!
//! 不同服务返回的 JSON 形状不一，这里按固定优先级取第一个非空字符串。

use serde_json::Value;

/// 流式单元的片段字段优先级
const FRAGMENT_PATHS: &[&[PathSeg]] = &[
    &[PathSeg::Key("delta")],
    &[PathSeg::Key("text")],
    &[PathSeg::Key("content")],
    &[
        PathSeg::Key("choices"),
        PathSeg::Index(0),
        PathSeg::Key("delta"),
        PathSeg::Key("content"),
    ],
    &[
        PathSeg::Key("choices"),
        PathSeg::Index(0),
        PathSeg::Key("message"),
        PathSeg::Key("content"),
    ],
];

/// 非流式响应的补全字段优先级
const COMPLETION_PATHS: &[&[PathSeg]] = &[
    &[PathSeg::Key("completion")],
    &[PathSeg::Key("text")],
    &[PathSeg::Key("choices"), PathSeg::Index(0), PathSeg::Key("text")],
    &[
        PathSeg::Key("choices"),
        PathSeg::Index(0),
        PathSeg::Key("message"),
        PathSeg::Key("content"),
    ],
];

#[derive(Debug, Clone, Copy)]
enum PathSeg {
    Key(&'static str),
    Index(usize),
}

fn lookup<'a>(value: &'a Value, path: &[PathSeg]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, seg| match seg {
        PathSeg::Key(key) => current.get(*key),
        PathSeg::Index(i) => current.get(*i),
    })
}

fn first_non_empty(value: &Value, paths: &[&[PathSeg]]) -> String {
    paths
        .iter()
        .filter_map(|path| lookup(value, path).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// 从一个流式单元（SSE data 或 NDJSON 行）提取文本片段
///
/// 非 JSON 或非对象的单元原样返回；对象中没有可用字段时返回空串。
pub fn extract_fragment(unit: &str) -> String {
    match serde_json::from_str::<Value>(unit) {
        Ok(value @ Value::Object(_)) => first_non_empty(&value, FRAGMENT_PATHS),
        _ => unit.to_string(),
    }
}

/// 从非流式响应体提取补全文本
pub fn coalesce_completion(value: &Value) -> String {
    if !value.is_object() {
        return String::new();
    }
    first_non_empty(value, COMPLETION_PATHS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fragment_priority() {
        assert_eq!(extract_fragment(r#"{"delta":"a","text":"b"}"#), "a");
        assert_eq!(extract_fragment(r#"{"delta":"","text":"b"}"#), "b");
        assert_eq!(extract_fragment(r#"{"content":"c"}"#), "c");
        assert_eq!(
            extract_fragment(r#"{"choices":[{"delta":{"content":"d"}}]}"#),
            "d"
        );
        assert_eq!(
            extract_fragment(r#"{"choices":[{"message":{"content":"m"}}]}"#),
            "m"
        );
    }

    #[test]
    fn test_fragment_fallbacks() {
        assert_eq!(extract_fragment(r#"{"request_id":"ab"}"#), "");
        assert_eq!(extract_fragment(r#"{"delta":5}"#), "");
        assert_eq!(extract_fragment("plain text"), "plain text");
        assert_eq!(extract_fragment("[1,2]"), "[1,2]");
        assert_eq!(extract_fragment("\"quoted\""), "\"quoted\"");
    }

    #[test]
    fn test_coalesce_completion() {
        assert_eq!(coalesce_completion(&json!({"completion":"x","text":"y"})), "x");
        assert_eq!(coalesce_completion(&json!({"completion":"","text":"y"})), "y");
        assert_eq!(coalesce_completion(&json!({"choices":[{"text":"t"}]})), "t");
        assert_eq!(
            coalesce_completion(&json!({"choices":[{"message":{"content":"c"}}]})),
            "c"
        );
        assert_eq!(coalesce_completion(&json!({"choices":[]})), "");
        assert_eq!(coalesce_completion(&json!("x")), "");
    }
}
