//! 停止序列截断

use super::traits::{StepContext, TextStep};

/// 在最早出现的停止序列处截断
pub fn cut_at_stops(text: &str, stops: &[String]) -> String {
    let earliest = stops
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min();

    match earliest {
        Some(idx) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// 停止序列截断步骤
#[derive(Debug, Default, Clone, Copy)]
pub struct StopCutoffStep;

impl TextStep for StopCutoffStep {
    fn apply(&self, ctx: &StepContext<'_>, text: String) -> String {
        cut_at_stops(&text, ctx.stops)
    }

    fn name(&self) -> &'static str {
        "stop_cutoff"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stops(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cut_at_fence_stop() {
        let text = "print(1)\n\n```";
        assert_eq!(cut_at_stops(text, &stops(&["\n\n```"])), "print(1)");
    }

    #[test]
    fn test_cut_earliest_wins() {
        let text = "a = 1\n\n# note\n\n## title";
        let result = cut_at_stops(text, &stops(&["\n\n##", "\n\n# "]));
        assert_eq!(result, "a = 1");
    }

    #[test]
    fn test_no_stop_found() {
        assert_eq!(cut_at_stops("x = 1", &stops(&["\n\n"])), "x = 1");
        assert_eq!(cut_at_stops("x = 1", &[]), "x = 1");
    }
}
