//! 补全后处理模块
//!
//! 把后端原始输出清洗为可直接插入的补全文本：
//!
//! ```text
//! raw ──> [围栏剥离] ──> [停止序列截断] ──> [首行缩进] ──> [prefix 去重] ──> [suffix 去重] ──> trim_end
//! ```
//!
//! 整个管道是纯函数，不持有跨请求状态。

mod error;
pub mod steps;


pub use error::CompletionError;
pub use steps::{
    cut_at_stops, dedupe_with_prefix, dedupe_with_suffix, normalize_indent, strip_fences,
    StepContext, TextStep, DEFAULT_OVERLAP_WINDOW,
};

use steps::{
    FenceStripStep, IndentNormalizeStep, PrefixOverlapStep, StopCutoffStep, SuffixOverlapStep,
};

/// 补全后处理器
pub struct Postprocessor {
    steps: Vec<Box<dyn TextStep>>,
    window: usize,
    enabled: bool,
}

impl std::fmt::Debug for Postprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.steps.iter().map(|s| s.name()).collect();
        f.debug_struct("Postprocessor")
            .field("steps", &names)
            .field("window", &self.window)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl Default for Postprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_OVERLAP_WINDOW)
    }
}

impl Postprocessor {
    /// 创建标准五步管道
    pub fn new(window: usize) -> Self {
        Self {
            steps: vec![
                Box::new(FenceStripStep),
                Box::new(StopCutoffStep),
                Box::new(IndentNormalizeStep),
                Box::new(PrefixOverlapStep),
                Box::new(SuffixOverlapStep),
            ],
            window,
            enabled: true,
        }
    }

    /// 设置是否启用；关闭时原样返回后端输出
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 步骤名称（按执行顺序）
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// 执行后处理
    pub fn process(&self, prefix: &str, suffix: &str, raw: &str, stops: &[String]) -> String {
        if !self.enabled {
            return raw.to_string();
        }

        let ctx = StepContext {
            prefix,
            suffix,
            stops,
            window: self.window,
        };

        let text = self
            .steps
            .iter()
            .fold(raw.to_string(), |text, step| step.apply(&ctx, text));
        text.trim_end().to_string()
    }
}

/// 使用默认配置执行后处理
pub fn postprocess(prefix: &str, suffix: &str, raw: &str, stops: &[String]) -> String {
    Postprocessor::default().process(prefix, suffix, raw, stops)
}
