//! 后处理步骤 trait 定义
//!
//! 每个步骤都是纯函数：输入上一步的文本，输出新的文本。

/// 步骤上下文
///
/// 每次请求构建一次，步骤之间共享只读数据
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// 光标前代码
    pub prefix: &'a str,
    /// 光标后代码
    pub suffix: &'a str,
    /// 停止序列
    pub stops: &'a [String],
    /// 重叠去重检查窗口（字符数）
    pub window: usize,
}

/// 后处理步骤 trait
pub trait TextStep: Send + Sync {
    /// 执行步骤
    fn apply(&self, ctx: &StepContext<'_>, text: String) -> String;

    /// 获取步骤名称
    fn name(&self) -> &'static str;
}
