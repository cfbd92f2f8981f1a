//! 后处理步骤
//!
//! 各步骤按固定顺序执行：围栏/停止序列必须先于重叠去重，
//! 否则 Markdown 噪声会干扰重叠匹配。

mod fence;
mod indent;
mod overlap;
mod stop;
mod traits;

pub use fence::{strip_fences, FenceStripStep, FENCES};
pub use indent::{last_line_indent, normalize_indent, IndentNormalizeStep};
pub use overlap::{
    dedupe_with_prefix, dedupe_with_suffix, PrefixOverlapStep, SuffixOverlapStep,
    DEFAULT_OVERLAP_WINDOW,
};
pub use stop::{cut_at_stops, StopCutoffStep};
pub use traits::{StepContext, TextStep};
