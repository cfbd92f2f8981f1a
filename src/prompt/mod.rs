//! Prompt 构建层
//!
//! - `indent`: 缩进单位推断与块开头的缩进预填
//! - `builder`: FIM 模板拼接

pub mod builder;
pub mod indent;

pub use builder::{PromptBuilder, DEFAULT_RULES};
pub use indent::{infer_indent_unit, leading_ws, prime_prefix, IndentUnit};
