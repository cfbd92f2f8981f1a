//! 路由处理器

mod completions;
mod health;

pub use completions::{complete, complete_stream};
pub use health::{health, model_names, models};
