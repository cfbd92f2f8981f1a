//! 数据模型

pub mod completion_model;

pub use completion_model::{
    new_request_id, sanitize_stops, CompletionRequest, CompletionResponse, DEFAULT_STOPS,
};
