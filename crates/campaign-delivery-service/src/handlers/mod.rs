//! HTTP 请求处理器

pub mod delivery;
pub mod health;
