//! 文档存储错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("不支持的查询管道: {0}")]
    UnsupportedPipeline(String),

    #[error("文档解析失败: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("预置数据加载失败: {path} - {message}")]
    Seed { path: String, message: String },

    #[error("存储不可用: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::UnsupportedPipeline(_) => "UNSUPPORTED_PIPELINE",
            Self::Decode(_) => "DOCUMENT_DECODE_ERROR",
            Self::Seed { .. } => "SEED_ERROR",
            Self::Unavailable(_) => "STORE_UNAVAILABLE",
        }
    }
}
