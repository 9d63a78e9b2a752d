//! 缓存错误类型

use thiserror::Error;

use crate::store::StoreError;

/// 缓存读取错误
///
/// 只表示缓存无法回答，调用方据此回源；国家不存在或没有活动不是错误。
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("活动缓存尚未就绪")]
    NotReady,
}

/// 缓存加载错误，携带失败的加载单元
#[derive(Debug, Error)]
pub enum CacheLoadError {
    #[error("加载单元 {unit} 读取失败: {source}")]
    Store {
        unit: String,
        #[source]
        source: StoreError,
    },

    #[error("加载单元 {unit} 文档解析失败: {source}")]
    Decode {
        unit: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("加载单元 {unit} 异常退出: {message}")]
    UnitPanicked { unit: String, message: String },
}

impl CacheLoadError {
    /// 失败的加载单元
    pub fn unit(&self) -> &str {
        match self {
            Self::Store { unit, .. } | Self::Decode { unit, .. } | Self::UnitPanicked { unit, .. } => {
                unit
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Store { .. } => "CACHE_LOAD_STORE_ERROR",
            Self::Decode { .. } => "CACHE_LOAD_DECODE_ERROR",
            Self::UnitPanicked { .. } => "CACHE_LOAD_PANICKED",
        }
    }
}
