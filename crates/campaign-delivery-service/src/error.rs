//! 投放服务错误类型定义

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::store::StoreError;

/// 投放服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    // 客户端输入错误
    #[error("缺少必填参数: {0}")]
    MissingParameter(String),
    #[error("参数无效: {field} - {message}")]
    InvalidParameter { field: String, message: String },
    #[error("未知的投放维度: {name}")]
    UnknownDimension { name: String },
    #[error("参数验证失败: {0}")]
    Validation(String),
    #[error("不支持的请求方法: {0}")]
    MethodNotAllowed(String),

    // 系统错误
    #[error("维度配置不存在")]
    DimensionConfigMissing,
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    #[error("存储查询超时: {timeout_ms}ms")]
    StoreTimeout { timeout_ms: u64 },
    #[error("内部错误: {0}")]
    Internal(String),
}

impl DeliveryError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingParameter(_)
            | Self::InvalidParameter { .. }
            | Self::UnknownDimension { .. }
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,

            Self::Store(StoreError::Unavailable(_)) | Self::StoreTimeout { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::DimensionConfigMissing | Self::Store(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "MISSING_PARAMETER",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::UnknownDimension { .. } => "UNKNOWN_DIMENSION",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            Self::DimensionConfigMissing => "DIMENSION_CONFIG_MISSING",
            Self::Store(e) => e.error_code(),
            Self::StoreTimeout { .. } => "STORE_TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为客户端输入错误
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for DeliveryError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "投放请求失败");
            "服务内部错误，请稍后重试".to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for DeliveryError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, DeliveryError>;
