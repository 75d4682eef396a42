// ==========================================
// 市场订单接入系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型,转换下层错误为用户友好的错误消息
// 红线: 所有错误信息必须包含显式原因(可解释性)
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 库存错误
    // ==========================================
    #[error("库存不足: {0}")]
    InsufficientStock(String),

    #[error("超出锁定上限: {0}")]
    ThresholdExceeded(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将仓储层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::MixedBatch { .. } | EngineError::UnresolvedSku { .. } => {
                ApiError::ImportError(err.to_string())
            }
            EngineError::InsufficientStock { .. } => ApiError::InsufficientStock(err.to_string()),
            EngineError::ThresholdExceeded { .. } => ApiError::ThresholdExceeded(err.to_string()),
            EngineError::RefillTooSmall { .. } => ApiError::InvalidInput(err.to_string()),
            EngineError::VariantNotFound(id) => ApiError::NotFound(format!("变体 {}", id)),
            EngineError::OrderNotFound(id) => ApiError::NotFound(format!("订单 {}", id)),
            EngineError::DuplicateOrder(id) => {
                ApiError::BusinessRuleViolation(format!("订单行重复: {}", id))
            }
            EngineError::InvalidTransition { from, to } => ApiError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            },
            EngineError::InvalidStage { .. } | EngineError::PendingNotFound(_) => {
                ApiError::InvalidInput(err.to_string())
            }
            EngineError::FileNotFound(_)
            | EngineError::UnsupportedFormat(_)
            | EngineError::CsvParse(_)
            | EngineError::ExcelParse(_) => ApiError::ImportError(err.to_string()),
            EngineError::Repository(e) => e.into(),
            EngineError::Config(msg) => ApiError::InternalError(format!("配置读取失败: {}", msg)),
            EngineError::Other(e) => ApiError::Other(e),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::OrderStatus;

    #[test]
    fn test_repository_error_conversion() {
        let repo_err = RepositoryError::NotFound {
            entity: "SizeVariant".to_string(),
            id: "D11/KHAKHI/XL".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("SizeVariant"));
                assert!(msg.contains("D11/KHAKHI/XL"));
            }
            _ => panic!("Expected NotFound"),
        }
    }

    #[test]
    fn test_engine_error_conversion() {
        let engine_err = EngineError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Dispatched,
        };
        let api_err: ApiError = engine_err.into();
        match api_err {
            ApiError::InvalidStateTransition { from, to } => {
                assert_eq!(from, "DELIVERED");
                assert_eq!(to, "DISPATCHED");
            }
            _ => panic!("Expected InvalidStateTransition"),
        }
    }
}
