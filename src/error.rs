use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// 核心库统一错误类型 / Unified core-library error type
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("未登录: 缺少当前用户身份")]
    NotAuthenticated,
    #[error("存储错误: {0}")]
    Store(String),
    #[error("发送失败: {reason}")]
    SendFailed { reason: String },
    #[error("订阅已关闭")]
    SubscriptionClosed,
    #[error("未找到记录: {0}")]
    NotFound(String),
    #[error("消息内容为空")]
    EmptyMessage,
    #[error("序列化错误: {0}")]
    Serde(#[from] serde_json::Error),
}

// 保留统一错误描述函数，避免在各层重复构建错误字符串

/// 获取详细错误描述（中英文） / Get detailed error description (CN/EN)
pub fn describe_error(e: &CoreError) -> String {
    match e {
        CoreError::NotAuthenticated => "未登录 / Not authenticated".to_string(),
        CoreError::Store(msg) => format!("存储错误 / Store error: {}", msg),
        CoreError::SendFailed { reason } => format!("发送失败 / Send failed: {}", reason),
        CoreError::SubscriptionClosed => "订阅已关闭 / Subscription closed".to_string(),
        CoreError::NotFound(what) => format!("未找到记录 / Record not found: {}", what),
        CoreError::EmptyMessage => "消息内容为空 / Message body is empty".to_string(),
        CoreError::Serde(msg) => format!("序列化错误 / Serialization error: {}", msg),
    }
}
