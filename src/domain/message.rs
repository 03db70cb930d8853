use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::account::AccountType;

/// 投递状态 / Delivery status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,
    Sent,
}

/// 会话消息 / Conversation message
///
/// 创建后不可变，只允许 isRead 更新与 senderAvatar 回填
/// Immutable once created except isRead updates and senderAvatar backfill
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    /// 必须指向同时包含收发双方的会话 / Must reference a conversation holding both parties
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub sender_name: String,
    pub receiver_name: String,
    pub sender_type: AccountType,
    pub receiver_type: AccountType,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
    /// 目前固定为 "text" / Fixed to "text" for now
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_avatar: Option<String>,
    pub delivery_status: DeliveryStatus,
}
