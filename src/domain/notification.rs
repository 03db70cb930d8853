use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::account::AccountType;

/// 展示级通知类型 / Display-level notification type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

/// 交互动作类型 / Interaction action type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ProfileView,
    MessageSent,
    ConnectionRequest,
    Follow,
    Like,
    Comment,
}

impl ActionType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "profile_view" => Some(ActionType::ProfileView),
            "message_sent" => Some(ActionType::MessageSent),
            "connection_request" => Some(ActionType::ConnectionRequest),
            "follow" => Some(ActionType::Follow),
            "like" => Some(ActionType::Like),
            "comment" => Some(ActionType::Comment),
            _ => None,
        }
    }

    /// 动作到展示类型的固定映射表；未知动作一律归为 info
    /// Fixed action -> display-type table; unknown actions fall back to info
    pub fn display_kind(raw: &str) -> NotificationKind {
        match raw {
            "profile_view" => NotificationKind::Info,
            "message_sent" => NotificationKind::Success,
            "connection_request" => NotificationKind::Warning,
            _ => NotificationKind::Info,
        }
    }
}

/// 物理来源标记：合并视图靠它直接路由标记已读，而不是双源探测
/// Physical source tag: lets mark-read route directly instead of probing both sources
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSource {
    System,
    Interaction,
}

/// 系统通知行（notifications 集合，已经是展示类型）
/// System notification row (the notifications collection, already display-typed)
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemNotificationRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_account_type: Option<AccountType>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 交互通知行（interaction_notifications 集合）
/// Interaction notification row (the interaction_notifications collection)
///
/// 线上契约：动作字符串写在 `type` 字段；生产者写入非法动作时映射表兜底为 info
/// Wire contract: the raw action string lives in `type`; the mapping table
/// silently defaults foreign actions to info
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecord {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub action: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 合并后的统一通知视图 / Unified merged notification view
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_account_type: Option<AccountType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ActionType>,
    pub source: NotificationSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
