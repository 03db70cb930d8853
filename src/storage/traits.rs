use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::broadcast;

use crate::domain::account::{AccountRecord, AccountType};
use crate::domain::conversation::Conversation;
use crate::domain::message::ChatMessage;
use crate::domain::notification::{InteractionRecord, SystemNotificationRecord};

/// 存储变更事件，驱动快照重建 / Store change events driving snapshot rebuilds
#[derive(Clone, Debug)]
pub enum StoreEvent {
    Conversations,
    Messages { conversation_id: String },
    SystemNotifications,
    InteractionNotifications,
}

/// 会话摘要更新，随每次发送写入 / Conversation summary update, written on every send
#[derive(Clone, Debug)]
pub struct ConversationSummaryUpdate {
    pub last_message: String,
    pub last_message_time: DateTime<Utc>,
    pub last_sender_id: String,
    /// 未读计数自增的参与者（接收方）/ Participant whose unread counter bumps (the receiver)
    pub increment_unread_for: String,
}

/// 会话存储 / Conversation store
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// 按确定性ID幂等写入 / Idempotent upsert keyed by the deterministic id
    async fn upsert(&self, conversation: &Conversation) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Conversation>>;
    /// 无序返回；排序由消费端完成，避免依赖复合索引
    /// Unordered; consumers sort client-side to avoid a composite index
    async fn list_for_participant(&self, uid: &str) -> Result<Vec<Conversation>>;
    async fn apply_summary(&self, id: &str, update: &ConversationSummaryUpdate) -> Result<()>;
    async fn set_participant_names(&self, id: &str, names: &HashMap<String, String>) -> Result<()>;
    async fn reset_unread(&self, id: &str, uid: &str) -> Result<()>;
    fn changes(&self) -> broadcast::Receiver<StoreEvent>;
}

/// 消息存储 / Message store
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: &ChatMessage) -> Result<()>;
    /// 按时间戳升序 / Ascending by timestamp
    async fn list_for_conversation(&self, conversation_id: &str) -> Result<Vec<ChatMessage>>;
    /// 将会话内发给 receiver_id 的消息标记已读，返回条数
    /// Mark the receiver's messages in the conversation read, returns the count
    async fn mark_read(&self, conversation_id: &str, receiver_id: &str) -> Result<usize>;
    fn changes(&self) -> broadcast::Receiver<StoreEvent>;
}

/// 通知存储：两个物理独立的集合 / Notification store: two physically distinct collections
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn list_system(&self, user_id: &str, limit: usize)
        -> Result<Vec<SystemNotificationRecord>>;
    async fn list_interaction(&self, user_id: &str, limit: usize)
        -> Result<Vec<InteractionRecord>>;
    /// 未知ID必须报错；调用方依赖它做双源探测
    /// Must fail on unknown ids; callers rely on that for two-source probing
    async fn mark_system_read(&self, id: &str) -> Result<()>;
    async fn mark_interaction_read(&self, id: &str) -> Result<()>;
    fn changes(&self) -> broadcast::Receiver<StoreEvent>;
}

/// 身份数据源（外部协作方）/ Identity source (external collaborator)
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// 类型专属档案文档 / The type-specific profile document
    async fn get_profile(
        &self,
        account_type: AccountType,
        account_id: &str,
    ) -> Result<Option<serde_json::Value>>;
    async fn get_raw_account(&self, account_id: &str) -> Result<Option<AccountRecord>>;
    /// 扫描至多 limit 条账户；底层不分页 / Scan up to limit accounts; no pagination underneath
    async fn list_accounts(&self, limit: usize) -> Result<Vec<AccountRecord>>;
}

/// 头像存储查询（外部协作方）/ Avatar storage lookup (external collaborator)
#[async_trait]
pub trait AvatarStore: Send + Sync {
    async fn find_avatar(
        &self,
        account_id: &str,
        account_type: AccountType,
    ) -> Result<Option<String>>;
}

/// 头像文件探测的扩展名顺序 / Extension probe order for avatar files
pub const AVATAR_PROBE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];
