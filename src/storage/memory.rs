//! 内存文档存储 / In-memory document store
//!
//! 四个集合：conversations、messages、notifications、interaction_notifications；
//! 每次写入都会广播变更事件，订阅泵据此重建快照
//! Four collections; every write broadcasts a change event the subscription
//! pumps use to rebuild their snapshots

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use tokio::sync::broadcast;

use crate::domain::account::{AccountRecord, AccountType};
use crate::domain::conversation::Conversation;
use crate::domain::message::ChatMessage;
use crate::domain::notification::{InteractionRecord, SystemNotificationRecord};

use super::traits::{
    AvatarStore, ConversationStore, ConversationSummaryUpdate, MessageStore, NotificationStore,
    ProfileSource, StoreEvent, AVATAR_PROBE_EXTENSIONS,
};

fn channel_capacity() -> usize {
    crate::comm::config::get_global_config_manager()
        .ok()
        .map(|cm| cm.get_or("subscription.channel_capacity", 64_i64) as usize)
        .unwrap_or(64)
}

pub struct MemoryStore {
    conversations: DashMap<String, Conversation>,
    messages: DashMap<String, ChatMessage>,
    system_notifications: DashMap<String, SystemNotificationRecord>,
    interaction_notifications: DashMap<String, InteractionRecord>,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(channel_capacity());
        Self {
            conversations: DashMap::new(),
            messages: DashMap::new(),
            system_notifications: DashMap::new(),
            interaction_notifications: DashMap::new(),
            events,
        }
    }

    fn emit(&self, event: StoreEvent) {
        // 没有订阅者时发送失败是正常情况 / A send with no receivers is fine
        let _ = self.events.send(event);
    }

    /// 系统通知种子写入（通知由核心之外的生产者创建）
    /// Seed a system notification (producers live outside the core)
    pub fn insert_system_notification(&self, record: SystemNotificationRecord) {
        self.system_notifications.insert(record.id.clone(), record);
        self.emit(StoreEvent::SystemNotifications);
    }

    /// 交互通知种子写入 / Seed an interaction notification
    pub fn insert_interaction_notification(&self, record: InteractionRecord) {
        self.interaction_notifications
            .insert(record.id.clone(), record);
        self.emit(StoreEvent::InteractionNotifications);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn upsert(&self, conversation: &Conversation) -> Result<()> {
        self.conversations
            .insert(conversation.id.clone(), conversation.clone());
        self.emit(StoreEvent::Conversations);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.conversations.get(id).map(|entry| entry.value().clone()))
    }

    async fn list_for_participant(&self, uid: &str) -> Result<Vec<Conversation>> {
        Ok(self
            .conversations
            .iter()
            .filter(|entry| entry.value().includes(uid))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn apply_summary(&self, id: &str, update: &ConversationSummaryUpdate) -> Result<()> {
        let mut conversation = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| anyhow!("会话不存在: {}", id))?;
        conversation.last_message = update.last_message.clone();
        conversation.last_message_time = Some(update.last_message_time);
        conversation.last_sender_id = update.last_sender_id.clone();
        conversation.updated_at = update.last_message_time;
        *conversation
            .unread_count
            .entry(update.increment_unread_for.clone())
            .or_insert(0) += 1;
        drop(conversation);
        self.emit(StoreEvent::Conversations);
        Ok(())
    }

    async fn set_participant_names(&self, id: &str, names: &HashMap<String, String>) -> Result<()> {
        let mut conversation = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| anyhow!("会话不存在: {}", id))?;
        for (uid, name) in names {
            conversation
                .participant_names
                .insert(uid.clone(), name.clone());
        }
        conversation.updated_at = Utc::now();
        drop(conversation);
        self.emit(StoreEvent::Conversations);
        Ok(())
    }

    async fn reset_unread(&self, id: &str, uid: &str) -> Result<()> {
        let mut conversation = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| anyhow!("会话不存在: {}", id))?;
        conversation.unread_count.insert(uid.to_string(), 0);
        drop(conversation);
        self.emit(StoreEvent::Conversations);
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: &ChatMessage) -> Result<()> {
        self.messages.insert(message.id.clone(), message.clone());
        self.emit(StoreEvent::Messages {
            conversation_id: message.conversation_id.clone(),
        });
        Ok(())
    }

    async fn list_for_conversation(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
        let mut list: Vec<ChatMessage> = self
            .messages
            .iter()
            .filter(|entry| entry.value().conversation_id == conversation_id)
            .map(|entry| entry.value().clone())
            .collect();
        list.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(list)
    }

    async fn mark_read(&self, conversation_id: &str, receiver_id: &str) -> Result<usize> {
        let mut updated = 0usize;
        for mut entry in self.messages.iter_mut() {
            let message = entry.value_mut();
            if message.conversation_id == conversation_id
                && message.receiver_id == receiver_id
                && !message.is_read
            {
                message.is_read = true;
                updated += 1;
            }
        }
        if updated > 0 {
            self.emit(StoreEvent::Messages {
                conversation_id: conversation_id.to_string(),
            });
        }
        Ok(updated)
    }

    fn changes(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn list_system(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<SystemNotificationRecord>> {
        let mut list: Vec<SystemNotificationRecord> = self
            .system_notifications
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list.truncate(limit);
        Ok(list)
    }

    async fn list_interaction(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<InteractionRecord>> {
        let mut list: Vec<InteractionRecord> = self
            .interaction_notifications
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list.truncate(limit);
        Ok(list)
    }

    async fn mark_system_read(&self, id: &str) -> Result<()> {
        let mut record = self
            .system_notifications
            .get_mut(id)
            .ok_or_else(|| anyhow!("系统通知不存在: {}", id))?;
        record.is_read = true;
        record.updated_at = Utc::now();
        drop(record);
        self.emit(StoreEvent::SystemNotifications);
        Ok(())
    }

    async fn mark_interaction_read(&self, id: &str) -> Result<()> {
        let mut record = self
            .interaction_notifications
            .get_mut(id)
            .ok_or_else(|| anyhow!("交互通知不存在: {}", id))?;
        record.is_read = true;
        drop(record);
        self.emit(StoreEvent::InteractionNotifications);
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

/// 内存身份数据源 / In-memory identity source
pub struct MemoryProfileSource {
    accounts: DashMap<String, AccountRecord>,
    /// 档案键 "{account_type}:{account_id}" / Profile key "{account_type}:{account_id}"
    profiles: DashMap<String, serde_json::Value>,
}

impl MemoryProfileSource {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            profiles: DashMap::new(),
        }
    }

    fn profile_key(account_type: AccountType, account_id: &str) -> String {
        format!("{}:{}", account_type.as_str(), account_id)
    }

    pub fn put_account(&self, record: AccountRecord) {
        self.accounts.insert(record.id.clone(), record);
    }

    pub fn put_profile(
        &self,
        account_type: AccountType,
        account_id: &str,
        profile: serde_json::Value,
    ) {
        self.profiles
            .insert(Self::profile_key(account_type, account_id), profile);
    }
}

impl Default for MemoryProfileSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileSource for MemoryProfileSource {
    async fn get_profile(
        &self,
        account_type: AccountType,
        account_id: &str,
    ) -> Result<Option<serde_json::Value>> {
        Ok(self
            .profiles
            .get(&Self::profile_key(account_type, account_id))
            .map(|entry| entry.value().clone()))
    }

    async fn get_raw_account(&self, account_id: &str) -> Result<Option<AccountRecord>> {
        Ok(self.accounts.get(account_id).map(|entry| entry.value().clone()))
    }

    async fn list_accounts(&self, limit: usize) -> Result<Vec<AccountRecord>> {
        Ok(self
            .accounts
            .iter()
            .take(limit)
            .map(|entry| entry.value().clone())
            .collect())
    }
}

/// 内存头像存储，按 "{account_id}.{ext}" 文件名存放
/// In-memory avatar storage keyed by "{account_id}.{ext}" file names
pub struct MemoryAvatarStore {
    files: DashMap<String, String>,
}

impl MemoryAvatarStore {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
        }
    }

    pub fn put_file(&self, file_name: &str, url: &str) {
        self.files.insert(file_name.to_string(), url.to_string());
    }
}

impl Default for MemoryAvatarStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AvatarStore for MemoryAvatarStore {
    async fn find_avatar(
        &self,
        account_id: &str,
        _account_type: AccountType,
    ) -> Result<Option<String>> {
        for ext in AVATAR_PROBE_EXTENSIONS {
            let file_name = format!("{}.{}", account_id, ext);
            if let Some(url) = self.files.get(&file_name) {
                return Ok(Some(url.value().clone()));
            }
        }
        Ok(None)
    }
}
