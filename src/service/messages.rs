//! 消息流 / Message stream
//!
//! 发送是两步写：先追加消息，再更新会话摘要；两步之间崩溃会留下
//! “消息可见但摘要过期”的状态，属于可接受的暂时不一致，下次发送自愈
//! Send is a two-step write: append the message, then update the summary.
//! A crash in between leaves a visible message with a stale summary —
//! accepted staleness that heals on the next send

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::domain::account::{AccountType, CurrentUser};
use crate::domain::conversation::Conversation;
use crate::domain::message::{ChatMessage, DeliveryStatus};
use crate::error::CoreError;
use crate::storage::traits::{
    AvatarStore, ConversationStore, ConversationSummaryUpdate, MessageStore, StoreEvent,
};
use crate::subscription::{Feed, SubscriptionHandle};

/// 头像回填补丁：定点修补，绝不重排
/// Avatar backfill patch: targeted mutation, never a reorder
struct AvatarPatch {
    message_id: String,
    url: String,
}

pub struct MessageService {
    messages: Arc<dyn MessageStore>,
    conversations: Arc<dyn ConversationStore>,
    avatars: Arc<dyn AvatarStore>,
}

impl MessageService {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        conversations: Arc<dyn ConversationStore>,
        avatars: Arc<dyn AvatarStore>,
    ) -> Self {
        Self {
            messages,
            conversations,
            avatars,
        }
    }

    /// 发送消息 / Send a message
    ///
    /// 失败时调用方保留输入文本自行重试；这里不做自动重试
    /// On failure the caller keeps the input text for a manual retry; no
    /// automatic retry loop here
    pub async fn send(
        &self,
        auth: Option<&CurrentUser>,
        conversation: &Conversation,
        text: &str,
    ) -> Result<ChatMessage, CoreError> {
        let user = auth.ok_or(CoreError::NotAuthenticated)?;
        let body = text.trim();
        if body.is_empty() {
            return Err(CoreError::EmptyMessage);
        }

        let receiver_id = conversation
            .other_participant(&user.uid)
            .ok_or_else(|| {
                CoreError::NotFound(format!("会话中没有对端 / No peer in conversation {}", conversation.id))
            })?
            .to_string();
        let receiver_name = conversation
            .participant_names
            .get(&receiver_id)
            .cloned()
            .unwrap_or_else(|| "مستخدم".to_string());
        let receiver_type = conversation
            .participant_types
            .get(&receiver_id)
            .copied()
            .unwrap_or(AccountType::Player);

        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation.id.clone(),
            sender_id: user.uid.clone(),
            receiver_id: receiver_id.clone(),
            sender_name: user.display_name.clone(),
            receiver_name,
            sender_type: user.account_type,
            receiver_type,
            message: body.to_string(),
            timestamp: Utc::now(),
            is_read: false,
            message_type: "text".to_string(),
            sender_avatar: user.avatar.clone(),
            delivery_status: DeliveryStatus::Sent,
        };

        self.messages
            .append(&message)
            .await
            .map_err(|e| CoreError::SendFailed {
                reason: e.to_string(),
            })?;

        // 第二步写：摘要与接收方未读自增 / Second write: summary + receiver unread bump
        let update = ConversationSummaryUpdate {
            last_message: body.to_string(),
            last_message_time: message.timestamp,
            last_sender_id: user.uid.clone(),
            increment_unread_for: receiver_id,
        };
        self.conversations
            .apply_summary(&conversation.id, &update)
            .await
            .map_err(|e| CoreError::SendFailed {
                reason: e.to_string(),
            })?;

        tracing::info!("📤 消息已发送 / Message sent in {}", conversation.id);
        Ok(message)
    }

    /// 订阅某会话的消息快照（时间升序）/ Subscribe to snapshots, ascending by timestamp
    ///
    /// 缺少发送者头像且非本人发送的消息触发异步回填；回填永不阻塞消息展示
    /// Avatar-less messages not authored by the viewer trigger an async
    /// backfill that never blocks display
    pub async fn subscribe(
        &self,
        auth: Option<&CurrentUser>,
        conversation_id: &str,
    ) -> Result<Feed<Vec<ChatMessage>>, CoreError> {
        let user = auth.ok_or(CoreError::NotAuthenticated)?;
        let viewer_id = user.uid.clone();
        let conversation_id = conversation_id.to_string();

        let capacity = channel_capacity();
        let (sender, receiver) = broadcast::channel(capacity);
        let (handle, mut shutdown) = SubscriptionHandle::new();
        let (patch_tx, mut patch_rx) = mpsc::unbounded_channel::<AvatarPatch>();

        let messages = self.messages.clone();
        let avatars = self.avatars.clone();
        let mut changes = messages.changes();
        let pump_handle = handle.clone();

        tokio::spawn(async move {
            let mut current: Vec<ChatMessage> = Vec::new();
            let mut requested: HashSet<String> = HashSet::new();

            refresh(&messages, &conversation_id, &mut current).await;
            spawn_backfills(&current, &viewer_id, &avatars, &patch_tx, &mut requested);
            let _ = sender.send(current.clone());

            loop {
                tokio::select! {
                    event = changes.recv() => match event {
                        Ok(StoreEvent::Messages { conversation_id: changed })
                            if changed == conversation_id =>
                        {
                            refresh(&messages, &conversation_id, &mut current).await;
                            spawn_backfills(&current, &viewer_id, &avatars, &patch_tx, &mut requested);
                            let _ = sender.send(current.clone());
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            refresh(&messages, &conversation_id, &mut current).await;
                            spawn_backfills(&current, &viewer_id, &avatars, &patch_tx, &mut requested);
                            let _ = sender.send(current.clone());
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            pump_handle.mark_idle();
                            break;
                        }
                    },
                    Some(patch) = patch_rx.recv() => {
                        if let Some(slot) = current
                            .iter_mut()
                            .find(|m| m.id == patch.message_id && m.sender_avatar.is_none())
                        {
                            slot.sender_avatar = Some(patch.url);
                            let _ = sender.send(current.clone());
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("👋 消息订阅泵退出 / Message pump stopped for {}", conversation_id);
        });

        Ok(Feed::new(receiver, handle, None))
    }

    /// 清零查看者的未读计数并标记其收到的消息已读
    /// Zero the viewer's unread counter and mark their received messages read
    pub async fn mark_conversation_read(
        &self,
        auth: Option<&CurrentUser>,
        conversation_id: &str,
    ) -> Result<(), CoreError> {
        let user = auth.ok_or(CoreError::NotAuthenticated)?;
        self.messages
            .mark_read(conversation_id, &user.uid)
            .await
            .map_err(|e| CoreError::Store(format!("消息标记已读失败 / Mark-read failed: {}", e)))?;
        self.conversations
            .reset_unread(conversation_id, &user.uid)
            .await
            .map_err(|e| CoreError::Store(format!("未读计数清零失败 / Unread reset failed: {}", e)))?;
        Ok(())
    }
}

async fn refresh(
    store: &Arc<dyn MessageStore>,
    conversation_id: &str,
    current: &mut Vec<ChatMessage>,
) {
    match store.list_for_conversation(conversation_id).await {
        Ok(list) => *current = list,
        Err(e) => {
            tracing::error!("❌ 消息读取失败 / Message query failed for {}: {}", conversation_id, e)
        }
    }
}

fn spawn_backfills(
    current: &[ChatMessage],
    viewer_id: &str,
    avatars: &Arc<dyn AvatarStore>,
    patch_tx: &mpsc::UnboundedSender<AvatarPatch>,
    requested: &mut HashSet<String>,
) {
    for message in current {
        if message.sender_avatar.is_some()
            || message.sender_id == viewer_id
            || requested.contains(&message.id)
        {
            continue;
        }
        requested.insert(message.id.clone());

        let avatars = avatars.clone();
        let patch_tx = patch_tx.clone();
        let message_id = message.id.clone();
        let sender_id = message.sender_id.clone();
        let sender_type = message.sender_type;
        tokio::spawn(async move {
            match avatars.find_avatar(&sender_id, sender_type).await {
                Ok(Some(url)) => {
                    let _ = patch_tx.send(AvatarPatch { message_id, url });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!("头像回填失败 / Avatar backfill failed for {}: {}", sender_id, e)
                }
            }
        });
    }
}

fn channel_capacity() -> usize {
    crate::comm::config::get_global_config_manager()
        .ok()
        .map(|cm| cm.get_or("subscription.channel_capacity", 64_i64) as usize)
        .unwrap_or(64)
}
