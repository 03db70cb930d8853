//! 会话服务 / Conversation service
//!
//! 会话列表是长驻订阅而不是一次性调用；底层存储不保证顺序，
//! 排序在消费端按 updatedAt 降序完成，避免依赖复合索引
//! The conversation list is a standing subscription, not a one-shot call;
//! the store guarantees no order, so sorting happens client-side by
//! updatedAt desc to avoid a composite index

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::domain::account::CurrentUser;
use crate::domain::contact::Contact;
use crate::domain::conversation::Conversation;
use crate::domain::message::ChatMessage;
use crate::error::CoreError;
use crate::service::messages::MessageService;
use crate::storage::traits::{ConversationStore, StoreEvent};
use crate::subscription::{Feed, SubscriptionHandle};

/// 每用户一个泵的共享状态 / Shared per-user pump state
struct SharedFeed {
    sender: broadcast::Sender<Vec<Conversation>>,
    handle: SubscriptionHandle,
    latest: Arc<RwLock<Option<Vec<Conversation>>>>,
}

/// 本地激活会话（纯客户端概念，同一时刻至多一个）
/// Locally active conversation (client-only; at most one at a time)
struct ActiveConversation {
    conversation_id: String,
    feed_handle: SubscriptionHandle,
}

pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
    feeds: DashMap<String, Arc<SharedFeed>>,
    active: Mutex<Option<ActiveConversation>>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self {
            store,
            feeds: DashMap::new(),
            active: Mutex::new(None),
        }
    }

    /// 订阅会话列表快照 / Subscribe to conversation-list snapshots
    ///
    /// 同一用户已有活跃订阅时不再起第二个泵，而是挂到现有泵上——
    /// 门闩保证重入是空操作
    /// While a pump is live for the user, a re-entrant subscribe attaches to
    /// it instead of starting a second one — the latch makes re-entry a no-op
    pub async fn subscribe(
        &self,
        auth: Option<&CurrentUser>,
    ) -> Result<Feed<Vec<Conversation>>, CoreError> {
        let user = auth.ok_or(CoreError::NotAuthenticated)?;

        if let Some(shared) = self.feeds.get(&user.uid) {
            if shared.handle.is_active() {
                tracing::debug!(
                    "会话订阅已活跃，复用现有泵 / Conversation feed already active for {}, attaching",
                    user.uid
                );
                let pending = shared.latest.read().clone();
                return Ok(Feed::new(
                    shared.sender.subscribe(),
                    shared.handle.clone(),
                    pending,
                ));
            }
        }

        let (sender, receiver) = broadcast::channel(channel_capacity());
        let (handle, mut shutdown) = SubscriptionHandle::new();
        let latest: Arc<RwLock<Option<Vec<Conversation>>>> = Arc::new(RwLock::new(None));
        self.feeds.insert(
            user.uid.clone(),
            Arc::new(SharedFeed {
                sender: sender.clone(),
                handle: handle.clone(),
                latest: latest.clone(),
            }),
        );

        let store = self.store.clone();
        let uid = user.uid.clone();
        let mut changes = store.changes();
        let pump_handle = handle.clone();
        tokio::spawn(async move {
            emit_snapshot(&store, &uid, &sender, &latest).await;
            loop {
                tokio::select! {
                    event = changes.recv() => match event {
                        Ok(StoreEvent::Conversations) => {
                            emit_snapshot(&store, &uid, &sender, &latest).await;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            emit_snapshot(&store, &uid, &sender, &latest).await;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            pump_handle.mark_idle();
                            break;
                        }
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("👋 会话订阅泵退出 / Conversation pump stopped for {}", uid);
        });

        Ok(Feed::new(receiver, handle, None))
    }

    /// 幂等建立会话：有则复用（先到先得），无则按确定性ID写入
    /// Idempotent ensure: reuse when present (first-found-wins), else upsert
    /// under the deterministic pair id
    pub async fn ensure_conversation(
        &self,
        auth: Option<&CurrentUser>,
        contact: &Contact,
    ) -> Result<Conversation, CoreError> {
        let user = auth.ok_or(CoreError::NotAuthenticated)?;

        let existing = self
            .store
            .list_for_participant(&user.uid)
            .await
            .map_err(|e| CoreError::Store(format!("会话扫描失败 / Conversation scan failed: {}", e)))?;
        if let Some(found) = existing
            .into_iter()
            .find(|conversation| conversation.includes(&contact.account_id))
        {
            // 复用时刷新参与者名称 / Refresh participant names on reuse
            let mut names = HashMap::new();
            names.insert(user.uid.clone(), user.display_name.clone());
            names.insert(contact.account_id.clone(), contact.display_name.clone());
            if let Err(e) = self.store.set_participant_names(&found.id, &names).await {
                tracing::warn!(
                    "⚠️ 参与者名称刷新失败 / Participant name refresh failed for {}: {}",
                    found.id,
                    e
                );
            }
            tracing::info!("✅ 复用现有会话 / Reusing conversation {}", found.id);
            return Ok(found);
        }

        let now = Utc::now();
        let conversation = Conversation {
            id: Conversation::pair_id(&user.uid, &contact.account_id),
            participants: vec![user.uid.clone(), contact.account_id.clone()],
            participant_names: HashMap::from([
                (user.uid.clone(), user.display_name.clone()),
                (contact.account_id.clone(), contact.display_name.clone()),
            ]),
            participant_types: HashMap::from([
                (user.uid.clone(), user.account_type),
                (contact.account_id.clone(), contact.account_type),
            ]),
            participant_avatars: HashMap::from([
                (user.uid.clone(), user.avatar.clone()),
                (contact.account_id.clone(), contact.avatar_url.clone()),
            ]),
            subject: format!("محادثة مع {}", contact.display_name),
            last_message: String::new(),
            last_message_time: None,
            last_sender_id: String::new(),
            unread_count: HashMap::from([
                (user.uid.clone(), 0),
                (contact.account_id.clone(), 0),
            ]),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.store
            .upsert(&conversation)
            .await
            .map_err(|e| CoreError::Store(format!("会话创建失败 / Conversation create failed: {}", e)))?;
        tracing::info!("✅ 新会话已创建 / Conversation created: {}", conversation.id);
        Ok(conversation)
    }

    /// 打开会话：标记本地激活并委托消息订阅；打开新的会停掉上一个
    /// Open: mark locally active and delegate to the message feed; opening a
    /// new one deactivates (and stops) the previous
    pub async fn open_conversation(
        &self,
        auth: Option<&CurrentUser>,
        messages: &MessageService,
        conversation: &Conversation,
    ) -> Result<Feed<Vec<ChatMessage>>, CoreError> {
        auth.ok_or(CoreError::NotAuthenticated)?;

        let feed = messages.subscribe(auth, &conversation.id).await?;
        {
            let mut active = self.active.lock();
            if let Some(previous) = active.take() {
                previous.feed_handle.stop();
            }
            *active = Some(ActiveConversation {
                conversation_id: conversation.id.clone(),
                feed_handle: feed.handle(),
            });
        }
        // 打开即清零本人未读 / Opening zeroes the viewer's unread counter
        messages
            .mark_conversation_read(auth, &conversation.id)
            .await?;
        Ok(feed)
    }

    /// 当前激活会话ID / Currently active conversation id
    pub fn active_conversation(&self) -> Option<String> {
        self.active
            .lock()
            .as_ref()
            .map(|active| active.conversation_id.clone())
    }

    /// 关闭当前会话并停掉其消息订阅 / Close the active conversation and stop its feed
    pub fn close_conversation(&self) {
        if let Some(previous) = self.active.lock().take() {
            previous.feed_handle.stop();
        }
    }

    /// 停止某用户的会话列表订阅（界面销毁/登出时调用）
    /// Stop the user's conversation-list feed (screen teardown / logout)
    pub fn stop_feed(&self, uid: &str) {
        if let Some((_, shared)) = self.feeds.remove(uid) {
            shared.handle.stop();
        }
    }
}

async fn emit_snapshot(
    store: &Arc<dyn ConversationStore>,
    uid: &str,
    sender: &broadcast::Sender<Vec<Conversation>>,
    latest: &Arc<RwLock<Option<Vec<Conversation>>>>,
) {
    match store.list_for_participant(uid).await {
        Ok(mut conversations) => {
            conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            *latest.write() = Some(conversations.clone());
            let _ = sender.send(conversations);
        }
        Err(e) => {
            tracing::error!("❌ 会话列表读取失败 / Conversation query failed for {}: {}", uid, e)
        }
    }
}

fn channel_capacity() -> usize {
    crate::comm::config::get_global_config_manager()
        .ok()
        .map(|cm| cm.get_or("subscription.channel_capacity", 64_i64) as usize)
        .unwrap_or(64)
}
