//! 通知聚合 / Notification aggregation
//!
//! 两个物理独立的集合（系统通知、交互通知）合并成一条按 createdAt 降序的
//! 统一信息流；任一来源失败只影响该来源，信息流继续用健康的一侧渲染
//! Two physically distinct collections (system + interaction) merge into one
//! createdAt-descending feed; a failing source degrades itself only, the
//! feed keeps rendering from the healthy one

use dashmap::DashMap;
use futures_util::future::{join_all, BoxFuture};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::domain::account::CurrentUser;
use crate::domain::notification::{
    ActionType, InteractionRecord, Notification, NotificationKind, NotificationSource,
    SystemNotificationRecord,
};
use crate::error::CoreError;
use crate::service::identity::IdentityResolver;
use crate::storage::traits::{NotificationStore, StoreEvent};
use crate::subscription::{Feed, SubscriptionHandle};

/// 合并快照：每个来源的健康状况独立上报
/// Merged snapshot with independently reported per-source health
#[derive(Clone, Debug, Default)]
pub struct NotificationSnapshot {
    pub items: Vec<Notification>,
    pub system_error: Option<String>,
    pub interaction_error: Option<String>,
}

/// 读取状态过滤 / Read-state filter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadState {
    Read,
    Unread,
}

/// 过滤选项；全部条件为与关系 / Filter options; conditions combine with AND
#[derive(Clone, Debug, Default)]
pub struct FilterOptions {
    pub search_term: Option<String>,
    pub kind: Option<NotificationKind>,
    pub read_state: Option<ReadState>,
    pub action_type: Option<ActionType>,
}

/// 仪表盘统计 / Dashboard statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NotificationStats {
    pub total: usize,
    pub unread: usize,
    pub warnings: usize,
    pub errors: usize,
    pub profile_views: usize,
    pub messages: usize,
    pub connections: usize,
}

struct SharedFeed {
    sender: broadcast::Sender<NotificationSnapshot>,
    handle: SubscriptionHandle,
    latest: Arc<RwLock<Option<NotificationSnapshot>>>,
}

pub struct NotificationCenter {
    store: Arc<dyn NotificationStore>,
    resolver: Arc<IdentityResolver>,
    feeds: DashMap<String, Arc<SharedFeed>>,
    /// 合并视图的 ID→来源 索引；标记已读靠它直接路由
    /// id -> source index over the merged view for direct mark-read routing
    source_index: Arc<DashMap<String, NotificationSource>>,
}

impl NotificationCenter {
    pub fn new(store: Arc<dyn NotificationStore>, resolver: Arc<IdentityResolver>) -> Self {
        Self {
            store,
            resolver,
            feeds: DashMap::new(),
            source_index: Arc::new(DashMap::new()),
        }
    }

    /// 订阅合并信息流 / Subscribe to the merged feed
    pub async fn subscribe(
        &self,
        auth: Option<&CurrentUser>,
    ) -> Result<Feed<NotificationSnapshot>, CoreError> {
        let user = auth.ok_or(CoreError::NotAuthenticated)?;

        if let Some(shared) = self.feeds.get(&user.uid) {
            if shared.handle.is_active() {
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
        let latest: Arc<RwLock<Option<NotificationSnapshot>>> = Arc::new(RwLock::new(None));
        self.feeds.insert(
            user.uid.clone(),
            Arc::new(SharedFeed {
                sender: sender.clone(),
                handle: handle.clone(),
                latest: latest.clone(),
            }),
        );

        let store = self.store.clone();
        let resolver = self.resolver.clone();
        let index = self.source_index.clone();
        let uid = user.uid.clone();
        let mut changes = store.changes();
        let pump_handle = handle.clone();
        tokio::spawn(async move {
            emit_merged(&store, &resolver, &index, &uid, &sender, &latest).await;
            loop {
                tokio::select! {
                    event = changes.recv() => match event {
                        Ok(StoreEvent::SystemNotifications)
                        | Ok(StoreEvent::InteractionNotifications) => {
                            emit_merged(&store, &resolver, &index, &uid, &sender, &latest).await;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            emit_merged(&store, &resolver, &index, &uid, &sender, &latest).await;
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
            tracing::debug!("👋 通知订阅泵退出 / Notification pump stopped for {}", uid);
        });

        Ok(Feed::new(receiver, handle, None))
    }

    /// 标记单条已读 / Mark one item read
    ///
    /// 已知ID按来源标记直接路由；合并视图之外的ID退回“先系统后交互”的双源探测
    /// Known ids route directly by source tag; ids foreign to the merged view
    /// fall back to system-then-interaction probing
    pub async fn mark_as_read(&self, auth: Option<&CurrentUser>, id: &str) -> Result<(), CoreError> {
        auth.ok_or(CoreError::NotAuthenticated)?;

        let source = self.source_index.get(id).map(|entry| *entry.value());
        match source {
            Some(NotificationSource::System) => self
                .store
                .mark_system_read(id)
                .await
                .map_err(|e| CoreError::Store(e.to_string()))?,
            Some(NotificationSource::Interaction) => self
                .store
                .mark_interaction_read(id)
                .await
                .map_err(|e| CoreError::Store(e.to_string()))?,
            None => {
                if let Err(first) = self.store.mark_system_read(id).await {
                    self.store.mark_interaction_read(id).await.map_err(|second| {
                        CoreError::NotFound(format!(
                            "通知不存在 / Notification {} not found ({}; {})",
                            id, first, second
                        ))
                    })?;
                }
            }
        }
        Ok(())
    }

    /// 全部标记已读：合并视图中所有未读项并行处理，返回成功条数
    /// Mark everything read: all unread merged items in parallel, returns the
    /// success count
    pub async fn mark_all_as_read(&self, auth: Option<&CurrentUser>) -> Result<usize, CoreError> {
        let user = auth.ok_or(CoreError::NotAuthenticated)?;
        let limit = source_limit();

        let system = self
            .store
            .list_system(&user.uid, limit)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("⚠️ 系统通知读取失败 / System source failed: {}", e);
                Vec::new()
            });
        let interaction = self
            .store
            .list_interaction(&user.uid, limit)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("⚠️ 交互通知读取失败 / Interaction source failed: {}", e);
                Vec::new()
            });

        let mut tasks: Vec<BoxFuture<'static, anyhow::Result<()>>> = Vec::new();
        for record in system.into_iter().filter(|record| !record.is_read) {
            let store = self.store.clone();
            tasks.push(Box::pin(
                async move { store.mark_system_read(&record.id).await },
            ));
        }
        for record in interaction.into_iter().filter(|record| !record.is_read) {
            let store = self.store.clone();
            tasks.push(Box::pin(async move {
                store.mark_interaction_read(&record.id).await
            }));
        }

        let mut updated = 0usize;
        for result in join_all(tasks).await {
            match result {
                Ok(()) => updated += 1,
                Err(e) => tracing::warn!("⚠️ 标记已读失败 / Mark-read failed: {}", e),
            }
        }
        Ok(updated)
    }

    /// 停止某用户的通知订阅 / Stop the user's notification feed
    pub fn stop_feed(&self, uid: &str) {
        if let Some((_, shared)) = self.feeds.remove(uid) {
            shared.handle.stop();
        }
    }
}

async fn emit_merged(
    store: &Arc<dyn NotificationStore>,
    resolver: &Arc<IdentityResolver>,
    index: &Arc<DashMap<String, NotificationSource>>,
    uid: &str,
    sender: &broadcast::Sender<NotificationSnapshot>,
    latest: &Arc<RwLock<Option<NotificationSnapshot>>>,
) {
    let limit = source_limit();
    let mut snapshot = NotificationSnapshot::default();

    match store.list_system(uid, limit).await {
        Ok(rows) => snapshot.items.extend(rows.into_iter().map(from_system)),
        Err(e) => {
            tracing::error!("❌ 系统通知读取失败 / System source failed for {}: {}", uid, e);
            snapshot.system_error = Some(e.to_string());
        }
    }

    match store.list_interaction(uid, limit).await {
        Ok(rows) => {
            for row in rows {
                snapshot.items.push(normalize_interaction(row, resolver).await);
            }
        }
        Err(e) => {
            tracing::error!("❌ 交互通知读取失败 / Interaction source failed for {}: {}", uid, e);
            snapshot.interaction_error = Some(e.to_string());
        }
    }

    // 稳定排序，createdAt 降序 / Stable sort, createdAt descending
    snapshot.items.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    for item in &snapshot.items {
        index.insert(item.id.clone(), item.source);
    }
    *latest.write() = Some(snapshot.clone());
    let _ = sender.send(snapshot);
}

/// 系统行直接映射 / System rows map directly
fn from_system(row: SystemNotificationRecord) -> Notification {
    Notification {
        id: row.id,
        user_id: row.user_id,
        title: row.title,
        message: row.message,
        kind: row.kind,
        is_read: row.is_read,
        link: row.link,
        metadata: row.metadata,
        sender_id: row.sender_id,
        sender_name: row.sender_name,
        sender_avatar: row.sender_avatar,
        sender_account_type: row.sender_account_type,
        action_type: None,
        source: NotificationSource::System,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// 交互行归一化：动作映射表 + 发送者身份增强
/// Normalize an interaction row: action mapping table + sender enrichment
async fn normalize_interaction(row: InteractionRecord, resolver: &IdentityResolver) -> Notification {
    let metadata = serde_json::to_value(&row).ok();
    let sender = match row.viewer_id.as_deref().or(row.sender_id.as_deref()) {
        Some(sender_id) => resolver.resolve_sender(sender_id).await,
        None => None,
    };

    Notification {
        id: row.id,
        user_id: row.user_id,
        title: row.title.unwrap_or_else(|| "إشعار تفاعلي".to_string()),
        message: row.message.unwrap_or_else(|| "لا توجد تفاصيل".to_string()),
        kind: ActionType::display_kind(&row.action),
        is_read: row.is_read,
        link: row.action_url,
        metadata,
        sender_id: sender.as_ref().map(|s| s.sender_id.clone()),
        sender_name: sender.as_ref().map(|s| s.sender_name.clone()),
        sender_avatar: sender.as_ref().and_then(|s| s.sender_avatar.clone()),
        sender_account_type: sender.as_ref().and_then(|s| s.sender_account_type),
        action_type: ActionType::parse(&row.action),
        source: NotificationSource::Interaction,
        created_at: row.created_at,
        updated_at: row.created_at,
    }
}

/// 纯函数过滤：searchTerm 对标题、正文与发送者名大小写不敏感匹配
/// Pure filter: searchTerm matches title, message and sender name
/// case-insensitively
pub fn filter_feed(items: &[Notification], options: &FilterOptions) -> Vec<Notification> {
    items
        .iter()
        .filter(|n| {
            if let Some(term) = &options.search_term {
                let term = term.trim().to_lowercase();
                if !term.is_empty() {
                    let hit = n.title.to_lowercase().contains(&term)
                        || n.message.to_lowercase().contains(&term)
                        || n.sender_name
                            .as_deref()
                            .map(|name| name.to_lowercase().contains(&term))
                            .unwrap_or(false);
                    if !hit {
                        return false;
                    }
                }
            }
            if let Some(kind) = options.kind {
                if n.kind != kind {
                    return false;
                }
            }
            match options.read_state {
                Some(ReadState::Read) if !n.is_read => return false,
                Some(ReadState::Unread) if n.is_read => return false,
                _ => {}
            }
            if let Some(action) = options.action_type {
                if n.action_type != Some(action) {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect()
}

/// 纯函数聚合统计 / Pure aggregation for the dashboard
pub fn compute_stats(items: &[Notification]) -> NotificationStats {
    NotificationStats {
        total: items.len(),
        unread: items.iter().filter(|n| !n.is_read).count(),
        warnings: items
            .iter()
            .filter(|n| n.kind == NotificationKind::Warning)
            .count(),
        errors: items
            .iter()
            .filter(|n| n.kind == NotificationKind::Error)
            .count(),
        profile_views: items
            .iter()
            .filter(|n| n.action_type == Some(ActionType::ProfileView))
            .count(),
        messages: items
            .iter()
            .filter(|n| n.action_type == Some(ActionType::MessageSent))
            .count(),
        connections: items
            .iter()
            .filter(|n| n.action_type == Some(ActionType::ConnectionRequest))
            .count(),
    }
}

fn source_limit() -> usize {
    crate::comm::config::get_global_config_manager()
        .ok()
        .map(|cm| cm.get_or("feed.source_limit", 100_i64) as usize)
        .unwrap_or(100)
}

fn channel_capacity() -> usize {
    crate::comm::config::get_global_config_manager()
        .ok()
        .map(|cm| cm.get_or("subscription.channel_capacity", 64_i64) as usize)
        .unwrap_or(64)
}
