//! 通知聚合集成测试 / Notification aggregation integration tests

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

use talent_connect_im::service::{
    compute_stats, filter_feed, FilterOptions, IdentityResolver, NotificationCenter,
};
use talent_connect_im::storage::{
    MemoryAvatarStore, MemoryProfileSource, MemoryStore, NotificationStore, StoreEvent,
};
use talent_connect_im::{
    AccountRecord, AccountType, ActionType, CoreError, CurrentUser, InteractionRecord,
    NotificationKind, NotificationSource, SystemNotificationRecord,
};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
}

fn player_user(uid: &str) -> CurrentUser {
    CurrentUser {
        uid: uid.to_string(),
        account_type: AccountType::Player,
        display_name: "أحمد صلاح".to_string(),
        avatar: None,
    }
}

fn system_row(
    id: &str,
    user_id: &str,
    title: &str,
    kind: NotificationKind,
    created_at: DateTime<Utc>,
) -> SystemNotificationRecord {
    SystemNotificationRecord {
        id: id.to_string(),
        user_id: user_id.to_string(),
        title: title.to_string(),
        message: "تفاصيل الإشعار".to_string(),
        kind,
        is_read: false,
        link: None,
        metadata: None,
        sender_id: None,
        sender_name: None,
        sender_avatar: None,
        sender_account_type: None,
        created_at,
        updated_at: created_at,
    }
}

fn interaction_row(
    id: &str,
    user_id: &str,
    action: &str,
    viewer_id: Option<&str>,
    created_at: DateTime<Utc>,
) -> InteractionRecord {
    InteractionRecord {
        id: id.to_string(),
        user_id: user_id.to_string(),
        action: action.to_string(),
        title: None,
        message: None,
        is_read: false,
        viewer_id: viewer_id.map(str::to_string),
        sender_id: None,
        action_url: None,
        created_at,
    }
}

struct Fixture {
    store: Arc<MemoryStore>,
    profiles: Arc<MemoryProfileSource>,
    center: NotificationCenter,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let profiles = Arc::new(MemoryProfileSource::new());
    let resolver = Arc::new(IdentityResolver::new(
        profiles.clone(),
        Arc::new(MemoryAvatarStore::new()),
    ));
    let center = NotificationCenter::new(store.clone(), resolver);
    Fixture {
        store,
        profiles,
        center,
    }
}

#[tokio::test]
async fn test_merged_feed_sorts_descending_by_created_at() -> Result<()> {
    let fx = fixture();
    let u = player_user("U1");
    fx.store.insert_system_notification(system_row(
        "n1",
        "U1",
        "تنبيه النظام",
        NotificationKind::Info,
        at(10, 0),
    ));
    fx.store.insert_interaction_notification(interaction_row(
        "i1",
        "U1",
        "profile_view",
        None,
        at(10, 5),
    ));

    let mut feed = fx.center.subscribe(Some(&u)).await?;
    let snapshot = timeout(Duration::from_secs(2), feed.next()).await??;

    assert_eq!(snapshot.items.len(), 2);
    // 10:05 的交互通知排在 10:00 的系统通知之前
    // The 10:05 interaction item precedes the 10:00 system item
    assert_eq!(snapshot.items[0].id, "i1");
    assert_eq!(snapshot.items[1].id, "n1");
    for pair in snapshot.items.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }
    assert!(snapshot.system_error.is_none());
    assert!(snapshot.interaction_error.is_none());
    feed.stop();
    Ok(())
}

#[tokio::test]
async fn test_interaction_rows_map_and_enrich() -> Result<()> {
    let fx = fixture();
    let u = player_user("U1");
    // 浏览者的原始账户记录提供发送者身份 / The viewer's raw account supplies sender identity
    fx.profiles.put_account(AccountRecord {
        id: "V1".to_string(),
        account_type: AccountType::Club,
        fields: json!({"displayName": "نادي الزمالك", "photoURL": "https://cdn.example/V1.png"}),
    });

    fx.store.insert_interaction_notification(interaction_row(
        "i1",
        "U1",
        "profile_view",
        Some("V1"),
        at(9, 0),
    ));
    fx.store.insert_interaction_notification(interaction_row(
        "i2",
        "U1",
        "message_sent",
        None,
        at(9, 1),
    ));
    fx.store.insert_interaction_notification(interaction_row(
        "i3",
        "U1",
        "connection_request",
        None,
        at(9, 2),
    ));
    // 生产者写入未知动作时静默映射为 info / Foreign action strings map to info
    fx.store.insert_interaction_notification(interaction_row(
        "i4",
        "U1",
        "poke",
        None,
        at(9, 3),
    ));

    let mut feed = fx.center.subscribe(Some(&u)).await?;
    let snapshot = timeout(Duration::from_secs(2), feed.next()).await??;
    assert_eq!(snapshot.items.len(), 4);

    let by_id = |id: &str| snapshot.items.iter().find(|n| n.id == id).unwrap();

    let viewed = by_id("i1");
    assert_eq!(viewed.kind, NotificationKind::Info);
    assert_eq!(viewed.action_type, Some(ActionType::ProfileView));
    assert_eq!(viewed.title, "إشعار تفاعلي");
    assert_eq!(viewed.message, "لا توجد تفاصيل");
    assert_eq!(viewed.sender_name.as_deref(), Some("نادي الزمالك"));
    assert_eq!(
        viewed.sender_avatar.as_deref(),
        Some("https://cdn.example/V1.png")
    );
    assert_eq!(viewed.sender_account_type, Some(AccountType::Club));
    assert_eq!(viewed.source, NotificationSource::Interaction);

    assert_eq!(by_id("i2").kind, NotificationKind::Success);
    assert_eq!(by_id("i3").kind, NotificationKind::Warning);
    assert_eq!(by_id("i4").kind, NotificationKind::Info);
    assert_eq!(by_id("i4").action_type, None);
    feed.stop();
    Ok(())
}

#[tokio::test]
async fn test_mark_as_read_routes_by_source_tag() -> Result<()> {
    let fx = fixture();
    let u = player_user("U1");
    fx.store.insert_system_notification(system_row(
        "n1",
        "U1",
        "تنبيه",
        NotificationKind::Warning,
        at(8, 0),
    ));
    fx.store.insert_interaction_notification(interaction_row(
        "i1",
        "U1",
        "follow",
        None,
        at(8, 5),
    ));

    // 先收到一帧快照，来源索引即已填充 / One snapshot populates the source index
    let mut feed = fx.center.subscribe(Some(&u)).await?;
    timeout(Duration::from_secs(2), feed.next()).await??;

    fx.center.mark_as_read(Some(&u), "i1").await?;
    fx.center.mark_as_read(Some(&u), "n1").await?;

    let system = fx.store.list_system("U1", 100).await?;
    assert!(system.iter().all(|n| n.is_read));
    let interaction = fx.store.list_interaction("U1", 100).await?;
    assert!(interaction.iter().all(|n| n.is_read));
    feed.stop();
    Ok(())
}

#[tokio::test]
async fn test_mark_as_read_probes_foreign_ids() -> Result<()> {
    let fx = fixture();
    let u = player_user("U1");
    fx.store.insert_interaction_notification(interaction_row(
        "i1",
        "U1",
        "like",
        None,
        at(8, 0),
    ));

    // 未订阅：索引为空，走“先系统后交互”的探测路径
    // No subscription: empty index, probes system first, then interaction
    fx.center.mark_as_read(Some(&u), "i1").await?;
    let interaction = fx.store.list_interaction("U1", 100).await?;
    assert!(interaction[0].is_read);

    let result = fx.center.mark_as_read(Some(&u), "missing").await;
    assert!(matches!(result, Err(CoreError::NotFound(_))));

    let result = fx.center.mark_as_read(None, "i1").await;
    assert!(matches!(result, Err(CoreError::NotAuthenticated)));
    Ok(())
}

#[tokio::test]
async fn test_mark_all_as_read_clears_the_merged_feed() -> Result<()> {
    let fx = fixture();
    let u = player_user("U1");
    fx.store.insert_system_notification(system_row(
        "n1",
        "U1",
        "أ",
        NotificationKind::Info,
        at(7, 0),
    ));
    fx.store.insert_system_notification(system_row(
        "n2",
        "U1",
        "ب",
        NotificationKind::Error,
        at(7, 1),
    ));
    fx.store.insert_interaction_notification(interaction_row(
        "i1",
        "U1",
        "comment",
        None,
        at(7, 2),
    ));
    let mut already_read = system_row("n3", "U1", "ج", NotificationKind::Info, at(7, 3));
    already_read.is_read = true;
    fx.store.insert_system_notification(already_read);

    let updated = fx.center.mark_all_as_read(Some(&u)).await?;
    assert_eq!(updated, 3);

    let mut feed = fx.center.subscribe(Some(&u)).await?;
    let snapshot = timeout(Duration::from_secs(2), feed.next()).await??;
    let stats = compute_stats(&snapshot.items);
    assert_eq!(stats.total, 4);
    assert_eq!(stats.unread, 0);
    feed.stop();
    Ok(())
}

#[tokio::test]
async fn test_filter_matches_title_message_and_sender() -> Result<()> {
    let fx = fixture();
    let u = player_user("U1");
    fx.profiles.put_account(AccountRecord {
        id: "V1".to_string(),
        account_type: AccountType::Agent,
        fields: json!({"displayName": "Ahmed Agency"}),
    });
    let mut row = system_row("n1", "U1", "عرض جديد", NotificationKind::Info, at(6, 0));
    row.message = "Ahmed viewed your profile".to_string();
    fx.store.insert_system_notification(row);
    fx.store.insert_system_notification(system_row(
        "n2",
        "U1",
        "تنبيه دفع",
        NotificationKind::Warning,
        at(6, 1),
    ));
    fx.store.insert_interaction_notification(interaction_row(
        "i1",
        "U1",
        "profile_view",
        Some("V1"),
        at(6, 2),
    ));

    let mut feed = fx.center.subscribe(Some(&u)).await?;
    let snapshot = timeout(Duration::from_secs(2), feed.next()).await??;

    let hits = filter_feed(
        &snapshot.items,
        &FilterOptions {
            search_term: Some("AHMED".to_string()),
            ..Default::default()
        },
    );
    // 正文命中 n1，发送者名命中 i1 / n1 matches on message, i1 on sender name
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().any(|n| n.id == "n1"));
    assert!(hits.iter().any(|n| n.id == "i1"));
    feed.stop();
    Ok(())
}

/// 系统源故障时信息流仍由交互源渲染 / The feed keeps rendering from the
/// interaction source when the system source is down
struct BrokenSystemSource {
    inner: Arc<MemoryStore>,
}

#[async_trait::async_trait]
impl NotificationStore for BrokenSystemSource {
    async fn list_system(
        &self,
        _user_id: &str,
        _limit: usize,
    ) -> Result<Vec<SystemNotificationRecord>> {
        anyhow::bail!("index unavailable")
    }

    async fn list_interaction(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<InteractionRecord>> {
        self.inner.list_interaction(user_id, limit).await
    }

    async fn mark_system_read(&self, id: &str) -> Result<()> {
        self.inner.mark_system_read(id).await
    }

    async fn mark_interaction_read(&self, id: &str) -> Result<()> {
        self.inner.mark_interaction_read(id).await
    }

    fn changes(&self) -> broadcast::Receiver<StoreEvent> {
        NotificationStore::changes(&*self.inner)
    }
}

#[tokio::test]
async fn test_one_broken_source_degrades_gracefully() -> Result<()> {
    let inner = Arc::new(MemoryStore::new());
    inner.insert_system_notification(system_row(
        "n1",
        "U1",
        "لن يظهر",
        NotificationKind::Info,
        at(5, 0),
    ));
    inner.insert_interaction_notification(interaction_row(
        "i1",
        "U1",
        "follow",
        None,
        at(5, 1),
    ));

    let profiles = Arc::new(MemoryProfileSource::new());
    let resolver = Arc::new(IdentityResolver::new(
        profiles,
        Arc::new(MemoryAvatarStore::new()),
    ));
    let center = NotificationCenter::new(
        Arc::new(BrokenSystemSource {
            inner: inner.clone(),
        }),
        resolver,
    );
    let u = player_user("U1");

    let mut feed = center.subscribe(Some(&u)).await?;
    let snapshot = timeout(Duration::from_secs(2), feed.next()).await??;

    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.items[0].id, "i1");
    assert!(snapshot.system_error.is_some());
    assert!(snapshot.interaction_error.is_none());
    feed.stop();
    Ok(())
}
