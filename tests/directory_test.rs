//! 联系人目录集成测试 / Contact directory integration tests

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use talent_connect_im::service::{
    filter_by_type, search_contacts, ContactDirectory, IdentityResolver,
};
use talent_connect_im::storage::{
    MemoryAvatarStore, MemoryProfileSource, ProfileSource,
};
use talent_connect_im::{AccountRecord, AccountType, CoreError, CurrentUser};

fn account(id: &str, account_type: AccountType, fields: serde_json::Value) -> AccountRecord {
    AccountRecord {
        id: id.to_string(),
        account_type,
        fields,
    }
}

fn club_user(uid: &str) -> CurrentUser {
    CurrentUser {
        uid: uid.to_string(),
        account_type: AccountType::Club,
        display_name: "نادي الهلال".to_string(),
        avatar: None,
    }
}

struct Fixture {
    profiles: Arc<MemoryProfileSource>,
    avatars: Arc<MemoryAvatarStore>,
    directory: ContactDirectory,
}

fn fixture() -> Fixture {
    let profiles = Arc::new(MemoryProfileSource::new());
    let avatars = Arc::new(MemoryAvatarStore::new());
    let resolver = Arc::new(IdentityResolver::new(profiles.clone(), avatars.clone()));
    let directory = ContactDirectory::new(profiles.clone(), resolver);
    Fixture {
        profiles,
        avatars,
        directory,
    }
}

/// 种子数据：俱乐部C1（当前用户）、从属球员P1、经纪人A1、管理员、软删除账户
/// Seed: club C1 (current user), dependent player P1, agent A1, an admin and
/// a soft-deleted account
fn seed_base(fx: &Fixture) {
    fx.profiles
        .put_account(account("C1", AccountType::Club, json!({"name": "نادي الهلال"})));
    fx.profiles
        .put_profile(AccountType::Club, "C1", json!({"name": "نادي الهلال"}));

    fx.profiles
        .put_account(account("P1", AccountType::Player, json!({"isOnline": true})));
    fx.profiles.put_profile(
        AccountType::Player,
        "P1",
        json!({"full_name": "أحمد صلاح", "club_id": "C1", "current_club": "نادي الهلال"}),
    );

    fx.profiles
        .put_account(account("A1", AccountType::Agent, json!({})));
    fx.profiles.put_profile(
        AccountType::Agent,
        "A1",
        json!({"agency_name": "وكالة النجوم", "organizationName": "وكالة النجوم"}),
    );

    fx.profiles
        .put_account(account("AD1", AccountType::Admin, json!({"name": "مشرف النظام"})));
    fx.profiles.put_account(account(
        "DEL1",
        AccountType::Player,
        json!({"name": "محذوف", "isDeleted": true}),
    ));
}

#[tokio::test]
async fn test_each_contactable_account_appears_exactly_once() -> Result<()> {
    let fx = fixture();
    seed_base(&fx);
    let user = club_user("C1");

    let contacts = fx.directory.build_directory(Some(&user), None).await?;

    // 当前用户、admin、软删除账户都不在目录里
    // The current user, admins and soft-deleted accounts never appear
    assert_eq!(contacts.len(), 2);
    let mut ids: Vec<&str> = contacts.iter().map(|c| c.composite_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["agent:A1", "player:P1"]);
    Ok(())
}

#[tokio::test]
async fn test_dependent_player_detection() -> Result<()> {
    let fx = fixture();
    seed_base(&fx);
    let user = club_user("C1");

    let contacts = fx.directory.build_directory(Some(&user), None).await?;
    let p1 = contacts
        .iter()
        .find(|c| c.account_id == "P1")
        .expect("player contact");

    assert!(p1.is_dependent);
    assert_eq!(p1.parent_account_id.as_deref(), Some("C1"));
    assert_eq!(p1.parent_account_type, Some(AccountType::Club));
    // 从属球员获得组合标签 / Dependent players get the composed label
    assert!(p1.display_name.starts_with("أحمد صلاح"));
    assert!(p1.display_name.contains("تابع لـ نادي"));
    assert!(p1.is_online);
    Ok(())
}

#[tokio::test]
async fn test_directory_requires_authentication() {
    let fx = fixture();
    let result = fx.directory.build_directory(None, None).await;
    assert!(matches!(result, Err(CoreError::NotAuthenticated)));
}

#[tokio::test]
async fn test_zero_contacts_is_a_valid_terminal_state() -> Result<()> {
    let fx = fixture();
    fx.profiles
        .put_account(account("C1", AccountType::Club, json!({})));
    let user = club_user("C1");

    let contacts = fx.directory.build_directory(Some(&user), None).await?;
    assert!(contacts.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_fetch_limit_bounds_the_scan() -> Result<()> {
    let fx = fixture();
    for i in 0..20 {
        fx.profiles.put_account(account(
            &format!("P{}", i),
            AccountType::Player,
            json!({"name": format!("لاعب {}", i)}),
        ));
    }
    let user = club_user("C1");

    let contacts = fx.directory.build_directory(Some(&user), Some(5)).await?;
    assert!(contacts.len() <= 5);
    Ok(())
}

#[tokio::test]
async fn test_search_and_type_filters() -> Result<()> {
    let fx = fixture();
    seed_base(&fx);
    let user = club_user("C1");
    let contacts = fx.directory.build_directory(Some(&user), None).await?;

    // 组织名命中 / Organization name matches
    let hits = search_contacts(&contacts, "وكالة النجوم");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].account_id, "A1");

    // 名称命中 / Display name matches
    let hits = search_contacts(&contacts, "أحمد");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].account_id, "P1");

    // 空搜索词返回全部 / Empty term returns everything
    assert_eq!(search_contacts(&contacts, "  ").len(), contacts.len());

    let players = filter_by_type(&contacts, Some(AccountType::Player));
    assert_eq!(players.len(), 1);
    assert_eq!(filter_by_type(&contacts, None).len(), contacts.len());
    Ok(())
}

#[tokio::test]
async fn test_avatar_resolution_order() -> Result<()> {
    let fx = fixture();
    seed_base(&fx);
    // P1 在头像存储里有文件，优先级最高 / A stored file wins for P1
    fx.avatars.put_file("P1.png", "https://cdn.example/avatars/P1.png");
    let user = club_user("C1");

    let contacts = fx.directory.build_directory(Some(&user), None).await?;
    let p1 = contacts.iter().find(|c| c.account_id == "P1").unwrap();
    assert_eq!(
        p1.avatar_url.as_deref(),
        Some("https://cdn.example/avatars/P1.png")
    );

    // A1 没有存储文件也没有档案头像字段，落到确定性占位图
    // A1 has neither a stored file nor profile avatar fields: deterministic placeholder
    let a1 = contacts.iter().find(|c| c.account_id == "A1").unwrap();
    let url = a1.avatar_url.as_deref().expect("placeholder avatar");
    assert!(url.starts_with("https://ui-avatars.com/api/"));
    Ok(())
}

/// 档案源整体故障时逐账户降级为原始字段，而不是丢弃条目
/// A broken profile source degrades per account to raw fields instead of
/// dropping entries
struct FailingProfiles {
    inner: Arc<MemoryProfileSource>,
}

#[async_trait::async_trait]
impl ProfileSource for FailingProfiles {
    async fn get_profile(
        &self,
        _account_type: AccountType,
        _account_id: &str,
    ) -> Result<Option<serde_json::Value>> {
        anyhow::bail!("permission denied")
    }

    async fn get_raw_account(&self, account_id: &str) -> Result<Option<AccountRecord>> {
        self.inner.get_raw_account(account_id).await
    }

    async fn list_accounts(&self, limit: usize) -> Result<Vec<AccountRecord>> {
        self.inner.list_accounts(limit).await
    }
}

#[tokio::test]
async fn test_profile_failures_degrade_to_raw_fields() -> Result<()> {
    let inner = Arc::new(MemoryProfileSource::new());
    inner.put_account(account(
        "T1",
        AccountType::Trainer,
        json!({"name": "كابتن خالد"}),
    ));
    inner.put_account(account("P2", AccountType::Player, json!({})));

    let profiles: Arc<dyn ProfileSource> = Arc::new(FailingProfiles { inner });
    let avatars = Arc::new(MemoryAvatarStore::new());
    let resolver = Arc::new(IdentityResolver::new(profiles.clone(), avatars));
    let directory = ContactDirectory::new(profiles, resolver);
    let user = club_user("C1");

    let contacts = directory.build_directory(Some(&user), None).await?;
    assert_eq!(contacts.len(), 2);

    let t1 = contacts.iter().find(|c| c.account_id == "T1").unwrap();
    assert_eq!(t1.display_name, "كابتن خالد");
    // 原始记录也没有名称字段时落到通用默认 / No raw name either: generic default
    let p2 = contacts.iter().find(|c| c.account_id == "P2").unwrap();
    assert_eq!(p2.display_name, "مستخدم");
    Ok(())
}
