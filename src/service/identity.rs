//! 身份解析 / Identity resolution
//!
//! 每种账户类型一张声明式回退表：解析策略是数据而不是分支。
//! 解析永不向调用方抛错——任何一步失败都降级为类型默认值并记日志
//! One declarative fallback table per account type: resolution policy is
//! data, not branching. Resolution never throws to the caller — every
//! failure degrades to the type defaults and logs

use serde_json::Value;
use std::sync::Arc;

use crate::domain::account::{AccountRecord, AccountType};
use crate::storage::traits::{AvatarStore, ProfileSource};

/// 名称回退策略 / Name fallback policy
struct NamePolicy {
    keys: &'static [&'static str],
    fallback: &'static str,
}

/// 组织名回退策略 / Organization fallback policy
struct OrgPolicy {
    keys: &'static [&'static str],
}

const PLAYER_NAMES: NamePolicy = NamePolicy {
    keys: &["full_name", "name", "displayName"],
    fallback: "لاعب",
};
const CLUB_NAMES: NamePolicy = NamePolicy {
    keys: &["name", "club_name", "displayName"],
    fallback: "نادي",
};
const ACADEMY_NAMES: NamePolicy = NamePolicy {
    keys: &["name", "academy_name", "displayName"],
    fallback: "أكاديمية",
};
const AGENT_NAMES: NamePolicy = NamePolicy {
    keys: &["name", "agent_name", "agency_name", "displayName"],
    fallback: "وكيل",
};
const TRAINER_NAMES: NamePolicy = NamePolicy {
    keys: &["name", "trainer_name", "displayName"],
    fallback: "مدرب",
};
const ADMIN_NAMES: NamePolicy = NamePolicy {
    keys: &["name", "displayName"],
    fallback: "مشرف",
};

/// 原始账户记录的通用链 / Generic chain over the raw account record
const RAW_NAME_KEYS: [&str; 3] = ["name", "full_name", "displayName"];
const GENERIC_FALLBACK: &str = "مستخدم";
const UNKNOWN_SENDER: &str = "مستخدم غير معروف";

const PLAYER_ORGS: OrgPolicy = OrgPolicy {
    keys: &["current_club", "clubName", "academyName"],
};
const CLUB_ORGS: OrgPolicy = OrgPolicy {
    keys: &["organizationName", "clubName"],
};
const ACADEMY_ORGS: OrgPolicy = OrgPolicy {
    keys: &["organizationName", "academyName"],
};
const AGENT_ORGS: OrgPolicy = OrgPolicy {
    keys: &["organizationName", "agencyName"],
};
const TRAINER_ORGS: OrgPolicy = OrgPolicy {
    keys: &["organizationName", "specialization"],
};
const RAW_ORGS: OrgPolicy = OrgPolicy {
    keys: &["organizationName", "clubName", "academyName", "agencyName"],
};

/// 档案/账户文档中头像字段的优先级 / Avatar field precedence in documents
const AVATAR_FIELDS: [&str; 6] = [
    "profile_image_url",
    "profile_image",
    "avatar",
    "photoURL",
    "profilePicture",
    "image",
];

fn name_policy(account_type: AccountType) -> &'static NamePolicy {
    match account_type {
        AccountType::Player => &PLAYER_NAMES,
        AccountType::Club => &CLUB_NAMES,
        AccountType::Academy => &ACADEMY_NAMES,
        AccountType::Agent => &AGENT_NAMES,
        AccountType::Trainer => &TRAINER_NAMES,
        AccountType::Admin => &ADMIN_NAMES,
    }
}

fn org_policy(account_type: AccountType) -> &'static OrgPolicy {
    match account_type {
        AccountType::Player => &PLAYER_ORGS,
        AccountType::Club => &CLUB_ORGS,
        AccountType::Academy => &ACADEMY_ORGS,
        AccountType::Agent => &AGENT_ORGS,
        AccountType::Trainer => &TRAINER_ORGS,
        AccountType::Admin => &RAW_ORGS,
    }
}

/// 解析结果 / Resolution output
#[derive(Clone, Debug)]
pub struct ResolvedIdentity {
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub organization_name: Option<String>,
}

/// 发送者摘要，通知增强用 / Sender summary used for notification enrichment
#[derive(Clone, Debug)]
pub struct SenderInfo {
    pub sender_id: String,
    pub sender_name: String,
    pub sender_avatar: Option<String>,
    pub sender_account_type: Option<AccountType>,
}

pub struct IdentityResolver {
    profiles: Arc<dyn ProfileSource>,
    avatars: Arc<dyn AvatarStore>,
}

impl IdentityResolver {
    pub fn new(profiles: Arc<dyn ProfileSource>, avatars: Arc<dyn AvatarStore>) -> Self {
        Self { profiles, avatars }
    }

    /// 解析展示身份 / Resolve the display identity
    pub async fn resolve(&self, account_id: &str, account_type: AccountType) -> ResolvedIdentity {
        self.resolve_full(account_id, account_type).await.0
    }

    /// 解析展示身份并带回档案文档（目录构建要复用它做依赖检测）
    /// Resolve and hand back the profile document (the directory reuses it
    /// for dependent detection)
    pub async fn resolve_full(
        &self,
        account_id: &str,
        account_type: AccountType,
    ) -> (ResolvedIdentity, Option<Value>) {
        let profile = match self.profiles.get_profile(account_type, account_id).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!("⚠️ 档案读取失败 / Profile lookup failed for {}: {}", account_id, e);
                None
            }
        };
        let raw = match self.profiles.get_raw_account(account_id).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("⚠️ 账户读取失败 / Account lookup failed for {}: {}", account_id, e);
                None
            }
        };

        let display_name = resolve_display_name(account_type, profile.as_ref(), raw.as_ref());
        let organization_name = resolve_organization(account_type, profile.as_ref(), raw.as_ref());
        let avatar_url = self
            .resolve_avatar(account_id, account_type, profile.as_ref(), raw.as_ref(), &display_name)
            .await;

        (
            ResolvedIdentity {
                display_name,
                avatar_url,
                organization_name,
            },
            profile,
        )
    }

    /// 头像解析顺序：头像存储 → 档案字段 → 账户字段 → 生成的占位图
    /// Avatar order: storage lookup -> profile fields -> account fields -> generated placeholder
    pub async fn resolve_avatar(
        &self,
        account_id: &str,
        account_type: AccountType,
        profile: Option<&Value>,
        raw: Option<&AccountRecord>,
        display_name: &str,
    ) -> Option<String> {
        match self.avatars.find_avatar(account_id, account_type).await {
            Ok(Some(url)) => return Some(url),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!("头像存储查询失败 / Avatar store lookup failed for {}: {}", account_id, e)
            }
        }
        if let Some(url) = profile.and_then(|doc| pick_string(doc, &AVATAR_FIELDS)) {
            return Some(url);
        }
        if let Some(url) = raw.and_then(|record| pick_string(&record.fields, &AVATAR_FIELDS)) {
            return Some(url);
        }
        Some(placeholder_avatar(display_name))
    }

    /// 只凭原始账户记录解析发送者（通知增强不读类型档案）
    /// Sender resolution over the raw account record only (enrichment never
    /// reads the type-specific profile)
    pub async fn resolve_sender(&self, sender_id: &str) -> Option<SenderInfo> {
        match self.profiles.get_raw_account(sender_id).await {
            Ok(Some(record)) => Some(SenderInfo {
                sender_id: sender_id.to_string(),
                sender_name: pick_string(&record.fields, &["displayName", "name"])
                    .unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
                sender_avatar: pick_string(&record.fields, &["photoURL", "avatar"]),
                sender_account_type: Some(record.account_type),
            }),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("⚠️ 发送者读取失败 / Sender lookup failed for {}: {}", sender_id, e);
                None
            }
        }
    }
}

/// 档案链 → 原始账户链 → 类型默认标签
/// Profile chain -> raw-account chain -> type-labelled default
fn resolve_display_name(
    account_type: AccountType,
    profile: Option<&Value>,
    raw: Option<&AccountRecord>,
) -> String {
    let policy = name_policy(account_type);
    if let Some(profile) = profile {
        if let Some(name) = pick_string(profile, policy.keys) {
            return name;
        }
    }
    if let Some(raw) = raw {
        if let Some(name) = pick_string(&raw.fields, &RAW_NAME_KEYS) {
            return name;
        }
    }
    if profile.is_some() {
        policy.fallback.to_string()
    } else {
        GENERIC_FALLBACK.to_string()
    }
}

fn resolve_organization(
    account_type: AccountType,
    profile: Option<&Value>,
    raw: Option<&AccountRecord>,
) -> Option<String> {
    if let Some(profile) = profile {
        return pick_string(profile, org_policy(account_type).keys);
    }
    raw.and_then(|record| pick_string(&record.fields, RAW_ORGS.keys))
}

/// 依序取第一个可用的字符串字段 / First usable string field in key order
fn pick_string(doc: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(value) = doc.get(key) {
            if let Some(s) = string_value(value) {
                return Some(s);
            }
        }
    }
    None
}

/// 接受字符串或 {url: ...} 对象，跳过 "undefined"/"null" 垃圾值
/// Accepts a string or a {url} object; junk values are skipped
fn string_value(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("url")?.as_str()?,
        _ => return None,
    };
    let s = s.trim();
    if s.is_empty() || s == "undefined" || s == "null" {
        None
    } else {
        Some(s.to_string())
    }
}

/// 确定性占位头像：同一展示名恒产生同一URL
/// Deterministic placeholder: equal display names, equal URLs
fn placeholder_avatar(display_name: &str) -> String {
    format!(
        "https://ui-avatars.com/api/?name={}",
        urlencoding::encode(display_name)
    )
}
