//! 联系人目录 / Contact directory
//!
//! 扫描一批账户并逐个解析成联系人；单个账户的失败只降级该联系人，
//! 整批扫描失败才作为可重试错误上报
//! Scans a batch of accounts and resolves each into a contact; per-account
//! failures degrade that contact only, a whole-scan failure escalates as a
//! retryable error

use futures_util::future::join_all;
use std::sync::Arc;

use crate::domain::account::{AccountRecord, AccountType, CurrentUser};
use crate::domain::contact::Contact;
use crate::error::CoreError;
use crate::service::identity::IdentityResolver;
use crate::storage::traits::ProfileSource;

/// 依赖检测的外键优先级（第一个非空者决定归属）
/// Foreign-key priority for dependent detection (first non-empty wins)
const DEPENDENT_PARENT_KEYS: [(&str, AccountType); 4] = [
    ("club_id", AccountType::Club),
    ("academy_id", AccountType::Academy),
    ("trainer_id", AccountType::Trainer),
    ("agent_id", AccountType::Agent),
];

pub struct ContactDirectory {
    profiles: Arc<dyn ProfileSource>,
    resolver: Arc<IdentityResolver>,
}

impl ContactDirectory {
    pub fn new(profiles: Arc<dyn ProfileSource>, resolver: Arc<IdentityResolver>) -> Self {
        Self { profiles, resolver }
    }

    /// 构建联系人目录 / Build the contact directory
    ///
    /// 空目录是合法的终态，不是错误 / Zero contacts is a valid terminal state
    pub async fn build_directory(
        &self,
        auth: Option<&CurrentUser>,
        limit: Option<usize>,
    ) -> Result<Vec<Contact>, CoreError> {
        let user = auth.ok_or(CoreError::NotAuthenticated)?;
        let limit = limit.unwrap_or_else(default_fetch_limit);

        let accounts = self
            .profiles
            .list_accounts(limit)
            .await
            .map_err(|e| CoreError::Store(format!("账户扫描失败 / Account scan failed: {}", e)))?;

        let tasks = accounts
            .iter()
            .filter(|account| account.id != user.uid)
            .filter(|account| account.account_type.is_contactable())
            .filter(|account| !account.is_deleted())
            .map(|account| self.build_contact(account));
        let contacts: Vec<Contact> = join_all(tasks).await;

        tracing::info!(
            "✅ 联系人目录构建完成 / Contact directory built: {} contacts",
            contacts.len()
        );
        Ok(contacts)
    }

    /// 单个联系人：身份解析 + 从属检测 / One contact: identity + dependent detection
    async fn build_contact(&self, account: &AccountRecord) -> Contact {
        let (resolved, profile) = self
            .resolver
            .resolve_full(&account.id, account.account_type)
            .await;

        let mut display_name = resolved.display_name;
        let mut is_dependent = false;
        let mut parent_account_id = None;
        let mut parent_account_type = None;

        if account.account_type == AccountType::Player {
            if let Some((parent_type, parent_id)) =
                profile.as_ref().and_then(detect_parent)
            {
                is_dependent = true;
                display_name = format!("{} (تابع لـ {})", display_name, parent_type.ar_label());
                parent_account_id = Some(parent_id);
                parent_account_type = Some(parent_type);
            }
        }

        Contact {
            composite_id: Contact::composite_id_for(account.account_type, &account.id),
            account_id: account.id.clone(),
            account_type: account.account_type,
            display_name,
            avatar_url: resolved.avatar_url,
            is_online: account.is_online(),
            organization_name: resolved.organization_name,
            is_dependent,
            parent_account_id,
            parent_account_type,
        }
    }
}

fn detect_parent(profile: &serde_json::Value) -> Option<(AccountType, String)> {
    for (key, parent_type) in DEPENDENT_PARENT_KEYS {
        if let Some(id) = profile.get(key).and_then(|v| v.as_str()) {
            if !id.trim().is_empty() {
                return Some((parent_type, id.to_string()));
            }
        }
    }
    None
}

fn default_fetch_limit() -> usize {
    crate::comm::config::get_global_config_manager()
        .ok()
        .map(|cm| cm.get_or("directory.fetch_limit", 100_i64) as usize)
        .unwrap_or(100)
}

/// 按名称或组织名过滤，大小写不敏感 / Filter by name or organization, case-insensitive
pub fn search_contacts(contacts: &[Contact], term: &str) -> Vec<Contact> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return contacts.to_vec();
    }
    contacts
        .iter()
        .filter(|contact| {
            contact.display_name.to_lowercase().contains(&term)
                || contact
                    .organization_name
                    .as_deref()
                    .map(|org| org.to_lowercase().contains(&term))
                    .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// 按账户类型过滤；None 表示全部 / Filter by account type; None means all
pub fn filter_by_type(contacts: &[Contact], account_type: Option<AccountType>) -> Vec<Contact> {
    match account_type {
        None => contacts.to_vec(),
        Some(wanted) => contacts
            .iter()
            .filter(|contact| contact.account_type == wanted)
            .cloned()
            .collect(),
    }
}
