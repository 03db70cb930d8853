use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 账户类型 / Account type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Club,
    Academy,
    Agent,
    Trainer,
    Player,
    Admin,
}

impl AccountType {
    /// admin 不进入联系人目录 / admin never enters the contact directory
    pub fn is_contactable(self) -> bool {
        !matches!(self, AccountType::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Club => "club",
            AccountType::Academy => "academy",
            AccountType::Agent => "agent",
            AccountType::Trainer => "trainer",
            AccountType::Player => "player",
            AccountType::Admin => "admin",
        }
    }

    /// 阿拉伯语类型标签（界面与默认名称用）
    /// Arabic type label (used in UI text and default display names)
    pub fn ar_label(self) -> &'static str {
        match self {
            AccountType::Club => "نادي",
            AccountType::Academy => "أكاديمية",
            AccountType::Agent => "وكيل",
            AccountType::Trainer => "مدرب",
            AccountType::Player => "لاعب",
            AccountType::Admin => "مشرف",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "club" => Some(AccountType::Club),
            "academy" => Some(AccountType::Academy),
            "agent" => Some(AccountType::Agent),
            "trainer" => Some(AccountType::Trainer),
            "player" => Some(AccountType::Player),
            "admin" => Some(AccountType::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 原始账户记录（外部身份源的只读输入）
/// Raw account record (read-only input from the external identity source)
///
/// 名称、头像等字段因账户类型而异，保持松散类型文档
/// Name/avatar fields vary per account type, kept as a loosely-typed document
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub id: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub fields: serde_json::Value,
}

impl AccountRecord {
    pub fn is_deleted(&self) -> bool {
        self.fields
            .get("isDeleted")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn is_online(&self) -> bool {
        self.fields
            .get("isOnline")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// 已解析的当前用户身份，由外部鉴权层提供；任何核心操作缺少它都会快速失败
/// Resolved current-user identity supplied by the external auth layer; every
/// core operation fails fast without it
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub uid: String,
    pub account_type: AccountType,
    pub display_name: String,
    pub avatar: Option<String>,
}
