use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::account::AccountType;

/// 联系人：由账户派生的瞬时视图 / Contact: ephemeral view derived from an account
///
/// 目录中每个账户恰好对应一个联系人；当前用户永远不在目录里
/// Exactly one contact per account in the directory; the current user never appears
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// "{account_type}:{account_id}"，跨类型全局唯一（即使原始ID冲突）
    /// Globally unique across types even when raw ids collide
    pub composite_id: String,
    pub account_id: String,
    pub account_type: AccountType,
    /// 永不为空，最终回退到类型标签 / Never empty; bottoms out at the type label
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub is_online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    /// 仅对 player 有意义：档案携带俱乐部/学院/教练/经纪人外键时为真
    /// Meaningful for players only: true when the profile carries a parent FK
    pub is_dependent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_account_type: Option<AccountType>,
}

impl Contact {
    pub fn composite_id_for(account_type: AccountType, account_id: &str) -> String {
        format!("{}:{}", account_type.as_str(), account_id)
    }
}
