use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::account::AccountType;

/// 会话文档 / Conversation document
///
/// 任意无序参与者对 {A,B} 至多存在一个会话；核心从不硬删除
/// At most one conversation per unordered pair {A,B}; never hard-deleted by the core
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    /// 恰好两个账户ID / Exactly two account ids
    pub participants: Vec<String>,
    pub participant_names: HashMap<String, String>,
    pub participant_types: HashMap<String, AccountType>,
    #[serde(default)]
    pub participant_avatars: HashMap<String, Option<String>>,
    pub subject: String,
    pub last_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_time: Option<DateTime<Utc>>,
    pub last_sender_id: String,
    /// 每个参与者一个未读计数 / One unread counter per participant
    pub unread_count: HashMap<String, u32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// 每条新消息都会推进 / Advances on every new message
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// 由排序后的参与者对推导的确定性会话ID，使创建成为幂等写入
    /// Deterministic id from the sorted participant pair; create becomes an idempotent upsert
    pub fn pair_id(a: &str, b: &str) -> String {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        format!("{}-{}", first, second)
    }

    /// 另一位参与者 / The other participant
    pub fn other_participant(&self, uid: &str) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| p.as_str() != uid)
            .map(|p| p.as_str())
    }

    pub fn includes(&self, uid: &str) -> bool {
        self.participants.iter().any(|p| p == uid)
    }

    pub fn unread_for(&self, uid: &str) -> u32 {
        self.unread_count.get(uid).copied().unwrap_or(0)
    }
}
