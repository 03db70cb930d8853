//! 导航出口 / Navigation sink
//!
//! 核心只发出“打开某档案/某链接”的请求，路由本身属于宿主应用
//! The core only emits "open profile X / link Y" requests; routing belongs to
//! the host application

use async_trait::async_trait;

use crate::domain::account::AccountType;
use crate::domain::notification::Notification;

/// 导航请求（即发即忘）/ Navigation request (fire-and-forget)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NavigationRequest {
    Profile {
        account_id: String,
        account_type: AccountType,
    },
    Link(String),
}

/// 由宿主应用实现 / Implemented by the host application
#[async_trait]
pub trait NavigationSink: Send + Sync {
    async fn navigate(&self, request: NavigationRequest);
}

/// 通知点击目标：链接 > metadata.actionUrl > 发送者档案
/// Click target for a notification: link > metadata.actionUrl > sender profile
pub fn notification_target(notification: &Notification) -> Option<NavigationRequest> {
    if let Some(link) = &notification.link {
        return Some(NavigationRequest::Link(link.clone()));
    }
    if let Some(url) = notification
        .metadata
        .as_ref()
        .and_then(|m| m.get("actionUrl"))
        .and_then(|v| v.as_str())
    {
        return Some(NavigationRequest::Link(url.to_string()));
    }
    if let (Some(sender_id), Some(account_type)) = (
        notification.sender_id.as_ref(),
        notification.sender_account_type,
    ) {
        return Some(NavigationRequest::Profile {
            account_id: sender_id.clone(),
            account_type,
        });
    }
    None
}
