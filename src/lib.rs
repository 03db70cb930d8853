// talent-connect-im 库主入口，按需导出模块
//
// 体育人才平台的实时会话与通知核心：联系人目录、会话存储、消息流、
// 通知聚合。作为库被界面层消费，自身不暴露网络协议
// Real-time conversation and notification core of a sports-talent platform:
// contact directory, conversation store, message stream, notification
// aggregation. Consumed as a library by UI layers; exposes no network
// protocol of its own

pub mod comm;
pub use crate::comm::config::{get_global_config_manager, init_global_config_manager, ConfigManager};
pub use crate::comm::tracing::init_tracing;

pub mod error;
pub use crate::error::{describe_error, CoreError};

pub mod domain;
pub use crate::domain::account::{AccountRecord, AccountType, CurrentUser};
pub use crate::domain::contact::Contact;
pub use crate::domain::conversation::Conversation;
pub use crate::domain::message::{ChatMessage, DeliveryStatus};
pub use crate::domain::notification::{
    ActionType, InteractionRecord, Notification, NotificationKind, NotificationSource,
    SystemNotificationRecord,
};

pub mod storage;
pub mod subscription;
pub use crate::subscription::{Feed, SubscriptionHandle, SubscriptionState};

pub mod service;
pub use crate::service::{
    ContactDirectory, ConversationService, IdentityResolver, MessageService, NotificationCenter,
};

pub mod navigation;
pub use crate::navigation::{notification_target, NavigationRequest, NavigationSink};

// 重新导出 tracing 宏，方便宿主应用 / Re-export tracing macros for host apps
pub use tracing::{debug, error, info, trace, warn};
