pub mod conversations;
pub mod directory;
pub mod identity;
pub mod messages;
pub mod notifications;

pub use conversations::ConversationService;
pub use directory::{filter_by_type, search_contacts, ContactDirectory};
pub use identity::{IdentityResolver, ResolvedIdentity, SenderInfo};
pub use messages::MessageService;
pub use notifications::{
    compute_stats, filter_feed, FilterOptions, NotificationCenter, NotificationSnapshot,
    NotificationStats, ReadState,
};
