//! 存储模块 / Storage module
//!
//! 持久层是外部文档库；此处只约定访问trait与变更事件，
//! 内存实现用于测试与内嵌场景
//! The persistence layer is an external document store; this module defines
//! the access traits and change events, plus an in-memory implementation for
//! tests and embedded use

pub mod memory;
pub mod traits;

pub use memory::{MemoryAvatarStore, MemoryProfileSource, MemoryStore};
pub use traits::{
    AvatarStore, ConversationStore, ConversationSummaryUpdate, MessageStore, NotificationStore,
    ProfileSource, StoreEvent, AVATAR_PROBE_EXTENSIONS,
};
