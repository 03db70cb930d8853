//! 订阅生命周期 / Subscription lifecycle
//!
//! 显式的 {Idle, Active} 状态机取代零散的布尔标志；start/stop 必须成对出现，
//! 消费者离开（切换界面、登出）后遗留的活跃订阅是正确性缺陷
//! An explicit {Idle, Active} state machine instead of ad hoc boolean flags;
//! start/stop must pair up — a subscription leaked past teardown is a
//! correctness bug, not a cosmetic one

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use crate::error::CoreError;

/// 订阅状态 / Subscription state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    Idle,
    Active,
}

/// 订阅句柄：可克隆，所有克隆共享同一状态
/// Subscription handle: cloneable, all clones share one state
#[derive(Clone)]
pub struct SubscriptionHandle {
    state: Arc<Mutex<SubscriptionState>>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl SubscriptionHandle {
    /// 创建处于 Active 状态的句柄及配套的关停接收端
    /// Create an Active handle plus its shutdown receiver
    pub(crate) fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                state: Arc::new(Mutex::new(SubscriptionState::Active)),
                shutdown: Arc::new(tx),
            },
            rx,
        )
    }

    pub fn state(&self) -> SubscriptionState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Active
    }

    /// 显式停止；重复调用无副作用 / Explicit stop; idempotent
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if *state == SubscriptionState::Idle {
            return;
        }
        *state = SubscriptionState::Idle;
        let _ = self.shutdown.send(true);
    }

    /// 泵任务在上游通道关闭时回置状态 / Pumps flip back to Idle when the source closes
    pub(crate) fn mark_idle(&self) {
        *self.state.lock() = SubscriptionState::Idle;
    }
}

/// 实时快照流 / Live snapshot feed
///
/// 每次投递都是“当前完整有序集”，不是增量补丁；消费端直接整体替换
/// Every delivery is "the current full ordered set", never an incremental
/// patch; consumers replace their view wholesale
pub struct Feed<T> {
    rx: broadcast::Receiver<T>,
    handle: SubscriptionHandle,
    /// 挂到已有泵上时补发的最近快照 / Latest snapshot replayed when attaching to a live pump
    pending: Option<T>,
}

impl<T: Clone> Feed<T> {
    pub(crate) fn new(
        rx: broadcast::Receiver<T>,
        handle: SubscriptionHandle,
        pending: Option<T>,
    ) -> Self {
        Self { rx, handle, pending }
    }

    /// 下一个快照；滞后时跳到最新，不逐条补投
    /// Next snapshot; skips ahead on lag instead of replaying stale ones
    pub async fn next(&mut self) -> Result<T, CoreError> {
        if let Some(snapshot) = self.pending.take() {
            return Ok(snapshot);
        }
        loop {
            match self.rx.recv().await {
                Ok(snapshot) => return Ok(snapshot),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("⏩ 快照滞后，跳过 {} 帧 / Feed lagged, skipped {} snapshots", skipped, skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Err(CoreError::SubscriptionClosed),
            }
        }
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    pub fn stop(&self) {
        self.handle.stop();
    }
}
