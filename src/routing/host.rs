//! 宿主路由服务：待分派 Agent 队列与递归计数器
//!
//! 规划器只通过 RoutingHost 的两个调用触碰宿主状态（清空队列 / 重置计数），且每轮只调用其一，从不回读。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::core::PlannerError;

/// 规划器可见的宿主接口（构造时注入）
pub trait RoutingHost: Send + Sync {
    /// 清空待分派 Agent 队列：不再分派本规划器的后续指令
    fn clear_pending_queue(&self, reason: &str);

    /// 重置宿主的防失控递归计数
    fn reset_recursion_guard(&self);
}

/// 宿主默认的递归深度上限
pub const DEFAULT_MAX_RECURSION: usize = 10;

/// 内存中的宿主路由状态
#[derive(Debug)]
pub struct RoutingContext {
    pending: Mutex<Vec<String>>,
    recursion: AtomicUsize,
    max_recursion: usize,
    last_clear_reason: Mutex<Option<String>>,
}

impl Default for RoutingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingContext {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            recursion: AtomicUsize::new(0),
            max_recursion: DEFAULT_MAX_RECURSION,
            last_clear_reason: Mutex::new(None),
        }
    }

    pub fn with_max_recursion(mut self, max: usize) -> Self {
        self.max_recursion = max;
        self
    }

    pub fn push_agent(&self, agent_id: impl Into<String>) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push(agent_id.into());
        }
    }

    pub fn pending_agents(&self) -> Vec<String> {
        self.pending.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// 每次路由迭代加一，超过上限时拒绝（计数不变）
    pub fn increment_recursion(&self) -> Result<usize, PlannerError> {
        let max = self.max_recursion;
        self.recursion
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| {
                (depth < max).then_some(depth + 1)
            })
            .map(|previous| previous + 1)
            .map_err(|_| PlannerError::RecursionLimit { max })
    }

    pub fn recursion_count(&self) -> usize {
        self.recursion.load(Ordering::SeqCst)
    }

    pub fn last_clear_reason(&self) -> Option<String> {
        self.last_clear_reason.lock().ok().and_then(|r| r.clone())
    }
}

impl RoutingHost for RoutingContext {
    fn clear_pending_queue(&self, reason: &str) {
        tracing::info!(reason, "Pending agent queue cleared");
        if let Ok(mut pending) = self.pending.lock() {
            pending.clear();
        }
        if let Ok(mut last) = self.last_clear_reason.lock() {
            *last = Some(reason.to_string());
        }
    }

    fn reset_recursion_guard(&self) {
        self.recursion.store(0, Ordering::SeqCst);
    }
}
