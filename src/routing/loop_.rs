//! 外层路由循环
//!
//! get_next_instruction -> agent_executing -> before_handle_context -> 执行 ->
//! after_handle_context -> agent_executed，直到规划器返回「停止」、被取消或迭代上限耗尽。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::PlannerError;
use crate::dialog::{Agent, RoleDialog};
use crate::planning::planner::produced_result;
use crate::planning::TwoStagePlanner;
use crate::routing::{InstructionExecutor, RoutingContext, RoutingHost};

/// 循环结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// 最后一个执行单元完成
    Completed,
    /// 触发消息请求停止
    Stopped,
    /// 外部取消
    Cancelled,
}

/// 一次路由的结果
#[derive(Debug, Clone)]
pub struct RoutingOutcome {
    pub exit: LoopExit,
    /// 实际调用 get_next_instruction 的次数
    pub iterations: usize,
    /// 最后一步执行产出的内容
    pub last_response: Option<String>,
}

/// 驱动 TwoStagePlanner 的外层循环，持有与规划器共享的宿主路由状态
pub struct RoutingLoop {
    planner: TwoStagePlanner,
    executor: Arc<dyn InstructionExecutor>,
    host: Arc<RoutingContext>,
}

impl RoutingLoop {
    pub fn new(
        planner: TwoStagePlanner,
        executor: Arc<dyn InstructionExecutor>,
        host: Arc<RoutingContext>,
    ) -> Self {
        Self {
            planner,
            executor,
            host,
        }
    }

    pub fn planner(&self) -> &TwoStagePlanner {
        &self.planner
    }

    pub fn host(&self) -> &RoutingContext {
        &self.host
    }

    /// 处理一条用户消息，dialogs 为会话对话（只追加）。
    /// 生成失败、执行失败、递归或迭代上限耗尽都会终止任务，并清空宿主待分派队列。
    pub async fn run(
        &mut self,
        router: &Agent,
        message: &RoleDialog,
        dialogs: &mut Vec<RoleDialog>,
        cancel: CancellationToken,
    ) -> Result<RoutingOutcome, PlannerError> {
        self.host.push_agent(router.id.clone());
        let result = self.run_steps(router, message, dialogs, cancel).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Routing loop failed");
            self.host
                .clear_pending_queue(&format!("Routing failed: {e}"));
        }
        result
    }

    async fn run_steps(
        &mut self,
        router: &Agent,
        message: &RoleDialog,
        dialogs: &mut Vec<RoleDialog>,
        cancel: CancellationToken,
    ) -> Result<RoutingOutcome, PlannerError> {
        let max = self.planner.max_loop_count();
        let mut last_response = None;

        for iteration in 1..=max {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(iteration - 1, last_response));
            }
            let depth = self.host.increment_recursion()?;
            tracing::debug!(iteration, depth, "Routing iteration");

            let inst = self
                .planner
                .get_next_instruction(router, &message.message_id, dialogs)
                .await?;

            self.planner.agent_executing(router, &inst, message, dialogs);
            let mut task_dialogs = self.planner.before_handle_context(&inst, message, dialogs);

            tokio::select! {
                result = self.executor.execute(&inst, &mut task_dialogs) => result?,
                _ = cancel.cancelled() => {
                    return Ok(self.cancelled(iteration, last_response));
                }
            }

            self.planner.after_handle_context(dialogs, &task_dialogs);
            if let Some(result) = produced_result(&task_dialogs) {
                last_response = Some(result.content.clone());
            }

            if !self.planner.agent_executed(router, &inst, message, dialogs) {
                let exit = if message.stop_completion {
                    LoopExit::Stopped
                } else {
                    LoopExit::Completed
                };
                tracing::info!(?exit, iterations = iteration, "Routing loop finished");
                return Ok(RoutingOutcome {
                    exit,
                    iterations: iteration,
                    last_response,
                });
            }
        }

        Err(PlannerError::IterationExhausted { max })
    }

    fn cancelled(&self, iterations: usize, last_response: Option<String>) -> RoutingOutcome {
        tracing::warn!(iterations, "Routing loop cancelled");
        self.host.clear_pending_queue("Routing cancelled by host");
        RoutingOutcome {
            exit: LoopExit::Cancelled,
            iterations,
            last_response,
        }
    }
}
