//! TwoStagePlanner：两阶段规划器
//!
//! 被外层路由循环反复调用：get_next_instruction 惰性补齐队列并出队一个执行单元；
//! 四个执行包装（before/after_handle_context、agent_executing/executed）负责对话记录、
//! 上下文累积以及与宿主之间的完成 / 继续协议。

use std::sync::Arc;

use crate::config::PlannerSection;
use crate::core::PlannerError;
use crate::dialog::{Agent, Role, RoleDialog};
use crate::planning::context::ExecutionContext;
use crate::planning::generator::PlanGenerator;
use crate::planning::queue::{InstructionTarget, PendingWork, PlannerState};
use crate::planning::types::Instruction;
use crate::routing::RoutingHost;

/// 单会话规划器（一个实例只服务一个会话，不可跨会话共享）
pub struct TwoStagePlanner {
    generator: Arc<dyn PlanGenerator>,
    host: Arc<dyn RoutingHost>,
    settings: PlannerSection,
    state: PlannerState,
    context: ExecutionContext,
}

impl TwoStagePlanner {
    pub fn new(
        generator: Arc<dyn PlanGenerator>,
        host: Arc<dyn RoutingHost>,
        settings: PlannerSection,
    ) -> Self {
        let context = ExecutionContext::new(
            settings.context_label.clone(),
            settings.line_separator.clone(),
        );
        Self {
            generator,
            host,
            settings,
            state: PlannerState::new(),
            context,
        }
    }

    /// 宿主强制的迭代上限
    pub fn max_loop_count(&self) -> usize {
        self.settings.max_loop_count
    }

    pub fn is_task_completed(&self) -> bool {
        self.state.is_completed()
    }

    pub fn state(&self) -> &PlannerState {
        &self.state
    }

    pub fn execution_context(&self) -> &ExecutionContext {
        &self.context
    }

    /// 丢弃整个会话状态（会话结束或被外部清空）
    pub fn reset(&mut self) {
        self.state = PlannerState::new();
        self.context.clear();
    }

    /// 补齐队列并出队一个执行单元。生成失败时返回错误，队列保持原样，可安全重试。
    pub async fn get_next_instruction(
        &mut self,
        router: &Agent,
        message_id: &str,
        dialogs: &[RoleDialog],
    ) -> Result<Instruction, PlannerError> {
        if matches!(self.state.pending(), PendingWork::FirstStage) {
            let plans = self
                .generator
                .first_stage(router, message_id, dialogs)
                .await?;
            self.state.accept_first_stage(plans)?;
        }

        match self.state.pending() {
            PendingWork::SecondStage(plan) => {
                let plan = plan.clone();
                let steps = self
                    .generator
                    .second_stage(router, message_id, &plan, dialogs)
                    .await?;
                self.state.accept_second_stage(steps)?;
            }
            PendingWork::Promote => self.state.promote_front()?,
            PendingWork::FirstStage | PendingWork::Dequeue => {}
        }

        let target = InstructionTarget {
            agent_name: self.settings.executor_agent.clone(),
            function: self.settings.route_function.clone(),
        };
        self.state.dequeue(&target)
    }

    /// 执行前：构造带上下文的请求消息（绑定触发消息 ID），不修改队列
    pub fn before_handle_context(
        &self,
        inst: &Instruction,
        message: &RoleDialog,
        _dialogs: &[RoleDialog],
    ) -> Vec<RoleDialog> {
        let question = self.context.wrap_prompt(&inst.response);
        vec![RoleDialog::user(question).with_message_id(message.message_id.clone())]
    }

    /// 发送后：除合成请求外的执行产出追加到会话对话；
    /// 产出中最后一条消息的内容是本步的权威结果，写入执行上下文
    pub fn after_handle_context(
        &mut self,
        dialogs: &mut Vec<RoleDialog>,
        task_agent_dialogs: &[RoleDialog],
    ) -> bool {
        dialogs.extend(task_agent_dialogs.iter().skip(1).cloned());

        match produced_result(task_agent_dialogs) {
            Some(last) => self.context.append(last.content.clone()),
            None => tracing::warn!("Executor produced no messages, execution context unchanged"),
        }
        true
    }

    /// 分派前：以路由 Agent 身份记录发出的指令
    pub fn agent_executing(
        &self,
        router: &Agent,
        inst: &Instruction,
        message: &RoleDialog,
        dialogs: &mut Vec<RoleDialog>,
    ) -> bool {
        dialogs.push(
            RoleDialog::new(Role::User, inst.response.clone())
                .with_message_id(message.message_id.clone())
                .with_agent(router.id.clone()),
        );
        true
    }

    /// 分派后：决定外层循环是否继续。
    /// 上游请求停止或任务已完成 -> 清空宿主待分派队列并返回 false；
    /// 否则重置宿主递归计数（本规划器的内部循环不重复计入）并返回 true。
    pub fn agent_executed(
        &mut self,
        _router: &Agent,
        _inst: &Instruction,
        message: &RoleDialog,
        _dialogs: &[RoleDialog],
    ) -> bool {
        if message.stop_completion || self.state.is_completed() {
            if message.stop_completion {
                tracing::warn!(message_id = %message.message_id, "Stop requested, discarding remaining plans");
                self.state.discard();
            } else {
                tracing::info!(steps = self.context.len(), "Two-stage plan completed");
            }
            self.host
                .clear_pending_queue("Agent queue is cleared by TwoStagePlanner");
            return false;
        }

        self.host.reset_recursion_guard();
        true
    }
}

/// 首条为合成的上下文请求，其后才是执行产出；取产出中的最后一条
pub(crate) fn produced_result(task_agent_dialogs: &[RoleDialog]) -> Option<&RoleDialog> {
    task_agent_dialogs.get(1..).and_then(<[_]>::last)
}
