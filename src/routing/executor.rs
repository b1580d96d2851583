//! 指令执行器：把规划器发出的指令交给下游执行 Agent
//!
//! 输入是带上下文的请求对话（首条为合成请求），执行产出追加在其后。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::PlannerError;
use crate::dialog::{Agent, RoleDialog};
use crate::llm::LlmClient;
use crate::planning::Instruction;

/// 下游执行方
#[async_trait]
pub trait InstructionExecutor: Send + Sync {
    /// 执行指令，把产出的消息追加到 task_dialogs 末尾
    async fn execute(
        &self,
        inst: &Instruction,
        task_dialogs: &mut Vec<RoleDialog>,
    ) -> Result<(), PlannerError>;
}

/// 以 LLM 扮演执行 Agent
pub struct LlmExecutor {
    llm: Arc<dyn LlmClient>,
    agent: Agent,
}

impl LlmExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, agent: Agent) -> Self {
        Self { llm, agent }
    }
}

#[async_trait]
impl InstructionExecutor for LlmExecutor {
    async fn execute(
        &self,
        inst: &Instruction,
        task_dialogs: &mut Vec<RoleDialog>,
    ) -> Result<(), PlannerError> {
        let mut messages = Vec::with_capacity(task_dialogs.len() + 1);
        if !self.agent.instruction.is_empty() {
            messages.push(RoleDialog::system(self.agent.instruction.clone()));
        }
        messages.extend(task_dialogs.iter().cloned());

        tracing::debug!(agent = %inst.agent_name, function = %inst.function, "Executing instruction");
        let reply = self
            .llm
            .complete(&messages)
            .await
            .map_err(|e| PlannerError::Execution(format!("{}: {}", self.agent.name, e)))?;

        let message_id = task_dialogs
            .first()
            .map(|m| m.message_id.clone())
            .unwrap_or_default();
        task_dialogs.push(
            RoleDialog::assistant(reply)
                .with_message_id(message_id)
                .with_agent(self.agent.id.clone()),
        );
        Ok(())
    }
}
