//! 计划生成器：第一阶段拆解与多步任务的第二阶段拆解
//!
//! LlmPlanGenerator 拼接路由 Agent 指令 + 对话历史 + 阶段请求后调用 LLM，
//! 从回复中提取 JSON 数组并反序列化为计划序列。

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::core::{PlanStage, PlannerError};
use crate::dialog::{Agent, RoleDialog};
use crate::llm::LlmClient;
use crate::planning::types::{FirstStagePlan, SecondStagePlan};

/// 推理协作方：按对话历史生成两级计划
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn first_stage(
        &self,
        router: &Agent,
        message_id: &str,
        dialogs: &[RoleDialog],
    ) -> Result<Vec<FirstStagePlan>, PlannerError>;

    async fn second_stage(
        &self,
        router: &Agent,
        message_id: &str,
        plan: &FirstStagePlan,
        dialogs: &[RoleDialog],
    ) -> Result<Vec<SecondStagePlan>, PlannerError>;
}

const FIRST_STAGE_REQUEST: &str = r#"Break the user's request into an ordered list of tasks.
Reply with a JSON array only. Each element:
{"task": "...", "is_multiple_steps": true|false, "tables": ["..."], "parameters": {"name": "value"}, "results": "..."}
Set is_multiple_steps to true when the task needs more than one query to complete."#;

const SECOND_STAGE_REQUEST: &str = r#"Break the following task into ordered atomic steps.
Reply with a JSON array only. Each element:
{"description": "...", "tables": ["..."], "parameters": {"name": "value"}, "results": "..."}"#;

/// 基于 LLM 的计划生成器
pub struct LlmPlanGenerator {
    llm: Arc<dyn LlmClient>,
}

impl LlmPlanGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn build_messages(router: &Agent, dialogs: &[RoleDialog], request: String) -> Vec<RoleDialog> {
        let mut messages = Vec::with_capacity(dialogs.len() + 2);
        if !router.instruction.is_empty() {
            messages.push(RoleDialog::system(router.instruction.clone()));
        }
        messages.extend(dialogs.iter().cloned());
        messages.push(RoleDialog::user(request));
        messages
    }

    async fn request<T: DeserializeOwned>(
        &self,
        stage: PlanStage,
        messages: &[RoleDialog],
    ) -> Result<Vec<T>, PlannerError> {
        let reply = self
            .llm
            .complete(messages)
            .await
            .map_err(|e| PlannerError::generation(stage, e))?;
        parse_plans(&reply)
    }
}

#[async_trait]
impl PlanGenerator for LlmPlanGenerator {
    async fn first_stage(
        &self,
        router: &Agent,
        message_id: &str,
        dialogs: &[RoleDialog],
    ) -> Result<Vec<FirstStagePlan>, PlannerError> {
        tracing::debug!(router = %router.name, message_id, "Generating first-stage plans");
        let messages = Self::build_messages(router, dialogs, FIRST_STAGE_REQUEST.to_string());
        self.request(PlanStage::First, &messages).await
    }

    async fn second_stage(
        &self,
        router: &Agent,
        message_id: &str,
        plan: &FirstStagePlan,
        dialogs: &[RoleDialog],
    ) -> Result<Vec<SecondStagePlan>, PlannerError> {
        tracing::debug!(router = %router.name, message_id, task = %plan.task, "Generating second-stage plans");
        let task = serde_json::to_string(plan).map_err(|e| PlannerError::JsonParse(e.to_string()))?;
        let request = format!("{SECOND_STAGE_REQUEST}\n\nTask:\n{task}");
        let messages = Self::build_messages(router, dialogs, request);
        self.request(PlanStage::Second, &messages).await
    }
}

/// 从 LLM 回复中提取计划数组：```json 代码块、裸数组、{"plans": [...]} 包装或单个对象
pub fn parse_plans<T: DeserializeOwned>(output: &str) -> Result<Vec<T>, PlannerError> {
    let trimmed = output.trim();

    let body = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
    } else if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) {
        if start < end && !trimmed[..start].contains('{') {
            &trimmed[start..=end]
        } else {
            object_span(trimmed).unwrap_or(trimmed)
        }
    } else {
        object_span(trimmed).unwrap_or(trimmed)
    };

    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| PlannerError::JsonParse(format!("{}: {}", e, body)))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("plans") {
            Some(serde_json::Value::Array(items)) => items,
            Some(other) => vec![other],
            None => vec![serde_json::Value::Object(map)],
        },
        other => {
            return Err(PlannerError::JsonParse(format!(
                "expected a JSON array of plans, got: {other}"
            )))
        }
    };

    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(|e| PlannerError::JsonParse(e.to_string())))
        .collect()
}

fn object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
