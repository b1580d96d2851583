//! 对话模型：角色消息、路由 Agent 身份
//!
//! 规划器只向对话列表追加消息、读取尾部元素，从不删除或重排已有条目。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致，Function 用于路由结果）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
    Function,
}

/// 单条对话消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoleDialog {
    pub role: Role,
    pub content: String,
    /// 触发本轮处理的用户消息 ID
    #[serde(default)]
    pub message_id: String,
    /// 产生 / 记录该消息时的 Agent
    #[serde(default)]
    pub current_agent_id: Option<String>,
    /// 上游请求提前终止
    #[serde(default)]
    pub stop_completion: bool,
}

impl RoleDialog {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            message_id: String::new(),
            current_agent_id: None,
            stop_completion: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.current_agent_id = Some(agent_id.into());
        self
    }

    pub fn with_stop(mut self, stop: bool) -> Self {
        self.stop_completion = stop;
        self
    }
}

/// 路由 Agent：规划器以它的身份记录指令，并把它的 instruction 作为生成计划时的系统提示
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub instruction: String,
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            instruction: String::new(),
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }
}
