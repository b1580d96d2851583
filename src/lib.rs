//! Routing Planner - 两阶段任务规划器
//!
//! 把一次用户请求拆解为有序子任务并逐步驱动执行，中间结果累积为后续步骤的上下文。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **dialog**: 对话消息与路由 Agent
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / 脚本化 / Mock）
//! - **observability**: 日志初始化
//! - **planning**: 两级计划、生成器、执行上下文、队列状态机、TwoStagePlanner
//! - **routing**: 宿主路由状态、指令执行器、外层路由循环

pub mod config;
pub mod core;
pub mod dialog;
pub mod llm;
pub mod observability;
pub mod planning;
pub mod routing;

pub use crate::core::PlannerError;
pub use planning::TwoStagePlanner;
pub use routing::RoutingLoop;
