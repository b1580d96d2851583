//! 规划器错误类型
//!
//! 生成失败与畸形计划在入队前被拒绝，队列保持原样，调用方可安全重试 get_next_instruction。

use thiserror::Error;

/// 计划所属阶段（用于错误信息与日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStage {
    First,
    Second,
}

impl std::fmt::Display for PlanStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanStage::First => write!(f, "first-stage"),
            PlanStage::Second => write!(f, "second-stage"),
        }
    }
}

/// 规划与执行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum PlannerError {
    /// 推理协作方失败，或在要求非空时返回了空序列
    #[error("{stage} plan generation failed: {reason}")]
    Generation { stage: PlanStage, reason: String },

    /// 计划缺少必填字段（如空的 task / description）
    #[error("malformed {stage} plan at index {index}: {reason}")]
    MalformedPlan {
        stage: PlanStage,
        index: usize,
        reason: String,
    },

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// 宿主迭代上限耗尽仍未自然完成
    #[error("Iteration limit of {max} reached before the task completed")]
    IterationExhausted { max: usize },

    /// 宿主递归深度超限
    #[error("Recursion limit of {max} reached")]
    RecursionLimit { max: usize },

    #[error("Instruction execution failed: {0}")]
    Execution(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl PlannerError {
    pub(crate) fn generation(stage: PlanStage, reason: impl Into<String>) -> Self {
        PlannerError::Generation {
            stage,
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for PlannerError {
    fn from(e: config::ConfigError) -> Self {
        PlannerError::Config(e.to_string())
    }
}
