//! 规划层：两级计划、计划生成器、执行上下文、队列状态机与 TwoStagePlanner

pub mod context;
pub mod generator;
pub mod planner;
pub mod queue;
pub mod types;

pub use context::ExecutionContext;
pub use generator::{parse_plans, LlmPlanGenerator, PlanGenerator};
pub use planner::TwoStagePlanner;
pub use queue::{InstructionTarget, PendingWork, PlannerPhase, PlannerState};
pub use types::{FirstStagePlan, Instruction, SecondStagePlan};
