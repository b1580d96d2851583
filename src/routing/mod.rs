//! 路由层：宿主路由状态、指令执行器与外层路由循环

pub mod executor;
pub mod host;
pub mod loop_;

pub use executor::{InstructionExecutor, LlmExecutor};
pub use host::{RoutingContext, RoutingHost};
pub use loop_::{LoopExit, RoutingLoop, RoutingOutcome};
