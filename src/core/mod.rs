//! 核心层：错误类型与阶段标识

pub mod error;

pub use error::{PlanStage, PlannerError};
