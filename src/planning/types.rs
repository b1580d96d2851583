//! 两级计划与指令
//!
//! FirstStagePlan：对原始请求的粗粒度拆解，可能跨多个执行步骤；
//! SecondStagePlan：不可再拆的原子执行单元；
//! Instruction：交给执行层的单元（目标 Agent + 渲染后的提示 + 对话托管标记）。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{PlanStage, PlannerError};

/// 第一阶段计划（生成后不可变，出队一次）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FirstStagePlan {
    pub task: String,
    #[serde(
        default,
        rename = "is_multiple_steps",
        alias = "contain_multiple_steps",
        alias = "contains_multiple_steps"
    )]
    pub contains_multiple_steps: bool,
    #[serde(default, deserialize_with = "lenient_tables")]
    pub tables: Vec<String>,
    #[serde(default, deserialize_with = "lenient_parameters")]
    pub parameters: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub results: String,
}

impl FirstStagePlan {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            contains_multiple_steps: false,
            tables: Vec::new(),
            parameters: BTreeMap::new(),
            results: String::new(),
        }
    }

    pub fn multi_step(mut self) -> Self {
        self.contains_multiple_steps = true;
        self
    }

    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_results(mut self, results: impl Into<String>) -> Self {
        self.results = results.into();
        self
    }
}

/// 第二阶段计划（原子执行单元，不再拆分）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecondStagePlan {
    pub description: String,
    #[serde(default, deserialize_with = "lenient_tables")]
    pub tables: Vec<String>,
    #[serde(default, deserialize_with = "lenient_parameters")]
    pub parameters: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub results: String,
}

impl SecondStagePlan {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            tables: Vec::new(),
            parameters: BTreeMap::new(),
            results: String::new(),
        }
    }

    /// 渲染为下游执行 Agent 的任务提示
    pub fn render(&self) -> String {
        let mut out = format!("Task: {}", self.description);
        if !self.tables.is_empty() {
            out.push_str(&format!("\nTables: {}", self.tables.join(", ")));
        }
        if !self.parameters.is_empty() {
            let params = self
                .parameters
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("\nParameters: {params}"));
        }
        if !self.results.is_empty() {
            out.push_str(&format!("\nExpected results: {}", self.results));
        }
        out
    }
}

/// 模型常输出 "tables": null，视为空列表
fn lenient_tables<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// 参数值允许数字 / 布尔等标量，统一转为字符串
fn lenient_parameters<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect())
}

/// 结果描述对本层不透明：非字符串时保留其 JSON 文本
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

/// 单步计划直接提升：task -> description，其余字段原样搬运
impl From<FirstStagePlan> for SecondStagePlan {
    fn from(plan: FirstStagePlan) -> Self {
        Self {
            description: plan.task,
            tables: plan.tables,
            parameters: plan.parameters,
            results: plan.results,
        }
    }
}

/// 入队前校验：非空且每条计划描述非空
pub(crate) fn validate_first_stage(plans: &[FirstStagePlan]) -> Result<(), PlannerError> {
    if plans.is_empty() {
        return Err(PlannerError::generation(PlanStage::First, "no plans generated"));
    }
    match plans.iter().position(|p| p.task.trim().is_empty()) {
        Some(index) => Err(PlannerError::MalformedPlan {
            stage: PlanStage::First,
            index,
            reason: "task is empty".to_string(),
        }),
        None => Ok(()),
    }
}

pub(crate) fn validate_second_stage(plans: &[SecondStagePlan]) -> Result<(), PlannerError> {
    if plans.is_empty() {
        return Err(PlannerError::generation(
            PlanStage::Second,
            "no steps generated for multi-step task",
        ));
    }
    match plans.iter().position(|p| p.description.trim().is_empty()) {
        Some(index) => Err(PlannerError::MalformedPlan {
            stage: PlanStage::Second,
            index,
            reason: "description is empty".to_string(),
        }),
        None => Ok(()),
    }
}

/// 交给执行层的指令
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// 目标执行 Agent
    pub agent_name: String,
    /// 路由函数名
    pub function: String,
    /// 渲染后的任务提示（消息正文）
    pub response: String,
    /// 该指令的对话处理完全由规划器负责
    pub handle_dialogs_by_planner: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_copies_fields_verbatim() {
        let first = FirstStagePlan::new("count orders")
            .with_tables(["orders", "customers"])
            .with_parameter("year", "2024")
            .with_results("a number");
        let second = SecondStagePlan::from(first.clone());
        assert_eq!(second.description, first.task);
        assert_eq!(second.tables, first.tables);
        assert_eq!(second.parameters, first.parameters);
        assert_eq!(second.results, first.results);
    }

    #[test]
    fn test_first_stage_accepts_field_aliases() {
        let plan: FirstStagePlan = serde_json::from_str(
            r#"{"task": "A", "contain_multiple_steps": true, "tables": ["t1"]}"#,
        )
        .unwrap();
        assert!(plan.contains_multiple_steps);
        assert_eq!(plan.tables, vec!["t1"]);
        assert!(plan.parameters.is_empty());
    }

    #[test]
    fn test_parameters_accept_scalars_and_null() {
        let plan: SecondStagePlan = serde_json::from_str(
            r#"{"description": "B1", "parameters": {"limit": 10, "name": "x"}}"#,
        )
        .unwrap();
        assert_eq!(plan.parameters["limit"], "10");
        assert_eq!(plan.parameters["name"], "x");

        let plan: SecondStagePlan =
            serde_json::from_str(r#"{"description": "B2", "parameters": null}"#).unwrap();
        assert!(plan.parameters.is_empty());

        let plan: FirstStagePlan = serde_json::from_str(
            r#"{"task": "A", "tables": null, "parameters": null, "results": null}"#,
        )
        .unwrap();
        assert!(plan.tables.is_empty());
        assert!(plan.results.is_empty());

        let plan: SecondStagePlan =
            serde_json::from_str(r#"{"description": "B3", "results": ["count"]}"#).unwrap();
        assert_eq!(plan.results, r#"["count"]"#);
    }

    #[test]
    fn test_render_includes_present_fields_only() {
        let plan = SecondStagePlan::new("load rows");
        assert_eq!(plan.render(), "Task: load rows");

        let plan = SecondStagePlan::from(
            FirstStagePlan::new("load rows")
                .with_tables(["t"])
                .with_parameter("limit", "10"),
        );
        let rendered = plan.render();
        assert!(rendered.contains("Tables: t"));
        assert!(rendered.contains("Parameters: limit=10"));
        assert!(!rendered.contains("Expected results"));
    }

    #[test]
    fn test_validation_rejects_empty_and_blank() {
        assert!(matches!(
            validate_first_stage(&[]),
            Err(PlannerError::Generation { stage: PlanStage::First, .. })
        ));
        let plans = vec![FirstStagePlan::new("A"), FirstStagePlan::new("  ")];
        assert!(matches!(
            validate_first_stage(&plans),
            Err(PlannerError::MalformedPlan { index: 1, .. })
        ));
        assert!(validate_second_stage(&[SecondStagePlan::new("B1")]).is_ok());
        assert!(validate_second_stage(&[]).is_err());
    }
}
