//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PLANNER__*` 覆盖（双下划线表示嵌套，如 `PLANNER__PLANNER__MAX_LOOP_COUNT=50`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::planning::context::{DEFAULT_CONTEXT_LABEL, DEFAULT_LINE_SEPARATOR};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub planner: PlannerSection,
    pub llm: LlmSection,
    pub executor: ExecutorSection,
}

/// [planner] 段：迭代上限、下游执行 Agent、上下文标签
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerSection {
    /// 单个会话内 get_next_instruction 的最大调用次数
    pub max_loop_count: usize,
    /// 指令固定路由到的执行 Agent
    pub executor_agent: String,
    pub route_function: String,
    pub context_label: String,
    pub line_separator: String,
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            max_loop_count: 100,
            executor_agent: "SQL Driver".to_string(),
            route_function: "route_to_agent".to_string(),
            context_label: DEFAULT_CONTEXT_LABEL.to_string(),
            line_separator: DEFAULT_LINE_SEPARATOR.to_string(),
        }
    }
}

/// [llm] 段：后端选择
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / mock；openai 无可用 Key 时回退 mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

impl LlmSection {
    /// 配置中的 Key 优先，其次 OPENAI_API_KEY
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

/// [executor] 段：下游执行 Agent 的系统提示
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    pub system_prompt: String,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            system_prompt: "You are a data assistant. Complete the task using the CONTEXT \
                            from previous steps and reply with the result only."
                .to_string(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 PLANNER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PLANNER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PLANNER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 重新从磁盘与环境变量加载配置
pub fn reload_config() -> Result<AppConfig, config::ConfigError> {
    load_config(None)
}
