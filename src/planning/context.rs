//! 执行上下文：逐步累积的子任务结果
//!
//! 每执行完一个 SecondStagePlan 追加一条结果；只追加、不重排、不截断，每次构造提示时整体读取。

/// 默认标签与分隔符
pub const DEFAULT_CONTEXT_LABEL: &str = "CONTEXT:";
pub const DEFAULT_LINE_SEPARATOR: &str = "\r\n";

/// 执行上下文累积器
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    entries: Vec<String>,
    label: String,
    separator: String,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_LABEL, DEFAULT_LINE_SEPARATOR)
    }
}

impl ExecutionContext {
    pub fn new(label: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            label: label.into(),
            separator: separator.into(),
        }
    }

    /// 唯一的修改入口
    pub fn append(&mut self, result: impl Into<String>) {
        self.entries.push(result.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按顺序渲染全部结果，每条保留原文
    pub fn snapshot(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("* {e}"))
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    /// 构造带上下文的提示：无上下文时标签后直接跟指令正文
    pub fn wrap_prompt(&self, payload: &str) -> String {
        if self.entries.is_empty() {
            format!("{}{}{}", self.label, self.separator, payload)
        } else {
            format!(
                "{}{}{}{}{}",
                self.label,
                self.separator,
                self.snapshot(),
                self.separator,
                payload
            )
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_without_context_uses_payload_verbatim() {
        let ctx = ExecutionContext::default();
        assert_eq!(ctx.wrap_prompt("Task: A"), "CONTEXT:\r\nTask: A");
    }

    #[test]
    fn test_wrap_with_context_prefixes_snapshot() {
        let mut ctx = ExecutionContext::default();
        ctx.append("rows: 3");
        ctx.append("sum: 42");
        assert_eq!(ctx.snapshot(), "* rows: 3\r\n* sum: 42");
        assert_eq!(
            ctx.wrap_prompt("Task: B"),
            "CONTEXT:\r\n* rows: 3\r\n* sum: 42\r\nTask: B"
        );
    }

    #[test]
    fn test_labeling_is_stable_across_calls() {
        let mut ctx = ExecutionContext::new("CTX", "\n");
        ctx.append("r1");
        let first = ctx.wrap_prompt("p");
        let second = ctx.wrap_prompt("p");
        assert_eq!(first, second);
        assert_eq!(first.matches("CTX").count(), 1);
    }

    #[test]
    fn test_entries_are_monotonic_and_unaltered() {
        let mut ctx = ExecutionContext::default();
        for (k, r) in ["a", "b", "c"].iter().enumerate() {
            ctx.append(*r);
            assert_eq!(ctx.len(), k + 1);
        }
        assert_eq!(ctx.entries(), ["a", "b", "c"]);
        let snap = ctx.snapshot();
        let pos: Vec<_> = ["* a", "* b", "* c"]
            .iter()
            .map(|s| snap.find(s).unwrap())
            .collect();
        assert!(pos.windows(2).all(|w| w[0] < w[1]));
    }
}
