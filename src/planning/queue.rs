//! 两级执行队列状态机
//!
//! 每次 get_next_instruction 的转移：
//! 1. 两个队列都空 -> 需要第一阶段生成（Empty -> Planning1）
//! 2. 第二阶段队列空 -> 取队首第一阶段计划：多步则第二阶段生成，否则直接提升（Planning1 -> Planning2）
//! 3. 第二阶段队首出队，渲染为指令（Planning2 -> Ready）
//! 4. 出队后两个队列都空则标记完成（Completed）
//!
//! PlannerState 本身不调用任何生成器：调用方根据 pending() 取得生成结果后交给 accept_*，
//! 因此可以用预置的计划序列直接测试。

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use crate::core::{PlanStage, PlannerError};
use crate::planning::types::{
    validate_first_stage, validate_second_stage, FirstStagePlan, Instruction, SecondStagePlan,
};

/// 状态机阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerPhase {
    /// 尚无任何计划
    Empty,
    /// 第一阶段计划已入队
    Planning1,
    /// 当前第一阶段计划的子步骤已入队
    Planning2,
    /// 一条第二阶段计划已出队并生成指令
    Ready,
    /// 终态：一次出队后两个队列均为空
    Completed,
}

/// 下一次出队前需要完成的工作
#[derive(Debug, PartialEq, Eq)]
pub enum PendingWork<'a> {
    /// 两个队列都空，需要第一阶段生成
    FirstStage,
    /// 队首第一阶段计划是多步的，需要第二阶段生成
    SecondStage(&'a FirstStagePlan),
    /// 队首第一阶段计划是单步的，直接提升
    Promote,
    /// 第二阶段队列非空，可直接出队
    Dequeue,
}

/// 指令的路由目标
#[derive(Debug, Clone)]
pub struct InstructionTarget {
    pub agent_name: String,
    pub function: String,
}

/// 单个会话的规划状态（不可跨会话共享）
#[derive(Debug)]
pub struct PlannerState {
    first_stage: VecDeque<FirstStagePlan>,
    second_stage: VecDeque<SecondStagePlan>,
    completed: bool,
    phase: PlannerPhase,
    fingerprint: Option<u64>,
}

impl Default for PlannerState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlannerState {
    pub fn new() -> Self {
        Self {
            first_stage: VecDeque::new(),
            second_stage: VecDeque::new(),
            completed: false,
            phase: PlannerPhase::Empty,
            fingerprint: None,
        }
    }

    pub fn pending(&self) -> PendingWork<'_> {
        if !self.second_stage.is_empty() {
            return PendingWork::Dequeue;
        }
        match self.first_stage.front() {
            None => PendingWork::FirstStage,
            Some(plan) if plan.contains_multiple_steps => PendingWork::SecondStage(plan),
            Some(_) => PendingWork::Promote,
        }
    }

    /// 按生成顺序整体入队；校验失败时队列不变
    pub fn accept_first_stage(&mut self, plans: Vec<FirstStagePlan>) -> Result<(), PlannerError> {
        if !matches!(self.pending(), PendingWork::FirstStage) {
            return Err(PlannerError::generation(
                PlanStage::First,
                "queues are not empty",
            ));
        }
        validate_first_stage(&plans)?;

        let fingerprint = batch_fingerprint(&plans);
        if self.fingerprint == Some(fingerprint) {
            tracing::warn!(
                fingerprint,
                "First-stage plan batch regenerated identically"
            );
        }
        self.fingerprint = Some(fingerprint);

        tracing::info!(count = plans.len(), "First-stage plans enqueued");
        self.first_stage.extend(plans);
        self.completed = false;
        self.phase = PlannerPhase::Planning1;
        Ok(())
    }

    /// 第二阶段生成成功后才弹出对应的第一阶段计划，失败时两个队列都不变
    pub fn accept_second_stage(&mut self, plans: Vec<SecondStagePlan>) -> Result<(), PlannerError> {
        if !matches!(self.pending(), PendingWork::SecondStage(_)) {
            return Err(PlannerError::generation(
                PlanStage::Second,
                "no multi-step first-stage plan is waiting",
            ));
        }
        validate_second_stage(&plans)?;

        let source = self.first_stage.pop_front();
        tracing::info!(
            task = source.as_ref().map(|p| p.task.as_str()).unwrap_or_default(),
            steps = plans.len(),
            "Second-stage plans enqueued"
        );
        self.second_stage.extend(plans);
        self.phase = PlannerPhase::Planning2;
        Ok(())
    }

    /// 单步计划 1:1 提升为第二阶段计划
    pub fn promote_front(&mut self) -> Result<(), PlannerError> {
        if !matches!(self.pending(), PendingWork::Promote) {
            return Err(PlannerError::generation(
                PlanStage::Second,
                "front first-stage plan cannot be promoted",
            ));
        }
        if let Some(plan) = self.first_stage.pop_front() {
            tracing::debug!(task = %plan.task, "Single-step plan promoted");
            self.second_stage.push_back(SecondStagePlan::from(plan));
        }
        self.phase = PlannerPhase::Planning2;
        Ok(())
    }

    /// 出队一条第二阶段计划并构造指令；完成标记在出队之后重算，
    /// 所以最后一个单元的指令照常发出，同一次调用内 completed 变为 true
    pub fn dequeue(&mut self, target: &InstructionTarget) -> Result<Instruction, PlannerError> {
        let plan = self.second_stage.pop_front().ok_or_else(|| {
            PlannerError::generation(PlanStage::Second, "second-stage queue is empty")
        })?;

        let instruction = Instruction {
            agent_name: target.agent_name.clone(),
            function: target.function.clone(),
            response: plan.render(),
            handle_dialogs_by_planner: true,
        };

        self.completed = self.first_stage.is_empty() && self.second_stage.is_empty();
        self.phase = if self.completed {
            PlannerPhase::Completed
        } else {
            PlannerPhase::Ready
        };
        tracing::debug!(
            first_stage = self.first_stage.len(),
            second_stage = self.second_stage.len(),
            completed = self.completed,
            "Second-stage plan dequeued"
        );
        Ok(instruction)
    }

    /// 提前终止：丢弃两个队列
    pub fn discard(&mut self) {
        self.first_stage.clear();
        self.second_stage.clear();
        self.phase = PlannerPhase::Completed;
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn phase(&self) -> PlannerPhase {
        self.phase
    }

    pub fn fingerprint(&self) -> Option<u64> {
        self.fingerprint
    }

    pub fn first_stage_len(&self) -> usize {
        self.first_stage.len()
    }

    pub fn second_stage_len(&self) -> usize {
        self.second_stage.len()
    }

    pub fn second_stage(&self) -> impl Iterator<Item = &SecondStagePlan> {
        self.second_stage.iter()
    }
}

fn batch_fingerprint(plans: &[FirstStagePlan]) -> u64 {
    let mut hasher = DefaultHasher::new();
    plans.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> InstructionTarget {
        InstructionTarget {
            agent_name: "SQL Driver".to_string(),
            function: "route_to_agent".to_string(),
        }
    }

    /// 用预置的第二阶段拆分驱动一次完整的 fill-and-dequeue
    fn step(
        state: &mut PlannerState,
        first: &mut Option<Vec<FirstStagePlan>>,
        splits: &mut VecDeque<Vec<SecondStagePlan>>,
    ) -> Instruction {
        loop {
            match state.pending() {
                PendingWork::FirstStage => state.accept_first_stage(first.take().unwrap()).unwrap(),
                PendingWork::SecondStage(_) => {
                    state.accept_second_stage(splits.pop_front().unwrap()).unwrap()
                }
                PendingWork::Promote => state.promote_front().unwrap(),
                PendingWork::Dequeue => return state.dequeue(&target()).unwrap(),
            }
        }
    }

    #[test]
    fn test_example_sequence_and_completion_timing() {
        let mut state = PlannerState::new();
        assert_eq!(state.phase(), PlannerPhase::Empty);

        let mut first = Some(vec![
            FirstStagePlan::new("A"),
            FirstStagePlan::new("B").multi_step(),
        ]);
        let mut splits = VecDeque::from(vec![vec![
            SecondStagePlan::new("B1"),
            SecondStagePlan::new("B2"),
        ]]);

        let a = step(&mut state, &mut first, &mut splits);
        assert_eq!(a.response, "Task: A");
        assert!(!state.is_completed());
        assert_eq!(state.phase(), PlannerPhase::Ready);

        let b1 = step(&mut state, &mut first, &mut splits);
        assert_eq!(b1.response, "Task: B1");
        assert!(!state.is_completed());

        let b2 = step(&mut state, &mut first, &mut splits);
        assert_eq!(b2.response, "Task: B2");
        assert!(state.is_completed());
        assert_eq!(state.phase(), PlannerPhase::Completed);
        assert!(b2.handle_dialogs_by_planner);
        assert_eq!(b2.agent_name, "SQL Driver");
    }

    #[test]
    fn test_ordering_is_flattened_generation_order() {
        let mut state = PlannerState::new();
        let mut first = Some(vec![
            FirstStagePlan::new("T1").multi_step(),
            FirstStagePlan::new("T2"),
            FirstStagePlan::new("T3").multi_step(),
        ]);
        let mut splits = VecDeque::from(vec![
            vec![SecondStagePlan::new("T1.1"), SecondStagePlan::new("T1.2")],
            vec![
                SecondStagePlan::new("T3.1"),
                SecondStagePlan::new("T3.2"),
                SecondStagePlan::new("T3.3"),
            ],
        ]);

        let mut emitted = Vec::new();
        let mut completed_at = None;
        for i in 0..6 {
            emitted.push(step(&mut state, &mut first, &mut splits).response);
            if state.is_completed() && completed_at.is_none() {
                completed_at = Some(i);
            }
        }
        let expected: Vec<String> = ["T1.1", "T1.2", "T2", "T3.1", "T3.2", "T3.3"]
            .iter()
            .map(|d| format!("Task: {d}"))
            .collect();
        assert_eq!(emitted, expected);
        assert_eq!(completed_at, Some(5));
    }

    #[test]
    fn test_second_stage_queue_only_holds_current_task() {
        let mut state = PlannerState::new();
        state
            .accept_first_stage(vec![
                FirstStagePlan::new("X").multi_step(),
                FirstStagePlan::new("Y").multi_step(),
            ])
            .unwrap();
        state
            .accept_second_stage(vec![SecondStagePlan::new("X1"), SecondStagePlan::new("X2")])
            .unwrap();
        assert_eq!(state.first_stage_len(), 1);
        assert!(state.second_stage().all(|p| p.description.starts_with('X')));

        // 第二阶段队列非空时不允许再次灌入
        assert!(state
            .accept_second_stage(vec![SecondStagePlan::new("Y1")])
            .is_err());
        assert_eq!(state.second_stage_len(), 2);
    }

    #[test]
    fn test_failed_generation_leaves_queues_untouched() {
        let mut state = PlannerState::new();
        assert!(state.accept_first_stage(vec![]).is_err());
        assert_eq!(state.pending(), PendingWork::FirstStage);
        assert_eq!(state.phase(), PlannerPhase::Empty);

        let multi = FirstStagePlan::new("M").multi_step();
        state.accept_first_stage(vec![multi.clone()]).unwrap();
        let err = state
            .accept_second_stage(vec![SecondStagePlan::new("ok"), SecondStagePlan::new("")])
            .unwrap_err();
        assert!(matches!(err, PlannerError::MalformedPlan { index: 1, .. }));
        assert_eq!(state.pending(), PendingWork::SecondStage(&multi));
        assert_eq!(state.second_stage_len(), 0);
    }

    #[test]
    fn test_dequeue_on_empty_queue_is_error() {
        let mut state = PlannerState::new();
        assert!(state.dequeue(&target()).is_err());
    }

    #[test]
    fn test_discard_clears_both_queues() {
        let mut state = PlannerState::new();
        state
            .accept_first_stage(vec![FirstStagePlan::new("A"), FirstStagePlan::new("B")])
            .unwrap();
        state.promote_front().unwrap();
        state.discard();
        assert_eq!(state.first_stage_len(), 0);
        assert_eq!(state.second_stage_len(), 0);
        assert_eq!(state.pending(), PendingWork::FirstStage);
    }

    #[test]
    fn test_fingerprint_tracks_latest_batch() {
        let mut state = PlannerState::new();
        assert!(state.fingerprint().is_none());
        state.accept_first_stage(vec![FirstStagePlan::new("A")]).unwrap();
        let fp = state.fingerprint();
        state.promote_front().unwrap();
        state.dequeue(&target()).unwrap();
        state.accept_first_stage(vec![FirstStagePlan::new("A")]).unwrap();
        assert_eq!(state.fingerprint(), fp);
        state.promote_front().unwrap();
        state.dequeue(&target()).unwrap();
        state.accept_first_stage(vec![FirstStagePlan::new("B")]).unwrap();
        assert_ne!(state.fingerprint(), fp);
    }
}
