//! 任务进度跟踪
//!
//! 以任务编号为键保存完整的 [`Task`] 记录。每次更新在分片锁内整体修改，
//! 读取方拿到的是记录的克隆，不会观察到更新到一半的状态。
//!
//! 状态只能前进，`progress_percent` 单调不减。

use dashmap::DashMap;

use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::model::{OutputFile, ProcessingResult, Task, TaskStatus};

/// 任务进度跟踪器
#[derive(Debug, Default)]
pub struct ProgressTracker {
    tasks: DashMap<String, Task>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建排队中的任务
    pub fn create(&self, task_id: &str, document_id: &str) -> Task {
        let task = Task::new(task_id, document_id);
        self.tasks.insert(task_id.to_string(), task.clone());
        task
    }

    /// 获取任务快照
    pub fn get(&self, task_id: &str) -> TranslationResult<Task> {
        self.tasks
            .get(task_id)
            .map(|task| task.value().clone())
            .ok_or_else(|| TranslationError::TaskNotFound(task_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 所有任务快照，按创建时间排序
    pub fn list(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.iter().map(|entry| entry.value().clone()).collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        tasks
    }

    fn update<F>(&self, task_id: &str, apply: F) -> TranslationResult<()>
    where
        F: FnOnce(&mut Task) -> TranslationResult<()>,
    {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| TranslationError::TaskNotFound(task_id.to_string()))?;

        let mut updated = entry.value().clone();
        apply(&mut updated)?;
        updated.updated_at = chrono::Utc::now();
        *entry.value_mut() = updated;
        Ok(())
    }

    /// 进入下一阶段
    pub fn transition(&self, task_id: &str, next: TaskStatus) -> TranslationResult<()> {
        self.update(task_id, |task| {
            if !task.status.can_transition_to(next) {
                return Err(TranslationError::InternalError(format!(
                    "任务 {} 不能从 {:?} 迁移到 {:?}",
                    task.id, task.status, next
                )));
            }
            tracing::debug!("任务 {} 状态: {} -> {}", task.id, task.status, next);
            task.status = next;
            task.current_step = next.label().to_string();
            Ok(())
        })
    }

    /// 设置翻译单元总数
    pub fn set_total_units(&self, task_id: &str, total: usize) -> TranslationResult<()> {
        self.update(task_id, |task| {
            task.total_units = total;
            task.completed_units = task.completed_units.min(total);
            Ok(())
        })
    }

    /// 完成一个翻译单元
    pub fn complete_unit(&self, task_id: &str) -> TranslationResult<()> {
        self.update(task_id, |task| {
            if task.completed_units < task.total_units {
                task.completed_units += 1;
            }
            if task.total_units > 0 {
                let percent = task.completed_units as f64 * 100.0 / task.total_units as f64;
                task.progress_percent = task.progress_percent.max(percent);
            }
            task.current_step = format!(
                "{} {}/{}",
                TaskStatus::Translating.label(),
                task.completed_units,
                task.total_units
            );
            Ok(())
        })
    }

    pub fn set_step(&self, task_id: &str, step: impl Into<String>) -> TranslationResult<()> {
        let step = step.into();
        self.update(task_id, |task| {
            task.current_step = step;
            Ok(())
        })
    }

    pub fn add_warnings(&self, task_id: &str, warnings: &[String]) -> TranslationResult<()> {
        if warnings.is_empty() {
            return Ok(());
        }
        self.update(task_id, |task| {
            task.warnings.extend_from_slice(warnings);
            Ok(())
        })
    }

    pub fn add_warning(&self, task_id: &str, warning: impl Into<String>) -> TranslationResult<()> {
        self.add_warnings(task_id, &[warning.into()])
    }

    /// 标记完成并附带输出文件与结果摘要
    pub fn complete(
        &self,
        task_id: &str,
        outputs: Vec<OutputFile>,
        result: ProcessingResult,
    ) -> TranslationResult<()> {
        self.update(task_id, |task| {
            if !task.status.can_transition_to(TaskStatus::Completed) {
                return Err(TranslationError::InternalError(format!(
                    "任务 {} 已处于 {:?}，无法标记完成",
                    task.id, task.status
                )));
            }
            task.status = TaskStatus::Completed;
            task.current_step = TaskStatus::Completed.label().to_string();
            task.progress_percent = 100.0;
            task.outputs = outputs;
            task.result = Some(result);
            Ok(())
        })
    }

    /// 标记失败，已处于终态的任务保持不变
    pub fn fail(&self, task_id: &str, error: &TranslationError) -> TranslationResult<()> {
        let message = error.to_string();
        self.update(task_id, |task| {
            if task.status.is_terminal() {
                return Ok(());
            }
            task.status = TaskStatus::Failed;
            task.current_step = TaskStatus::Failed.label().to_string();
            task.error = Some(message);
            Ok(())
        })
    }

    /// 删除任务记录
    pub fn remove(&self, task_id: &str) -> Option<Task> {
        self.tasks.remove(task_id).map(|(_, task)| task)
    }
}
