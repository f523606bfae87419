//! Grouped execution of several same-shaped invocations of one operation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::OperationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Running,
    /// Every item completed.
    Completed,
    /// Every item failed.
    Failed,
    /// Some items completed, some failed.
    Partial,
}

/// One input of a batch and, once it ran, its result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem<T> {
    pub input: serde_json::Value,
    pub status: ItemStatus,
    pub result: Option<OperationResult<T>>,
}

/// Batches are produced by the engine and only serialized outward.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOperation<T> {
    pub id: Uuid,
    pub operation: String,
    pub items: Vec<BatchItem<T>>,
    pub status: BatchStatus,
}

impl<T> BatchOperation<T> {
    pub fn new(operation: impl Into<String>, inputs: Vec<serde_json::Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation: operation.into(),
            items: inputs
                .into_iter()
                .map(|input| BatchItem {
                    input,
                    status: ItemStatus::Pending,
                    result: None,
                })
                .collect(),
            status: BatchStatus::Pending,
        }
    }

    pub(crate) fn mark_running(&mut self, range: std::ops::Range<usize>) {
        self.status = BatchStatus::Running;
        for item in &mut self.items[range] {
            item.status = ItemStatus::Running;
        }
    }

    pub(crate) fn finish_item(&mut self, index: usize, result: OperationResult<T>) {
        if let Some(item) = self.items.get_mut(index) {
            item.status = if result.is_success() {
                ItemStatus::Completed
            } else {
                ItemStatus::Failed
            };
            item.result = Some(result);
        }
    }

    /// Derive the aggregate status from the items. An empty batch is
    /// vacuously completed.
    pub(crate) fn finalize(&mut self) {
        let completed = self.completed_count();
        let failed = self.failed_count();
        self.status = if failed == 0 && completed == self.items.len() {
            BatchStatus::Completed
        } else if completed == 0 && failed == self.items.len() {
            BatchStatus::Failed
        } else {
            BatchStatus::Partial
        };
    }

    pub fn completed_count(&self) -> usize {
        self.count(ItemStatus::Completed)
    }

    pub fn failed_count(&self) -> usize {
        self.count(ItemStatus::Failed)
    }

    fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }
}
