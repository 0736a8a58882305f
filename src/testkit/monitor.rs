//! Monitor that records operations for assertions.

use parking_lot::Mutex;

use crate::port::outbound::monitor::{OperationId, OperationMonitor};

/// One completed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub name: String,
    pub dependency: String,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Default)]
pub struct RecordingMonitor {
    started: Mutex<Vec<(OperationId, String, String)>>,
    completed: Mutex<Vec<Recorded>>,
}

impl RecordingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self) -> usize {
        self.started.lock().len()
    }

    pub fn completed(&self) -> Vec<Recorded> {
        self.completed.lock().clone()
    }

    /// Completed operations named `name`.
    pub fn named(&self, name: &str) -> Vec<Recorded> {
        self.completed
            .lock()
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect()
    }
}

impl OperationMonitor for RecordingMonitor {
    fn start_operation(&self, name: &str, dependency: &str, _detail: &str) -> OperationId {
        let id = OperationId::new();
        self.started
            .lock()
            .push((id, name.to_string(), dependency.to_string()));
        id
    }

    fn complete_operation(&self, id: OperationId, success: bool, error: Option<&str>) {
        let started = self.started.lock();
        let Some((_, name, dependency)) = started.iter().find(|(op, _, _)| *op == id) else {
            return;
        };
        self.completed.lock().push(Recorded {
            name: name.clone(),
            dependency: dependency.clone(),
            success,
            error: error.map(str::to_string),
        });
    }
}
