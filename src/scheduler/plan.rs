use crate::task::{TaskId, TaskRegistry};
use serde::Serialize;

/// Waves a run would execute if every attempt succeeded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WavePlan {
    pub waves: Vec<Vec<TaskId>>,
    /// Pending tasks no wave within the cap reaches
    pub unscheduled: Vec<TaskId>,
    /// Tasks were still ready when the wave cap was reached
    pub hit_wave_limit: bool,
}

impl WavePlan {
    pub fn is_complete(&self) -> bool {
        self.unscheduled.is_empty()
    }

    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        for (index, wave) in self.waves.iter().enumerate() {
            lines.push(format!("Wave {}: {}", index + 1, wave.join(", ")));
        }
        if self.hit_wave_limit {
            lines.push(format!("Wave limit reached after {} waves", self.waves.len()));
        }
        if !self.unscheduled.is_empty() {
            lines.push(format!("Unscheduled: {}", self.unscheduled.join(", ")));
        }
        if lines.is_empty() {
            lines.push("Nothing to run".to_string());
        }
        lines.join("\n")
    }
}

/// Simulate the wave loop on a copy of `registry`, assuming success everywhere.
///
/// Tasks already running, completed or failed are left out. Cycles and
/// dependencies on failed tasks show up in [`WavePlan::unscheduled`].
pub fn plan_waves(registry: &TaskRegistry, max_waves: u32) -> WavePlan {
    let mut simulated = registry.clone();
    let mut waves = Vec::new();

    while waves.len() < max_waves as usize {
        let ready: Vec<TaskId> = simulated.ready_set().iter().map(|t| t.id.clone()).collect();
        if ready.is_empty() {
            break;
        }
        for id in &ready {
            // Ids come from the ready set, so both transitions are valid
            let _ = simulated.mark_running(id);
            let _ = simulated.mark_completed(id, "");
        }
        waves.push(ready);
    }

    let hit_wave_limit = simulated.next_ready().is_some();
    let unscheduled = simulated
        .tasks()
        .filter(|t| t.is_pending())
        .map(|t| t.id.clone())
        .collect();

    WavePlan {
        waves,
        unscheduled,
        hit_wave_limit,
    }
}
