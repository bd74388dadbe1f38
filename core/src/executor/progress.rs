use std::collections::HashMap;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Visual progress monitor for plan execution
///
/// One overall bar for the plan plus a spinner per running task.
pub struct ProgressMonitor {
    multi: MultiProgress,
    overall: ProgressBar,
    task_bars: HashMap<String, ProgressBar>,
    enabled: bool,
}

impl ProgressMonitor {
    /// Create a new progress monitor
    ///
    /// # Arguments
    ///
    /// * `total_tasks` - Total number of tasks in the plan
    /// * `enabled` - Whether to draw anything (disabled for jsonl output and non-tty stderr)
    pub fn new(total_tasks: usize, enabled: bool) -> Self {
        if !enabled {
            return Self {
                multi: MultiProgress::new(),
                overall: ProgressBar::hidden(),
                task_bars: HashMap::new(),
                enabled: false,
            };
        }

        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(total_tasks as u64));
        overall.set_style(
            ProgressStyle::default_bar()
                .template(
                    "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks ({percent}%) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░  "),
        );
        overall.set_message("Starting...");

        Self {
            multi,
            overall,
            task_bars: HashMap::new(),
            enabled: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Show a spinner for a task attempt. Repeated attempts reuse the spinner.
    pub fn start_task(&mut self, task_id: &str, attempt: u32) {
        if !self.enabled {
            return;
        }

        let label = if attempt > 1 {
            format!("⏳ {task_id} (attempt {attempt})")
        } else {
            format!("⏳ {task_id}")
        };

        if let Some(bar) = self.task_bars.get(task_id) {
            bar.set_message(label);
            return;
        }

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.set_message(label);
        bar.enable_steady_tick(Duration::from_millis(100));
        self.task_bars.insert(task_id.to_string(), bar);
    }

    pub fn retry_task(&mut self, task_id: &str, delay_ms: u64) {
        if let Some(bar) = self.task_bars.get(task_id) {
            bar.set_message(format!("↻ {task_id} (retrying in {delay_ms}ms)"));
        }
    }

    pub fn complete_task(&mut self, task_id: &str, success: bool, duration_ms: u64) {
        if !self.enabled {
            return;
        }

        if let Some(bar) = self.task_bars.remove(task_id) {
            let icon = if success { "✅" } else { "❌" };
            bar.finish_with_message(format!("{icon} {task_id} ({duration_ms}ms)"));
        }
        self.overall.inc(1);
    }

    pub fn set_message(&self, msg: &str) {
        if self.enabled {
            self.overall.set_message(msg.to_string());
        }
    }

    pub fn finish(&self, success: bool) {
        if !self.enabled {
            return;
        }

        let msg = if success {
            "✅ Plan completed"
        } else {
            "❌ Plan did not complete"
        };
        self.overall.finish_with_message(msg.to_string());
    }

    pub fn clear(&self) {
        if self.enabled {
            self.overall.finish_and_clear();
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        for (_, bar) in self.task_bars.drain() {
            bar.finish_and_clear();
        }
    }
}
