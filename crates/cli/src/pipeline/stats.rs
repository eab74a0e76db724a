//! Pipeline statistics.

use std::time::Duration;

use contracts::BakeStatus;
use observability::SessionSummary;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Session ticks executed
    pub ticks: u64,

    /// Scenario actors alive at teardown
    pub live_actors: usize,

    /// Stopped by Ctrl+C instead of running the scenario to its end
    pub interrupted: bool,

    /// Session ended itself (nothing left to record)
    pub session_ended: bool,

    /// Wall time of capture plus baking
    pub duration: Duration,

    /// Final bake queue progress
    pub bake: BakeStatus,

    /// Session aggregator output
    pub session: SessionSummary,
}

impl PipelineStats {
    /// Session ticks per wall-clock second
    pub fn ticks_per_second(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ticks as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Pipeline Statistics ===\n");
        println!("Overview");
        println!("  Duration: {:.2}s", self.duration.as_secs_f64());
        println!("  Session ticks: {}", self.ticks);
        println!("  Ticks/s: {:.2}", self.ticks_per_second());
        println!("  Live actors at teardown: {}", self.live_actors);
        if self.interrupted {
            println!("  Stopped by signal");
        } else if self.session_ended {
            println!("  Session ended on its own");
        }
        println!(
            "  Bake queue: {}/{} jobs processed",
            self.bake.jobs_done, self.bake.total_jobs
        );
        println!();
        print!("{}", self.session);
        println!();
    }
}
