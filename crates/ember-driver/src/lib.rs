//! Stepping, trial running and parameter sweeps for the simulation kernels.
//!
//! [`Driver`] owns a grid and its kernel and advances them in one of two
//! modes: *real-time*, where wall-clock deltas are converted into a
//! simulated-time budget and drained one fixed step at a time, and *batch*,
//! where exactly N steps run back to back with no wall-clock coupling.
//!
//! On top of the driver, [`trials`] runs single stochastic-resonance trials
//! to a verdict and [`sweep`] iterates parameter grids, appending results to
//! CSV files row by row so a crashed sweep keeps everything it finished.
//!
//! # Example
//!
//! ```
//! use ember_automata::{Life, LifeRule};
//! use ember_driver::Driver;
//! use ember_grid::DoubleGrid;
//!
//! let grid = DoubleGrid::new(16, 16, false).unwrap();
//! let kernel = Life::new(LifeRule::classic());
//! // 32 generations per simulated second, real-time rate 1x.
//! let mut driver = Driver::new(kernel, grid, 0.03125, 1.0).unwrap();
//!
//! let taken = driver.advance(0.5).unwrap();
//! assert_eq!(taken, 16);
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ember_automata::GhCensus;
use ember_grid::{DoubleGrid, GridError, StepKernel};

pub mod sweep;
pub mod trials;

pub use sweep::{GhBatch, LifeBatch, SigmaSummary, SigmaSweep, SweepError};
pub use trials::{Region, TrialConfig, TrialLog, TrialOutcome, TrialResult, TrialRunner};

/// Hard cap on catch-up steps per real-time frame, so a long stall cannot
/// stall the next frame even longer.
pub const DEFAULT_MAX_STEPS_PER_FRAME: usize = 300;

/// Owns a grid/kernel pair and the swap-commit cadence.
#[derive(Debug)]
pub struct Driver<K: StepKernel> {
    kernel: K,
    grid: DoubleGrid<K::Cell>,
    dt_sim: f64,
    time_scale: f64,
    max_steps_per_frame: usize,
    accumulator: f64,
    steps: u64,
}

impl<K: StepKernel> Driver<K> {
    /// Creates a driver stepping `dt_sim` simulated seconds per generation,
    /// with wall-clock time scaled by `time_scale` in real-time mode.
    pub fn new(
        kernel: K,
        grid: DoubleGrid<K::Cell>,
        dt_sim: f64,
        time_scale: f64,
    ) -> Result<Self, GridError> {
        if !dt_sim.is_finite() || dt_sim <= 0.0 {
            return Err(GridError::InvalidConfiguration(format!(
                "dt_sim must be positive, got {dt_sim}"
            )));
        }
        if !time_scale.is_finite() || time_scale <= 0.0 {
            return Err(GridError::InvalidConfiguration(format!(
                "time_scale must be positive, got {time_scale}"
            )));
        }
        Ok(Self {
            kernel,
            grid,
            dt_sim,
            time_scale,
            max_steps_per_frame: DEFAULT_MAX_STEPS_PER_FRAME,
            accumulator: 0.0,
            steps: 0,
        })
    }

    /// The kernel.
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Mutable kernel access, for edits serialized between steps.
    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    /// The grid.
    pub fn grid(&self) -> &DoubleGrid<K::Cell> {
        &self.grid
    }

    /// Mutable grid access, for edits serialized between steps.
    pub fn grid_mut(&mut self) -> &mut DoubleGrid<K::Cell> {
        &mut self.grid
    }

    /// Steps taken since construction or the last restart.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Simulated time elapsed, `steps * dt_sim`.
    pub fn sim_time(&self) -> f64 {
        self.steps as f64 * self.dt_sim
    }

    /// Simulated seconds per generation.
    pub fn dt_sim(&self) -> f64 {
        self.dt_sim
    }

    /// Changes the per-frame catch-up cap (at least 1).
    pub fn set_max_steps_per_frame(&mut self, cap: usize) {
        self.max_steps_per_frame = cap.max(1);
    }

    /// Real-time mode: folds a wall-clock delta into the time budget and
    /// drains whole steps from it, up to the per-frame cap. Returns how many
    /// steps ran. Leftover budget carries to the next call, so the
    /// simulation rate is decoupled from the caller's frame rate.
    pub fn advance(&mut self, frame_dt: f64) -> Result<usize, GridError> {
        self.accumulator += frame_dt.max(0.0) * self.time_scale;
        let mut taken = 0;
        while self.accumulator >= self.dt_sim && taken < self.max_steps_per_frame {
            self.kernel.step(&mut self.grid)?;
            self.accumulator -= self.dt_sim;
            taken += 1;
            self.steps += 1;
        }
        Ok(taken)
    }

    /// Batch mode: exactly `n` steps, no wall-clock coupling.
    pub fn run_batch(&mut self, n: u64) -> Result<(), GridError> {
        for _ in 0..n {
            self.kernel.step(&mut self.grid)?;
            self.steps += 1;
        }
        Ok(())
    }

    /// Batch mode with a cancellation check at every step boundary. The
    /// callback receives the total step count; returning `false` aborts
    /// between generations. Returns whether the batch ran to completion.
    pub fn run_batch_with(
        &mut self,
        n: u64,
        mut keep_going: impl FnMut(u64) -> bool,
    ) -> Result<bool, GridError> {
        for _ in 0..n {
            if !keep_going(self.steps) {
                return Ok(false);
            }
            self.kernel.step(&mut self.grid)?;
            self.steps += 1;
        }
        Ok(true)
    }

    /// Reinitializes through the supplied closure and zeroes the step
    /// counter, the time budget and the grid's generation clock.
    pub fn restart_with(&mut self, init: impl FnOnce(&mut K, &mut DoubleGrid<K::Cell>)) {
        init(&mut self.kernel, &mut self.grid);
        self.grid.reset_clock();
        self.steps = 0;
        self.accumulator = 0.0;
    }

    /// Releases the kernel and grid.
    pub fn into_parts(self) -> (K, DoubleGrid<K::Cell>) {
        (self.kernel, self.grid)
    }
}

// ============================================================================
// Census logs
// ============================================================================

/// Per-step live-cell count log for Game of Life runs.
///
/// Format: `Iteration,Live Cell Count`, one row per recorded step, flushed
/// row by row.
#[derive(Debug)]
pub struct LifeCensusLog {
    writer: BufWriter<File>,
    rows: u64,
}

impl LifeCensusLog {
    /// Creates the file and writes the header.
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "Iteration,Live Cell Count")?;
        writer.flush()?;
        Ok(Self { writer, rows: 0 })
    }

    /// Appends one row.
    pub fn record(&mut self, step: u64, live: usize) -> std::io::Result<()> {
        writeln!(self.writer, "{step},{live}")?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Data rows written so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

/// Per-step phase census log for Greenberg-Hastings runs.
///
/// Format: `Step,Active_cells,Refractory_cells,Resting_cells`, one row per
/// recorded step, flushed row by row.
#[derive(Debug)]
pub struct GhCensusLog {
    writer: BufWriter<File>,
    rows: u64,
}

impl GhCensusLog {
    /// Creates the file and writes the header.
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "Step,Active_cells,Refractory_cells,Resting_cells")?;
        writer.flush()?;
        Ok(Self { writer, rows: 0 })
    }

    /// Appends one row.
    pub fn record(&mut self, step: u64, census: &GhCensus) -> std::io::Result<()> {
        writeln!(
            self.writer,
            "{step},{},{},{}",
            census.excited, census.refractory, census.resting
        )?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Data rows written so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_automata::{GhParams, GreenbergHastings, Life, LifeRule, Neighborhood};
    use ember_automata::{GhCell, GhCensus};

    /// Kernel that only copies state forward; used to count scheduling.
    struct IdleKernel;

    impl StepKernel for IdleKernel {
        type Cell = u8;

        fn step(&mut self, grid: &mut DoubleGrid<u8>) -> Result<(), GridError> {
            grid.copy_next_from_current();
            grid.commit();
            Ok(())
        }
    }

    fn idle_driver(dt_sim: f64, time_scale: f64) -> Driver<IdleKernel> {
        let grid = DoubleGrid::new(4, 4, 0u8).unwrap();
        Driver::new(IdleKernel, grid, dt_sim, time_scale).unwrap()
    }

    #[test]
    fn construction_validates_timing() {
        let grid = DoubleGrid::new(4, 4, 0u8).unwrap();
        assert!(Driver::new(IdleKernel, grid.clone(), 0.0, 1.0).is_err());
        assert!(Driver::new(IdleKernel, grid.clone(), 0.02, 0.0).is_err());
        assert!(Driver::new(IdleKernel, grid, 0.02, 50.0).is_ok());
    }

    #[test]
    fn advance_drains_whole_steps_and_keeps_the_remainder() {
        // Binary-exact timing values keep the arithmetic away from step
        // boundaries.
        let mut driver = idle_driver(0.25, 4.0);

        // 2.0 wall seconds * 4 = 8.0 simulated seconds = 32 steps.
        assert_eq!(driver.advance(2.0).unwrap(), 32);
        assert_eq!(driver.steps(), 32);

        // 0.05 * 4 = 0.2: under one step, budget carries over.
        assert_eq!(driver.advance(0.05).unwrap(), 0);
        assert_eq!(driver.advance(0.05).unwrap(), 1);
    }

    #[test]
    fn advance_caps_catch_up_after_a_stall() {
        let mut driver = idle_driver(0.25, 4.0);

        // A 400-simulated-second stall wants 1600 steps; the cap holds it
        // to 300 per frame and keeps the rest of the budget.
        assert_eq!(driver.advance(100.0).unwrap(), 300);
        assert_eq!(driver.advance(0.0).unwrap(), 300);
        assert_eq!(driver.steps(), 600);
    }

    #[test]
    fn batch_runs_exactly_n_steps() {
        let mut driver = idle_driver(0.02, 1.0);
        driver.run_batch(137).unwrap();
        assert_eq!(driver.steps(), 137);
        assert!((driver.sim_time() - 137.0 * 0.02).abs() < 1e-12);
    }

    #[test]
    fn batch_can_be_cancelled_between_generations() {
        let mut driver = idle_driver(0.02, 1.0);
        let completed = driver
            .run_batch_with(1000, |steps| steps < 25)
            .unwrap();
        assert!(!completed);
        assert_eq!(driver.steps(), 25);
    }

    #[test]
    fn restart_resets_counters() {
        let mut driver = idle_driver(0.02, 1.0);
        driver.run_batch(10).unwrap();
        driver.restart_with(|_, grid| {
            grid.fill_next(7);
            grid.commit();
        });
        assert_eq!(driver.steps(), 0);
        assert_eq!(driver.grid().generation(), 0);
        assert!(driver.grid().current().iter().all(|&c| c == 7));
    }

    #[test]
    fn driver_steps_real_kernels() {
        let mut grid = DoubleGrid::new(9, 9, false).unwrap();
        let life = Life::new(LifeRule::classic());
        // Blinker through the driver.
        life.set(&mut grid, 3, 4, true).unwrap();
        life.set(&mut grid, 4, 4, true).unwrap();
        life.set(&mut grid, 5, 4, true).unwrap();

        let mut driver = Driver::new(life, grid, 1.0, 1.0).unwrap();
        driver.run_batch(2).unwrap();
        assert!(*driver.grid().get(4, 4).unwrap());
        assert_eq!(ember_automata::Life::population(driver.grid()), 3);
    }

    #[test]
    fn census_logs_write_header_and_rows() {
        let dir = std::env::temp_dir().join("ember-driver-census-test");
        std::fs::create_dir_all(&dir).unwrap();

        let life_path = dir.join("life.csv");
        let mut log = LifeCensusLog::create(&life_path).unwrap();
        log.record(1, 42).unwrap();
        log.record(2, 40).unwrap();
        assert_eq!(log.rows(), 2);
        drop(log);

        let text = std::fs::read_to_string(&life_path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Iteration,Live Cell Count");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "1,42");

        let gh_path = dir.join("gh.csv");
        let mut kernel = GreenbergHastings::new(
            GhParams::new(2, 4, Neighborhood::Moore).unwrap(),
        );
        let mut grid = DoubleGrid::new(12, 12, GhCell::resting()).unwrap();
        kernel.seed_random(&mut grid, 11, 0.2);

        let mut log = GhCensusLog::create(&gh_path).unwrap();
        for step in 1..=5u64 {
            kernel.step(&mut grid).unwrap();
            log.record(step, &GhCensus::of(&grid)).unwrap();
        }
        drop(log);

        let text = std::fs::read_to_string(&gh_path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Step,Active_cells,Refractory_cells,Resting_cells");
        assert_eq!(lines.len(), 6);

        std::fs::remove_file(&life_path).ok();
        std::fs::remove_file(&gh_path).ok();
    }
}
