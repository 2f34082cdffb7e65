//! Single stochastic-resonance trials and their CSV log.
//!
//! A trial seeds a wave, regenerates the noise pool, then runs batch steps
//! until one of five verdicts: the wave reached the target region, a cell
//! activated away from the seeded front (auto-excitation), all activity
//! ceased, the activation front stopped growing (stagnation), or the step
//! budget ran out.
//!
//! Activation is tracked per cell (`u` ever above the activation
//! threshold). Cells reachable from the seed region through the activated
//! set — 8-connected flood fill — belong to the wave; any other activated
//! cell is spurious.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use ember_fhn::{Fhn, FhnCell, SPOT_U, SPOT_V};
use ember_grid::{DoubleGrid, GridError};

use crate::Driver;

/// A half-open rectangular cell region: `x0..x1` by `y0..y1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Left edge (inclusive).
    pub x0: usize,
    /// Bottom edge (inclusive).
    pub y0: usize,
    /// Right edge (exclusive).
    pub x1: usize,
    /// Top edge (exclusive).
    pub y1: usize,
}

impl Region {
    /// Creates a region; empty when the edges cross.
    pub fn new(x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// True if `(x, y)` lies inside.
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    /// True if the region holds no cells.
    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    /// A `size`-wide square centered on the grid.
    pub fn center_square(width: usize, height: usize, size: usize) -> Self {
        let x0 = (width / 2).saturating_sub(size / 2);
        let y0 = (height / 2).saturating_sub(size / 2);
        Self {
            x0,
            y0,
            x1: (x0 + size).min(width),
            y1: (y0 + size).min(height),
        }
    }

    /// A `thickness`-wide band along the right edge — the default target
    /// wall.
    pub fn right_wall(width: usize, height: usize, thickness: usize) -> Self {
        Self {
            x0: width.saturating_sub(thickness),
            y0: 0,
            x1: width,
            y1: height,
        }
    }
}

/// Knobs for one trial.
#[derive(Debug, Clone)]
pub struct TrialConfig {
    /// Step budget before the trial times out.
    pub max_steps: u64,
    /// Steps between state analyses.
    pub analyze_every: u64,
    /// `u` level past which a cell counts as activated.
    pub activation_threshold: f32,
    /// Peak `u` below which the whole system counts as quiescent.
    pub quiescence_threshold: f32,
    /// Consecutive analyses without new activation before the trial is
    /// declared stagnant.
    pub stagnation_window: u32,
    /// Spurious-cell count tolerated before auto-excitation is flagged.
    pub spurious_tolerance: usize,
    /// Stop as soon as auto-excitation is detected.
    pub stop_on_auto_excitation: bool,
    /// Where the wave is seeded.
    pub seed: Region,
    /// Where the wave must arrive.
    pub target: Region,
}

impl TrialConfig {
    /// Defaults for a stochastic-resonance run: 80k steps, analysis every
    /// 200, a centered square seed and the right wall as target.
    pub fn for_grid(width: usize, height: usize) -> Self {
        let spot = 30.min(width / 4).max(2);
        Self {
            max_steps: 80_000,
            analyze_every: 200,
            activation_threshold: 0.5,
            quiescence_threshold: 0.1,
            stagnation_window: 20,
            spurious_tolerance: 0,
            stop_on_auto_excitation: true,
            seed: Region::center_square(width, height, spot),
            target: Region::right_wall(width, height, 2),
        }
    }
}

/// Why a trial stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialOutcome {
    /// The wave reached the target region with no spurious activation.
    HitTarget,
    /// A cell activated away from the seeded front.
    AutoExcited,
    /// All activity ceased (including integrator divergence).
    SystemDead,
    /// The activation front stopped growing.
    Stagnated,
    /// The step budget ran out first.
    TimedOut,
}

/// Immutable record of one finished trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialResult {
    /// Why the trial stopped.
    pub outcome: TrialOutcome,
    /// Wave arrived and nothing fired spuriously.
    pub success: bool,
    /// The target region was reached.
    pub hit_target: bool,
    /// Spurious activation was detected.
    pub auto_excited: bool,
    /// The system went quiescent or diverged.
    pub system_dead: bool,
    /// The activation front stopped growing.
    pub stagnated: bool,
    /// Steps actually taken.
    pub steps: u64,
    /// Simulated seconds elapsed.
    pub sim_time: f64,
    /// Wall-clock seconds elapsed.
    pub wall_time: f64,
}

/// Per-cell activation bookkeeping across one trial.
struct Tracker {
    width: usize,
    height: usize,
    ever: Vec<bool>,
    last_count: usize,
    static_analyses: u32,
}

struct Observation {
    u_max: f32,
    hit_target: bool,
    spurious: usize,
    grew: bool,
}

impl Tracker {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ever: vec![false; width * height],
            last_count: 0,
            static_analyses: 0,
        }
    }

    fn observe(&mut self, cells: &[FhnCell], config: &TrialConfig) -> Observation {
        let mut u_max = f32::NEG_INFINITY;
        for (flag, cell) in self.ever.iter_mut().zip(cells) {
            if cell.u > config.activation_threshold {
                *flag = true;
            }
            u_max = u_max.max(cell.u);
        }

        let count = self.ever.iter().filter(|&&e| e).count();
        let grew = count > self.last_count;
        if grew {
            self.static_analyses = 0;
        } else {
            self.static_analyses += 1;
        }
        self.last_count = count;

        let reached = self.flood_from_seed(&config.seed);
        let reached_count = reached.iter().filter(|&&r| r).count();
        let spurious = count - reached_count;

        let mut hit_target = false;
        'outer: for y in config.target.y0..config.target.y1.min(self.height) {
            for x in config.target.x0..config.target.x1.min(self.width) {
                if reached[y * self.width + x] {
                    hit_target = true;
                    break 'outer;
                }
            }
        }

        Observation {
            u_max,
            hit_target,
            spurious,
            grew,
        }
    }

    /// 8-connected flood fill from the seed region over activated cells.
    fn flood_from_seed(&self, seed: &Region) -> Vec<bool> {
        let mut reached = vec![false; self.ever.len()];
        let mut stack = Vec::new();
        for y in seed.y0..seed.y1.min(self.height) {
            for x in seed.x0..seed.x1.min(self.width) {
                let i = y * self.width + x;
                if self.ever[i] && !reached[i] {
                    reached[i] = true;
                    stack.push((x, y));
                }
            }
        }
        while let Some((x, y)) = stack.pop() {
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= self.width as i32 || ny >= self.height as i32 {
                        continue;
                    }
                    let j = ny as usize * self.width + nx as usize;
                    if self.ever[j] && !reached[j] {
                        reached[j] = true;
                        stack.push((nx as usize, ny as usize));
                    }
                }
            }
        }
        reached
    }
}

/// Runs trials against a FitzHugh-Nagumo driver.
#[derive(Debug, Clone)]
pub struct TrialRunner {
    /// Trial configuration shared by every run.
    pub config: TrialConfig,
}

impl TrialRunner {
    /// Creates a runner.
    pub fn new(config: TrialConfig) -> Self {
        Self { config }
    }

    /// Runs one independent trial: reseeds the wave and the noise pool,
    /// steps in `analyze_every` batches and classifies the stop cause.
    ///
    /// Integrator divergence is folded into a `system_dead` verdict; any
    /// other kernel error propagates, since it means the runner itself is
    /// misconfigured.
    pub fn run(
        &self,
        driver: &mut Driver<Fhn>,
        trial_seed: u64,
    ) -> Result<TrialResult, GridError> {
        let config = &self.config;
        if config.analyze_every == 0 {
            return Err(GridError::InvalidConfiguration(
                "analyze_every must be at least 1".into(),
            ));
        }
        let wall_start = Instant::now();

        driver.restart_with(|fhn, grid| {
            seed_region(grid, &config.seed);
            fhn.reseed_noise(trial_seed);
        });

        let width = driver.grid().width();
        let height = driver.grid().height();
        let mut tracker = Tracker::new(width, height);
        tracker.observe(driver.grid().current(), config);

        let mut hit_target = false;
        let mut auto_excited = false;
        let mut system_dead = false;
        let mut stagnated = false;
        let mut outcome = TrialOutcome::TimedOut;

        while driver.steps() < config.max_steps {
            let chunk = config.analyze_every.min(config.max_steps - driver.steps());
            match driver.run_batch(chunk) {
                Ok(()) => {}
                Err(GridError::NumericalInstability { x, y, value, .. }) => {
                    log::warn!("trial diverged at ({x}, {y}): {value}");
                    system_dead = true;
                    outcome = TrialOutcome::SystemDead;
                    break;
                }
                Err(other) => return Err(other),
            }

            let obs = tracker.observe(driver.grid().current(), config);
            if obs.spurious > config.spurious_tolerance {
                auto_excited = true;
            }
            if obs.hit_target {
                hit_target = true;
                outcome = if auto_excited {
                    TrialOutcome::AutoExcited
                } else {
                    TrialOutcome::HitTarget
                };
                break;
            }
            if auto_excited && config.stop_on_auto_excitation {
                outcome = TrialOutcome::AutoExcited;
                break;
            }
            if obs.u_max < config.quiescence_threshold {
                system_dead = true;
                outcome = TrialOutcome::SystemDead;
                break;
            }
            if !obs.grew && tracker.static_analyses >= config.stagnation_window {
                stagnated = true;
                outcome = TrialOutcome::Stagnated;
                break;
            }
        }

        Ok(TrialResult {
            outcome,
            success: hit_target && !auto_excited,
            hit_target,
            auto_excited,
            system_dead,
            stagnated,
            steps: driver.steps(),
            sim_time: driver.sim_time(),
            wall_time: wall_start.elapsed().as_secs_f64(),
        })
    }
}

/// Writes the seed spot into the next generation and commits.
fn seed_region(grid: &mut DoubleGrid<FhnCell>, seed: &Region) {
    let width = grid.width();
    let height = grid.height();
    grid.fill_next(FhnCell::default());
    {
        let (_, next) = grid.split();
        for y in seed.y0..seed.y1.min(height) {
            for x in seed.x0..seed.x1.min(width) {
                next[y * width + x] = FhnCell { u: SPOT_U, v: SPOT_V };
            }
        }
    }
    grid.commit();
}

/// Trial-log CSV writer.
///
/// Header:
/// `trial,sigma,success,hit_target,auto_excited,system_dead,stagnated,steps,sim_time,wall_time`.
/// Rows are flushed as they are written so a crashed sweep keeps its
/// progress.
#[derive(Debug)]
pub struct TrialLog {
    writer: BufWriter<File>,
    rows: u64,
}

impl TrialLog {
    /// Creates the file and writes the header.
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(
            writer,
            "trial,sigma,success,hit_target,auto_excited,system_dead,stagnated,steps,sim_time,wall_time"
        )?;
        writer.flush()?;
        Ok(Self { writer, rows: 0 })
    }

    /// Appends one trial row.
    pub fn record(&mut self, trial: u32, sigma: f32, result: &TrialResult) -> std::io::Result<()> {
        writeln!(
            self.writer,
            "{trial},{sigma:.4},{},{},{},{},{},{},{:.4},{:.2}",
            result.success,
            result.hit_target,
            result.auto_excited,
            result.system_dead,
            result.stagnated,
            result.steps,
            result.sim_time,
            result.wall_time,
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
    use ember_fhn::FhnParams;

    fn fhn_driver(width: usize, height: usize, params: FhnParams) -> Driver<Fhn> {
        let fhn = Fhn::new(params, width, height, 0).unwrap();
        let grid = DoubleGrid::new(width, height, FhnCell::default()).unwrap();
        let dt = params.dt as f64;
        Driver::new(fhn, grid, dt, params.time_scale as f64).unwrap()
    }

    #[test]
    fn region_geometry() {
        let r = Region::new(2, 3, 5, 6);
        assert!(r.contains(2, 3));
        assert!(r.contains(4, 5));
        assert!(!r.contains(5, 3));
        assert!(!r.contains(2, 6));
        assert!(Region::new(3, 3, 3, 6).is_empty());

        let wall = Region::right_wall(32, 16, 2);
        assert!(wall.contains(30, 0));
        assert!(wall.contains(31, 15));
        assert!(!wall.contains(29, 8));

        let square = Region::center_square(32, 32, 8);
        assert!(square.contains(16, 16));
        assert!(!square.contains(11, 16));
    }

    #[test]
    fn empty_seed_goes_quiescent() {
        let mut config = TrialConfig::for_grid(16, 16);
        config.seed = Region::new(0, 0, 0, 0);
        config.max_steps = 1_000;
        config.analyze_every = 100;

        let mut driver = fhn_driver(16, 16, FhnParams::default());
        let result = TrialRunner::new(config).run(&mut driver, 1).unwrap();

        assert_eq!(result.outcome, TrialOutcome::SystemDead);
        assert!(result.system_dead);
        assert!(!result.success);
        assert_eq!(result.steps, 100);
    }

    #[test]
    fn target_overlapping_seed_hits_immediately() {
        let mut config = TrialConfig::for_grid(16, 16);
        config.target = config.seed;
        config.max_steps = 1_000;
        config.analyze_every = 50;

        let mut driver = fhn_driver(16, 16, FhnParams::default());
        let result = TrialRunner::new(config).run(&mut driver, 2).unwrap();

        assert_eq!(result.outcome, TrialOutcome::HitTarget);
        assert!(result.success && result.hit_target);
        assert!(!result.auto_excited && !result.system_dead && !result.stagnated);
        assert_eq!(result.steps, 50);
    }

    #[test]
    fn unreachable_target_times_out() {
        // On a 48x48 grid the wave needs roughly 210 steps to reach the
        // right wall; a 150-step budget has to time out with the wave still
        // alive.
        let mut config = TrialConfig::for_grid(48, 48);
        config.max_steps = 150;
        config.analyze_every = 50;
        config.stagnation_window = 1_000; // effectively off

        let mut driver = fhn_driver(48, 48, FhnParams::default());
        let result = TrialRunner::new(config).run(&mut driver, 3).unwrap();

        assert_eq!(result.outcome, TrialOutcome::TimedOut);
        assert!(!result.success);
        assert!(!result.hit_target && !result.system_dead);
        assert_eq!(result.steps, 150);
    }

    #[test]
    fn noiseless_wave_reaches_the_wall() {
        // Deterministic propagation success: the centered spot launches a
        // wave that arrives at the right-wall target a little after 200
        // steps, flagged at the next analysis.
        let mut config = TrialConfig::for_grid(48, 48);
        config.max_steps = 2_000;
        config.analyze_every = 100;

        let mut driver = fhn_driver(48, 48, FhnParams::default());
        let result = TrialRunner::new(config).run(&mut driver, 7).unwrap();

        assert_eq!(result.outcome, TrialOutcome::HitTarget);
        assert!(result.success && result.hit_target);
        assert!(!result.auto_excited);
        assert_eq!(result.steps, 300);
    }

    #[test]
    fn divergence_counts_as_system_dead() {
        let params = FhnParams {
            dt: 1.0,
            ..FhnParams::default()
        };
        let mut config = TrialConfig::for_grid(16, 16);
        config.max_steps = 10_000;

        let mut driver = fhn_driver(16, 16, params);
        let result = TrialRunner::new(config).run(&mut driver, 4).unwrap();

        assert_eq!(result.outcome, TrialOutcome::SystemDead);
        assert!(result.system_dead && !result.success);
    }

    #[test]
    fn trials_reset_state_between_runs() {
        let mut config = TrialConfig::for_grid(16, 16);
        config.target = config.seed;
        config.max_steps = 200;
        config.analyze_every = 50;
        let runner = TrialRunner::new(config);

        let mut driver = fhn_driver(16, 16, FhnParams::default());
        let a = runner.run(&mut driver, 5).unwrap();
        let b = runner.run(&mut driver, 5).unwrap();

        // Same seed, freshly reseeded pool and grid: identical verdicts and
        // step counts.
        assert_eq!(a.outcome, b.outcome);
        assert_eq!(a.steps, b.steps);
    }

    #[test]
    fn trial_log_rows_match_header() {
        let dir = std::env::temp_dir().join("ember-trial-log-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("trials.csv");

        let result = TrialResult {
            outcome: TrialOutcome::HitTarget,
            success: true,
            hit_target: true,
            auto_excited: false,
            system_dead: false,
            stagnated: false,
            steps: 1200,
            sim_time: 24.0,
            wall_time: 0.5,
        };

        let mut log = TrialLog::create(&path).unwrap();
        log.record(1, 0.03, &result).unwrap();
        assert_eq!(log.rows(), 1);
        drop(log);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let header_fields = lines[0].split(',').count();
        let row_fields = lines[1].split(',').count();
        assert_eq!(header_fields, row_fields);
        assert!(lines[1].starts_with("1,0.0300,true,true,false,false,false,1200,"));

        std::fs::remove_file(&path).ok();
    }
}
