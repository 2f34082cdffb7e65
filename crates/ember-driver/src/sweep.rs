//! Parameter sweeps over many independent runs.
//!
//! All sweeps are plain sequential loops — one run at a time, results
//! appended to CSV files row by row, a progress log line per unit of work.
//! The noise pool is fully regenerated before every stochastic trial so
//! trials stay statistically independent, and every trial seed derives from
//! the sweep's master seed, which makes a whole sweep reproducible.

use std::path::PathBuf;

use ember_automata::{GhCell, GhCensus, GhParams, GreenbergHastings, Life, LifeRule, Neighborhood};
use ember_fhn::{Fhn, FhnCell, FhnParams};
use ember_grid::{DoubleGrid, GridError, StepKernel};
use thiserror::Error;

use crate::trials::{TrialConfig, TrialLog, TrialRunner};
use crate::{Driver, GhCensusLog, LifeCensusLog};

/// Errors raised while running a sweep.
#[derive(Debug, Error)]
pub enum SweepError {
    /// A CSV file could not be created or written.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A kernel or configuration error outside the per-trial recovery path.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Mixes a master seed with per-unit indices, SplitMix64-style, so every
/// trial in a sweep gets an independent, reproducible stream.
fn derive_seed(master: u64, lane: u64, index: u64) -> u64 {
    let mut z = master ^ lane.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ index.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Aggregated outcome of one sweep point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaSummary {
    /// Noise amplitude of this sweep point.
    pub sigma: f32,
    /// Trials run.
    pub trials: u32,
    /// Trials where the wave arrived with no spurious activation.
    pub successes: u32,
}

impl SigmaSummary {
    /// Success fraction in [0, 1].
    pub fn success_rate(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.successes as f64 / self.trials as f64
        }
    }
}

/// Noise-amplitude sweep for the stochastic-resonance experiment.
///
/// For each sigma, `trials_per_sigma` independent trials run against a
/// fresh kernel whose pool is regenerated per trial; results land in one
/// CSV per sigma (`sigma_<value>.csv`) under `output_dir`.
#[derive(Debug, Clone)]
pub struct SigmaSweep {
    /// Noise amplitudes to visit, in order.
    pub sigmas: Vec<f32>,
    /// Trials per amplitude.
    pub trials_per_sigma: u32,
    /// Master seed; every trial seed derives from it.
    pub master_seed: u64,
    /// Directory receiving the per-sigma CSV files.
    pub output_dir: PathBuf,
    /// Per-trial configuration.
    pub config: TrialConfig,
}

impl SigmaSweep {
    /// Runs the sweep and returns one summary per sigma.
    pub fn run(
        &self,
        params: FhnParams,
        width: usize,
        height: usize,
    ) -> Result<Vec<SigmaSummary>, SweepError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let runner = TrialRunner::new(self.config.clone());
        let mut summaries = Vec::with_capacity(self.sigmas.len());

        log::info!(
            "sigma sweep: {} amplitudes x {} trials on {}x{}",
            self.sigmas.len(),
            self.trials_per_sigma,
            width,
            height
        );

        for (sigma_idx, &sigma) in self.sigmas.iter().enumerate() {
            let mut run_params = params;
            run_params.noise_amplitude = sigma;

            let kernel = Fhn::new(
                run_params,
                width,
                height,
                derive_seed(self.master_seed, sigma_idx as u64, 0),
            )?;
            let grid = DoubleGrid::new(width, height, FhnCell::default())?;
            let mut driver = Driver::new(
                kernel,
                grid,
                run_params.dt as f64,
                run_params.time_scale as f64,
            )?;

            let path = self.output_dir.join(format!("sigma_{sigma:.4}.csv"));
            let mut csv = TrialLog::create(&path)?;
            let mut successes = 0u32;

            for trial in 0..self.trials_per_sigma {
                let seed = derive_seed(self.master_seed, sigma_idx as u64, u64::from(trial) + 1);
                let result = runner.run(&mut driver, seed)?;
                csv.record(trial + 1, sigma, &result)?;
                if result.success {
                    successes += 1;
                }
                log::debug!(
                    "sigma {sigma:.4} trial {}/{}: {:?} in {} steps",
                    trial + 1,
                    self.trials_per_sigma,
                    result.outcome,
                    result.steps
                );
            }

            log::info!(
                "sigma {sigma:.4}: {successes}/{} successes",
                self.trials_per_sigma
            );
            summaries.push(SigmaSummary {
                sigma,
                trials: self.trials_per_sigma,
                successes,
            });
        }
        Ok(summaries)
    }
}

/// Greenberg-Hastings batch experiment: refractory period x grid size at a
/// fixed density, a per-step census CSV per combination.
#[derive(Debug, Clone)]
pub struct GhBatch {
    /// Square grid side lengths to visit.
    pub grid_sizes: Vec<usize>,
    /// Refractory periods to visit per size.
    pub refractory_periods: Vec<u16>,
    /// Steps per combination.
    pub steps: u64,
    /// Initial excited/refractory density.
    pub density: f32,
    /// Excitation threshold.
    pub threshold: u8,
    /// Neighbor set.
    pub neighborhood: Neighborhood,
    /// Master seed for the initial patterns.
    pub master_seed: u64,
    /// Directory receiving the census CSV files.
    pub output_dir: PathBuf,
}

impl GhBatch {
    /// Runs every combination, writing
    /// `GH_size<S>x<S>_density<D>_refr<R>.csv` files.
    pub fn run(&self) -> Result<(), SweepError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let density_percent = (self.density * 100.0).round() as u32;

        for (size_idx, &size) in self.grid_sizes.iter().enumerate() {
            let mut grid = DoubleGrid::new(size, size, GhCell::resting())?;

            for (period_idx, &period) in self.refractory_periods.iter().enumerate() {
                let params = GhParams::new(self.threshold, period, self.neighborhood)?;
                let mut kernel = GreenbergHastings::new(params);
                kernel.seed_random(
                    &mut grid,
                    derive_seed(self.master_seed, size_idx as u64, period_idx as u64),
                    self.density,
                );
                grid.reset_clock();

                let name =
                    format!("GH_size{size}x{size}_density{density_percent}_refr{period}.csv");
                let mut csv = GhCensusLog::create(self.output_dir.join(name))?;

                for step in 1..=self.steps {
                    kernel.step(&mut grid)?;
                    csv.record(step, &GhCensus::of(&grid))?;
                    if step % 100 == 0 {
                        log::debug!("GH size {size} refr {period}: step {step}/{}", self.steps);
                    }
                }
                log::info!("GH size {size} refr {period}: done");
            }
        }
        Ok(())
    }
}

/// Game of Life rule sweep: density x survive x birth with the strict
/// single-count rule, a per-step live-count CSV per combination.
#[derive(Debug, Clone)]
pub struct LifeBatch {
    /// Square grid side length.
    pub grid_size: usize,
    /// Initial live densities to visit.
    pub densities: Vec<f32>,
    /// Survive counts to visit (0..=8).
    pub survive_rules: Vec<u8>,
    /// Birth counts to visit (0..=8).
    pub birth_rules: Vec<u8>,
    /// Steps per combination.
    pub steps: u64,
    /// Master seed for the initial patterns.
    pub master_seed: u64,
    /// Directory receiving the census CSV files.
    pub output_dir: PathBuf,
}

impl LifeBatch {
    /// Runs every combination, writing
    /// `GoL_size<S>x<S>_density<D>_survive<V>_birth<B>.csv` files.
    pub fn run(&self) -> Result<(), SweepError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let size = self.grid_size;
        let mut grid = DoubleGrid::new(size, size, false)?;

        let mut combo = 0u64;
        for &density in &self.densities {
            let density_percent = (density * 100.0).round() as u32;
            for &survive in &self.survive_rules {
                for &birth in &self.birth_rules {
                    let mut kernel = Life::new(LifeRule::exact(birth, survive)?);
                    kernel.seed_random(&mut grid, derive_seed(self.master_seed, combo, 0), density);
                    grid.reset_clock();
                    combo += 1;

                    let name = format!(
                        "GoL_size{size}x{size}_density{density_percent}_survive{survive}_birth{birth}.csv"
                    );
                    let mut csv = LifeCensusLog::create(self.output_dir.join(name))?;

                    for step in 1..=self.steps {
                        kernel.step(&mut grid)?;
                        csv.record(step, Life::population(&grid))?;
                    }
                    log::debug!("GoL density {density_percent} S{survive} B{birth}: done");
                }
            }
        }
        Ok(())
    }
}
