//! FitzHugh-Nagumo excitable medium on a double-buffered grid.
//!
//! Each cell carries a fast excitatory variable `u` and a slow recovery
//! variable `v`, advanced by an explicit Euler-Maruyama step:
//!
//! ```text
//! du = [ u(1-u)(u-a) - v ] / e  +  Du * lap(u)
//! dv = [ b*u - v ]              +  Dv * lap(v)
//! u' = u + du*dt + Z_u * sqrt(dt)
//! v' = v + dv*dt + Z_v * sqrt(dt)
//! ```
//!
//! `lap` is the 4-neighbor discrete Laplacian with zero-flux boundaries
//! (missing neighbors contribute nothing), and `(Z_u, Z_v)` are independent
//! Gaussian draws from a [`NoisePool`]. Noise fields are pre-scaled by the
//! noise amplitude when they are generated; the integrator applies only the
//! `sqrt(dt)` factor. That one convention holds everywhere.
//!
//! # Example
//!
//! ```
//! use ember_fhn::{Fhn, FhnCell, FhnParams};
//! use ember_grid::{DoubleGrid, StepKernel};
//!
//! let mut fhn = Fhn::new(FhnParams::default(), 64, 64, 42).unwrap();
//! let mut grid = DoubleGrid::new(64, 64, FhnCell::default()).unwrap();
//!
//! fhn.seed_spot(&mut grid, 30);
//! fhn.step_many(&mut grid, 100).unwrap();
//! assert!(Fhn::energy(&grid) > 0.0);
//! ```
//!
//! # Stability
//!
//! The explicit scheme diverges when `dt` is too large for the diffusion
//! coefficients — roughly `dt <= 1 / (4 * max(Du, Dv))` on a unit lattice.
//! The defaults (`dt = 0.02`, `Du = 4.0`, `Dv = 0.5`) sit inside that
//! region and are stable over hundreds of thousands of steps. A sanity
//! bound on |u| and |v| turns divergence into a
//! [`GridError::NumericalInstability`] instead of a silent runaway.

use ember_grid::{DoubleGrid, GridError, StepKernel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// `u` value written by [`Fhn::activate`] and the spot patterns.
pub const SPOT_U: f32 = 0.9;
/// `v` value written by [`Fhn::activate`] and the spot patterns.
pub const SPOT_V: f32 = 0.11;

/// Default number of pre-sampled fields in a [`NoisePool`].
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Default |u|/|v| bound past which a step reports divergence.
pub const DEFAULT_SANITY_BOUND: f32 = 100.0;

/// One FitzHugh-Nagumo cell.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FhnCell {
    /// Fast excitatory variable.
    pub u: f32,
    /// Slow recovery variable.
    pub v: f32,
}

/// Model constants, fixed per run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FhnParams {
    /// Excitation threshold constant.
    pub a: f32,
    /// Recovery coupling constant.
    pub b: f32,
    /// Time-scale separation between `u` and `v`.
    pub e: f32,
    /// Diffusion coefficient of `u`.
    pub du: f32,
    /// Diffusion coefficient of `v`.
    pub dv: f32,
    /// Integration step in simulated seconds.
    pub dt: f32,
    /// Wall-clock-to-simulation-time multiplier used by real-time drivers.
    pub time_scale: f32,
    /// Standard deviation of the additive noise forcing.
    pub noise_amplitude: f32,
}

impl Default for FhnParams {
    fn default() -> Self {
        Self {
            a: 0.16,
            b: 0.14,
            e: 0.025,
            du: 4.0,
            dv: 0.5,
            dt: 0.02,
            time_scale: 50.0,
            noise_amplitude: 0.0,
        }
    }
}

impl FhnParams {
    /// Checks the parameter set, rejecting values the integrator cannot use.
    pub fn validate(&self) -> Result<(), GridError> {
        for (name, value) in [
            ("a", self.a),
            ("b", self.b),
            ("e", self.e),
            ("Du", self.du),
            ("Dv", self.dv),
            ("dt", self.dt),
            ("time_scale", self.time_scale),
            ("noise_amplitude", self.noise_amplitude),
        ] {
            if !value.is_finite() {
                return Err(GridError::InvalidConfiguration(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        if self.dt <= 0.0 {
            return Err(GridError::InvalidConfiguration(format!(
                "dt must be positive, got {}",
                self.dt
            )));
        }
        if self.e <= 0.0 {
            return Err(GridError::InvalidConfiguration(format!(
                "e must be positive, got {}",
                self.e
            )));
        }
        if self.du < 0.0 || self.dv < 0.0 {
            return Err(GridError::InvalidConfiguration(
                "diffusion coefficients must be non-negative".into(),
            ));
        }
        if self.time_scale <= 0.0 {
            return Err(GridError::InvalidConfiguration(
                "time_scale must be positive".into(),
            ));
        }
        if self.noise_amplitude < 0.0 {
            return Err(GridError::InvalidConfiguration(
                "noise_amplitude must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Noise pool
// ============================================================================

/// Rotating cache of pre-sampled Gaussian noise fields.
///
/// The pool holds a fixed number of fields, each one `(Z_u, Z_v)` pair per
/// cell, pre-scaled by the noise amplitude at generation time. Consumption
/// is round-robin with a fresh random 2D offset on every draw, so
/// consecutive uses of the same cached field are decorrelated. Before each
/// independent trial the whole pool must be resampled
/// ([`regenerate`](Self::regenerate)) — reusing fields across trials would
/// correlate their noise and bias a stochastic-resonance sweep.
#[derive(Debug, Clone)]
pub struct NoisePool {
    width: usize,
    height: usize,
    fields: Vec<Vec<[f32; 2]>>,
    cursor: usize,
    rng: StdRng,
}

impl NoisePool {
    /// Creates a pool of [`DEFAULT_POOL_SIZE`] fields.
    pub fn new(width: usize, height: usize, amplitude: f32, seed: u64) -> Self {
        Self::with_size(width, height, amplitude, DEFAULT_POOL_SIZE, seed)
    }

    /// Creates a pool with an explicit field count.
    pub fn with_size(
        width: usize,
        height: usize,
        amplitude: f32,
        pool_size: usize,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let len = width * height;
        let fields = (0..pool_size.max(1))
            .map(|_| Self::sample_field(&mut rng, len, amplitude))
            .collect();
        Self {
            width,
            height,
            fields,
            cursor: 0,
            rng,
        }
    }

    fn sample_field(rng: &mut StdRng, len: usize, amplitude: f32) -> Vec<[f32; 2]> {
        (0..len)
            .map(|_| {
                let zu: f32 = rng.sample(StandardNormal);
                let zv: f32 = rng.sample(StandardNormal);
                [zu * amplitude, zv * amplitude]
            })
            .collect()
    }

    /// Field width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Field height in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of cached fields.
    pub fn pool_size(&self) -> usize {
        self.fields.len()
    }

    /// Resamples every field at the given amplitude.
    pub fn regenerate(&mut self, amplitude: f32) {
        let len = self.width * self.height;
        for field in &mut self.fields {
            *field = Self::sample_field(&mut self.rng, len, amplitude);
        }
        self.cursor = 0;
    }

    /// Replaces the generator state; combine with
    /// [`regenerate`](Self::regenerate) for a reproducible trial.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Takes the next field, round-robin, with a fresh random offset.
    pub fn draw(&mut self) -> NoiseView<'_> {
        let idx = self.cursor % self.fields.len();
        self.cursor = self.cursor.wrapping_add(1);
        let ox = self.rng.gen_range(0..self.width);
        let oy = self.rng.gen_range(0..self.height);
        NoiseView {
            field: &self.fields[idx],
            width: self.width,
            height: self.height,
            ox,
            oy,
        }
    }
}

/// One noise field viewed through a wrapping spatial offset.
#[derive(Debug)]
pub struct NoiseView<'a> {
    field: &'a [[f32; 2]],
    width: usize,
    height: usize,
    ox: usize,
    oy: usize,
}

impl NoiseView<'_> {
    /// The pre-scaled `(Z_u, Z_v)` pair for a cell.
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> [f32; 2] {
        let x = (x + self.ox) % self.width;
        let y = (y + self.oy) % self.height;
        self.field[y * self.width + x]
    }
}

// ============================================================================
// Two-region tissue
// ============================================================================

/// Material class of one cell in the two-region variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Material {
    /// Wall: never updates, excluded from neighbor coupling.
    Blocked,
    /// Gray matter: less excitable, slower diffusion.
    Gray,
    /// White matter: uses the global parameters.
    White,
}

/// Luminance cut points for material classification.
///
/// Intervals are half-open: `l < black_max` is blocked,
/// `black_max <= l < gray_max` is gray, `l >= gray_max` is white.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaterialThresholds {
    /// Upper luminance bound (exclusive) of the blocked class.
    pub black_max: f32,
    /// Upper luminance bound (exclusive) of the gray class.
    pub gray_max: f32,
}

impl Default for MaterialThresholds {
    fn default() -> Self {
        Self {
            black_max: 0.2,
            gray_max: 0.6,
        }
    }
}

/// Static per-cell material mask with the gray-matter overrides.
#[derive(Debug, Clone)]
pub struct Tissue {
    width: usize,
    height: usize,
    materials: Vec<Material>,
    /// `a` used inside gray matter.
    pub gray_a: f32,
    /// `Du` used inside gray matter.
    pub gray_du: f32,
}

impl Tissue {
    /// An all-white mask, the starting point for interactive wall edits.
    pub fn all_white(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            materials: vec![Material::White; width * height],
            gray_a: 0.25,
            gray_du: 1.0,
        }
    }

    /// Classifies a luminance field (one value per cell, row-major).
    pub fn from_luminance(
        luminance: &[f32],
        width: usize,
        height: usize,
        thresholds: MaterialThresholds,
    ) -> Result<Self, GridError> {
        if luminance.len() != width * height {
            return Err(GridError::InvalidConfiguration(format!(
                "expected {} luminance samples for a {width}x{height} mask, got {}",
                width * height,
                luminance.len()
            )));
        }
        if !(0.0..=1.0).contains(&thresholds.black_max)
            || thresholds.gray_max < thresholds.black_max
        {
            return Err(GridError::InvalidConfiguration(format!(
                "material thresholds must satisfy 0 <= black_max <= gray_max, got {:?}",
                thresholds
            )));
        }
        let materials = luminance
            .iter()
            .map(|&l| {
                if l < thresholds.black_max {
                    Material::Blocked
                } else if l < thresholds.gray_max {
                    Material::Gray
                } else {
                    Material::White
                }
            })
            .collect();
        Ok(Self {
            width,
            height,
            materials,
            gray_a: 0.25,
            gray_du: 1.0,
        })
    }

    /// Sets the gray-matter parameter overrides.
    pub fn with_gray(mut self, a: f32, du: f32) -> Self {
        self.gray_a = a;
        self.gray_du = du;
        self
    }

    /// Mask width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Mask height in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Material of the cell at a row-major index.
    #[inline]
    pub fn material_at(&self, index: usize) -> Material {
        self.materials[index]
    }
}

// ============================================================================
// Kernel
// ============================================================================

/// FitzHugh-Nagumo update kernel.
///
/// Owns the noise pool and the optional tissue mask; the grid itself is
/// passed in per step so one kernel can drive many trials over the same
/// allocation.
#[derive(Debug, Clone)]
pub struct Fhn {
    params: FhnParams,
    pool: NoisePool,
    tissue: Option<Tissue>,
    sanity_bound: Option<f32>,
}

impl Fhn {
    /// Creates a kernel for a `width` x `height` grid.
    pub fn new(params: FhnParams, width: usize, height: usize, seed: u64) -> Result<Self, GridError> {
        params.validate()?;
        Ok(Self {
            params,
            pool: NoisePool::new(width, height, params.noise_amplitude, seed),
            tissue: None,
            sanity_bound: Some(DEFAULT_SANITY_BOUND),
        })
    }

    /// The active parameters.
    pub fn params(&self) -> &FhnParams {
        &self.params
    }

    /// The noise pool.
    pub fn pool(&self) -> &NoisePool {
        &self.pool
    }

    /// Changes the noise amplitude mid-run. This is the only mutable model
    /// constant; it forces a full pool regeneration.
    pub fn set_noise_amplitude(&mut self, sigma: f32) -> Result<(), GridError> {
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(GridError::InvalidConfiguration(format!(
                "noise_amplitude must be a non-negative finite value, got {sigma}"
            )));
        }
        self.params.noise_amplitude = sigma;
        self.pool.regenerate(sigma);
        Ok(())
    }

    /// Reseeds and fully resamples the noise pool. Call once per trial so
    /// trials are statistically independent.
    pub fn reseed_noise(&mut self, seed: u64) {
        self.pool.reseed(seed);
        self.pool.regenerate(self.params.noise_amplitude);
    }

    /// Attaches a two-region tissue mask. Its shape must match the kernel.
    pub fn set_tissue(&mut self, tissue: Tissue) -> Result<(), GridError> {
        if tissue.width() != self.pool.width() || tissue.height() != self.pool.height() {
            return Err(GridError::PatternSize {
                found_width: tissue.width(),
                found_height: tissue.height(),
                width: self.pool.width(),
                height: self.pool.height(),
            });
        }
        self.tissue = Some(tissue);
        Ok(())
    }

    /// Removes the tissue mask; every cell becomes white matter.
    pub fn clear_tissue(&mut self) {
        self.tissue = None;
    }

    /// Sets or disables the divergence guard.
    pub fn set_sanity_bound(&mut self, bound: Option<f32>) {
        self.sanity_bound = bound;
    }

    fn is_blocked(&self, index: usize) -> bool {
        self.tissue
            .as_ref()
            .is_some_and(|t| t.material_at(index) == Material::Blocked)
    }

    /// Forces one cell to the maximally excitable state to seed a wave.
    /// Blocked cells are left untouched.
    pub fn activate(
        &self,
        grid: &mut DoubleGrid<FhnCell>,
        x: usize,
        y: usize,
    ) -> Result<(), GridError> {
        let i = grid.index(x, y)?;
        grid.copy_next_from_current();
        if !self.is_blocked(i) {
            grid.write_next(x, y, FhnCell { u: SPOT_U, v: SPOT_V })?;
        }
        grid.commit();
        Ok(())
    }

    /// Toggles a wall at one cell, materializing an all-white tissue mask
    /// on first use. Raising a wall clears the cell's chemical state; the
    /// edit goes through the same copy-and-commit discipline as
    /// [`activate`](Self::activate).
    pub fn toggle_block(
        &mut self,
        grid: &mut DoubleGrid<FhnCell>,
        x: usize,
        y: usize,
    ) -> Result<(), GridError> {
        let i = grid.index(x, y)?;
        let width = self.pool.width();
        let height = self.pool.height();
        let tissue = self
            .tissue
            .get_or_insert_with(|| Tissue::all_white(width, height));
        tissue.materials[i] = if tissue.materials[i] == Material::Blocked {
            Material::White
        } else {
            Material::Blocked
        };

        grid.copy_next_from_current();
        grid.write_next(x, y, FhnCell::default())?;
        grid.commit();
        Ok(())
    }

    /// Reinitializes the grid to all-resting.
    pub fn clear(&self, grid: &mut DoubleGrid<FhnCell>) {
        grid.fill_next(FhnCell::default());
        grid.commit();
    }

    /// Reinitializes the grid with a centered square spot of excited state.
    pub fn seed_spot(&self, grid: &mut DoubleGrid<FhnCell>, size: usize) {
        let width = grid.width();
        let height = grid.height();
        grid.fill_next(FhnCell::default());
        {
            let (_, next) = grid.split();
            write_spot(next, width, height, width / 2, height / 2, size);
        }
        grid.commit();
    }

    /// Reinitializes the grid with two spots separated horizontally by
    /// `gap` cells.
    pub fn seed_two_spots(&self, grid: &mut DoubleGrid<FhnCell>, size: usize, gap: usize) {
        let width = grid.width();
        let height = grid.height();
        let cy = height / 2;
        let half = (gap + size) / 2;
        let left = (width / 2).saturating_sub(half);
        let right = (width / 2 + half).min(width - 1);
        grid.fill_next(FhnCell::default());
        {
            let (_, next) = grid.split();
            write_spot(next, width, height, left, cy, size);
            write_spot(next, width, height, right, cy, size);
        }
        grid.commit();
    }

    /// Σ(u² + v²) over the current generation — the dissipation diagnostic.
    /// Bounded over time for stable parameters.
    pub fn energy(grid: &DoubleGrid<FhnCell>) -> f64 {
        grid.current()
            .iter()
            .map(|c| (c.u as f64) * (c.u as f64) + (c.v as f64) * (c.v as f64))
            .sum()
    }

    /// Encodes a cell for image export: `u` in red, `v` in green, both
    /// clamped to their natural [0, 1] range.
    pub fn encode_cell(cell: FhnCell) -> [f32; 4] {
        [cell.u.clamp(0.0, 1.0), cell.v.clamp(0.0, 1.0), 0.0, 1.0]
    }

    /// Decodes an imported pixel into a cell.
    pub fn decode_cell(px: [f32; 4]) -> FhnCell {
        FhnCell { u: px[0], v: px[1] }
    }
}

fn write_spot(
    cells: &mut [FhnCell],
    width: usize,
    height: usize,
    cx: usize,
    cy: usize,
    size: usize,
) {
    let x0 = cx.saturating_sub(size / 2);
    let y0 = cy.saturating_sub(size / 2);
    let x1 = (x0 + size).min(width);
    let y1 = (y0 + size).min(height);
    for y in y0..y1 {
        for x in x0..x1 {
            cells[y * width + x] = FhnCell { u: SPOT_U, v: SPOT_V };
        }
    }
}

impl StepKernel for Fhn {
    type Cell = FhnCell;

    fn step(&mut self, grid: &mut DoubleGrid<FhnCell>) -> Result<(), GridError> {
        let width = grid.width();
        let height = grid.height();
        if width != self.pool.width() || height != self.pool.height() {
            return Err(GridError::PatternSize {
                found_width: width,
                found_height: height,
                width: self.pool.width(),
                height: self.pool.height(),
            });
        }

        let p = self.params;
        let dt = p.dt;
        let sqrt_dt = dt.sqrt();
        let tissue = self.tissue.as_ref();
        let sanity_bound = self.sanity_bound;
        let noise = if p.noise_amplitude != 0.0 {
            Some(self.pool.draw())
        } else {
            None
        };

        let (cur, next) = grid.split();
        for y in 0..height {
            for x in 0..width {
                let i = y * width + x;
                let material = tissue.map(|t| t.material_at(i));
                if material == Some(Material::Blocked) {
                    next[i] = cur[i];
                    continue;
                }
                let (a, du_coeff) = match (material, tissue) {
                    (Some(Material::Gray), Some(t)) => (t.gray_a, t.gray_du),
                    _ => (p.a, p.du),
                };

                let c = cur[i];
                let mut lap_u = 0.0;
                let mut lap_v = 0.0;
                for (dx, dy) in [(1i32, 0i32), (-1, 0), (0, 1), (0, -1)] {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                        continue;
                    }
                    let j = ny as usize * width + nx as usize;
                    if tissue.is_some_and(|t| t.material_at(j) == Material::Blocked) {
                        continue;
                    }
                    lap_u += cur[j].u - c.u;
                    lap_v += cur[j].v - c.v;
                }

                let du_dt = (c.u * (1.0 - c.u) * (c.u - a) - c.v) / p.e + du_coeff * lap_u;
                let dv_dt = p.b * c.u - c.v + p.dv * lap_v;
                let mut u1 = c.u + du_dt * dt;
                let mut v1 = c.v + dv_dt * dt;
                if let Some(n) = &noise {
                    let z = n.at(x, y);
                    u1 += z[0] * sqrt_dt;
                    v1 += z[1] * sqrt_dt;
                }

                if let Some(bound) = sanity_bound {
                    if !u1.is_finite() || u1.abs() > bound {
                        return Err(GridError::NumericalInstability {
                            x,
                            y,
                            value: u1,
                            bound,
                        });
                    }
                    if !v1.is_finite() || v1.abs() > bound {
                        return Err(GridError::NumericalInstability {
                            x,
                            y,
                            value: v1,
                            bound,
                        });
                    }
                }
                next[i] = FhnCell { u: u1, v: v1 };
            }
        }

        grid.commit();
        Ok(())
    }
}
