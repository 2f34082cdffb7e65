//! Discrete cellular-automaton kernels on a double-buffered grid.
//!
//! Two models live here: Conway-style Game of Life ([`Life`]) and the
//! Greenberg-Hastings excitable medium ([`GreenbergHastings`]). Both read a
//! fixed neighbor pattern from the current generation and write the next
//! generation through the swap protocol of [`ember_grid::DoubleGrid`].
//!
//! The boundary is clamped everywhere: cells outside the grid do not exist,
//! do not wrap, and contribute nothing to neighbor counts.
//!
//! # Example
//!
//! ```
//! use ember_automata::{Life, LifeRule};
//! use ember_grid::{DoubleGrid, StepKernel};
//!
//! let mut life = Life::new(LifeRule::classic());
//! let mut grid = DoubleGrid::new(5, 5, false).unwrap();
//!
//! // Horizontal blinker.
//! for x in 1..4 {
//!     life.set(&mut grid, x, 2, true).unwrap();
//! }
//! life.step(&mut grid).unwrap();
//! assert!(*grid.get(2, 1).unwrap());
//! ```

use ember_grid::{DoubleGrid, GridError, StepKernel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Neighbor set on the square lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Neighborhood {
    /// 8-connected: orthogonal and diagonal neighbors.
    #[default]
    Moore,
    /// 4-connected: orthogonal neighbors only.
    VonNeumann,
}

impl Neighborhood {
    /// Relative offsets of the neighboring cells.
    pub fn offsets(&self) -> &'static [(i32, i32)] {
        match self {
            Neighborhood::Moore => &[
                (-1, -1),
                (0, -1),
                (1, -1),
                (-1, 0),
                (1, 0),
                (-1, 1),
                (0, 1),
                (1, 1),
            ],
            Neighborhood::VonNeumann => &[(0, -1), (-1, 0), (1, 0), (0, 1)],
        }
    }

    /// Largest possible neighbor count for this neighborhood.
    pub fn max_neighbors(&self) -> u8 {
        self.offsets().len() as u8
    }
}

// ============================================================================
// Game of Life
// ============================================================================

/// Birth/survival rule as neighbor-count sets over the Moore neighborhood.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LifeRule {
    birth: Vec<u8>,
    survive: Vec<u8>,
}

impl LifeRule {
    /// Creates a rule from birth and survival count sets.
    ///
    /// Every count must be a reachable Moore neighbor count (0..=8).
    pub fn new(birth: &[u8], survive: &[u8]) -> Result<Self, GridError> {
        for &n in birth.iter().chain(survive) {
            if n > 8 {
                return Err(GridError::InvalidConfiguration(format!(
                    "life rule count {n} exceeds the 8-neighbor maximum"
                )));
            }
        }
        Ok(Self {
            birth: birth.to_vec(),
            survive: survive.to_vec(),
        })
    }

    /// Classic Conway rules, B3/S23.
    pub fn classic() -> Self {
        Self {
            birth: vec![3],
            survive: vec![2, 3],
        }
    }

    /// Strict single-count rule: born on exactly `birth` neighbors, survives
    /// on exactly `survive` neighbors. This is the form the rule sweep
    /// iterates over.
    pub fn exact(birth: u8, survive: u8) -> Result<Self, GridError> {
        Self::new(&[birth], &[survive])
    }

    /// True if a dead cell with `neighbors` live neighbors is born.
    pub fn births(&self, neighbors: u8) -> bool {
        self.birth.contains(&neighbors)
    }

    /// True if a live cell with `neighbors` live neighbors survives.
    pub fn survives(&self, neighbors: u8) -> bool {
        self.survive.contains(&neighbors)
    }
}

/// Game of Life kernel over a boolean grid.
#[derive(Debug, Clone)]
pub struct Life {
    rule: LifeRule,
}

impl Life {
    /// Creates a kernel with the given rule.
    pub fn new(rule: LifeRule) -> Self {
        Self { rule }
    }

    /// The active rule.
    pub fn rule(&self) -> &LifeRule {
        &self.rule
    }

    fn count_neighbors(cells: &[bool], width: usize, height: usize, x: usize, y: usize) -> u8 {
        let mut count = 0u8;
        for &(dx, dy) in Neighborhood::Moore.offsets() {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                continue;
            }
            if cells[ny as usize * width + nx as usize] {
                count += 1;
            }
        }
        count
    }

    /// Flips one cell. Reads current, commits a one-cell-differing next
    /// generation — the same discipline as a full step.
    pub fn toggle(&self, grid: &mut DoubleGrid<bool>, x: usize, y: usize) -> Result<(), GridError> {
        let alive = *grid.get(x, y)?;
        grid.copy_next_from_current();
        grid.write_next(x, y, !alive)?;
        grid.commit();
        Ok(())
    }

    /// Sets one cell to a given state through the edit protocol.
    pub fn set(
        &self,
        grid: &mut DoubleGrid<bool>,
        x: usize,
        y: usize,
        alive: bool,
    ) -> Result<(), GridError> {
        grid.index(x, y)?;
        grid.copy_next_from_current();
        grid.write_next(x, y, alive)?;
        grid.commit();
        Ok(())
    }

    /// Reinitializes the grid with each cell alive at probability `density`.
    pub fn seed_random(&self, grid: &mut DoubleGrid<bool>, seed: u64, density: f32) {
        let mut rng = StdRng::seed_from_u64(seed);
        let (_, next) = grid.split();
        for cell in next.iter_mut() {
            *cell = rng.gen::<f32>() < density;
        }
        grid.commit();
    }

    /// Number of live cells in the current generation.
    pub fn population(grid: &DoubleGrid<bool>) -> usize {
        grid.current().iter().filter(|&&c| c).count()
    }

    /// Encodes a cell for image export: live cells are white.
    pub fn encode_cell(alive: bool) -> [f32; 4] {
        if alive {
            [1.0, 1.0, 1.0, 1.0]
        } else {
            [0.0, 0.0, 0.0, 1.0]
        }
    }

    /// Decodes an imported pixel: the red channel past 0.5 means alive.
    pub fn decode_cell(px: [f32; 4]) -> bool {
        px[0] > 0.5
    }
}

impl StepKernel for Life {
    type Cell = bool;

    fn step(&mut self, grid: &mut DoubleGrid<bool>) -> Result<(), GridError> {
        let width = grid.width();
        let height = grid.height();
        let (cur, next) = grid.split();

        for y in 0..height {
            for x in 0..width {
                let neighbors = Self::count_neighbors(cur, width, height, x, y);
                let alive = cur[y * width + x];
                next[y * width + x] = if alive {
                    self.rule.survives(neighbors)
                } else {
                    self.rule.births(neighbors)
                };
            }
        }

        grid.commit();
        Ok(())
    }
}

// ============================================================================
// Greenberg-Hastings
// ============================================================================

/// Phase of one excitable cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GhPhase {
    /// Excitable and idle.
    #[default]
    Resting,
    /// Firing this generation.
    Excited,
    /// Recovering; the counter runs from 1 up to the refractory period.
    Refractory(u16),
}

/// One Greenberg-Hastings cell: a phase plus a wall flag.
///
/// Blocked cells never transition and are excluded from every neighbor
/// count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GhCell {
    /// Current phase.
    pub phase: GhPhase,
    /// Wall flag.
    pub blocked: bool,
}

impl GhCell {
    /// A resting, unblocked cell.
    pub fn resting() -> Self {
        Self::default()
    }

    /// An excited, unblocked cell.
    pub fn excited() -> Self {
        Self {
            phase: GhPhase::Excited,
            blocked: false,
        }
    }
}

/// Greenberg-Hastings parameters, validated at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GhParams {
    /// Excited-neighbor count needed to excite a resting cell.
    pub threshold: u8,
    /// Generations a cell stays refractory after firing.
    pub refractory_period: u16,
    /// Which neighbors are counted.
    pub neighborhood: Neighborhood,
}

impl GhParams {
    /// Creates a parameter set.
    ///
    /// The threshold must be reachable for the chosen neighborhood and the
    /// refractory period must be at least 1.
    pub fn new(
        threshold: u8,
        refractory_period: u16,
        neighborhood: Neighborhood,
    ) -> Result<Self, GridError> {
        if threshold == 0 || threshold > neighborhood.max_neighbors() {
            return Err(GridError::InvalidConfiguration(format!(
                "threshold {threshold} is outside 1..={} for {neighborhood:?}",
                neighborhood.max_neighbors()
            )));
        }
        if refractory_period == 0 {
            return Err(GridError::InvalidConfiguration(
                "refractory period must be at least 1".into(),
            ));
        }
        Ok(Self {
            threshold,
            refractory_period,
            neighborhood,
        })
    }
}

impl Default for GhParams {
    fn default() -> Self {
        Self {
            threshold: 2,
            refractory_period: 15,
            neighborhood: Neighborhood::Moore,
        }
    }
}

/// Greenberg-Hastings kernel: a three-phase state machine per cell.
///
/// Transitions per generation:
/// resting → excited when enough neighbors are excited; excited →
/// refractory(1); refractory(k) → refractory(k+1) until the period is
/// reached, then back to resting.
#[derive(Debug, Clone)]
pub struct GreenbergHastings {
    params: GhParams,
}

impl GreenbergHastings {
    /// Creates a kernel with the given parameters.
    pub fn new(params: GhParams) -> Self {
        Self { params }
    }

    /// The active parameters.
    pub fn params(&self) -> &GhParams {
        &self.params
    }

    fn count_excited(&self, cells: &[GhCell], width: usize, height: usize, x: usize, y: usize) -> u8 {
        let mut count = 0u8;
        for &(dx, dy) in self.params.neighborhood.offsets() {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                continue;
            }
            let cell = cells[ny as usize * width + nx as usize];
            if !cell.blocked && cell.phase == GhPhase::Excited {
                count += 1;
            }
        }
        count
    }

    /// Forces a cell to the excited phase to seed a new wave.
    ///
    /// Blocked cells are left untouched.
    pub fn excite(
        &self,
        grid: &mut DoubleGrid<GhCell>,
        x: usize,
        y: usize,
    ) -> Result<(), GridError> {
        let cell = *grid.get(x, y)?;
        grid.copy_next_from_current();
        if !cell.blocked {
            grid.write_next(x, y, GhCell::excited())?;
        }
        grid.commit();
        Ok(())
    }

    /// Toggles the wall flag of a cell. Raising a wall also clears the
    /// phase, since a wall is not excitable.
    pub fn toggle_block(
        &self,
        grid: &mut DoubleGrid<GhCell>,
        x: usize,
        y: usize,
    ) -> Result<(), GridError> {
        let cell = *grid.get(x, y)?;
        grid.copy_next_from_current();
        let new_cell = if cell.blocked {
            GhCell::resting()
        } else {
            GhCell {
                phase: GhPhase::Resting,
                blocked: true,
            }
        };
        grid.write_next(x, y, new_cell)?;
        grid.commit();
        Ok(())
    }

    /// Reinitializes the grid randomly: each cell starts excited with
    /// probability `density`, refractory-start with probability `density`,
    /// resting otherwise. Walls are cleared.
    pub fn seed_random(&self, grid: &mut DoubleGrid<GhCell>, seed: u64, density: f32) {
        let mut rng = StdRng::seed_from_u64(seed);
        let (_, next) = grid.split();
        for cell in next.iter_mut() {
            let roll = rng.gen::<f32>();
            let phase = if roll < density {
                GhPhase::Excited
            } else if roll < density * 2.0 {
                GhPhase::Refractory(1)
            } else {
                GhPhase::Resting
            };
            *cell = GhCell {
                phase,
                blocked: false,
            };
        }
        grid.commit();
    }

    /// Reinitializes the grid with a traveling-wave seed: a refractory row
    /// at the vertical center and an excited row directly below it, both
    /// running from the horizontal center to the right edge. The refractory
    /// backing stops the wave from splitting into two fronts.
    pub fn seed_wave_pair(&self, grid: &mut DoubleGrid<GhCell>) {
        let width = grid.width();
        let height = grid.height();
        let center_x = width / 2;
        let center_y = height / 2;

        grid.fill_next(GhCell::resting());
        {
            let (_, next) = grid.split();
            for x in center_x..width {
                next[center_y * width + x].phase = GhPhase::Refractory(1);
                if center_y + 1 < height {
                    next[(center_y + 1) * width + x].phase = GhPhase::Excited;
                }
            }
        }
        grid.commit();
    }

    /// Encodes a cell for image export. Resting maps to 0, excited to 0.5,
    /// refractory counts down linearly from 1.0 toward 0.5; the blue channel
    /// carries the wall flag.
    pub fn encode_cell(&self, cell: GhCell) -> [f32; 4] {
        let r = match cell.phase {
            GhPhase::Resting => 0.0,
            GhPhase::Excited => 0.5,
            GhPhase::Refractory(k) => {
                let period = self.params.refractory_period as f32;
                0.5 + 0.5 * (period - k as f32 + 1.0) / period
            }
        };
        let b = if cell.blocked { 1.0 } else { 0.0 };
        [r, 0.0, b, 1.0]
    }

    /// Decodes an imported pixel back into a cell, inverting
    /// [`encode_cell`](Self::encode_cell) to the nearest phase.
    pub fn decode_cell(&self, px: [f32; 4]) -> GhCell {
        let period = self.params.refractory_period;
        let phase = if px[0] < 0.25 {
            GhPhase::Resting
        } else if px[0] < 0.5 + 0.25 / period as f32 {
            GhPhase::Excited
        } else {
            let k = (period as f32 + 1.0 - (px[0] - 0.5) * 2.0 * period as f32).round();
            GhPhase::Refractory((k.clamp(1.0, period as f32)) as u16)
        };
        GhCell {
            phase,
            blocked: px[2] > 0.5,
        }
    }
}

impl StepKernel for GreenbergHastings {
    type Cell = GhCell;

    fn step(&mut self, grid: &mut DoubleGrid<GhCell>) -> Result<(), GridError> {
        let width = grid.width();
        let height = grid.height();
        let period = self.params.refractory_period;
        let threshold = self.params.threshold;
        let (cur, next) = grid.split();

        for y in 0..height {
            for x in 0..width {
                let i = y * width + x;
                let cell = cur[i];
                if cell.blocked {
                    next[i] = cell;
                    continue;
                }
                let phase = match cell.phase {
                    GhPhase::Resting => {
                        if self.count_excited(cur, width, height, x, y) >= threshold {
                            GhPhase::Excited
                        } else {
                            GhPhase::Resting
                        }
                    }
                    GhPhase::Excited => GhPhase::Refractory(1),
                    GhPhase::Refractory(k) => {
                        if k < period {
                            GhPhase::Refractory(k + 1)
                        } else {
                            GhPhase::Resting
                        }
                    }
                };
                next[i] = GhCell {
                    phase,
                    blocked: false,
                };
            }
        }

        grid.commit();
        Ok(())
    }
}

/// Per-generation phase census of a Greenberg-Hastings grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GhCensus {
    /// Cells in the excited phase.
    pub excited: usize,
    /// Cells in any refractory phase.
    pub refractory: usize,
    /// Resting, unblocked cells.
    pub resting: usize,
    /// Wall cells.
    pub blocked: usize,
}

impl GhCensus {
    /// Counts phases over the current generation.
    pub fn of(grid: &DoubleGrid<GhCell>) -> Self {
        let mut census = Self::default();
        for cell in grid.current() {
            if cell.blocked {
                census.blocked += 1;
                continue;
            }
            match cell.phase {
                GhPhase::Resting => census.resting += 1,
                GhPhase::Excited => census.excited += 1,
                GhPhase::Refractory(_) => census.refractory += 1,
            }
        }
        census
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn life_grid(width: usize, height: usize) -> DoubleGrid<bool> {
        DoubleGrid::new(width, height, false).unwrap()
    }

    fn place(grid: &mut DoubleGrid<bool>, cells: &[(usize, usize)]) {
        grid.copy_next_from_current();
        for &(x, y) in cells {
            grid.write_next(x, y, true).unwrap();
        }
        grid.commit();
    }

    fn live_set(grid: &DoubleGrid<bool>) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for y in 0..grid.height() {
            for x in 0..grid.width() {
                if *grid.get(x, y).unwrap() {
                    out.push((x, y));
                }
            }
        }
        out
    }

    #[test]
    fn life_rule_rejects_impossible_counts() {
        assert!(LifeRule::new(&[9], &[2]).is_err());
        assert!(LifeRule::exact(3, 9).is_err());
        assert!(LifeRule::exact(3, 2).is_ok());
    }

    #[test]
    fn blinker_oscillates() {
        let mut life = Life::new(LifeRule::classic());
        let mut grid = life_grid(5, 5);
        place(&mut grid, &[(1, 2), (2, 2), (3, 2)]);

        life.step(&mut grid).unwrap();
        assert_eq!(live_set(&grid), vec![(2, 1), (2, 2), (2, 3)]);

        life.step(&mut grid).unwrap();
        assert_eq!(live_set(&grid), vec![(1, 2), (2, 2), (3, 2)]);
    }

    #[test]
    fn glider_translates_diagonally_in_four_generations() {
        let mut life = Life::new(LifeRule::classic());
        let mut grid = life_grid(12, 12);
        let glider = [(2, 1), (3, 2), (1, 3), (2, 3), (3, 3)];
        place(&mut grid, &glider);

        life.step_many(&mut grid, 4).unwrap();

        let mut got = live_set(&grid);
        got.sort();
        let mut expected: Vec<_> = glider.iter().map(|&(x, y)| (x + 1, y + 1)).collect();
        expected.sort();
        assert_eq!(got, expected);
    }

    #[test]
    fn corners_do_not_wrap() {
        let mut life = Life::new(LifeRule::classic());
        let mut grid = life_grid(6, 6);
        // One live cell in each corner: if the boundary wrapped, each would
        // see three neighbors and the block would persist. Clamped, each
        // sees zero and dies.
        place(&mut grid, &[(0, 0), (5, 0), (0, 5), (5, 5)]);

        life.step(&mut grid).unwrap();
        assert!(live_set(&grid).is_empty());
    }

    #[test]
    fn exact_rule_uses_strict_counts() {
        // Under B3/S2 a block (each cell has 3 live neighbors) dies.
        let mut life = Life::new(LifeRule::exact(3, 2).unwrap());
        let mut grid = life_grid(5, 5);
        place(&mut grid, &[(1, 1), (2, 1), (1, 2), (2, 2)]);

        life.step(&mut grid).unwrap();
        assert!(!*grid.get(1, 1).unwrap());
    }

    #[test]
    fn toggle_commits_one_cell_edit() {
        let life = Life::new(LifeRule::classic());
        let mut grid = life_grid(4, 4);
        let gen = grid.generation();

        life.toggle(&mut grid, 1, 1).unwrap();
        assert!(*grid.get(1, 1).unwrap());
        assert_eq!(grid.generation(), gen + 1);

        life.toggle(&mut grid, 1, 1).unwrap();
        assert!(!*grid.get(1, 1).unwrap());
    }

    #[test]
    fn seed_random_is_reproducible() {
        let life = Life::new(LifeRule::classic());
        let mut a = life_grid(20, 20);
        let mut b = life_grid(20, 20);
        life.seed_random(&mut a, 7, 0.3);
        life.seed_random(&mut b, 7, 0.3);
        assert_eq!(a.current(), b.current());

        let pop = Life::population(&a);
        assert!(pop > 0 && pop < 400);
    }

    fn gh(
        threshold: u8,
        refractory_period: u16,
        neighborhood: Neighborhood,
    ) -> GreenbergHastings {
        GreenbergHastings::new(GhParams::new(threshold, refractory_period, neighborhood).unwrap())
    }

    #[test]
    fn gh_params_are_validated() {
        assert!(GhParams::new(0, 5, Neighborhood::Moore).is_err());
        assert!(GhParams::new(5, 5, Neighborhood::VonNeumann).is_err());
        assert!(GhParams::new(4, 5, Neighborhood::VonNeumann).is_ok());
        assert!(GhParams::new(2, 0, Neighborhood::Moore).is_err());
    }

    #[test]
    fn refractory_cycle_length_is_period_plus_one() {
        for period in [1u16, 2, 5, 15] {
            let mut kernel = gh(2, period, Neighborhood::Moore);
            let mut grid = DoubleGrid::new(7, 7, GhCell::resting()).unwrap();
            kernel.excite(&mut grid, 3, 3).unwrap();

            // A lone excited cell cannot re-excite anything (threshold 2),
            // so it walks excited → refractory(1..=period) → resting.
            for step in 1..=u64::from(period) {
                kernel.step(&mut grid).unwrap();
                assert_eq!(
                    grid.get(3, 3).unwrap().phase,
                    GhPhase::Refractory(step as u16),
                    "period {period}, step {step}"
                );
            }
            kernel.step(&mut grid).unwrap();
            assert_eq!(grid.get(3, 3).unwrap().phase, GhPhase::Resting);
        }
    }

    #[test]
    fn excitation_respects_threshold_and_neighborhood() {
        // Threshold 2, von Neumann: one excited orthogonal neighbor is not
        // enough, two are.
        let mut kernel = gh(2, 3, Neighborhood::VonNeumann);
        let mut grid = DoubleGrid::new(5, 5, GhCell::resting()).unwrap();
        kernel.excite(&mut grid, 1, 2).unwrap();
        kernel.step(&mut grid).unwrap();
        assert_eq!(grid.get(2, 2).unwrap().phase, GhPhase::Resting);

        let mut grid = DoubleGrid::new(5, 5, GhCell::resting()).unwrap();
        kernel.excite(&mut grid, 1, 2).unwrap();
        kernel.excite(&mut grid, 3, 2).unwrap();
        kernel.step(&mut grid).unwrap();
        assert_eq!(grid.get(2, 2).unwrap().phase, GhPhase::Excited);
    }

    #[test]
    fn diagonal_neighbors_only_count_for_moore() {
        let mut von = gh(1, 3, Neighborhood::VonNeumann);
        let mut grid = DoubleGrid::new(5, 5, GhCell::resting()).unwrap();
        von.excite(&mut grid, 1, 1).unwrap();
        von.step(&mut grid).unwrap();
        assert_eq!(grid.get(2, 2).unwrap().phase, GhPhase::Resting);

        let mut moore = gh(1, 3, Neighborhood::Moore);
        let mut grid = DoubleGrid::new(5, 5, GhCell::resting()).unwrap();
        moore.excite(&mut grid, 1, 1).unwrap();
        moore.step(&mut grid).unwrap();
        assert_eq!(grid.get(2, 2).unwrap().phase, GhPhase::Excited);
    }

    #[test]
    fn walls_block_propagation_and_never_transition() {
        let mut kernel = gh(1, 3, Neighborhood::VonNeumann);
        let mut grid = DoubleGrid::new(5, 5, GhCell::resting()).unwrap();

        // Wall between the source and (3, 2).
        kernel.toggle_block(&mut grid, 2, 2).unwrap();
        kernel.excite(&mut grid, 1, 2).unwrap();
        kernel.step(&mut grid).unwrap();

        let wall = *grid.get(2, 2).unwrap();
        assert!(wall.blocked);
        assert_eq!(wall.phase, GhPhase::Resting);
        // The wave cannot pass through the wall cell.
        assert_eq!(grid.get(3, 2).unwrap().phase, GhPhase::Resting);
        // But it spreads where no wall stands.
        assert_eq!(grid.get(1, 1).unwrap().phase, GhPhase::Excited);
    }

    #[test]
    fn wave_pair_seeds_half_width_rows() {
        let kernel = gh(1, 2, Neighborhood::VonNeumann);
        let mut grid = DoubleGrid::new(10, 10, GhCell::resting()).unwrap();
        kernel.seed_wave_pair(&mut grid);

        assert_eq!(grid.get(5, 5).unwrap().phase, GhPhase::Refractory(1));
        assert_eq!(grid.get(9, 5).unwrap().phase, GhPhase::Refractory(1));
        assert_eq!(grid.get(5, 6).unwrap().phase, GhPhase::Excited);
        assert_eq!(grid.get(4, 5).unwrap().phase, GhPhase::Resting);
    }

    #[test]
    fn census_accounts_for_every_cell() {
        let kernel = gh(2, 4, Neighborhood::Moore);
        let mut grid = DoubleGrid::new(8, 8, GhCell::resting()).unwrap();
        kernel.seed_random(&mut grid, 42, 0.2);
        kernel.toggle_block(&mut grid, 0, 0).unwrap();

        let census = GhCensus::of(&grid);
        assert_eq!(
            census.excited + census.refractory + census.resting + census.blocked,
            64
        );
        assert_eq!(census.blocked, 1);
    }

    #[test]
    fn phase_encoding_round_trips() {
        let kernel = gh(2, 15, Neighborhood::Moore);
        for cell in [
            GhCell::resting(),
            GhCell::excited(),
            GhCell {
                phase: GhPhase::Refractory(1),
                blocked: false,
            },
            GhCell {
                phase: GhPhase::Refractory(15),
                blocked: false,
            },
            GhCell {
                phase: GhPhase::Resting,
                blocked: true,
            },
        ] {
            let decoded = kernel.decode_cell(kernel.encode_cell(cell));
            assert_eq!(decoded, cell, "{cell:?}");
        }
    }
}
