//! 3D substance concentration grids advanced by an explicit diffusion-decay stencil.

use crate::config::SpaceBounds;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubstanceId(pub u16);

impl fmt::Display for SubstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Value assumed for a neighbor that lies outside the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryCondition {
    /// Ghost cell mirrors the boundary cell: no flux leaves the grid.
    #[default]
    ZeroFlux,
    /// Ghost cell holds zero concentration: substance drains out of the grid.
    Absorbing,
}

impl BoundaryCondition {
    /// Concentration of the virtual neighbor beyond a boundary cell holding `boundary_value`.
    #[inline]
    pub fn ghost(self, boundary_value: f64) -> f64 {
        match self {
            BoundaryCondition::ZeroFlux => boundary_value,
            BoundaryCondition::Absorbing => 0.0,
        }
    }
}

/// Setup-time description of one substance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubstanceDefinition {
    pub id: SubstanceId,
    pub name: String,
    pub diffusion_coefficient: f64,
    pub decay_constant: f64,
    /// Cells per axis.
    pub resolution: usize,
    #[serde(default)]
    pub boundary: BoundaryCondition,
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl SubstanceDefinition {
    pub fn new(
        id: u16,
        name: impl Into<String>,
        diffusion_coefficient: f64,
        decay_constant: f64,
        resolution: usize,
    ) -> Self {
        Self {
            id: SubstanceId(id),
            name: name.into(),
            diffusion_coefficient,
            decay_constant,
            resolution,
            boundary: BoundaryCondition::ZeroFlux,
            threshold: None,
        }
    }

    pub fn with_boundary(mut self, boundary: BoundaryCondition) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    NegativeDiffusion { substance: SubstanceId, value: f64 },
    NegativeDecay { substance: SubstanceId, value: f64 },
    ZeroResolution { substance: SubstanceId },
    TooManyCells { substance: SubstanceId, max: usize, actual: usize },
    InvalidExtent { substance: SubstanceId },
    Unstable {
        substance: SubstanceId,
        name: String,
        diffusion_number: f64,
        max: f64,
    },
    DecayTooLarge { substance: SubstanceId, decay_per_step: f64 },
    InvalidThreshold { substance: SubstanceId, value: f64 },
    NonFinite {
        substance: SubstanceId,
        name: String,
        cell: [usize; 3],
    },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::NegativeDiffusion { substance, value } => write!(
                f,
                "substance {substance}: diffusion coefficient ({value}) must be finite and >= 0"
            ),
            FieldError::NegativeDecay { substance, value } => write!(
                f,
                "substance {substance}: decay constant ({value}) must be finite and >= 0"
            ),
            FieldError::ZeroResolution { substance } => {
                write!(f, "substance {substance}: resolution must be at least 1")
            }
            FieldError::TooManyCells {
                substance,
                max,
                actual,
            } => write!(
                f,
                "substance {substance}: grid of {actual} cells exceeds supported maximum ({max})"
            ),
            FieldError::InvalidExtent { substance } => {
                write!(f, "substance {substance}: grid extent must be finite and positive")
            }
            FieldError::Unstable {
                substance,
                name,
                diffusion_number,
                max,
            } => write!(
                f,
                "substance {substance} ({name}): diffusion number {diffusion_number} exceeds stability bound {max}"
            ),
            FieldError::DecayTooLarge {
                substance,
                decay_per_step,
            } => write!(
                f,
                "substance {substance}: decay per step ({decay_per_step}) must be below 1"
            ),
            FieldError::InvalidThreshold { substance, value } => write!(
                f,
                "substance {substance}: concentration threshold ({value}) must be finite and >= 0"
            ),
            FieldError::NonFinite {
                substance,
                name,
                cell,
            } => write!(
                f,
                "substance {substance} ({name}): non-finite concentration at cell {cell:?}"
            ),
        }
    }
}

impl Error for FieldError {}

/// One substance's concentration grid.
///
/// The grid covers the cube `[min_bound, max_bound]^3` with `resolution` cells
/// per axis. Cell `(i, j, k)` is stored at `i + n * (j + n * k)`, so each
/// z-slab is a contiguous run of `n * n` values.
#[derive(Clone, Debug)]
pub struct SubstanceField {
    id: SubstanceId,
    name: String,
    min_bound: f64,
    resolution: usize,
    cell_size: f64,
    diffusion_coefficient: f64,
    decay_constant: f64,
    time_step: f64,
    boundary: BoundaryCondition,
    threshold: Option<f64>,
    data: Vec<f64>,
    scratch: Vec<f64>,
}

impl SubstanceField {
    /// Explicit FTCS in three dimensions is stable for `D * dt / dx^2 <= 1/6`.
    pub const MAX_DIFFUSION_NUMBER: f64 = 1.0 / 6.0;
    pub const MAX_CELLS: usize = 1 << 27;

    pub fn new(
        definition: &SubstanceDefinition,
        bounds: SpaceBounds,
        time_step: f64,
    ) -> Result<Self, FieldError> {
        let substance = definition.id;
        let d = definition.diffusion_coefficient;
        if !d.is_finite() || d < 0.0 {
            return Err(FieldError::NegativeDiffusion {
                substance,
                value: d,
            });
        }
        let decay = definition.decay_constant;
        if !decay.is_finite() || decay < 0.0 {
            return Err(FieldError::NegativeDecay {
                substance,
                value: decay,
            });
        }
        let n = definition.resolution;
        if n == 0 {
            return Err(FieldError::ZeroResolution { substance });
        }
        let cells = n
            .checked_mul(n)
            .and_then(|nn| nn.checked_mul(n))
            .filter(|&c| c <= Self::MAX_CELLS)
            .ok_or(FieldError::TooManyCells {
                substance,
                max: Self::MAX_CELLS,
                actual: n.saturating_mul(n).saturating_mul(n),
            })?;
        let extent = bounds.extent();
        if !extent.is_finite() || extent <= 0.0 || !bounds.min.is_finite() {
            return Err(FieldError::InvalidExtent { substance });
        }
        let cell_size = extent / n as f64;
        let diffusion_number = d * time_step / (cell_size * cell_size);
        if !diffusion_number.is_finite() || diffusion_number > Self::MAX_DIFFUSION_NUMBER {
            return Err(FieldError::Unstable {
                substance,
                name: definition.name.clone(),
                diffusion_number,
                max: Self::MAX_DIFFUSION_NUMBER,
            });
        }
        let decay_per_step = decay * time_step;
        if decay_per_step >= 1.0 {
            return Err(FieldError::DecayTooLarge {
                substance,
                decay_per_step,
            });
        }
        if let Some(threshold) = definition.threshold {
            check_threshold(substance, threshold)?;
        }

        Ok(Self {
            id: substance,
            name: definition.name.clone(),
            min_bound: bounds.min,
            resolution: n,
            cell_size,
            diffusion_coefficient: d,
            decay_constant: decay,
            time_step,
            boundary: definition.boundary,
            threshold: definition.threshold,
            data: vec![0.0; cells],
            scratch: vec![0.0; cells],
        })
    }

    pub fn id(&self) -> SubstanceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn min_bound(&self) -> f64 {
        self.min_bound
    }

    pub fn boundary(&self) -> BoundaryCondition {
        self.boundary
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn diffusion_coefficient(&self) -> f64 {
        self.diffusion_coefficient
    }

    pub fn decay_constant(&self) -> f64 {
        self.decay_constant
    }

    pub fn diffusion_number(&self) -> f64 {
        self.diffusion_coefficient * self.time_step / (self.cell_size * self.cell_size)
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Ceiling applied after every `diffuse` call.
    pub fn set_concentration_threshold(&mut self, threshold: f64) -> Result<(), FieldError> {
        check_threshold(self.id, threshold)?;
        self.threshold = Some(threshold);
        Ok(())
    }

    #[inline]
    pub(crate) fn flat_index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.resolution * (j + self.resolution * k)
    }

    pub fn cell(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[self.flat_index(i, j, k)]
    }

    /// Overwrite one cell. Values are validated on the next `diffuse`.
    pub fn set_cell(&mut self, i: usize, j: usize, k: usize, value: f64) {
        let idx = self.flat_index(i, j, k);
        self.data[idx] = value;
    }

    /// World coordinate of the center of cell `index` along any axis.
    pub fn cell_center(&self, index: usize) -> f64 {
        self.min_bound + (index as f64 + 0.5) * self.cell_size
    }

    /// Nearest cell along one axis; out-of-grid coordinates clamp to the edge cell.
    pub(crate) fn axis_cell(&self, coordinate: f64) -> usize {
        let raw = ((coordinate - self.min_bound) / self.cell_size).floor();
        if raw.is_nan() || raw < 0.0 {
            0
        } else {
            (raw as usize).min(self.resolution - 1)
        }
    }

    /// Add `profile(x, y, z)` evaluated at every cell center.
    ///
    /// Calling this repeatedly superimposes profiles, e.g. one Gaussian band per axis.
    pub fn initialize<F>(&mut self, profile: F)
    where
        F: Fn(f64, f64, f64) -> f64,
    {
        let n = self.resolution;
        for k in 0..n {
            let z = self.cell_center(k);
            for j in 0..n {
                let y = self.cell_center(j);
                for i in 0..n {
                    let x = self.cell_center(i);
                    let idx = self.flat_index(i, j, k);
                    self.data[idx] += profile(x, y, z);
                }
            }
        }
        self.clip();
    }

    pub fn total_concentration(&self) -> f64 {
        self.data.iter().sum()
    }

    fn clip(&mut self) {
        let ceiling = self.threshold.unwrap_or(f64::INFINITY);
        for v in &mut self.data {
            if v.is_finite() {
                *v = v.clamp(0.0, ceiling);
            }
        }
    }

    /// Advance one timestep of `dC/dt = D * lap(C) - decay * C`, parallel over z-slabs.
    pub fn diffuse(&mut self) -> Result<(), FieldError> {
        self.diffuse_with(true)
    }

    /// Same as [`diffuse`](Self::diffuse); `parallel = false` keeps the whole
    /// update on the calling thread. Both paths produce identical grids.
    pub fn diffuse_with(&mut self, parallel: bool) -> Result<(), FieldError> {
        let stencil = Stencil {
            n: self.resolution,
            r: self.diffusion_number(),
            decay: self.decay_constant * self.time_step,
            boundary: self.boundary,
            ceiling: self.threshold.unwrap_or(f64::INFINITY),
        };
        let slab_len = self.resolution * self.resolution;
        let prev = &self.data;
        let first_bad = if parallel {
            self.scratch
                .par_chunks_mut(slab_len)
                .enumerate()
                .filter_map(|(k, slab)| stencil.update_slab(prev, k, slab))
                .min()
        } else {
            self.scratch
                .chunks_mut(slab_len)
                .enumerate()
                .filter_map(|(k, slab)| stencil.update_slab(prev, k, slab))
                .min()
        };

        if let Some(idx) = first_bad {
            let n = self.resolution;
            return Err(FieldError::NonFinite {
                substance: self.id,
                name: self.name.clone(),
                cell: [idx % n, (idx / n) % n, idx / (n * n)],
            });
        }
        std::mem::swap(&mut self.data, &mut self.scratch);
        Ok(())
    }
}

fn check_threshold(substance: SubstanceId, value: f64) -> Result<(), FieldError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FieldError::InvalidThreshold { substance, value })
    }
}

/// Per-step constants of the 7-point stencil.
struct Stencil {
    n: usize,
    r: f64,
    decay: f64,
    boundary: BoundaryCondition,
    ceiling: f64,
}

impl Stencil {
    /// Write slab `k` of the next grid from `prev`. Reads of slabs `k - 1` and
    /// `k + 1` come from the previous step only. Returns the flat index of the
    /// first non-finite result, if any.
    fn update_slab(&self, prev: &[f64], k: usize, slab: &mut [f64]) -> Option<usize> {
        let n = self.n;
        let plane = n * n;
        let base = k * plane;
        let mut first_bad = None;
        for j in 0..n {
            for i in 0..n {
                let local = i + n * j;
                let idx = base + local;
                let c = prev[idx];
                let x_lo = if i > 0 { prev[idx - 1] } else { self.boundary.ghost(c) };
                let x_hi = if i + 1 < n { prev[idx + 1] } else { self.boundary.ghost(c) };
                let y_lo = if j > 0 { prev[idx - n] } else { self.boundary.ghost(c) };
                let y_hi = if j + 1 < n { prev[idx + n] } else { self.boundary.ghost(c) };
                let z_lo = if k > 0 { prev[idx - plane] } else { self.boundary.ghost(c) };
                let z_hi = if k + 1 < n { prev[idx + plane] } else { self.boundary.ghost(c) };

                let laplacian = x_lo + x_hi + y_lo + y_hi + z_lo + z_hi - 6.0 * c;
                let next = c + self.r * laplacian - self.decay * c;
                if !next.is_finite() {
                    first_bad.get_or_insert(idx);
                    slab[local] = next;
                    continue;
                }
                slab[local] = next.clamp(0.0, self.ceiling);
            }
        }
        first_bad
    }
}

/// All substance fields of a run, in registration order.
#[derive(Clone, Debug, Default)]
pub struct SubstanceRegistry {
    fields: Vec<SubstanceField>,
}

impl SubstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, id: SubstanceId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: SubstanceId) -> Option<&SubstanceField> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn get_mut(&mut self, id: SubstanceId) -> Option<&mut SubstanceField> {
        self.fields.iter_mut().find(|f| f.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubstanceField> {
        self.fields.iter()
    }

    /// Returns the field back if its id is already registered.
    pub(crate) fn insert(&mut self, field: SubstanceField) -> Result<&mut SubstanceField, SubstanceField> {
        if self.contains(field.id) {
            return Err(field);
        }
        self.fields.push(field);
        let last = self.fields.len() - 1;
        Ok(&mut self.fields[last])
    }

    /// Diffuse every field; the error of the first failing field in
    /// registration order is returned.
    pub(crate) fn diffuse_all(&mut self, parallel: bool) -> Result<(), FieldError> {
        if parallel {
            let results: Vec<Result<(), FieldError>> = self
                .fields
                .par_iter_mut()
                .map(|field| field.diffuse_with(true))
                .collect();
            results.into_iter().collect()
        } else {
            self.fields
                .iter_mut()
                .try_for_each(|field| field.diffuse_with(false))
        }
    }
}
