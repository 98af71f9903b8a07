//! Conversion between continuous world positions and grid cells.

use thiserror::Error;
use world_of_bits_core::{CellCoord, Direction, WorldPoint};

/// Latitude and longitude of cell `0:0`'s south-west corner by default.
pub const DEFAULT_ORIGIN: WorldPoint = WorldPoint::new(36.997_936, -122.057_194);

/// Default edge length of a cell in degrees.
pub const DEFAULT_CELL_SIZE: f64 = 1e-4;

/// Fraction of a cell within which a position counts as sitting on a grid line.
const AXIS_SNAP_EPSILON: f64 = 1e-9;

/// Placement and scale of the world grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridConfig {
    origin: WorldPoint,
    cell_size: f64,
}

impl GridConfig {
    /// Creates a validated grid configuration.
    pub fn new(origin: WorldPoint, cell_size: f64) -> Result<Self, GridConfigError> {
        if !origin.lat.is_finite() || !origin.lng.is_finite() {
            return Err(GridConfigError::NonFiniteOrigin);
        }
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(GridConfigError::InvalidCellSize(cell_size));
        }
        Ok(Self { origin, cell_size })
    }

    /// World position of cell `0:0`'s minimum corner.
    #[must_use]
    pub const fn origin(&self) -> WorldPoint {
        self.origin
    }

    /// Edge length of every cell in degrees.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN,
            cell_size: DEFAULT_CELL_SIZE,
        }
    }
}

/// Reasons a grid configuration was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum GridConfigError {
    /// The origin contains NaN or infinite coordinates.
    #[error("grid origin must be finite")]
    NonFiniteOrigin,
    /// The cell size is not a positive finite number.
    #[error("cell size must be positive and finite, got {0}")]
    InvalidCellSize(f64),
}

/// Rectangular extent of a single cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellBounds {
    /// South-west corner.
    pub min: WorldPoint,
    /// North-east corner.
    pub max: WorldPoint,
}

/// Stateless coordinate system of the world grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldIndex {
    config: GridConfig,
}

impl WorldIndex {
    /// Creates an index over the provided grid.
    #[must_use]
    pub const fn new(config: GridConfig) -> Self {
        Self { config }
    }

    /// Grid configuration backing the index.
    #[must_use]
    pub const fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Cell containing the provided position. Each axis is floored independently.
    #[must_use]
    pub fn to_cell(&self, point: WorldPoint) -> CellCoord {
        let origin = self.config.origin;
        CellCoord::new(
            self.axis_index(point.lat - origin.lat),
            self.axis_index(point.lng - origin.lng),
        )
    }

    /// Rectangular extent covered by the cell.
    #[must_use]
    pub fn cell_bounds(&self, cell: CellCoord) -> CellBounds {
        let origin = self.config.origin;
        let size = self.config.cell_size;
        let min = WorldPoint::new(
            origin.lat + f64::from(cell.i()) * size,
            origin.lng + f64::from(cell.j()) * size,
        );
        CellBounds {
            min,
            max: WorldPoint::new(min.lat + size, min.lng + size),
        }
    }

    /// Centre of the cell; stable under [`WorldIndex::to_cell`].
    #[must_use]
    pub fn cell_center(&self, cell: CellCoord) -> WorldPoint {
        let bounds = self.cell_bounds(cell);
        let half = self.config.cell_size / 2.0;
        WorldPoint::new(bounds.min.lat + half, bounds.min.lng + half)
    }

    /// Grid distance used for proximity gating (Chebyshev).
    #[must_use]
    pub fn grid_distance(&self, a: CellCoord, b: CellCoord) -> u32 {
        a.chebyshev_distance(b)
    }

    /// Moves a position by one cell edge in the given direction.
    #[must_use]
    pub fn step(&self, point: WorldPoint, direction: Direction) -> WorldPoint {
        let size = self.config.cell_size;
        match direction {
            Direction::North => WorldPoint::new(point.lat + size, point.lng),
            Direction::South => WorldPoint::new(point.lat - size, point.lng),
            Direction::East => WorldPoint::new(point.lat, point.lng + size),
            Direction::West => WorldPoint::new(point.lat, point.lng - size),
        }
    }

    /// Cells within `radius` of `center`, ordered by row then column.
    #[must_use]
    pub fn cells_within(&self, center: CellCoord, radius: u32) -> Vec<CellCoord> {
        let radius = i32::try_from(radius).unwrap_or(i32::MAX);
        let min = CellCoord::new(
            center.i().saturating_sub(radius),
            center.j().saturating_sub(radius),
        );
        let max = CellCoord::new(
            center.i().saturating_add(radius),
            center.j().saturating_add(radius),
        );
        cells_between(min, max)
    }

    /// Cells overlapping the rectangle spanned by two positions, ordered by row then column.
    #[must_use]
    pub fn cells_in_view(&self, south_west: WorldPoint, north_east: WorldPoint) -> Vec<CellCoord> {
        cells_between(self.to_cell(south_west), self.to_cell(north_east))
    }

    fn axis_index(&self, offset: f64) -> i32 {
        let quotient = offset / self.config.cell_size;
        // Corners computed by `cell_bounds` can land a rounding error below
        // their integer index; snap those before flooring.
        let nearest = quotient.round();
        let index = if (quotient - nearest).abs() < AXIS_SNAP_EPSILON {
            nearest
        } else {
            quotient.floor()
        };
        // `as` saturates out-of-range values and maps NaN to zero.
        index as i32
    }
}

fn cells_between(min: CellCoord, max: CellCoord) -> Vec<CellCoord> {
    let mut cells = Vec::new();
    for i in min.i()..=max.i() {
        for j in min.j()..=max.j() {
            cells.push(CellCoord::new(i, j));
        }
    }
    cells
}
