//! Logical geometry of a puzzle map: the square grid, where its cells sit in
//! world space, the static obstacles and traps, and the two sets of hazards
//! (holes and fire holes) the robot can clear.
//!
//! This is the only place that decides whether a move is legal. Positions are
//! continuous; cells are always derived from them by rounding.

use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};

/// World units between neighbouring cell centers.
pub const CELL_SPACING: f64 = 2.0;

pub const DEFAULT_DIVISIONS: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
	pub x: i32,
	pub z: i32,
}

impl Cell {
	pub const fn new(x: i32, z: i32) -> Self {
		Self { x, z }
	}

	/// One step from `self` toward `goal`, each axis independently.
	pub fn step_toward(self, goal: Cell) -> Cell {
		Cell::new(self.x + goal.x.cmp(&self.x) as i32, self.z + goal.z.cmp(&self.z) as i32)
	}

	/// Exactly one axis-aligned step away.
	pub fn is_adjacent(self, other: Cell) -> bool {
		(self.x - other.x).abs() + (self.z - other.z).abs() == 1
	}
}

/// Continuous position on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
	pub x: f64,
	pub z: f64,
}

impl Position {
	pub const fn new(x: f64, z: f64) -> Self {
		Self { x, z }
	}

	pub fn lerp(self, to: Position, alpha: f64) -> Position {
		Position::new(self.x + (to.x - self.x) * alpha, self.z + (to.z - self.z) * alpha)
	}

	pub fn approx_eq(self, other: Position, precision: f64) -> bool {
		(self.x - other.x).abs() < precision && (self.z - other.z).abs() < precision
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
	Nearest,
	/// The cell being entered when travelling toward lower coordinates.
	Floor,
	/// The cell being entered when travelling toward higher coordinates.
	Ceil,
}

/// Inclusive rectangle of cells nobody can enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Obstacle {
	pub min_x: i32,
	pub max_x: i32,
	pub min_z: i32,
	pub max_z: i32,
}

impl Obstacle {
	pub const fn new(min_x: i32, max_x: i32, min_z: i32, max_z: i32) -> Self {
		Self { min_x, max_x, min_z, max_z }
	}

	pub fn contains(&self, cell: Cell) -> bool {
		(self.min_x..=self.max_x).contains(&cell.x) && (self.min_z..=self.max_z).contains(&cell.z)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HazardKind {
	Hole,
	FireHole,
}

/// Sequential within one hazard kind, in registration order.
pub type HazardId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hazard {
	pub id: HazardId,
	pub cell: Cell,
	pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocker {
	Edge,
	/// Index of the obstacle in registration order.
	Obstacle(usize),
}

/// Outcome of [`GridMap::resolve_move`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved {
	/// The whole path is free; the requested position stands.
	Clear(Position),
	/// The path is blocked further ahead; stop at the last free cell.
	Shortened { position: Position, by: Blocker },
	/// The very next cell is blocked; stay on the current cell.
	Clamped { position: Position, by: Blocker },
}

impl Resolved {
	pub fn position(&self) -> Position {
		match *self {
			Resolved::Clear(position) => position,
			Resolved::Shortened { position, .. } | Resolved::Clamped { position, .. } => position,
		}
	}

	pub fn is_clamped(&self) -> bool {
		matches!(self, Resolved::Clamped { .. })
	}
}

#[derive(Debug, Clone)]
pub struct GridMap {
	divisions: i32,
	origin: f64,
	obstacles: Vec<Obstacle>,
	traps: IndexSet<Cell>,
	holes: IndexMap<HazardId, Hazard>,
	fire_holes: IndexMap<HazardId, Hazard>,
}

impl Default for GridMap {
	fn default() -> Self {
		Self::new(DEFAULT_DIVISIONS)
	}
}

/// `Math.round` semantics: halves go up, also for negative numbers.
fn round_half_up(v: f64) -> f64 {
	(v + 0.5).floor()
}

fn travel_rounding(from: f64, to: f64) -> Rounding {
	if from >= to { Rounding::Floor } else { Rounding::Ceil }
}

impl GridMap {
	pub fn new(divisions: i32) -> Self {
		let divisions = divisions.max(1);
		Self {
			divisions,
			origin: -f64::from(divisions - 1),
			obstacles: Vec::new(),
			traps: IndexSet::new(),
			holes: IndexMap::new(),
			fire_holes: IndexMap::new(),
		}
	}

	pub fn divisions(&self) -> i32 {
		self.divisions
	}

	// --------------------------------------------------
	// Coordinates
	// --------------------------------------------------

	pub fn cell_to_world(&self, cell: Cell) -> Position {
		Position::new(self.origin + CELL_SPACING * f64::from(cell.x), self.origin + CELL_SPACING * f64::from(cell.z))
	}

	pub fn world_to_cell(&self, position: Position, rounding: Rounding) -> Cell {
		Cell::new(self.axis_to_cell(position.x, rounding), self.axis_to_cell(position.z, rounding))
	}

	// Casting saturates, so absurdly distant positions land far off the map.
	fn axis_to_cell(&self, v: f64, rounding: Rounding) -> i32 {
		let coord = match rounding {
			Rounding::Nearest => round_half_up((round_half_up(v) - self.origin) / CELL_SPACING),
			Rounding::Floor => ((v.floor() - self.origin) / CELL_SPACING).floor(),
			Rounding::Ceil => ((v.ceil() - self.origin) / CELL_SPACING).ceil(),
		};
		coord as i32
	}

	pub fn is_out_of_bounds(&self, cell: Cell) -> bool {
		!(0..self.divisions).contains(&cell.x) || !(0..self.divisions).contains(&cell.z)
	}

	fn clamp_cell(&self, cell: Cell) -> Cell {
		Cell::new(cell.x.clamp(0, self.divisions - 1), cell.z.clamp(0, self.divisions - 1))
	}

	// --------------------------------------------------
	// Level setup
	// --------------------------------------------------

	pub fn add_obstacle(&mut self, obstacle: Obstacle) {
		self.obstacles.push(obstacle);
	}

	pub fn add_trap(&mut self, cell: Cell) {
		self.traps.insert(cell);
	}

	pub fn add_hole(&mut self, cell: Cell) -> HazardId {
		Self::register(&mut self.holes, cell)
	}

	pub fn add_fire_hole(&mut self, cell: Cell) -> HazardId {
		Self::register(&mut self.fire_holes, cell)
	}

	fn register(set: &mut IndexMap<HazardId, Hazard>, cell: Cell) -> HazardId {
		let id = set.len();
		set.insert(id, Hazard { id, cell, active: true });
		id
	}

	pub fn hazards(&self, kind: HazardKind) -> impl Iterator<Item = &Hazard> + '_ {
		self.hazard_set(kind).values()
	}

	pub fn hazard(&self, kind: HazardKind, id: HazardId) -> Option<&Hazard> {
		self.hazard_set(kind).get(&id)
	}

	fn hazard_set(&self, kind: HazardKind) -> &IndexMap<HazardId, Hazard> {
		match kind {
			HazardKind::Hole => &self.holes,
			HazardKind::FireHole => &self.fire_holes,
		}
	}

	fn hazard_set_mut(&mut self, kind: HazardKind) -> &mut IndexMap<HazardId, Hazard> {
		match kind {
			HazardKind::Hole => &mut self.holes,
			HazardKind::FireHole => &mut self.fire_holes,
		}
	}

	// --------------------------------------------------
	// Movement legality
	// --------------------------------------------------

	/// What stops an actor from entering `cell`, if anything.
	pub fn blocker_at(&self, cell: Cell) -> Option<Blocker> {
		if self.is_out_of_bounds(cell) {
			return Some(Blocker::Edge);
		}
		self.obstacles.iter().position(|o| o.contains(cell)).map(Blocker::Obstacle)
	}

	/// Clamp a requested move to what the map allows. Called again on every
	/// animation tick, so obstacles met half way still stop the actor.
	pub fn resolve_move(&self, current: Position, requested: Position) -> Resolved {
		let here = self.clamp_cell(self.world_to_cell(current, Rounding::Nearest));
		let hold = self.cell_to_world(here);

		// Cell being entered in the direction of travel; catches in-flight
		// positions that have already slid past the last row.
		let leading = Cell::new(
			self.axis_to_cell(current.x, travel_rounding(current.x, requested.x)),
			self.axis_to_cell(current.z, travel_rounding(current.z, requested.z)),
		);
		if self.is_out_of_bounds(leading) {
			warn!("move from {here:?} runs off the map");
			return Resolved::Clamped {
				position: hold,
				by: Blocker::Edge,
			};
		}

		// One cell past the edge is as far as the walk can get.
		let goal = self.world_to_cell(requested, Rounding::Nearest);
		let goal = Cell::new(goal.x.clamp(-1, self.divisions), goal.z.clamp(-1, self.divisions));
		let mut cell = here;
		while cell != goal {
			let next = cell.step_toward(goal);
			if let Some(by) = self.blocker_at(next) {
				if cell == here {
					warn!("move from {here:?} blocked by {by:?} at {next:?}");
					return Resolved::Clamped { position: hold, by };
				}
				debug!("move from {here:?} shortened to {cell:?}, {by:?} at {next:?}");
				return Resolved::Shortened {
					position: self.cell_to_world(cell),
					by,
				};
			}
			cell = next;
		}
		Resolved::Clear(requested)
	}

	// --------------------------------------------------
	// Hazards and traps
	// --------------------------------------------------

	pub fn check_trap(&self, position: Position) -> bool {
		self.traps.contains(&self.world_to_cell(position, Rounding::Nearest))
	}

	pub fn check_hole(&self, position: Position) -> bool {
		self.active_hazard_at(position, HazardKind::Hole)
	}

	pub fn check_fire_hole(&self, position: Position) -> bool {
		self.active_hazard_at(position, HazardKind::FireHole)
	}

	fn active_hazard_at(&self, position: Position, kind: HazardKind) -> bool {
		let cell = self.world_to_cell(position, Rounding::Nearest);
		self.hazards(kind).any(|h| h.active && h.cell == cell)
	}

	/// First active hazard of `kind`, in registration order, one step away
	/// from the cell under `position`.
	pub fn find_adjacent_hazard(&self, position: Position, kind: HazardKind) -> Option<HazardId> {
		let cell = self.world_to_cell(position, Rounding::Nearest);
		self.hazards(kind).find(|h| h.active && h.cell.is_adjacent(cell)).map(|h| h.id)
	}

	/// Put out / cover the hazard next to `position`. Returns the id acted
	/// on, or `None` when there is nothing adjacent.
	pub fn deactivate_hazard(&mut self, position: Position, kind: HazardKind) -> Option<HazardId> {
		let id = self.find_adjacent_hazard(position, kind)?;
		self.set_hazard_active(kind, id, false);
		Some(id)
	}

	pub fn set_hazard_active(&mut self, kind: HazardKind, id: HazardId, active: bool) -> bool {
		match self.hazard_set_mut(kind).get_mut(&id) {
			Some(hazard) => {
				hazard.active = active;
				true
			},
			None => false,
		}
	}

	/// Re-arm every hole and fire hole. Traps and obstacles are untouched.
	pub fn reset_hazards(&mut self) {
		for hazard in self.holes.values_mut().chain(self.fire_holes.values_mut()) {
			hazard.active = true;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn center(grid: &GridMap, x: i32, z: i32) -> Position {
		grid.cell_to_world(Cell::new(x, z))
	}

	#[test]
	fn cell_world_round_trip() {
		let grid = GridMap::default();
		for x in 0..grid.divisions() {
			for z in 0..grid.divisions() {
				let cell = Cell::new(x, z);
				assert_eq!(grid.world_to_cell(grid.cell_to_world(cell), Rounding::Nearest), cell);
			}
		}
	}

	#[test]
	fn corners_map_to_expected_world_positions() {
		let grid = GridMap::default();
		assert_eq!(grid.cell_to_world(Cell::new(0, 0)), Position::new(-9.0, -9.0));
		assert_eq!(grid.cell_to_world(Cell::new(9, 9)), Position::new(9.0, 9.0));
	}

	#[test]
	fn directional_rounding_between_cells() {
		let grid = GridMap::default();
		// Half way between cells 4 (x = -1) and 5 (x = 1).
		let pos = Position::new(0.0, -9.0);
		assert_eq!(grid.world_to_cell(pos, Rounding::Floor).x, 4);
		assert_eq!(grid.world_to_cell(pos, Rounding::Ceil).x, 5);
		assert_eq!(grid.world_to_cell(pos, Rounding::Nearest).x, 5);
	}

	#[test]
	fn bounds() {
		let grid = GridMap::new(10);
		assert!(!grid.is_out_of_bounds(Cell::new(0, 9)));
		assert!(grid.is_out_of_bounds(Cell::new(-1, 0)));
		assert!(grid.is_out_of_bounds(Cell::new(0, 10)));
	}

	#[test]
	fn clear_path_passes_through() {
		let grid = GridMap::default();
		let from = center(&grid, 0, 5);
		let to = center(&grid, 6, 5);
		assert_eq!(grid.resolve_move(from, to), Resolved::Clear(to));
	}

	#[test]
	fn obstacle_right_ahead_clamps_to_current_cell() {
		let mut grid = GridMap::default();
		grid.add_obstacle(Obstacle::new(5, 5, 5, 5));
		let from = center(&grid, 4, 5);
		let resolved = grid.resolve_move(from, center(&grid, 9, 5));
		assert!(resolved.is_clamped());
		assert_eq!(resolved.position(), from);
		assert_eq!(
			resolved,
			Resolved::Clamped {
				position: from,
				by: Blocker::Obstacle(0)
			}
		);
	}

	#[test]
	fn obstacle_further_ahead_shortens() {
		let mut grid = GridMap::default();
		grid.add_obstacle(Obstacle::new(5, 5, 5, 5));
		let resolved = grid.resolve_move(center(&grid, 0, 5), center(&grid, 9, 5));
		assert_eq!(
			resolved,
			Resolved::Shortened {
				position: center(&grid, 4, 5),
				by: Blocker::Obstacle(0)
			}
		);
	}

	#[test]
	fn first_registered_obstacle_is_reported() {
		let mut grid = GridMap::default();
		grid.add_obstacle(Obstacle::new(1, 3, 5, 5));
		grid.add_obstacle(Obstacle::new(1, 1, 0, 9));
		let from = center(&grid, 0, 5);
		match grid.resolve_move(from, center(&grid, 2, 5)) {
			Resolved::Clamped { by, .. } => assert_eq!(by, Blocker::Obstacle(0)),
			other => panic!("expected clamp, got {other:?}"),
		}
	}

	#[test]
	fn map_edge_clamps() {
		let grid = GridMap::default();
		let from = center(&grid, 9, 3);
		let resolved = grid.resolve_move(from, center(&grid, 12, 3));
		assert_eq!(
			resolved,
			Resolved::Clamped {
				position: from,
				by: Blocker::Edge
			}
		);

		let from = center(&grid, 0, 0);
		assert!(grid.resolve_move(from, Position::new(from.x, from.z - 4.0)).is_clamped());
	}

	#[test]
	fn overshoot_past_last_row_is_pulled_back() {
		let grid = GridMap::default();
		let past_edge = Position::new(9.3, -9.0);
		let resolved = grid.resolve_move(past_edge, Position::new(13.0, -9.0));
		assert_eq!(
			resolved,
			Resolved::Clamped {
				position: center(&grid, 9, 0),
				by: Blocker::Edge
			}
		);
	}

	#[test]
	fn resolved_moves_stay_on_legal_cells() {
		let mut grid = GridMap::default();
		grid.add_obstacle(Obstacle::new(2, 8, 2, 2));
		grid.add_obstacle(Obstacle::new(2, 9, 4, 4));
		grid.add_obstacle(Obstacle::new(7, 7, 0, 1));

		for x in 0..10 {
			for z in 0..10 {
				let here = Cell::new(x, z);
				if grid.blocker_at(here).is_some() {
					continue;
				}
				let from = grid.cell_to_world(here);
				for (dx, dz) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
					for steps in (1..12).chain([i64::from(u32::MAX / 2), i64::from(u32::MAX)]) {
						let to = Position::new(
							from.x + CELL_SPACING * (dx * steps) as f64,
							from.z + CELL_SPACING * (dz * steps) as f64,
						);
						let landed = grid.world_to_cell(grid.resolve_move(from, to).position(), Rounding::Nearest);
						assert!(grid.blocker_at(landed).is_none(), "{here:?} -> {steps} x ({dx},{dz}) landed on {landed:?}");
					}
				}
			}
		}
	}

	#[test]
	fn huge_requests_stop_at_the_edge_they_head_for() {
		let grid = GridMap::default();
		let from = center(&grid, 5, 5);
		let far = CELL_SPACING * 3_000_000_000.0;

		let west = grid.resolve_move(from, Position::new(from.x - far, from.z));
		assert_eq!(
			west,
			Resolved::Shortened {
				position: center(&grid, 0, 5),
				by: Blocker::Edge
			}
		);
		let east = grid.resolve_move(from, Position::new(from.x + far, from.z));
		assert_eq!(grid.world_to_cell(east.position(), Rounding::Nearest), Cell::new(9, 5));
		let north = grid.resolve_move(from, Position::new(from.x, from.z - far));
		assert_eq!(grid.world_to_cell(north.position(), Rounding::Nearest), Cell::new(5, 0));
	}

	#[test]
	fn stepping_toward_a_saturated_goal_does_not_overflow() {
		let here = Cell::new(5, 5);
		assert_eq!(here.step_toward(Cell::new(i32::MIN, 5)), Cell::new(4, 5));
		assert_eq!(here.step_toward(Cell::new(5, i32::MAX)), Cell::new(5, 6));
		assert_eq!(here.step_toward(here), here);
	}

	#[test]
	fn traps_and_active_hazards_under_position() {
		let mut grid = GridMap::default();
		grid.add_trap(Cell::new(2, 2));
		let hole = grid.add_hole(Cell::new(3, 3));
		let fire = grid.add_fire_hole(Cell::new(4, 4));

		assert!(grid.check_trap(center(&grid, 2, 2)));
		assert!(!grid.check_trap(center(&grid, 2, 3)));
		assert!(grid.check_hole(center(&grid, 3, 3)));
		assert!(grid.check_fire_hole(center(&grid, 4, 4)));
		assert!(!grid.check_fire_hole(center(&grid, 3, 3)));

		grid.set_hazard_active(HazardKind::Hole, hole, false);
		grid.set_hazard_active(HazardKind::FireHole, fire, false);
		assert!(!grid.check_hole(center(&grid, 3, 3)));
		assert!(!grid.check_fire_hole(center(&grid, 4, 4)));
		// Traps never switch off.
		grid.reset_hazards();
		assert!(grid.check_trap(center(&grid, 2, 2)));
	}

	#[test]
	fn hazard_ids_follow_registration_order() {
		let mut grid = GridMap::default();
		assert_eq!(grid.add_fire_hole(Cell::new(1, 1)), 0);
		assert_eq!(grid.add_fire_hole(Cell::new(2, 2)), 1);
		assert_eq!(grid.add_hole(Cell::new(3, 3)), 0);
		let ids: Vec<_> = grid.hazards(HazardKind::FireHole).map(|h| h.id).collect();
		assert_eq!(ids, vec![0, 1]);
	}

	#[test]
	fn adjacent_fire_hole_is_found_then_put_out_until_reset() {
		let mut grid = GridMap::default();
		let id = grid.add_fire_hole(Cell::new(3, 3));
		let actor = center(&grid, 3, 4);

		assert_eq!(grid.find_adjacent_hazard(actor, HazardKind::FireHole), Some(id));
		assert_eq!(grid.find_adjacent_hazard(actor, HazardKind::Hole), None);

		assert_eq!(grid.deactivate_hazard(actor, HazardKind::FireHole), Some(id));
		assert_eq!(grid.find_adjacent_hazard(actor, HazardKind::FireHole), None);
		assert_eq!(grid.deactivate_hazard(actor, HazardKind::FireHole), None);

		grid.reset_hazards();
		assert_eq!(grid.find_adjacent_hazard(actor, HazardKind::FireHole), Some(id));
	}

	#[test]
	fn diagonal_hazards_are_not_adjacent() {
		let mut grid = GridMap::default();
		grid.add_hole(Cell::new(3, 3));
		assert_eq!(grid.find_adjacent_hazard(center(&grid, 4, 4), HazardKind::Hole), None);
	}

	#[test]
	fn first_adjacent_hazard_wins() {
		let mut grid = GridMap::default();
		grid.add_hole(Cell::new(5, 4));
		grid.add_hole(Cell::new(3, 4));
		assert_eq!(grid.find_adjacent_hazard(center(&grid, 4, 4), HazardKind::Hole), Some(0));
		grid.set_hazard_active(HazardKind::Hole, 0, false);
		assert_eq!(grid.find_adjacent_hazard(center(&grid, 4, 4), HazardKind::Hole), Some(1));
	}
}
