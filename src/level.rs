use log::{debug, info};

use crate::ast::Sensor;
use crate::events::{Event, Prop};
use crate::grid::{Cell, GridMap, HazardId, HazardKind, Obstacle, Position, Rounding};

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Facing of the actor. East is +X, South is +Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heading {
	East,
	West,
	North,
	South,
}

impl Heading {
	pub fn left(self) -> Heading {
		match self {
			Heading::East => Heading::North,
			Heading::North => Heading::West,
			Heading::West => Heading::South,
			Heading::South => Heading::East,
		}
	}

	pub fn right(self) -> Heading {
		self.left().reverse()
	}

	pub fn reverse(self) -> Heading {
		match self {
			Heading::East => Heading::West,
			Heading::West => Heading::East,
			Heading::North => Heading::South,
			Heading::South => Heading::North,
		}
	}

	/// Yaw about the vertical axis, degrees. Forward is `(sin yaw, cos yaw)`.
	pub fn yaw_degrees(self) -> f64 {
		match self {
			Heading::South => 0.0,
			Heading::East => 90.0,
			Heading::North => 180.0,
			Heading::West => 270.0,
		}
	}

	/// Unit step in cells.
	pub fn forward(self) -> (i32, i32) {
		match self {
			Heading::East => (1, 0),
			Heading::West => (-1, 0),
			Heading::North => (0, -1),
			Heading::South => (0, 1),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Actor {
	pub position: Position,
	/// Degrees; animated, so it can sit between two headings.
	pub yaw: f64,
	/// Committed once a turn finishes.
	pub heading: Heading,
}

impl Actor {
	pub fn pose_event(&self) -> Event {
		Event::Pose {
			position: self.position,
			yaw: self.yaw,
		}
	}
}

// ---------------------------------------------------------------------------
// Level definition
// ---------------------------------------------------------------------------

/// Fire holes that blink on a timer while the player is editing: `lit` ids
/// start active, `dark` ids start out, and they swap on every alternation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flicker {
	pub lit: Vec<HazardId>,
	pub dark: Vec<HazardId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinRule {
	AllCollected,
	/// Every crystal collected and the actor still standing on one.
	CollectedAndStanding,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelDef {
	pub id: &'static str,
	pub title: &'static str,
	pub divisions: i32,
	pub start: Cell,
	pub heading: Heading,
	pub obstacles: Vec<Obstacle>,
	pub traps: Vec<Cell>,
	pub holes: Vec<Cell>,
	pub fire_holes: Vec<Cell>,
	pub crystals: Vec<Cell>,
	pub command_limit: Option<usize>,
	/// `None` means the phase hands out no extinguishers at all.
	pub extinguishers: Option<u32>,
	pub flicker: Option<Flicker>,
	pub win: WinRule,
}

impl LevelDef {
	/// An empty map with the actor on `start`, facing east.
	pub fn new(id: &'static str, title: &'static str, start: Cell) -> Self {
		Self {
			id,
			title,
			divisions: crate::grid::DEFAULT_DIVISIONS,
			start,
			heading: Heading::East,
			obstacles: Vec::new(),
			traps: Vec::new(),
			holes: Vec::new(),
			fire_holes: Vec::new(),
			crystals: Vec::new(),
			command_limit: None,
			extinguishers: None,
			flicker: None,
			win: WinRule::AllCollected,
		}
	}
}

// ---------------------------------------------------------------------------
// Runtime state
// ---------------------------------------------------------------------------

/// Mutable state of one phase: the map, the actor and what has been
/// collected or used up. Every state change is mirrored into events.
#[derive(Debug, Clone)]
pub struct Level {
	def: LevelDef,
	grid: GridMap,
	actor: Actor,
	collected: Vec<bool>,
	extinguishers: Option<u32>,
}

impl Level {
	pub fn new(def: LevelDef) -> Self {
		let mut grid = GridMap::new(def.divisions);
		for obstacle in &def.obstacles {
			grid.add_obstacle(*obstacle);
		}
		for trap in &def.traps {
			grid.add_trap(*trap);
		}
		for hole in &def.holes {
			grid.add_hole(*hole);
		}
		for fire in &def.fire_holes {
			grid.add_fire_hole(*fire);
		}

		let actor = Actor {
			position: grid.cell_to_world(def.start),
			yaw: def.heading.yaw_degrees(),
			heading: def.heading,
		};
		let mut level = Self {
			collected: vec![false; def.crystals.len()],
			extinguishers: def.extinguishers,
			def,
			grid,
			actor,
		};
		level.apply_flicker(true);
		level
	}

	pub fn def(&self) -> &LevelDef {
		&self.def
	}

	pub fn grid(&self) -> &GridMap {
		&self.grid
	}

	pub fn actor(&self) -> &Actor {
		&self.actor
	}

	pub fn actor_mut(&mut self) -> &mut Actor {
		&mut self.actor
	}

	pub fn actor_cell(&self) -> Cell {
		self.grid.world_to_cell(self.actor.position, Rounding::Nearest)
	}

	pub fn extinguishers(&self) -> Option<u32> {
		self.extinguishers
	}

	pub fn collected(&self) -> &[bool] {
		&self.collected
	}

	/// Back to the starting layout: actor on its start cell, crystals back,
	/// hazards re-armed and charges refilled.
	pub fn reset(&mut self, events: &mut Vec<Event>) {
		debug!("resetting level {}", self.def.id);
		self.grid.reset_hazards();
		self.apply_flicker(true);
		self.actor = Actor {
			position: self.grid.cell_to_world(self.def.start),
			yaw: self.def.heading.yaw_degrees(),
			heading: self.def.heading,
		};
		self.collected.iter_mut().for_each(|c| *c = false);
		self.extinguishers = self.def.extinguishers;

		events.push(self.actor.pose_event());
		for idx in 0..self.collected.len() {
			events.push(Event::Visibility {
				prop: Prop::Crystal(idx),
				visible: true,
			});
		}
		for kind in [HazardKind::Hole, HazardKind::FireHole] {
			for hazard in self.grid.hazards(kind) {
				events.push(Event::Visibility {
					prop: Prop::Hazard(kind, hazard.id),
					visible: hazard.active,
				});
			}
		}
		if let Some(n) = self.extinguishers {
			events.push(Event::Extinguishers(n));
		}
	}

	fn apply_flicker(&mut self, lit: bool) {
		let Some(flicker) = &self.def.flicker else { return };
		for &id in &flicker.lit {
			self.grid.set_hazard_active(HazardKind::FireHole, id, lit);
		}
		for &id in &flicker.dark {
			self.grid.set_hazard_active(HazardKind::FireHole, id, !lit);
		}
	}

	/// Swap the lit and dark fire sets. Does nothing on phases without
	/// blinking fires.
	pub fn alternate_hazards(&mut self, events: &mut Vec<Event>) {
		let Some(flicker) = self.def.flicker.clone() else { return };
		let lit_now = flicker
			.lit
			.first()
			.and_then(|&id| self.grid.hazard(HazardKind::FireHole, id))
			.is_some_and(|h| h.active);
		self.apply_flicker(!lit_now);

		for id in flicker.lit.into_iter().chain(flicker.dark) {
			if let Some(hazard) = self.grid.hazard(HazardKind::FireHole, id) {
				events.push(Event::Visibility {
					prop: Prop::Hazard(HazardKind::FireHole, id),
					visible: hazard.active,
				});
			}
		}
	}

	// --------------------------------------------------
	// Commands acting on the level
	// --------------------------------------------------

	pub fn sense(&self, sensor: Sensor) -> bool {
		let kind = match sensor {
			Sensor::FireAhead => HazardKind::FireHole,
			Sensor::HoleAhead => HazardKind::Hole,
		};
		self.grid.find_adjacent_hazard(self.actor.position, kind).is_some()
	}

	pub fn collect(&mut self, events: &mut Vec<Event>) {
		let cell = self.actor_cell();
		let found = self.def.crystals.iter().enumerate().find(|&(idx, c)| *c == cell && !self.collected[idx]).map(|(idx, _)| idx);

		let Some(idx) = found else {
			events.push(Event::say("Robô não está sobre o cristal."));
			return;
		};
		self.collected[idx] = true;
		events.push(Event::Visibility {
			prop: Prop::Crystal(idx),
			visible: false,
		});
		info!("crystal {idx} collected at {cell:?}");

		if self.collected.len() == 1 {
			events.push(Event::say("Cristal coletado com sucesso."));
		} else {
			events.push(Event::say("Cristal coletado."));
			if self.collected.iter().all(|c| *c) {
				events.push(Event::say("Todos os cristais coletados com sucesso!"));
			}
		}
	}

	/// Put out the fire next to the actor. Uses up one extinguisher, but only
	/// when there was a fire to put out.
	pub fn put_out_fire(&mut self, events: &mut Vec<Event>) {
		if self.extinguishers == Some(0) {
			events.push(Event::say("Estou sem extintores!"));
			return;
		}
		if self.clear_adjacent(HazardKind::FireHole, events) {
			if let Some(n) = self.extinguishers.as_mut() {
				*n -= 1;
				events.push(Event::Extinguishers(*n));
			}
		}
	}

	pub fn cover_hole(&mut self, events: &mut Vec<Event>) {
		self.clear_adjacent(HazardKind::Hole, events);
	}

	fn clear_adjacent(&mut self, kind: HazardKind, events: &mut Vec<Event>) -> bool {
		match self.grid.deactivate_hazard(self.actor.position, kind) {
			Some(id) => {
				debug!("{kind:?} {id} cleared");
				events.push(Event::Visibility {
					prop: Prop::Hazard(kind, id),
					visible: false,
				});
				true
			},
			None => {
				events.push(Event::say("Não posso fazer isso aqui!"));
				false
			},
		}
	}

	pub fn is_won(&self) -> bool {
		if !self.collected.iter().all(|c| *c) {
			return false;
		}
		match self.def.win {
			WinRule::AllCollected => true,
			WinRule::CollectedAndStanding => {
				let cell = self.actor_cell();
				self.def.crystals.contains(&cell)
			},
		}
	}
}
