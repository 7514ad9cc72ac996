//! Built-in phases. Coordinates are `(x, z)` cells on a 10x10 map.

use crate::grid::{Cell, Obstacle};
use crate::level::{Flicker, LevelDef, WinRule};

pub const IDS: &[&str] = &[
	"level1/phase5",
	"level1/phase6",
	"level2/phase1",
	"level2/phase2",
	"level2/phase5",
	"level2/phase7",
	"level2/phase8",
];

fn cells(list: &[(i32, i32)]) -> Vec<Cell> {
	list.iter().map(|&(x, z)| Cell::new(x, z)).collect()
}

fn obstacles(list: &[(i32, i32, i32, i32)]) -> Vec<Obstacle> {
	list.iter().map(|&(a, b, c, d)| Obstacle::new(a, b, c, d)).collect()
}

/// Look up a phase by id, e.g. `level2/phase2`.
pub fn builtin(id: &str) -> Option<LevelDef> {
	let def = match id {
		"level1/phase5" => {
			let mut def = LevelDef::new("level1/phase5", "Nível 1 - Fase 5", Cell::new(0, 2));
			def.obstacles = obstacles(&[(5, 7, 7, 7), (5, 5, 2, 3)]);
			def.crystals = cells(&[(6, 2), (7, 8)]);
			def
		},
		"level1/phase6" => {
			let mut def = LevelDef::new("level1/phase6", "Nível 1 - Fase 6", Cell::new(0, 5));
			def.obstacles = obstacles(&[(2, 8, 2, 2), (2, 9, 4, 4), (7, 7, 0, 1)]);
			def.crystals = cells(&[(8, 0)]);
			def.win = WinRule::CollectedAndStanding;
			def
		},
		"level2/phase1" => {
			let mut def = fire_phase("level2/phase1", "Nível 2 - Fase 1");
			def.command_limit = Some(10);
			def.obstacles = obstacles(&[(1, 9, 4, 4), (1, 9, 6, 6)]);
			def.fire_holes = cells(&[(7, 5)]);
			def.crystals = cells(&[(9, 5)]);
			def.win = WinRule::CollectedAndStanding;
			def
		},
		"level2/phase2" => {
			let mut def = fire_phase("level2/phase2", "Nível 2 - Fase 2");
			def.obstacles = obstacles(&[(2, 8, 2, 2), (2, 8, 4, 4), (2, 8, 6, 6), (2, 8, 8, 8)]);
			def.fire_holes = cells(&[(3, 3), (6, 3), (3, 7), (6, 7), (9, 6)]);
			def.traps = cells(&[(9, 2), (8, 5), (9, 8)]);
			def.crystals = cells(&[(9, 5)]);
			def.flicker = Some(Flicker {
				lit: vec![0, 3],
				dark: vec![1, 4],
			});
			def.win = WinRule::CollectedAndStanding;
			def
		},
		"level2/phase5" => {
			let mut def = fire_phase("level2/phase5", "Nível 2 - Fase 5");
			def.obstacles = obstacles(&[(3, 7, 8, 8), (7, 7, 6, 6), (3, 4, 4, 6), (6, 6, 4, 6), (3, 8, 2, 2), (7, 7, 4, 4)]);
			def.traps = cells(&[(5, 5)]);
			def.fire_holes = cells(&[(3, 7), (7, 7), (7, 3), (3, 3), (9, 2)]);
			def.crystals = cells(&[(5, 7), (5, 3)]);
			def.flicker = Some(Flicker { lit: vec![1], dark: vec![2] });
			def
		},
		"level2/phase7" => {
			let mut def = fire_phase("level2/phase7", "Nível 2 - Fase 7");
			def.obstacles = obstacles(&[
				(2, 8, 8, 8),
				(2, 2, 7, 7),
				(2, 2, 3, 3),
				(5, 5, 4, 6),
				(2, 3, 6, 6),
				(8, 8, 1, 7),
				(5, 5, 2, 2),
				(2, 3, 4, 4),
				(8, 8, 7, 7),
				(7, 8, 5, 5),
				(8, 8, 2, 3),
			]);
			def.traps = cells(&[(2, 5), (5, 3)]);
			def.fire_holes = cells(&[(2, 9), (2, 0), (6, 5), (8, 6), (8, 4), (4, 5)]);
			def.crystals = cells(&[(3, 5), (7, 3)]);
			def.flicker = Some(Flicker {
				lit: vec![2, 3, 4],
				dark: vec![0, 1, 5],
			});
			def
		},
		"level2/phase8" => {
			let mut def = fire_phase("level2/phase8", "Nível 2 - Fase 8");
			def.obstacles = obstacles(&[
				(2, 2, 6, 7),
				(2, 2, 3, 4),
				(2, 2, 0, 1),
				(4, 4, 1, 2),
				(6, 7, 2, 2),
				(8, 8, 1, 3),
				(4, 4, 6, 6),
				(6, 6, 6, 6),
				(4, 4, 4, 4),
				(6, 6, 4, 4),
			]);
			def.traps = cells(&[(4, 7), (6, 7), (2, 5), (4, 5), (6, 5), (8, 5), (6, 0)]);
			def.fire_holes = cells(&[(3, 7), (5, 7), (7, 7), (3, 3), (5, 3), (7, 3), (9, 5)]);
			def.crystals = cells(&[(3, 5), (5, 5), (7, 5)]);
			def.flicker = Some(Flicker {
				lit: vec![3, 5],
				dark: vec![4, 6],
			});
			def
		},
		_ => return None,
	};
	Some(def)
}

// Every phase of the second level starts mid-left with one extinguisher.
fn fire_phase(id: &'static str, title: &'static str) -> LevelDef {
	let mut def = LevelDef::new(id, title, Cell::new(0, 5));
	def.extinguishers = Some(1);
	def
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::grid::GridMap;

	#[test]
	fn every_id_resolves() {
		for id in IDS {
			let def = builtin(id).unwrap_or_else(|| panic!("missing {id}"));
			assert_eq!(def.id, *id);
		}
		assert!(builtin("level9/phase9").is_none());
	}

	#[test]
	fn starts_and_crystals_are_reachable_cells() {
		for id in IDS {
			let def = builtin(id).unwrap();
			let mut grid = GridMap::new(def.divisions);
			for o in &def.obstacles {
				grid.add_obstacle(*o);
			}
			assert!(grid.blocker_at(def.start).is_none(), "{id}: start is blocked");
			for crystal in &def.crystals {
				assert!(grid.blocker_at(*crystal).is_none(), "{id}: crystal {crystal:?} is blocked");
			}
		}
	}

	#[test]
	fn flicker_ids_exist() {
		for id in IDS {
			let def = builtin(id).unwrap();
			if let Some(flicker) = &def.flicker {
				for fid in flicker.lit.iter().chain(&flicker.dark) {
					assert!(*fid < def.fire_holes.len(), "{id}: fire hole {fid} out of range");
				}
			}
		}
	}

	#[test]
	fn only_the_first_fire_phase_limits_commands() {
		let limited: Vec<_> = IDS.iter().filter(|id| builtin(id).unwrap().command_limit.is_some()).collect();
		assert_eq!(limited, vec![&"level2/phase1"]);
	}
}
