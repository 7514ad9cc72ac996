use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use log::{debug, info, warn};

use crate::ast::{Command, Condition, Program, Statement};
use crate::events::Event;
use crate::grid::{CELL_SPACING, Position, Resolved};
use crate::level::{Heading, Level};

pub const CLAMP_WARNING: &str = "Aviso: Não é possível avançar mais por este caminho, seguindo para o próximo comando.";

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared stop flag for one run. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Rc<Cell<bool>>);

impl CancellationToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.set(true);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.get()
	}

	/// Whether both tokens belong to the same run.
	pub fn same_run(&self, other: &CancellationToken) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
	/// Lerp factor on the first frame of a move.
	pub initial_alpha: f64,
	/// Added to the lerp factor every frame, so moves speed up.
	pub alpha_step: f64,
	/// Distance at which a move snaps onto its target.
	pub precision: f64,
	/// Degrees turned per frame.
	pub turn_step: f64,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			initial_alpha: 0.01,
			alpha_step: 0.001,
			precision: 0.005,
			turn_step: 1.0,
		}
	}
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
	/// Every statement ran.
	Completed,
	/// The actor stepped on a trap; the run was cancelled.
	Trapped,
	/// Stopped from outside.
	Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
	Running,
	Done(RunEnd),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Motion {
	Translate {
		/// Where the command asked to go; re-checked against the map on
		/// every frame.
		requested: Position,
		alpha: f64,
		warned: bool,
	},
	Rotate {
		target_yaw: f64,
		heading: Heading,
	},
}

enum Progress {
	Moving(Motion),
	Settled,
	Trapped,
}

/// Runs one translated program against a level, one animation frame per
/// [`Interpreter::tick`].
pub struct Interpreter {
	queue: VecDeque<Statement>,
	motion: Option<Motion>,
	token: CancellationToken,
	config: EngineConfig,
	end: Option<RunEnd>,
}

impl Interpreter {
	pub fn new(program: Program, token: CancellationToken, config: EngineConfig) -> Self {
		Self {
			queue: program.body.statements.into(),
			motion: None,
			token,
			config,
			end: None,
		}
	}

	pub fn token(&self) -> &CancellationToken {
		&self.token
	}

	pub fn is_finished(&self) -> bool {
		self.end.is_some()
	}

	// --------------------------------------------------
	// Frame step
	// --------------------------------------------------

	/// Advance by one frame. Instant commands chain within the frame; a
	/// move or turn holds the rest of the program until it settles.
	pub fn tick(&mut self, level: &mut Level, events: &mut Vec<Event>) -> Step {
		if let Some(end) = self.end {
			return Step::Done(end);
		}
		let step = self.advance(level, events);
		if let Step::Done(end) = step {
			info!("run ended: {end:?}");
			self.end = Some(end);
			self.motion = None;
			self.queue.clear();
		}
		step
	}

	fn advance(&mut self, level: &mut Level, events: &mut Vec<Event>) -> Step {
		if self.token.is_cancelled() {
			return Step::Done(RunEnd::Cancelled);
		}

		if let Some(motion) = self.motion.take() {
			match self.step_motion(motion, level, events) {
				Progress::Moving(motion) => {
					self.motion = Some(motion);
					return Step::Running;
				},
				Progress::Trapped => return Step::Done(RunEnd::Trapped),
				Progress::Settled => {},
			}
		}

		while let Some(stmt) = self.queue.pop_front() {
			match stmt {
				Statement::Block(block) => self.splice(block.statements),
				Statement::If(ifst) => {
					let taken = self.evaluate(ifst.condition, level);
					debug!("se({}) -> {taken}", ifst.source);
					if taken {
						self.queue.push_front(*ifst.body);
					}
				},
				Statement::Command(cmd) => {
					debug!("exec {cmd}");
					if let Some(motion) = self.execute(cmd, level, events) {
						self.motion = Some(motion);
						return Step::Running;
					}
				},
			}
		}
		Step::Done(RunEnd::Completed)
	}

	/// Put a body at the front of the queue, order preserved.
	fn splice(&mut self, statements: Vec<Statement>) {
		for stmt in statements.into_iter().rev() {
			self.queue.push_front(stmt);
		}
	}

	fn evaluate(&self, condition: Condition, level: &Level) -> bool {
		match condition {
			Condition::Literal(b) => b,
			Condition::Sensor(sensor) => level.sense(sensor),
		}
	}

	// --------------------------------------------------
	// Commands
	// --------------------------------------------------

	fn execute(&mut self, cmd: Command, level: &mut Level, events: &mut Vec<Event>) -> Option<Motion> {
		let actor = *level.actor();
		match cmd {
			Command::MoveForward(n) | Command::MoveBackward(n) => {
				let sign = if matches!(cmd, Command::MoveForward(_)) { 1.0 } else { -1.0 };
				let (dx, dz) = actor.heading.forward();
				let distance = sign * CELL_SPACING * f64::from(n);
				Some(Motion::Translate {
					requested: Position::new(actor.position.x + f64::from(dx) * distance, actor.position.z + f64::from(dz) * distance),
					alpha: self.config.initial_alpha,
					warned: false,
				})
			},
			Command::TurnLeft => Some(Motion::Rotate {
				target_yaw: actor.yaw + 90.0,
				heading: actor.heading.left(),
			}),
			Command::TurnRight => Some(Motion::Rotate {
				target_yaw: actor.yaw - 90.0,
				heading: actor.heading.right(),
			}),
			Command::UTurn => Some(Motion::Rotate {
				target_yaw: actor.yaw + 180.0,
				heading: actor.heading.reverse(),
			}),
			Command::CollectCrystal => {
				level.collect(events);
				None
			},
			Command::PutOutFire => {
				level.put_out_fire(events);
				None
			},
			Command::CoverHole => {
				level.cover_hole(events);
				None
			},
		}
	}

	// --------------------------------------------------
	// Animation
	// --------------------------------------------------

	fn step_motion(&mut self, motion: Motion, level: &mut Level, events: &mut Vec<Event>) -> Progress {
		match motion {
			Motion::Translate { requested, alpha, warned } => self.translate(requested, alpha, warned, level, events),
			Motion::Rotate { target_yaw, heading } => {
				let actor = level.actor_mut();
				let diff = target_yaw - actor.yaw;
				if diff.abs() <= self.config.turn_step {
					actor.yaw = target_yaw.rem_euclid(360.0);
					actor.heading = heading;
					events.push(actor.pose_event());
					return Progress::Settled;
				}
				actor.yaw += self.config.turn_step * diff.signum();
				events.push(actor.pose_event());
				Progress::Moving(motion)
			},
		}
	}

	fn translate(&mut self, requested: Position, alpha: f64, mut warned: bool, level: &mut Level, events: &mut Vec<Event>) -> Progress {
		let current = level.actor().position;
		let grid = level.grid();
		if grid.check_trap(current) {
			events.push(Event::say("Você caiu na armadilha."));
			self.token.cancel();
			return Progress::Trapped;
		}
		if grid.check_fire_hole(current) {
			events.push(Event::say("Robô foi queimado!"));
			return Progress::Settled;
		}
		if grid.check_hole(current) {
			events.push(Event::say("Você caiu no buraco!"));
			return Progress::Settled;
		}

		let resolved = grid.resolve_move(current, requested);
		if let Resolved::Clamped { by, .. } = resolved {
			if !warned {
				warn!("move clamped by {by:?}");
				events.push(Event::warn(CLAMP_WARNING));
				warned = true;
			}
		}
		let target = resolved.position();

		let actor = level.actor_mut();
		if current.approx_eq(target, self.config.precision) {
			actor.position = target;
			events.push(actor.pose_event());
			return Progress::Settled;
		}
		actor.position = current.lerp(target, alpha);
		events.push(actor.pose_event());
		Progress::Moving(Motion::Translate {
			requested,
			alpha: (alpha + self.config.alpha_step).min(1.0),
			warned,
		})
	}
}

// ---------------------------------------------------------------------------
// Driving a run against a presentation layer
// ---------------------------------------------------------------------------

/// Whatever shows the run: gets the events of every frame and decides when
/// the next frame is due.
pub trait Stage {
	fn render(&mut self, events: Vec<Event>);

	fn next_frame(&mut self) -> LocalBoxFuture<'static, ()>;
}

/// Tick `interpreter` until it ends, yielding to `stage` between frames.
pub async fn drive<S: Stage + ?Sized>(interpreter: &mut Interpreter, level: &mut Level, stage: &mut S) -> RunEnd {
	loop {
		let mut events = Vec::new();
		let step = interpreter.tick(level, &mut events);
		if !events.is_empty() {
			stage.render(events);
		}
		match step {
			Step::Done(end) => return end,
			Step::Running => stage.next_frame().await,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::events::console_text;
	use crate::grid::{Cell, Obstacle};
	use crate::level::LevelDef;
	use crate::parser::parse_program;
	use futures::FutureExt;

	const MAX_TICKS: usize = 100_000;

	fn level(setup: impl FnOnce(&mut LevelDef)) -> Level {
		let mut def = LevelDef::new("test", "Test", Cell::new(0, 5));
		setup(&mut def);
		Level::new(def)
	}

	fn start(src: &str) -> Interpreter {
		let program = match parse_program(src, None) {
			Ok(p) => p,
			Err(e) => panic!("{}", e.to_console().text),
		};
		Interpreter::new(program, CancellationToken::new(), EngineConfig::default())
	}

	fn run(src: &str, level: &mut Level) -> (RunEnd, Vec<Event>) {
		let mut interp = start(src);
		let mut events = Vec::new();
		for _ in 0..MAX_TICKS {
			if let Step::Done(end) = interp.tick(level, &mut events) {
				return (end, events);
			}
		}
		panic!("program did not finish in {MAX_TICKS} ticks");
	}

	#[test]
	fn obstacle_stops_the_actor_and_collect_misses() {
		let mut lvl = level(|d| {
			d.obstacles = vec![Obstacle::new(5, 5, 5, 5)];
			d.crystals = vec![Cell::new(9, 5)];
		});
		let (end, events) = run("andarFrente(9)\ncoletarCristal()", &mut lvl);
		assert_eq!(end, RunEnd::Completed);
		assert_eq!(lvl.actor_cell(), Cell::new(4, 5));
		assert_eq!(lvl.actor().position, lvl.grid().cell_to_world(Cell::new(4, 5)));
		assert_eq!(console_text(&events), vec![CLAMP_WARNING, "Robô não está sobre o cristal."]);
	}

	#[test]
	fn free_move_lands_on_cell_center() {
		let mut lvl = level(|_| {});
		let (end, events) = run("andarFrente(3)\nandarTras(1)", &mut lvl);
		assert_eq!(end, RunEnd::Completed);
		assert_eq!(lvl.actor().position, lvl.grid().cell_to_world(Cell::new(2, 5)));
		assert!(console_text(&events).is_empty());
		assert!(matches!(events.last(), Some(Event::Pose { .. })));
	}

	#[test]
	fn backing_off_the_map_warns_and_stays() {
		let mut lvl = level(|_| {});
		let (end, events) = run("andarTras(2)", &mut lvl);
		assert_eq!(end, RunEnd::Completed);
		assert_eq!(lvl.actor_cell(), Cell::new(0, 5));
		assert_eq!(console_text(&events), vec![CLAMP_WARNING]);
	}

	#[test]
	fn longest_backward_move_stops_at_the_edge() {
		let mut lvl = level(|_| {});
		let (end, _) = run("andarFrente(5)\nandarTras(4294967295)", &mut lvl);
		assert_eq!(end, RunEnd::Completed);
		assert_eq!(lvl.actor_cell(), Cell::new(0, 5));
		assert_eq!(lvl.actor().heading, Heading::East);
	}

	#[test]
	fn trap_is_reported_before_an_edge_clamp() {
		let mut lvl = level(|d| d.traps = vec![Cell::new(0, 5)]);
		let (end, events) = run("andarTras(2)", &mut lvl);
		assert_eq!(end, RunEnd::Trapped);
		assert_eq!(console_text(&events), vec!["Você caiu na armadilha."]);
	}

	#[test]
	fn turns_rotate_and_commit_heading() {
		let mut lvl = level(|_| {});
		run("girarEsquerda()", &mut lvl);
		assert_eq!(lvl.actor().heading, Heading::North);
		assert_eq!(lvl.actor().yaw, 180.0);

		run("darMeiaVolta()", &mut lvl);
		assert_eq!(lvl.actor().heading, Heading::South);
		assert_eq!(lvl.actor().yaw, 0.0);

		run("girarDireita()\nandarFrente(1)", &mut lvl);
		assert_eq!(lvl.actor().heading, Heading::West);
		assert_eq!(lvl.actor().yaw, 270.0);
		// Already on column 0: walking west hits the edge.
		assert_eq!(lvl.actor_cell(), Cell::new(0, 5));
	}

	#[test]
	fn left_turn_then_walk_goes_north() {
		let mut lvl = level(|_| {});
		run("girarEsquerda()\nandarFrente(2)", &mut lvl);
		assert_eq!(lvl.actor_cell(), Cell::new(0, 3));
	}

	#[test]
	fn trap_ends_the_run() {
		let mut lvl = level(|d| d.traps = vec![Cell::new(2, 5)]);
		let mut interp = start("andarFrente(4)\ngirarDireita()");
		let mut events = Vec::new();
		let end = loop {
			if let Step::Done(end) = interp.tick(&mut lvl, &mut events) {
				break end;
			}
		};
		assert_eq!(end, RunEnd::Trapped);
		assert!(interp.token().is_cancelled());
		assert_eq!(console_text(&events), vec!["Você caiu na armadilha."]);
		assert_eq!(lvl.actor_cell(), Cell::new(2, 5));
		assert_eq!(lvl.actor().heading, Heading::East);
	}

	#[test]
	fn fire_hole_halts_the_move_but_not_the_program() {
		let mut lvl = level(|d| {
			d.fire_holes = vec![Cell::new(2, 5)];
			d.crystals = vec![Cell::new(8, 8)];
		});
		let (end, events) = run("andarFrente(4)\ncoletarCristal()", &mut lvl);
		assert_eq!(end, RunEnd::Completed);
		assert_eq!(lvl.actor_cell(), Cell::new(2, 5));
		assert_eq!(console_text(&events), vec!["Robô foi queimado!", "Robô não está sobre o cristal."]);
	}

	#[test]
	fn hole_halts_the_move() {
		let mut lvl = level(|d| d.holes = vec![Cell::new(1, 5)]);
		let (end, events) = run("andarFrente(3)", &mut lvl);
		assert_eq!(end, RunEnd::Completed);
		assert_eq!(lvl.actor_cell(), Cell::new(1, 5));
		assert_eq!(console_text(&events), vec!["Você caiu no buraco!"]);
	}

	#[test]
	fn guarded_fire_is_put_out_and_crossed() {
		let mut lvl = level(|d| {
			d.fire_holes = vec![Cell::new(2, 5)];
			d.extinguishers = Some(1);
		});
		let (end, events) = run("andarFrente(1)\nse(pegandoFogo()) {\n  apagarFogoECobrirBuraco()\n}\nandarFrente(2)", &mut lvl);
		assert_eq!(end, RunEnd::Completed);
		assert_eq!(lvl.actor_cell(), Cell::new(3, 5));
		assert_eq!(lvl.extinguishers(), Some(0));
		assert!(console_text(&events).is_empty());
		assert!(events.contains(&Event::Extinguishers(0)));
	}

	#[test]
	fn covered_hole_can_be_crossed() {
		let mut lvl = level(|d| d.holes = vec![Cell::new(1, 5)]);
		let (_, events) = run("se(buracoAFrente())\ncobrirBuraco()\nandarFrente(2)", &mut lvl);
		assert_eq!(lvl.actor_cell(), Cell::new(2, 5));
		assert!(console_text(&events).is_empty());
	}

	#[test]
	fn false_condition_skips_its_body() {
		let mut lvl = level(|_| {});
		run("se(false)\nandarFrente(1)\ngirarDireita()", &mut lvl);
		assert_eq!(lvl.actor_cell(), Cell::new(0, 5));
		assert_eq!(lvl.actor().heading, Heading::South);
	}

	#[test]
	fn instant_commands_share_a_frame() {
		let mut lvl = level(|d| d.crystals = vec![Cell::new(5, 5)]);
		let mut interp = start("coletarCristal()\ncoletarCristal()");
		let mut events = Vec::new();
		assert_eq!(interp.tick(&mut lvl, &mut events), Step::Done(RunEnd::Completed));
		assert_eq!(console_text(&events).len(), 2);
	}

	#[test]
	fn cancellation_stops_pose_updates_within_a_frame() {
		let mut lvl = level(|_| {});
		let mut interp = start("andarFrente(5)\ngirarDireita()");
		let mut events = Vec::new();
		for _ in 0..10 {
			assert_eq!(interp.tick(&mut lvl, &mut events), Step::Running);
		}
		let stopped_at = lvl.actor().position;
		interp.token().clone().cancel();

		events.clear();
		assert_eq!(interp.tick(&mut lvl, &mut events), Step::Done(RunEnd::Cancelled));
		assert!(events.is_empty());
		assert_eq!(lvl.actor().position, stopped_at);
		assert!(interp.is_finished());
		assert_eq!(interp.tick(&mut lvl, &mut events), Step::Done(RunEnd::Cancelled));
	}

	#[test]
	fn tokens_share_state_across_clones() {
		let a = CancellationToken::new();
		let b = a.clone();
		assert!(a.same_run(&b));
		assert!(!a.same_run(&CancellationToken::new()));
		b.cancel();
		assert!(a.is_cancelled());
	}

	struct Recorder {
		frames: usize,
		events: Vec<Event>,
	}

	impl Stage for Recorder {
		fn render(&mut self, events: Vec<Event>) {
			self.events.extend(events);
		}

		fn next_frame(&mut self) -> LocalBoxFuture<'static, ()> {
			self.frames += 1;
			futures::future::ready(()).boxed_local()
		}
	}

	#[test]
	fn drive_renders_every_frame() {
		let mut lvl = level(|d| d.crystals = vec![Cell::new(1, 5)]);
		let mut interp = start("andarFrente(1)\ncoletarCristal()");
		let mut stage = Recorder { frames: 0, events: Vec::new() };
		let end = futures::executor::block_on(drive(&mut interp, &mut lvl, &mut stage));
		assert_eq!(end, RunEnd::Completed);
		assert!(stage.frames > 10);
		assert_eq!(console_text(&stage.events), vec!["Cristal coletado com sucesso."]);
		let poses = stage.events.iter().filter(|e| matches!(e, Event::Pose { .. })).count();
		assert_eq!(poses, stage.frames);
	}
}
