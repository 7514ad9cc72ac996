use log::{error, info};

use crate::error::RunError;
use crate::events::Event;
use crate::interpreter::{CancellationToken, EngineConfig, Interpreter, RunEnd, Stage, drive};
use crate::level::{Level, LevelDef};
use crate::parser::parse_program;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
	pub end: RunEnd,
	pub won: bool,
}

/// One player working on one phase: owns the level and decides when a
/// program may run.
pub struct Session {
	level: Level,
	token: CancellationToken,
	config: EngineConfig,
	running: bool,
}

impl Session {
	pub fn new(def: LevelDef) -> Self {
		Self::with_config(def, EngineConfig::default())
	}

	pub fn with_config(def: LevelDef, config: EngineConfig) -> Self {
		Self {
			level: Level::new(def),
			token: CancellationToken::new(),
			config,
			running: false,
		}
	}

	pub fn level(&self) -> &Level {
		&self.level
	}

	pub fn level_mut(&mut self) -> &mut Level {
		&mut self.level
	}

	pub fn is_running(&self) -> bool {
		self.running
	}

	/// Validate `code` and set up a fresh run from the starting layout.
	/// Rejected programs are reported on the console and leave the level
	/// untouched.
	pub fn start(&mut self, code: &str, events: &mut Vec<Event>) -> Result<Interpreter, RunError> {
		if self.running {
			return Err(RunError::Busy);
		}
		let program = match parse_program(code, self.level.def().command_limit) {
			Ok(program) => program,
			Err(e) => {
				error!("rejected program: {e}");
				events.push(Event::Console(e.to_console()));
				return Err(e.into());
			},
		};

		self.token = CancellationToken::new();
		self.level.reset(events);
		self.running = true;
		info!("running {} commands on {}", program.command_count(), self.level.def().id);
		Ok(Interpreter::new(program, self.token.clone(), self.config))
	}

	/// Close a run started by [`Session::start`]. Runs superseded by a reset
	/// are reported as lost and leave the session alone.
	pub fn finish(&mut self, interpreter: &Interpreter, end: RunEnd, events: &mut Vec<Event>) -> RunReport {
		if !interpreter.token().same_run(&self.token) {
			return RunReport { end, won: false };
		}
		self.running = false;
		// A trap after the last crystal does not undo the win.
		let won = matches!(end, RunEnd::Completed | RunEnd::Trapped) && self.level.is_won();
		info!("{} finished: {end:?}, won: {won}", self.level.def().id);
		events.push(Event::Finished { won });
		RunReport { end, won }
	}

	/// Stop whatever is running and put the level back to its start.
	pub fn reset(&mut self, events: &mut Vec<Event>) {
		self.token.cancel();
		self.token = CancellationToken::new();
		self.running = false;
		self.level.reset(events);
	}

	/// Blink the phase's fires. Only while nobody is running a program.
	pub fn alternate_hazards(&mut self, events: &mut Vec<Event>) {
		if !self.running {
			self.level.alternate_hazards(events);
		}
	}

	/// Validate, run to the end against `stage` and report the outcome.
	pub async fn run<S: Stage + ?Sized>(&mut self, code: &str, stage: &mut S) -> Result<RunReport, RunError> {
		let mut events = Vec::new();
		let started = self.start(code, &mut events);
		stage.render(std::mem::take(&mut events));
		let mut interpreter = started?;

		let end = drive(&mut interpreter, &mut self.level, stage).await;
		let report = self.finish(&interpreter, end, &mut events);
		stage.render(events);
		Ok(report)
	}
}
