pub mod ast;
pub mod error;
pub mod events;
pub mod grid;
pub mod interpreter;
pub mod level;
pub mod levels;
pub mod parser;
mod preprocessor;
pub mod session;
pub mod web;

use log::info;
use wasm_bindgen::prelude::*;

pub use ast::Program;
pub use error::{RunError, ScriptError};
pub use events::{ConsoleLine, Event, Prop, Severity};
pub use interpreter::{CancellationToken, EngineConfig, Interpreter, RunEnd, Stage, Step, drive};
pub use level::{Level, LevelDef};
pub use parser::parse_program;
pub use session::{RunReport, Session};


#[wasm_bindgen]
pub fn start() {
	set_panic_hook();
	init_logging();
	info!("gridbot {} ready, levels: {:?}", env!("CARGO_PKG_VERSION"), levels::IDS);
}


pub fn set_panic_hook() {
	// When the `console_error_panic_hook` feature is enabled, we can call the
	// `set_panic_hook` function at least once during initialization, and then
	// we will get better error messages if our code ever panics.
	#[cfg(feature = "console_error_panic_hook")]
	console_error_panic_hook::set_once();
}

/// Route `log` output to the browser console or, natively, to stderr
/// filtered by `RUST_LOG` (default `info`). Safe to call more than once.
pub fn init_logging() {
	#[cfg(target_arch = "wasm32")]
	{
		console_log::init_with_level(log::Level::Debug).ok();
	}

	#[cfg(not(target_arch = "wasm32"))]
	{
		env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init().ok();
	}
}
