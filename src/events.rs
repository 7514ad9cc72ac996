use crate::grid::{HazardId, HazardKind, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
	Info,
	Warning,
	Error,
}

/// A message for the in-game console, optionally tied to a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
	pub text: String,
	pub line: Option<usize>,
	pub severity: Severity,
}

impl ConsoleLine {
	pub fn info(text: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			line: None,
			severity: Severity::Info,
		}
	}

	pub fn warning(text: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			line: None,
			severity: Severity::Warning,
		}
	}
}

/// Scene props whose visibility the core toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prop {
	Crystal(usize),
	Hazard(HazardKind, HazardId),
}

/// Everything the core tells the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
	Console(ConsoleLine),
	/// Desired actor pose for this frame. `yaw` is in degrees.
	Pose { position: Position, yaw: f64 },
	Visibility { prop: Prop, visible: bool },
	/// Remaining extinguisher charges.
	Extinguishers(u32),
	Finished { won: bool },
}

impl Event {
	pub fn say(text: impl Into<String>) -> Self {
		Event::Console(ConsoleLine::info(text))
	}

	pub fn warn(text: impl Into<String>) -> Self {
		Event::Console(ConsoleLine::warning(text))
	}
}

/// Console lines in emission order.
pub fn console_text(events: &[Event]) -> Vec<&str> {
	events
		.iter()
		.filter_map(|e| match e {
			Event::Console(line) => Some(line.text.as_str()),
			_ => None,
		})
		.collect()
}
