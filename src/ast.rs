use std::fmt;

/// A validated program, ready to hand to the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
	pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
	pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
	Command(Command),
	If(IfStatement),
	Block(Block),
}

/// `se(...)` governs exactly the statement that follows it, which may be a
/// braced block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfStatement {
	pub condition: Condition,
	/// Condition text as the player wrote it.
	pub source: String,
	pub body: Box<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
	Literal(bool),
	Sensor(Sensor),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
	/// `pegandoFogo()`: an active fire hole is one cell away.
	FireAhead,
	/// `buracoAFrente()`: an uncovered hole is one cell away.
	HoleAhead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
	MoveForward(u32),
	MoveBackward(u32),
	TurnLeft,
	TurnRight,
	UTurn,
	CollectCrystal,
	PutOutFire,
	CoverHole,
}

impl Command {
	pub fn keyword(&self) -> &'static str {
		match self {
			Command::MoveForward(_) => "andarFrente",
			Command::MoveBackward(_) => "andarTras",
			Command::TurnLeft => "girarEsquerda",
			Command::TurnRight => "girarDireita",
			Command::UTurn => "darMeiaVolta",
			Command::CollectCrystal => "coletarCristal",
			Command::PutOutFire => "apagarFogoECobrirBuraco",
			Command::CoverHole => "cobrirBuraco",
		}
	}

	/// The sensor a command must be guarded by, if any.
	pub fn required_sensor(&self) -> Option<Sensor> {
		match self {
			Command::PutOutFire => Some(Sensor::FireAhead),
			Command::CoverHole => Some(Sensor::HoleAhead),
			_ => None,
		}
	}
}

impl Sensor {
	pub fn keyword(&self) -> &'static str {
		match self {
			Sensor::FireAhead => "pegandoFogo",
			Sensor::HoleAhead => "buracoAFrente",
		}
	}
}

impl Program {
	/// Number of commands anywhere in the program, nested bodies included.
	pub fn command_count(&self) -> usize {
		fn count(stmt: &Statement) -> usize {
			match stmt {
				Statement::Command(_) => 1,
				Statement::If(ifst) => count(&ifst.body),
				Statement::Block(b) => b.statements.iter().map(count).sum(),
			}
		}
		self.body.statements.iter().map(count).sum()
	}
}

// ---------------------------------------------------------------------------
// Canonical listing, used when logging what the validator produced
// ---------------------------------------------------------------------------

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Command::MoveForward(n) | Command::MoveBackward(n) => write!(f, "{}({})", self.keyword(), n),
			_ => write!(f, "{}()", self.keyword()),
		}
	}
}

impl fmt::Display for Condition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Condition::Literal(b) => write!(f, "{b}"),
			Condition::Sensor(s) => write!(f, "{}()", s.keyword()),
		}
	}
}

impl Statement {
	fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
		let pad = "    ".repeat(depth);
		match self {
			Statement::Command(cmd) => writeln!(f, "{pad}{cmd}"),
			Statement::If(ifst) => {
				writeln!(f, "{pad}se({})", ifst.condition)?;
				match &*ifst.body {
					Statement::Block(_) => ifst.body.write_indented(f, depth),
					other => other.write_indented(f, depth + 1),
				}
			},
			Statement::Block(b) => {
				writeln!(f, "{pad}{{")?;
				for stmt in &b.statements {
					stmt.write_indented(f, depth + 1)?;
				}
				writeln!(f, "{pad}}}")
			},
		}
	}
}

impl fmt::Display for Statement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.write_indented(f, 0)
	}
}

impl fmt::Display for Program {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for stmt in &self.body.statements {
			stmt.write_indented(f, 0)?;
		}
		Ok(())
	}
}
