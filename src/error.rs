use thiserror::Error;

use crate::events::{ConsoleLine, Severity};

/// Why a program was rejected. Messages are the ones shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
	#[error("{text}")]
	UnknownCommand { line: usize, text: String },

	#[error("{text} (Condição inválida)")]
	InvalidCondition { line: usize, text: String },

	#[error("{text} (Bloco é aberto mas nunca é fechado)")]
	UnclosedBlock { line: usize, text: String },

	#[error("{text} (Bloco é fechado mas nunca é aberto)")]
	UnopenedBlock { line: usize, text: String },

	#[error("{text} (Não é possível usar comando sem saber o que está em minha frente)")]
	MissingSensorCheck { line: usize, text: String },

	#[error("{text} (Condição sem comando para executar)")]
	EmptyConditional { line: usize, text: String },

	#[error("O código tem mais linhas do que o robô pode processar. Tente rescrever seu código em {limit} linhas ou menos.")]
	TooManyCommands { line: usize, limit: usize },
}

impl ScriptError {
	/// 1-based line the error points at.
	pub fn line(&self) -> usize {
		match self {
			ScriptError::UnknownCommand { line, .. }
			| ScriptError::InvalidCondition { line, .. }
			| ScriptError::UnclosedBlock { line, .. }
			| ScriptError::UnopenedBlock { line, .. }
			| ScriptError::MissingSensorCheck { line, .. }
			| ScriptError::EmptyConditional { line, .. }
			| ScriptError::TooManyCommands { line, .. } => *line,
		}
	}

	pub fn to_console(&self) -> ConsoleLine {
		match self {
			ScriptError::TooManyCommands { .. } => ConsoleLine {
				text: self.to_string(),
				line: None,
				severity: Severity::Error,
			},
			_ => ConsoleLine {
				text: format!("Código Inválido: {} linha: {}", self, self.line()),
				line: Some(self.line()),
				severity: Severity::Error,
			},
		}
	}
}

#[derive(Debug, Error)]
pub enum RunError {
	#[error("a program is already running")]
	Busy,

	#[error(transparent)]
	Script(#[from] ScriptError),
}
