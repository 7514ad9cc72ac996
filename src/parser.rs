use std::iter::Peekable;

use log::debug;
use pest::Parser;
use pest::iterators::Pair;

use crate::ast::{Block, Command, Condition, IfStatement, Program, Sensor, Statement};
use crate::error::ScriptError;
use crate::preprocessor::{SourceLine, preprocess};

#[derive(pest_derive::Parser)]
#[grammar = "grammar.pest"]
struct LineParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
	Movement,
	Action,
	Guarded,
	Conditional,
	ConditionalBlock,
	CloseBlock,
	OpenBlock,
}

/// Tried in order; the first rule matching the whole line wins.
const LINE_RULES: &[(Rule, LineKind)] = &[
	(Rule::move_line, LineKind::Movement),
	(Rule::turn_line, LineKind::Action),
	(Rule::collect_line, LineKind::Action),
	(Rule::guarded_line, LineKind::Guarded),
	(Rule::bare_if_line, LineKind::Conditional),
	(Rule::block_if_line, LineKind::ConditionalBlock),
	(Rule::close_line, LineKind::CloseBlock),
	(Rule::open_line, LineKind::OpenBlock),
];

fn classify(text: &str) -> Option<(LineKind, Pair<'_, Rule>)> {
	LINE_RULES.iter().find_map(|&(rule, kind)| {
		let mut pairs = LineParser::parse(rule, text).ok()?;
		pairs.next().map(|pair| (kind, pair))
	})
}

fn kind_of(line: &SourceLine) -> Option<LineKind> {
	classify(line.text).map(|(kind, _)| kind)
}

/// First inner pair produced by `rule`, at any depth.
fn find_rule<'i>(pair: &Pair<'i, Rule>, rule: Rule) -> Option<Pair<'i, Rule>> {
	pair.clone().into_inner().flatten().find(|p| p.as_rule() == rule)
}

// ---------------------------------------------------------------------------
// Tokens: one per non-blank line
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
	Command(Command),
	/// `se(...)` governing the next statement.
	If(Condition, String),
	/// `se(...) {`, governing the block it opens.
	BlockIf(Condition, String),
	Open,
	Close,
}

#[derive(Debug, Clone)]
struct Token {
	line: usize,
	text: String,
	kind: TokenKind,
}

fn command_from(kind: LineKind, pair: &Pair<Rule>, line: &SourceLine) -> Result<Command, ScriptError> {
	let unknown = || ScriptError::UnknownCommand {
		line: line.number,
		text: line.raw.to_string(),
	};
	let name_rule = match kind {
		LineKind::Movement => Rule::move_name,
		LineKind::Guarded => Rule::guarded_name,
		_ => match pair.as_rule() {
			Rule::collect_line => Rule::collect_name,
			_ => Rule::turn_name,
		},
	};
	let name = find_rule(pair, name_rule).ok_or_else(unknown)?;

	let cmd = match name.as_str() {
		"andarFrente" | "andarTras" => {
			let count = find_rule(pair, Rule::count).ok_or_else(unknown)?;
			// Too many digits for a u32 is not a number the robot knows.
			let n: u32 = count.as_str().parse().map_err(|_| unknown())?;
			if name.as_str() == "andarFrente" { Command::MoveForward(n) } else { Command::MoveBackward(n) }
		},
		"girarEsquerda" => Command::TurnLeft,
		"girarDireita" => Command::TurnRight,
		"darMeiaVolta" => Command::UTurn,
		"coletarCristal" => Command::CollectCrystal,
		"apagarFogoECobrirBuraco" => Command::PutOutFire,
		"cobrirBuraco" => Command::CoverHole,
		_ => return Err(unknown()),
	};
	Ok(cmd)
}

fn sensor_from(pair: &Pair<Rule>) -> Option<Sensor> {
	let name = find_rule(pair, Rule::sensor_name)?;
	match name.as_str() {
		"pegandoFogo" => Some(Sensor::FireAhead),
		"buracoAFrente" => Some(Sensor::HoleAhead),
		_ => None,
	}
}

/// Parse the text between the parentheses of a `se`. Only literal booleans
/// and sensor calls are accepted, and they must make up the whole text.
fn parse_condition(text: &str) -> Option<Condition> {
	let pair = LineParser::parse(Rule::condition, text).ok()?.next()?;
	if let Some(truth) = find_rule(&pair, Rule::truth) {
		return Some(Condition::Literal(truth.as_str() == "true"));
	}
	let call = find_rule(&pair, Rule::sensor_call)?;
	sensor_from(&call).map(Condition::Sensor)
}

fn conditional_token(pair: &Pair<Rule>, capture: Rule, line: &SourceLine, block: bool) -> Result<TokenKind, ScriptError> {
	let invalid = || ScriptError::InvalidCondition {
		line: line.number,
		text: line.raw.to_string(),
	};
	let text = find_rule(pair, capture).ok_or_else(invalid)?.as_str();
	let condition = parse_condition(text).ok_or_else(invalid)?;
	let source = text.trim().to_string();
	Ok(if block { TokenKind::BlockIf(condition, source) } else { TokenKind::If(condition, source) })
}

// ---------------------------------------------------------------------------
// Block matching
// ---------------------------------------------------------------------------

/// Is there a closer for the opener on `lines[idx]`?
fn has_closer(lines: &[SourceLine], idx: usize) -> bool {
	let mut depth = 0usize;
	for line in &lines[idx + 1..] {
		if line.closes_block() {
			if depth == 0 {
				return true;
			}
			depth -= 1;
		}
		if line.opens_block() {
			depth += 1;
		}
	}
	false
}

/// Is there a still-unmatched opener above the closer on `lines[idx]`?
fn has_opener(lines: &[SourceLine], idx: usize) -> bool {
	let mut depth = 0usize;
	for line in lines[..idx].iter().rev() {
		if line.opens_block() {
			if depth == 0 {
				return true;
			}
			depth -= 1;
		}
		if line.closes_block() {
			depth += 1;
		}
	}
	false
}

fn previous_nonblank(lines: &[SourceLine], idx: usize) -> Option<usize> {
	(0..idx).rev().find(|&j| !lines[j].is_blank())
}

/// Line of the `se` whose body holds `lines[idx]`: either a bare `se(...)`
/// right above it, or the header of an enclosing block.
fn enclosing_conditional(lines: &[SourceLine], idx: usize) -> Option<usize> {
	let prev = previous_nonblank(lines, idx)?;
	if kind_of(&lines[prev]) == Some(LineKind::Conditional) {
		return Some(prev);
	}

	let mut depth = 0usize;
	for j in (0..idx).rev() {
		let line = &lines[j];
		if line.closes_block() {
			depth += 1;
			continue;
		}
		if !line.opens_block() {
			continue;
		}
		if depth > 0 {
			depth -= 1;
			continue;
		}
		match kind_of(line) {
			Some(LineKind::ConditionalBlock) => return Some(j),
			Some(LineKind::OpenBlock) => {
				// `se(...)` on its own line, brace on the next one.
				if let Some(p) = previous_nonblank(lines, j) {
					if kind_of(&lines[p]) == Some(LineKind::Conditional) {
						return Some(p);
					}
				}
			},
			_ => {},
		}
	}
	None
}

/// A guarded command must sit under a `se` testing its own sensor.
fn check_guard(lines: &[SourceLine], idx: usize, cmd: Command) -> Result<(), ScriptError> {
	let line = &lines[idx];
	let missing = || ScriptError::MissingSensorCheck {
		line: line.number,
		text: line.raw.to_string(),
	};
	let Some(required) = cmd.required_sensor() else { return Ok(()) };
	let header = enclosing_conditional(lines, idx).ok_or_else(missing)?;

	let joined: String = lines[header..idx].iter().map(|l| l.text).collect();
	let pair = LineParser::parse(Rule::guard_header, &joined).ok().and_then(|mut p| p.next()).ok_or_else(missing)?;
	let sensor = find_rule(&pair, Rule::sensor_call).and_then(|call| sensor_from(&call));
	if sensor == Some(required) { Ok(()) } else { Err(missing()) }
}

fn validate_line(lines: &[SourceLine], idx: usize) -> Result<Token, ScriptError> {
	let line = &lines[idx];
	let Some((kind, pair)) = classify(line.text) else {
		return Err(ScriptError::UnknownCommand {
			line: line.number,
			text: line.raw.to_string(),
		});
	};

	let kind = match kind {
		LineKind::Movement | LineKind::Action => TokenKind::Command(command_from(kind, &pair, line)?),
		LineKind::Guarded => {
			let cmd = command_from(kind, &pair, line)?;
			check_guard(lines, idx, cmd)?;
			TokenKind::Command(cmd)
		},
		LineKind::Conditional => conditional_token(&pair, Rule::bare_condition, line, false)?,
		LineKind::ConditionalBlock => {
			if !has_closer(lines, idx) {
				return Err(ScriptError::UnclosedBlock {
					line: line.number,
					text: line.raw.to_string(),
				});
			}
			conditional_token(&pair, Rule::block_condition, line, true)?
		},
		LineKind::OpenBlock => {
			if !has_closer(lines, idx) {
				return Err(ScriptError::UnclosedBlock {
					line: line.number,
					text: line.raw.to_string(),
				});
			}
			TokenKind::Open
		},
		LineKind::CloseBlock => {
			if !has_opener(lines, idx) {
				return Err(ScriptError::UnopenedBlock {
					line: line.number,
					text: line.raw.to_string(),
				});
			}
			TokenKind::Close
		},
	};

	Ok(Token {
		line: line.number,
		text: line.raw.to_string(),
		kind,
	})
}

// ---------------------------------------------------------------------------
// Assembly into a statement tree
// ---------------------------------------------------------------------------

fn parse_block<I: Iterator<Item = Token>>(tokens: &mut Peekable<I>, opener: Option<&Token>) -> Result<Block, ScriptError> {
	let mut statements = Vec::new();
	loop {
		match tokens.peek() {
			None => {
				return match opener {
					Some(open) => Err(ScriptError::UnclosedBlock {
						line: open.line,
						text: open.text.clone(),
					}),
					None => Ok(Block { statements }),
				};
			},
			Some(Token {
				kind: TokenKind::Close,
				line,
				text,
			}) => {
				if opener.is_none() {
					return Err(ScriptError::UnopenedBlock {
						line: *line,
						text: text.clone(),
					});
				}
				tokens.next();
				return Ok(Block { statements });
			},
			Some(_) => {
				if let Some(stmt) = parse_statement(tokens)? {
					statements.push(stmt);
				}
			},
		}
	}
}

fn parse_statement<I: Iterator<Item = Token>>(tokens: &mut Peekable<I>) -> Result<Option<Statement>, ScriptError> {
	let Some(token) = tokens.next() else { return Ok(None) };
	let stmt = match &token.kind {
		TokenKind::Command(cmd) => Statement::Command(*cmd),
		TokenKind::Open => Statement::Block(parse_block(tokens, Some(&token))?),
		TokenKind::BlockIf(condition, source) => Statement::If(IfStatement {
			condition: *condition,
			source: source.clone(),
			body: Box::new(Statement::Block(parse_block(tokens, Some(&token))?)),
		}),
		TokenKind::If(condition, source) => {
			let empty = || ScriptError::EmptyConditional {
				line: token.line,
				text: token.text.clone(),
			};
			if matches!(tokens.peek(), None | Some(Token { kind: TokenKind::Close, .. })) {
				return Err(empty());
			}
			let body = parse_statement(tokens)?.ok_or_else(empty)?;
			Statement::If(IfStatement {
				condition: *condition,
				source: source.clone(),
				body: Box::new(body),
			})
		},
		TokenKind::Close => {
			return Err(ScriptError::UnopenedBlock {
				line: token.line,
				text: token.text.clone(),
			});
		},
	};
	Ok(Some(stmt))
}

/// Validate every line of `source` and translate it into a [`Program`].
/// Nothing is returned unless the whole text is valid.
pub fn parse_program(source: &str, limit: Option<usize>) -> Result<Program, ScriptError> {
	let lines = preprocess(source);
	let mut tokens = Vec::new();

	for (idx, line) in lines.iter().enumerate() {
		if line.is_blank() {
			continue;
		}
		let token = validate_line(&lines, idx)?;
		tokens.push(token);
		if let Some(limit) = limit {
			if tokens.len() > limit {
				return Err(ScriptError::TooManyCommands { line: line.number, limit });
			}
		}
	}

	let mut stream = tokens.into_iter().peekable();
	let body = parse_block(&mut stream, None)?;
	let program = Program { body };
	debug!("translated program ({} commands):\n{}", program.command_count(), program);
	Ok(program)
}
