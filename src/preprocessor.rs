/// One physical line of the player's program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLine<'a> {
	/// 1-based, as shown in the editor gutter.
	pub number: usize,
	/// Untouched text, echoed back in error messages.
	pub raw: &'a str,
	/// Trimmed text the validator matches against.
	pub text: &'a str,
}

impl SourceLine<'_> {
	pub fn is_blank(&self) -> bool {
		self.text.is_empty()
	}

	pub fn opens_block(&self) -> bool {
		self.text.contains('{')
	}

	pub fn closes_block(&self) -> bool {
		self.text.contains('}')
	}
}

/// Split editor text into numbered lines. Blank lines are kept so that line
/// numbers stay aligned with the editor.
pub fn preprocess(src: &str) -> Vec<SourceLine<'_>> {
	let src = src.strip_prefix('\u{feff}').unwrap_or(src);
	src.split('\n')
		.enumerate()
		.map(|(idx, line)| {
			// Editors on Windows hand us CRLF.
			let raw = line.strip_suffix('\r').unwrap_or(line);
			SourceLine {
				number: idx + 1,
				raw,
				text: raw.trim(),
			}
		})
		.collect()
}
