//! Closed error taxonomy (spec §7). Every variant carries enough context
//! to print `path:line:col: [phase] message` without the caller having to
//! reconstruct it.

use std::path::PathBuf;

use thiserror::Error;

use crate::span::Span;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
	Read,
	Normalize,
	Expand,
	Import,
	Lower,
	Emit,
	Bundle,
}

impl std::fmt::Display for Phase {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			Phase::Read => "read",
			Phase::Normalize => "normalize",
			Phase::Expand => "expand",
			Phase::Import => "import",
			Phase::Lower => "lower",
			Phase::Emit => "emit",
			Phase::Bundle => "bundle",
		};
		write!(f, "{name}")
	}
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadErrorKind {
	UnbalancedDelim,
	UnterminatedString,
	InvalidEscape,
	InvalidNumber,
	UnexpectedToken,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MacroErrorKind {
	Undefined,
	BadArity,
	ExpansionFailed,
	DepthExceeded,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ImportErrorKind {
	NotFound,
	ReadFailed,
	CircularAtCompile,
	UnsupportedScheme,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BundleErrorKind {
	CircularImport,
	DuplicateExport,
}

/// A single user-visible diagnostic: phase, offending excerpt, and an
/// approximate source location (spec §7).
#[derive(Clone, Debug, Error)]
pub struct Diagnostic {
	pub phase: Phase,
	pub message: String,
	pub path: Option<PathBuf>,
	pub span: Option<Span>,
}

impl Diagnostic {
	pub fn new(phase: Phase, message: impl Into<String>) -> Self {
		Self {
			phase,
			message: message.into(),
			path: None,
			span: None,
		}
	}

	pub fn at(mut self, span: Span) -> Self {
		self.span = Some(span);
		self
	}

	pub fn in_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.path = Some(path.into());
		self
	}
}

impl std::fmt::Display for Diagnostic {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let path = self
			.path
			.as_ref()
			.map(|p| p.display().to_string())
			.unwrap_or_else(|| "<input>".to_string());
		if let Some(span) = self.span {
			write!(f, "{path}:{span}: [{}] {}", self.phase, self.message)
		} else {
			write!(f, "{path}: [{}] {}", self.phase, self.message)
		}
	}
}

#[derive(Debug, Error)]
pub enum CompileError {
	#[error("{0}")]
	Read(Diagnostic),

	#[error("{0}")]
	Syntax(Diagnostic),

	#[error("{0}")]
	Macro(Diagnostic),

	#[error("{0}")]
	Import(Diagnostic),

	#[error("{0}")]
	Lowering(Diagnostic),

	#[error("{0}")]
	Emit(Diagnostic),

	#[error("{0}")]
	Bundle(Diagnostic),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl CompileError {
	pub fn read(kind: ReadErrorKind, span: Span, detail: impl Into<String>) -> Self {
		CompileError::Read(Diagnostic::new(Phase::Read, format!("{kind:?}: {}", detail.into())).at(span))
	}

	pub fn syntax(span: Span, detail: impl Into<String>) -> Self {
		CompileError::Syntax(Diagnostic::new(Phase::Normalize, detail.into()).at(span))
	}

	pub fn macro_error(kind: MacroErrorKind, name: &str, depth: usize, detail: impl Into<String>) -> Self {
		CompileError::Macro(Diagnostic::new(
			Phase::Expand,
			format!("{kind:?} expanding `{name}` at depth {depth}: {}", detail.into()),
		))
	}

	pub fn import(kind: ImportErrorKind, path: impl Into<String>, detail: impl Into<String>) -> Self {
		let path = path.into();
		CompileError::Import(
			Diagnostic::new(Phase::Import, format!("{kind:?}: {}", detail.into())).in_file(path),
		)
	}

	pub fn lowering(span: Span, detail: impl Into<String>) -> Self {
		CompileError::Lowering(Diagnostic::new(Phase::Lower, detail.into()).at(span))
	}

	pub fn emit(detail: impl Into<String>) -> Self {
		CompileError::Emit(Diagnostic::new(Phase::Emit, detail.into()))
	}

	pub fn bundle(kind: BundleErrorKind, chain: &[String]) -> Self {
		CompileError::Bundle(Diagnostic::new(
			Phase::Bundle,
			format!("{kind:?}: {}", chain.join(" -> ")),
		))
	}

	/// Attaches a source span to whichever diagnostic this error carries;
	/// a no-op for `Io`, which has none.
	pub fn with_span(self, span: Span) -> Self {
		match self {
			CompileError::Read(d) => CompileError::Read(d.at(span)),
			CompileError::Syntax(d) => CompileError::Syntax(d.at(span)),
			CompileError::Macro(d) => CompileError::Macro(d.at(span)),
			CompileError::Import(d) => CompileError::Import(d.at(span)),
			CompileError::Lowering(d) => CompileError::Lowering(d.at(span)),
			CompileError::Emit(d) => CompileError::Emit(d.at(span)),
			CompileError::Bundle(d) => CompileError::Bundle(d.at(span)),
			other => other,
		}
	}
}

pub type Result<T> = std::result::Result<T, CompileError>;

/// Non-fatal diagnostics (spec §7: unused import, shadowed macro, ...).
#[derive(Clone, Debug)]
pub struct Warning {
	pub phase: Phase,
	pub message: String,
}

impl Warning {
	pub fn new(phase: Phase, message: impl Into<String>) -> Self {
		Self {
			phase,
			message: message.into(),
		}
	}
}

impl std::fmt::Display for Warning {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "[{}] warning: {}", self.phase, self.message)
	}
}
