//! C1: turns UTF-8 source text into a sequence of [`Node`]s.
//!
//! A hand-rolled character scanner in the style of the teacher's
//! `lexer.rs` `read_token` loop: match on the next char, consume a run,
//! putback on the delimiter. No external parsing crate — the grammar is
//! small enough that a combinator library would add more ceremony than
//! it saves.

use crate::ast::{form, Literal, Node, NodeKind};
use crate::error::{CompileError, ReadErrorKind, Result};
use crate::span::{Pos, Span};

pub struct Cursor<'a> {
	chars: Vec<char>,
	pos: usize,
	line: usize,
	column: usize,
	_source: &'a str,
}

impl<'a> Cursor<'a> {
	fn new(source: &'a str) -> Self {
		Self {
			chars: source.chars().collect(),
			pos: 0,
			line: 0,
			column: 0,
			_source: source,
		}
	}

	fn peek(&self) -> Option<char> {
		self.chars.get(self.pos).copied()
	}

	fn peek_at(&self, offset: usize) -> Option<char> {
		self.chars.get(self.pos + offset).copied()
	}

	fn mark(&self) -> Pos {
		Pos {
			line: self.line,
			column: self.column,
			offset: self.pos,
		}
	}

	fn advance(&mut self) -> Option<char> {
		let next = self.peek()?;
		self.pos += 1;
		if next == '\n' {
			self.line += 1;
			self.column = 0;
		} else {
			self.column += 1;
		}
		Some(next)
	}

	fn eof(&self) -> bool {
		self.pos >= self.chars.len()
	}
}

fn is_delimiter(c: char) -> bool {
	matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';' | '\'' | '`' | ',')
		|| c.is_whitespace()
}

pub struct Reader;

impl Reader {
	/// Reads every top-level form in `source`.
	pub fn read_all(source: &str) -> Result<Vec<Node>> {
		let mut cursor = Cursor::new(source);
		let mut nodes = Vec::new();
		loop {
			skip_atmosphere(&mut cursor);
			if cursor.eof() {
				break;
			}
			nodes.push(read_form(&mut cursor)?);
		}
		Ok(nodes)
	}
}

fn skip_atmosphere(cursor: &mut Cursor) {
	loop {
		match cursor.peek() {
			Some(c) if c.is_whitespace() => {
				cursor.advance();
			}
			Some(';') => {
				while !matches!(cursor.peek(), None | Some('\n')) {
					cursor.advance();
				}
			}
			_ => break,
		}
	}
}

fn read_form(cursor: &mut Cursor) -> Result<Node> {
	skip_atmosphere(cursor);
	let sta = cursor.mark();
	let c = cursor.peek().ok_or_else(|| {
		CompileError::read(ReadErrorKind::UnexpectedToken, span_at(sta), "unexpected end of input")
	})?;

	match c {
		'(' => read_seq(cursor, '(', ')', |items, span| Node::list(items, span)),
		'[' => read_seq(cursor, '[', ']', |items, span| {
			wrap_reader_rewrite("vector", items, span)
		}),
		'{' => read_seq(cursor, '{', '}', |items, span| {
			wrap_reader_rewrite("hash-map", items, span)
		}),
		')' | ']' | '}' => Err(CompileError::read(
			ReadErrorKind::UnbalancedDelim,
			span_at(sta),
			format!("unexpected closing `{c}`"),
		)),
		'\'' => {
			cursor.advance();
			let inner = read_form(cursor)?;
			Ok(wrap_reader_rewrite("quote", vec![inner], span_from(cursor, sta)))
		}
		'`' => {
			cursor.advance();
			let inner = read_form(cursor)?;
			Ok(wrap_reader_rewrite("quasiquote", vec![inner], span_from(cursor, sta)))
		}
		',' => {
			cursor.advance();
			if cursor.peek() == Some('@') {
				cursor.advance();
				let inner = read_form(cursor)?;
				Ok(wrap_reader_rewrite(
					"unquote-splicing",
					vec![inner],
					span_from(cursor, sta),
				))
			} else {
				let inner = read_form(cursor)?;
				Ok(wrap_reader_rewrite("unquote", vec![inner], span_from(cursor, sta)))
			}
		}
		'"' => read_string(cursor, sta),
		_ => read_atom(cursor, sta),
	}
}

fn wrap_reader_rewrite(head: &str, items: Vec<Node>, span: Span) -> Node {
	let mut elements = Vec::with_capacity(items.len() + 1);
	elements.push(Node::symbol(head, span));
	elements.extend(items);
	Node::list(elements, span)
}

fn read_seq(
	cursor: &mut Cursor,
	open: char,
	close: char,
	build: impl FnOnce(Vec<Node>, Span) -> Node,
) -> Result<Node> {
	let sta = cursor.mark();
	cursor.advance(); // consume `open`
	let mut items = Vec::new();
	loop {
		skip_atmosphere(cursor);
		match cursor.peek() {
			None => {
				return Err(CompileError::read(
					ReadErrorKind::UnbalancedDelim,
					span_at(sta),
					format!("unterminated `{open}`"),
				))
			}
			Some(c) if c == close => {
				cursor.advance();
				break;
			}
			_ => items.push(read_form(cursor)?),
		}
	}
	Ok(build(items, span_from(cursor, sta)))
}

fn read_string(cursor: &mut Cursor, sta: Pos) -> Result<Node> {
	cursor.advance(); // opening quote
	let mut parts: Vec<StringPart> = Vec::new();
	let mut current = String::new();
	loop {
		match cursor.advance() {
			None => {
				return Err(CompileError::read(
					ReadErrorKind::UnterminatedString,
					span_at(sta),
					"unterminated string literal",
				))
			}
			Some('"') => break,
			Some('\\') => match cursor.advance() {
				Some('n') => current.push('\n'),
				Some('t') => current.push('\t'),
				Some('"') => current.push('"'),
				Some('\\') => current.push('\\'),
				Some('(') => {
					// Interpolation: \(expr) — collect balanced parens as raw text,
					// then recursively read it as a single form (spec §4.1).
					if !current.is_empty() {
						parts.push(StringPart::Text(std::mem::take(&mut current)));
					}
					let expr_src = read_balanced_parens(cursor, sta)?;
					let expr_nodes = Reader::read_all(&expr_src)?;
					let expr = expr_nodes.into_iter().next().ok_or_else(|| {
						CompileError::read(ReadErrorKind::InvalidEscape, span_at(sta), "empty interpolation")
					})?;
					parts.push(StringPart::Expr(expr));
				}
				Some('u') => {
					let code = read_unicode_escape(cursor, sta)?;
					current.push(code);
				}
				Some(other) => {
					return Err(CompileError::read(
						ReadErrorKind::InvalidEscape,
						span_at(sta),
						format!("invalid escape `\\{other}`"),
					))
				}
				None => {
					return Err(CompileError::read(
						ReadErrorKind::InvalidEscape,
						span_at(sta),
						"dangling escape at end of input",
					))
				}
			},
			Some(c) => current.push(c),
		}
	}
	if !current.is_empty() || parts.is_empty() {
		parts.push(StringPart::Text(current));
	}

	let span = span_from(cursor, sta);
	if parts.len() == 1 {
		if let StringPart::Text(text) = parts.into_iter().next().unwrap() {
			return Ok(Node::literal(Literal::String(text), span));
		}
		unreachable!()
	}

	// More than one part: desugar to `(str part1 part2 ...)`.
	let args = parts
		.into_iter()
		.map(|part| match part {
			StringPart::Text(text) => Node::literal(Literal::String(text), span),
			StringPart::Expr(node) => node,
		})
		.collect();
	Ok(form("str", args))
}

enum StringPart {
	Text(String),
	Expr(Node),
}

fn read_balanced_parens(cursor: &mut Cursor, sta: Pos) -> Result<String> {
	let mut depth = 1usize;
	let mut text = String::new();
	loop {
		match cursor.advance() {
			None => {
				return Err(CompileError::read(
					ReadErrorKind::UnterminatedString,
					span_at(sta),
					"unterminated interpolation",
				))
			}
			Some('(') => {
				depth += 1;
				text.push('(');
			}
			Some(')') => {
				depth -= 1;
				if depth == 0 {
					break;
				}
				text.push(')');
			}
			Some(c) => text.push(c),
		}
	}
	Ok(text)
}

fn read_unicode_escape(cursor: &mut Cursor, sta: Pos) -> Result<char> {
	let mut hex = String::new();
	if cursor.peek() == Some('{') {
		cursor.advance();
		while cursor.peek() != Some('}') {
			match cursor.advance() {
				Some(c) => hex.push(c),
				None => {
					return Err(CompileError::read(
						ReadErrorKind::InvalidEscape,
						span_at(sta),
						"unterminated unicode escape",
					))
				}
			}
		}
		cursor.advance();
	} else {
		for _ in 0..4 {
			match cursor.advance() {
				Some(c) => hex.push(c),
				None => {
					return Err(CompileError::read(
						ReadErrorKind::InvalidEscape,
						span_at(sta),
						"unterminated unicode escape",
					))
				}
			}
		}
	}
	let code = u32::from_str_radix(&hex, 16)
		.ok()
		.and_then(char::from_u32)
		.ok_or_else(|| {
			CompileError::read(ReadErrorKind::InvalidEscape, span_at(sta), format!("invalid unicode escape \\u{hex}"))
		})?;
	Ok(code)
}

fn read_atom(cursor: &mut Cursor, sta: Pos) -> Result<Node> {
	let mut text = String::new();
	while let Some(c) = cursor.peek() {
		if is_delimiter(c) {
			break;
		}
		text.push(c);
		cursor.advance();
	}
	if text.is_empty() {
		let c = cursor.advance().unwrap();
		return Err(CompileError::read(
			ReadErrorKind::UnexpectedToken,
			span_at(sta),
			format!("unexpected character `{c}`"),
		));
	}

	let span = span_from(cursor, sta);
	match text.as_str() {
		"true" => return Ok(Node::literal(Literal::Bool(true), span)),
		"false" => return Ok(Node::literal(Literal::Bool(false), span)),
		"nil" => return Ok(Node::literal(Literal::Null, span)),
		_ => {}
	}

	if looks_numeric(&text) {
		match text.parse::<f64>() {
			Ok(value) => return Ok(Node::literal(Literal::Number(value), span)),
			Err(_) => {
				return Err(CompileError::read(
					ReadErrorKind::InvalidNumber,
					span,
					format!("invalid number literal `{text}`"),
				))
			}
		}
	}

	Ok(Node::symbol(text, span))
}

fn looks_numeric(text: &str) -> bool {
	let mut chars = text.chars().peekable();
	if matches!(chars.peek(), Some('+') | Some('-')) {
		chars.next();
	}
	matches!(chars.peek(), Some(c) if c.is_ascii_digit())
}

fn span_at(pos: Pos) -> Span {
	Span::new(pos, pos)
}

fn span_from(cursor: &Cursor, sta: Pos) -> Span {
	Span::new(sta, cursor.mark())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::NodeKind;

	fn read_one(src: &str) -> Node {
		let mut nodes = Reader::read_all(src).expect("should parse");
		assert_eq!(nodes.len(), 1);
		nodes.remove(0)
	}

	#[test]
	fn reads_atoms() {
		assert_eq!(read_one("42").kind, NodeKind::Literal(Literal::Number(42.0)));
		assert_eq!(read_one("true").kind, NodeKind::Literal(Literal::Bool(true)));
		assert_eq!(read_one("nil").kind, NodeKind::Literal(Literal::Null));
		assert_eq!(read_one("foo-bar").kind, NodeKind::Symbol("foo-bar".into()));
	}

	#[test]
	fn reads_list() {
		let node = read_one("(+ 1 2)");
		let items = node.as_list().unwrap();
		assert_eq!(items.len(), 3);
		assert_eq!(items[0].as_symbol(), Some("+"));
	}

	#[test]
	fn brackets_rewrite_to_vector() {
		let node = read_one("[1 2 3]");
		assert_eq!(node.head_symbol(), Some("vector"));
		assert_eq!(node.list_rest().len(), 3);
	}

	#[test]
	fn braces_rewrite_to_hash_map() {
		let node = read_one("{a 1}");
		assert_eq!(node.head_symbol(), Some("hash-map"));
	}

	#[test]
	fn quote_shorthand() {
		let node = read_one("'x");
		assert_eq!(node.head_symbol(), Some("quote"));
	}

	#[test]
	fn quasiquote_unquote_splicing() {
		let node = read_one("`(a ,b ,@c)");
		assert_eq!(node.head_symbol(), Some("quasiquote"));
		let inner = &node.list_rest()[0];
		let items = inner.as_list().unwrap();
		assert_eq!(items[1].head_symbol(), Some("unquote"));
		assert_eq!(items[2].head_symbol(), Some("unquote-splicing"));
	}

	#[test]
	fn string_escapes() {
		let node = read_one(r#""hello\nworld""#);
		assert_eq!(node.kind, NodeKind::Literal(Literal::String("hello\nworld".into())));
	}

	#[test]
	fn string_interpolation_desugars_to_str() {
		let node = read_one(r#""hello \(name)""#);
		assert_eq!(node.head_symbol(), Some("str"));
		assert_eq!(node.list_rest().len(), 2);
	}

	#[test]
	fn unterminated_list_is_an_error() {
		assert!(Reader::read_all("(+ 1 2").is_err());
	}

	#[test]
	fn unbalanced_closing_is_an_error() {
		assert!(Reader::read_all(")").is_err());
	}

	#[test]
	fn comments_are_skipped() {
		let nodes = Reader::read_all("; comment\n42 ; trailing\n").unwrap();
		assert_eq!(nodes.len(), 1);
	}
}
