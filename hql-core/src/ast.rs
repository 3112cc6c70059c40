//! The reader's output: a finite tree of literals, symbols, and lists.
//!
//! See spec §3 "AST node". `Node` is cheap to clone (an `Rc` around the
//! list body) since the expander rebuilds large swaths of the tree on
//! every pass.

use std::rc::Rc;

use crate::span::Span;

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
	Null,
	Bool(bool),
	Number(f64),
	String(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
	Literal(Literal),
	Symbol(String),
	List(Rc<Vec<Node>>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
	pub kind: NodeKind,
	pub span: Span,
}

impl Node {
	pub fn new(kind: NodeKind, span: Span) -> Self {
		Self { kind, span }
	}

	pub fn literal(value: Literal, span: Span) -> Self {
		Self::new(NodeKind::Literal(value), span)
	}

	pub fn symbol(name: impl Into<String>, span: Span) -> Self {
		Self::new(NodeKind::Symbol(name.into()), span)
	}

	pub fn list(elements: Vec<Node>, span: Span) -> Self {
		Self::new(NodeKind::List(Rc::new(elements)), span)
	}

	/// Synthesizes a node with no corresponding source text (macro output).
	pub fn synthetic(kind: NodeKind) -> Self {
		Self::new(kind, Span::synthetic())
	}

	pub fn nil(span: Span) -> Self {
		Self::literal(Literal::Null, span)
	}

	pub fn as_symbol(&self) -> Option<&str> {
		match &self.kind {
			NodeKind::Symbol(name) => Some(name.as_str()),
			_ => None,
		}
	}

	pub fn as_list(&self) -> Option<&[Node]> {
		match &self.kind {
			NodeKind::List(items) => Some(items.as_slice()),
			_ => None,
		}
	}

	pub fn is_empty_list(&self) -> bool {
		matches!(&self.kind, NodeKind::List(items) if items.is_empty())
	}

	/// The head symbol of a list node, if the node is a non-empty list
	/// headed by a symbol. This is the dispatch key used throughout the
	/// normalizer, expander, and lowerer.
	pub fn head_symbol(&self) -> Option<&str> {
		self.as_list()
			.and_then(|items| items.first())
			.and_then(|first| first.as_symbol())
	}

	pub fn list_rest(&self) -> &[Node] {
		self.as_list().map(|items| &items[1..]).unwrap_or(&[])
	}
}

/// Builds a `(head arg1 arg2 ...)` list node at a synthetic span, the
/// shape the expander and interpreter produce constantly.
pub fn form(head: &str, args: Vec<Node>) -> Node {
	let mut elements = Vec::with_capacity(args.len() + 1);
	elements.push(Node::symbol(head, Span::synthetic()));
	elements.extend(args);
	Node::synthetic(NodeKind::List(Rc::new(elements)))
}
