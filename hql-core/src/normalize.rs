//! C2: desugars surface sugar into canonical kernel-adjacent forms before
//! macro expansion ever sees the tree (spec §4.2).
//!
//! Three transforms, applied bottom-up so nested forms are normalized
//! before the enclosing one is inspected:
//!   - dot-chain method calls
//!   - `fn` naming sugar
//!   - `fx` typed-function sugar

use crate::ast::{form, Literal, Node, NodeKind};
use crate::error::{CompileError, Result};
use crate::span::Span;

pub fn normalize_all(nodes: Vec<Node>) -> Result<Vec<Node>> {
	nodes.into_iter().map(normalize).collect()
}

pub fn normalize(node: Node) -> Result<Node> {
	let items = match &node.kind {
		NodeKind::List(items) => items.clone(),
		_ => return Ok(node),
	};
	if items.is_empty() {
		return Ok(node);
	}

	// Normalize children first so nested dot-chains/fn/fx are already
	// canonical by the time we inspect this node's own shape.
	let normalized_children: Vec<Node> = items.iter().cloned().map(normalize).collect::<Result<_>>()?;

	let head = normalized_children[0].as_symbol();
	match head {
		Some("fn") if is_named_fn(&normalized_children) => normalize_fn_sugar(normalized_children, node.span),
		Some("fx") => normalize_fx_sugar(normalized_children, node.span),
		_ => {
			if let Some(chain) = desugar_dot_chain(&normalized_children, node.span) {
				Ok(chain)
			} else {
				Ok(Node::list(normalized_children, node.span))
			}
		}
	}
}

fn is_named_fn(items: &[Node]) -> bool {
	// `(fn name (params…) body…)` — second element is a symbol, not a list.
	items.len() >= 2 && items[1].as_symbol().is_some()
}

/// `(fn name (params…) body…)` → `(def name (fn (params…) body…))`.
fn normalize_fn_sugar(items: Vec<Node>, span: Span) -> Result<Node> {
	if items.len() < 3 {
		return Err(CompileError::syntax(span, "`fn` sugar requires a name and parameter list"));
	}
	let name = items[1].clone();
	let mut lambda = Vec::with_capacity(items.len() - 1);
	lambda.push(Node::symbol("fn", span));
	lambda.extend(items[2..].iter().cloned());
	let lambda = Node::list(lambda, span);
	Ok(form("def", vec![name, lambda]))
}

/// `(fx name ((p: T) (p: T = default) …) (-> R) body…)` erases the type
/// annotations and lowers default values into an `if (= p js/undefined)`
/// prologue (spec §4.2). The `(-> R)` return-type list is required and
/// otherwise dropped entirely; its absence is a normalizer-level error
/// (spec §7 `SyntaxError`, example: "`fx` without return-type list").
fn normalize_fx_sugar(items: Vec<Node>, span: Span) -> Result<Node> {
	if items.len() < 4 {
		return Err(CompileError::syntax(span, "`fx` requires name, params, return type, and a body"));
	}
	let name = items[1].clone();
	let params_form = items[2]
		.as_list()
		.ok_or_else(|| CompileError::syntax(span, "`fx` parameter list must be a list"))?;

	let return_form = items[3]
		.as_list()
		.filter(|elems| elems.first().and_then(|n| n.as_symbol()) == Some("->"))
		.ok_or_else(|| CompileError::syntax(span, "`fx` without return-type list"))?;
	let _ = return_form; // type is informational only (spec §1 non-goals)

	let mut param_names = Vec::new();
	let mut prologue = Vec::new();
	for param in params_form {
		let (pname, default) = parse_fx_param(param, span)?;
		param_names.push(Node::symbol(pname.clone(), span));
		if let Some(default) = default {
			let undefined = Node::symbol("js/undefined", span);
			let check = form("=", vec![Node::symbol(pname.clone(), span), undefined]);
			let assign = form("js-assign", vec![Node::symbol(pname, span), default]);
			prologue.push(form("if", vec![check, assign]));
		}
	}

	let mut lambda = Vec::with_capacity(items.len());
	lambda.push(Node::symbol("fn", span));
	lambda.push(Node::list(param_names, span));
	lambda.extend(prologue);
	lambda.extend(items[4..].iter().cloned());
	let lambda = Node::list(lambda, span);
	Ok(form("def", vec![name, lambda]))
}

/// A single `fx` parameter spec: `(name: Type)` or `(name: Type = default)`.
///
/// The reader doesn't treat `:` or `=` as delimiters, so `name:` arrives as
/// one symbol token and `=` arrives as its own bare symbol rather than any
/// kind of bracket: `(p: T = 0)` reads as the flat four-element list
/// `[Symbol("p:"), Symbol("T"), Symbol("="), Literal(0)]`.
fn parse_fx_param(param: &Node, span: Span) -> Result<(String, Option<Node>)> {
	let elems = param
		.as_list()
		.ok_or_else(|| CompileError::syntax(span, "`fx` parameter must be a list `(name: Type [= default])`"))?;
	let raw_name = elems
		.first()
		.and_then(|n| n.as_symbol())
		.ok_or_else(|| CompileError::syntax(span, "`fx` parameter is missing a name"))?;
	let name = raw_name.strip_suffix(':').unwrap_or(raw_name).to_string();
	// elems[1] is the (discarded) type annotation; elems[2] is the literal
	// `=` separator token, with the default value one position past it.
	let default = match elems.get(2).and_then(|n| n.as_symbol()) {
		Some("=") => elems.get(3).cloned(),
		_ => None,
	};
	Ok((name, default))
}

/// Reorganizes `(target .method1 arg… .method2 arg…)` into left-associative
/// `(method-call (method-call target "method1" arg…) "method2" arg…)`.
/// Returns `None` when `items` isn't shaped like a dot-chain.
fn desugar_dot_chain(items: &[Node], span: Span) -> Option<Node> {
	if items.is_empty() {
		return None;
	}
	if is_method_symbol(&items[0]) {
		return None;
	}
	let first_dot = items[1..].iter().position(is_method_symbol)?;
	let first_dot = first_dot + 1;

	let mut target = items[0].clone();
	// Any elements between the head and the first `.method` are folded
	// into the head as a plain call: `(target x y .method …)` calls
	// `target` with `x y`, matching ordinary list application.
	if first_dot > 1 {
		let mut call = Vec::with_capacity(first_dot);
		call.push(target);
		call.extend(items[1..first_dot].iter().cloned());
		target = Node::list(call, span);
	}

	let mut cursor = first_dot;
	while cursor < items.len() {
		debug_assert!(is_method_symbol(&items[cursor]));
		let method = items[cursor].as_symbol().unwrap().trim_start_matches('.').to_string();
		let next_dot = items[cursor + 1..]
			.iter()
			.position(is_method_symbol)
			.map(|p| p + cursor + 1)
			.unwrap_or(items.len());
		let args = &items[cursor + 1..next_dot];

		let mut call_args = Vec::with_capacity(args.len() + 2);
		call_args.push(target);
		call_args.push(Node::literal(Literal::String(method), span));
		call_args.extend(args.iter().cloned());
		target = form("method-call", call_args);

		cursor = next_dot;
	}

	Some(target)
}

fn is_method_symbol(node: &Node) -> bool {
	matches!(node.as_symbol(), Some(name) if name.starts_with('.') && name != ".")
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::reader::Reader;

	fn normalize_src(src: &str) -> Node {
		let mut nodes = Reader::read_all(src).unwrap();
		assert_eq!(nodes.len(), 1);
		normalize(nodes.remove(0)).unwrap()
	}

	#[test]
	fn dot_chain_desugars_left_associative() {
		let node = normalize_src("(arr .filter f .length)");
		assert_eq!(node.head_symbol(), Some("method-call"));
		assert_eq!(node.list_rest()[1], Node::literal(Literal::String("length".into()), node.span));
		let inner = &node.list_rest()[0];
		assert_eq!(inner.head_symbol(), Some("method-call"));
	}

	#[test]
	fn non_dot_list_is_untouched() {
		let node = normalize_src("(+ 1 2)");
		assert_eq!(node.head_symbol(), Some("+"));
	}

	#[test]
	fn fn_sugar_names_a_function() {
		let node = normalize_src("(fn add (x y) (+ x y))");
		assert_eq!(node.head_symbol(), Some("def"));
		assert_eq!(node.list_rest()[0].as_symbol(), Some("add"));
		assert_eq!(node.list_rest()[1].head_symbol(), Some("fn"));
	}

	#[test]
	fn fx_sugar_erases_types_and_synthesizes_default_prologue() {
		let node = normalize_src("(fx add ((x: Int) (y: Int = 0)) (-> Int) (+ x y))");
		assert_eq!(node.head_symbol(), Some("def"));
		let lambda = &node.list_rest()[1];
		assert_eq!(lambda.head_symbol(), Some("fn"));
		let body = lambda.list_rest();
		// params, then a default-prologue `if`, then the real body.
		assert_eq!(body[0].list_rest().len(), 2);
		assert_eq!(body[0].list_rest()[1].as_symbol(), Some("y"));
		assert_eq!(body[1].head_symbol(), Some("if"));
	}

	#[test]
	fn fx_without_return_type_is_a_syntax_error() {
		let mut nodes = Reader::read_all("(fx add ((x: Int)) (+ x 1))").unwrap();
		assert!(normalize(nodes.remove(0)).is_err());
	}
}
