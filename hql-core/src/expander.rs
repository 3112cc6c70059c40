//! C4: the recursive macro expander (spec §4.4).
//!
//! A macro-expansion failure doesn't abort the whole expander pass: the
//! offending subtree is replaced with a synthetic `(js-error "...")`
//! sentinel so independent errors elsewhere in the tree still get
//! reported, and the pipeline refuses to proceed past expansion while
//! any sentinel remains (spec §4.4 "Failure").

use std::rc::Rc;

use crate::ast::{form, Literal, Node, NodeKind};
use crate::env::Env;
use crate::error::{CompileError, Diagnostic, MacroErrorKind, Phase, Result, Warning};
use crate::interp;
use crate::span::Span;
use crate::value::{Macro, Value};

pub const DEFAULT_MAX_DEPTH: usize = 256;

pub struct Expansion {
	pub nodes: Vec<Node>,
	pub diagnostics: Vec<Diagnostic>,
	pub warnings: Vec<Warning>,
}

pub fn expand_all(nodes: Vec<Node>, env: &Rc<Env>) -> Expansion {
	expand_all_with_depth(nodes, env, DEFAULT_MAX_DEPTH)
}

pub fn expand_all_with_depth(nodes: Vec<Node>, env: &Rc<Env>, max_depth: usize) -> Expansion {
	let mut diagnostics = Vec::new();
	let mut warnings = Vec::new();
	let expanded = nodes
		.into_iter()
		.map(|node| expand(&node, env, 0, max_depth, &mut diagnostics, &mut warnings))
		.collect();
	Expansion {
		nodes: expanded,
		diagnostics,
		warnings,
	}
}

/// Fails if any `(js-error ...)` sentinel survives expansion (spec §8
/// "No dangling sentinels").
pub fn check_no_sentinels(nodes: &[Node]) -> Result<()> {
	for node in nodes {
		find_sentinel(node)?;
	}
	Ok(())
}

fn find_sentinel(node: &Node) -> Result<()> {
	if node.head_symbol() == Some("js-error") {
		let message = node
			.list_rest()
			.first()
			.and_then(|n| match &n.kind {
				NodeKind::Literal(Literal::String(s)) => Some(s.clone()),
				_ => None,
			})
			.unwrap_or_else(|| "macro expansion failed".to_string());
		return Err(CompileError::Macro(Diagnostic::new(Phase::Expand, message).at(node.span)));
	}
	if let Some(items) = node.as_list() {
		for item in items.iter() {
			find_sentinel(item)?;
		}
	}
	Ok(())
}

fn sentinel(err: CompileError, span: Span, diagnostics: &mut Vec<Diagnostic>) -> Node {
	let message = err.to_string();
	diagnostics.push(Diagnostic::new(Phase::Expand, message.clone()).at(span));
	form("js-error", vec![Node::literal(Literal::String(message), span)])
}

fn split_qualified(symbol: &str) -> Option<(&str, &str)> {
	symbol.split_once('.').filter(|(module, name)| !module.is_empty() && !name.is_empty())
}

fn expand(node: &Node, env: &Rc<Env>, depth: usize, max_depth: usize, diagnostics: &mut Vec<Diagnostic>, warnings: &mut Vec<Warning>) -> Node {
	let items = match &node.kind {
		NodeKind::List(items) => items.clone(),
		_ => return node.clone(), // step 1: atoms pass through
	};
	if items.is_empty() {
		return node.clone(); // step 1: empty list passes through
	}

	let head = items[0].as_symbol().map(str::to_string);

	// step 2: defmacro registers and disappears
	if head.as_deref() == Some("defmacro") {
		if let Some(name) = items.get(1).and_then(|n| n.as_symbol()) {
			if env.has_macro(name) {
				warnings.push(Warning::new(Phase::Expand, format!("macro `{name}` shadows an existing definition")));
			}
		}
		if let Err(e) = interp::eval(node, env) {
			return sentinel(e, node.span, diagnostics);
		}
		return Node::nil(node.span);
	}

	// step 3: quote is returned unexpanded
	if head.as_deref() == Some("quote") {
		return items.get(1).cloned().unwrap_or_else(|| Node::nil(node.span));
	}

	// step 4: quasiquote walks, evaluating unquote/unquote-splicing
	if head.as_deref() == Some("quasiquote") {
		let arg = items.get(1).cloned().unwrap_or_else(|| Node::nil(node.span));
		return match interp::eval_quasiquote(&arg, env) {
			Ok(result) => result,
			Err(e) => sentinel(e, node.span, diagnostics),
		};
	}

	if depth > max_depth {
		let err = CompileError::macro_error(
			MacroErrorKind::DepthExceeded,
			head.as_deref().unwrap_or("?"),
			depth,
			"maximum expansion depth exceeded",
		);
		return sentinel(err, node.span, diagnostics);
	}

	if let Some(head) = &head {
		// step 5: qualified `module.name` head
		if let Some((module, name)) = split_qualified(head) {
			let qualified = format!("{module}.{name}");
			if env.has_macro(&qualified) {
				return expand_macro_call(&qualified, &items[1..], env, depth, max_depth, diagnostics, warnings, node.span);
			}
			if env.lookup_module_member(module, name).is_some() {
				let rewritten = rewrite_to_js_call(module, name, &items[1..], node.span);
				return expand(&rewritten, env, depth, max_depth, diagnostics, warnings);
			}
		}

		// step 6: `(js-call module "name" args...)` where `module.name` is a macro
		if head == "js-call" {
			if let (Some(module), Some(name_node)) = (items.get(1).and_then(|n| n.as_symbol()), items.get(2)) {
				if let NodeKind::Literal(Literal::String(name)) = &name_node.kind {
					let qualified = format!("{module}.{name}");
					if env.has_macro(&qualified) {
						return expand_macro_call(&qualified, &items[3..], env, depth, max_depth, diagnostics, warnings, node.span);
					}
				}
			}
		}

		// step 7: unqualified macro
		if env.has_macro(head) {
			return expand_macro_call(head, &items[1..], env, depth, max_depth, diagnostics, warnings, node.span);
		}
	}

	// step 8: recurse into children left to right
	let expanded: Vec<Node> = items
		.iter()
		.map(|child| expand(child, env, depth, max_depth, diagnostics, warnings))
		.collect();
	Node::list(expanded, node.span)
}

fn rewrite_to_js_call(module: &str, name: &str, args: &[Node], span: Span) -> Node {
	let mut call_items = vec![
		Node::symbol("js-call", span),
		Node::symbol(module, span),
		Node::literal(Literal::String(name.to_string()), span),
	];
	call_items.extend(args.iter().cloned());
	Node::list(call_items, span)
}

fn expand_macro_call(
	name: &str,
	raw_args: &[Node],
	env: &Rc<Env>,
	depth: usize,
	max_depth: usize,
	diagnostics: &mut Vec<Diagnostic>,
	warnings: &mut Vec<Warning>,
	span: Span,
) -> Node {
	// Arguments are expanded before the macro function sees them (spec
	// §4.4 "Ordering").
	let args: Vec<Node> = raw_args
		.iter()
		.map(|arg| expand(arg, env, depth, max_depth, diagnostics, warnings))
		.collect();

	let macro_def = match env.get_macro(name) {
		Some(m) => m,
		None => {
			let err = CompileError::macro_error(MacroErrorKind::Undefined, name, depth, "macro vanished mid-expansion");
			return sentinel(err, span, diagnostics);
		}
	};

	match apply_macro(&macro_def, &args, env, name, depth) {
		Ok(result) => {
			let result = maybe_rewrite_dotted_head(result);
			expand(&result, env, depth + 1, max_depth, diagnostics, warnings)
		}
		Err(e) => sentinel(e, span, diagnostics),
	}
}

/// Step 7's post-expansion check: a macro that expands to `(foo.bar ...)`
/// benefits from the same qualified-call rewrite the reader/normalizer
/// would otherwise have no chance to apply.
fn maybe_rewrite_dotted_head(node: Node) -> Node {
	if let Some(head) = node.head_symbol() {
		if let Some((module, name)) = split_qualified(head) {
			let rest = node.list_rest().to_vec();
			return rewrite_to_js_call(module, name, &rest, node.span);
		}
	}
	node
}

fn apply_macro(macro_def: &Macro, args: &[Node], caller_env: &Rc<Env>, name: &str, depth: usize) -> Result<Node> {
	match macro_def {
		Macro::Native(f) => f(args, caller_env),
		Macro::User {
			params,
			rest_param,
			body,
			captured_env,
		} => {
			let too_few = args.len() < params.len();
			let too_many = rest_param.is_none() && args.len() > params.len();
			if too_few || too_many {
				return Err(CompileError::macro_error(
					MacroErrorKind::BadArity,
					name,
					depth,
					format!("expected {} argument(s), got {}", params.len(), args.len()),
				));
			}
			let scope = captured_env.child();
			for (param, arg) in params.iter().zip(args.iter()) {
				scope.define(param.clone(), Value::Node(arg.clone()));
			}
			if let Some(rest_name) = rest_param {
				let rest_args = args[params.len()..].to_vec();
				scope.define(rest_name.clone(), Value::Node(Node::synthetic(NodeKind::List(Rc::new(rest_args)))));
			}
			let result = interp::eval_sequence(body, &scope)?;
			Ok(result.into_node().unwrap_or_else(|| Node::nil(Span::synthetic())))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::primitives;
	use crate::reader::Reader;

	fn expand_src(src: &str, env: &Rc<Env>) -> Node {
		let mut nodes = Reader::read_all(src).unwrap();
		let mut diags = Vec::new();
		let mut warnings = Vec::new();
		expand(&nodes.remove(0), env, 0, DEFAULT_MAX_DEPTH, &mut diags, &mut warnings)
	}

	fn root_env() -> Rc<Env> {
		let env = Env::root();
		primitives::install(&env);
		env
	}

	#[test]
	fn defmacro_disappears_and_registers() {
		let env = root_env();
		let node = expand_src("(defmacro sq (x) `(* ,x ,x))", &env);
		assert_eq!(node.kind, NodeKind::Literal(Literal::Null));
		assert!(env.has_macro("sq"));
	}

	#[test]
	fn macro_use_expands_to_kernel_form() {
		let env = root_env();
		expand_src("(defmacro sq (x) `(* ,x ,x))", &env);
		let node = expand_src("(sq 5)", &env);
		assert_eq!(node.head_symbol(), Some("*"));
	}

	#[test]
	fn expansion_is_idempotent_at_a_fixed_point() {
		let env = root_env();
		expand_src("(defmacro sq (x) `(* ,x ,x))", &env);
		let once = expand_src("(sq 5)", &env);
		let mut diags = Vec::new();
		let mut warnings = Vec::new();
		let twice = expand(&once, &env, 0, DEFAULT_MAX_DEPTH, &mut diags, &mut warnings);
		assert_eq!(once, twice);
	}

	#[test]
	fn redefining_a_macro_emits_a_shadow_warning() {
		let env = root_env();
		expand_src("(defmacro sq (x) `(* ,x ,x))", &env);
		let mut nodes = Reader::read_all("(defmacro sq (x) `(+ ,x ,x))").unwrap();
		let mut diags = Vec::new();
		let mut warnings = Vec::new();
		expand(&nodes.remove(0), &env, 0, DEFAULT_MAX_DEPTH, &mut diags, &mut warnings);
		assert_eq!(warnings.len(), 1);
		assert!(warnings[0].message.contains("sq"));
	}

	#[test]
	fn quote_suppresses_expansion_of_macro_calls() {
		let env = root_env();
		expand_src("(defmacro sq (x) `(* ,x ,x))", &env);
		let node = expand_src("(quote (sq 5))", &env);
		assert_eq!(node.head_symbol(), Some("sq"));
	}

	#[test]
	fn bad_arity_produces_sentinel_not_a_panic() {
		let env = root_env();
		expand_src("(defmacro sq (x) `(* ,x ,x))", &env);
		let node = expand_src("(sq 1 2)", &env);
		assert_eq!(node.head_symbol(), Some("js-error"));
		assert!(check_no_sentinels(std::slice::from_ref(&node)).is_err());
	}

	#[test]
	fn rest_param_collects_extra_args() {
		let env = root_env();
		expand_src("(defmacro pass (a &rest more) `(list ,a ,@more))", &env);
		let node = expand_src("(pass 1 2 3)", &env);
		assert_eq!(node.head_symbol(), Some("list"));
		assert_eq!(node.list_rest().len(), 3);
	}
}
