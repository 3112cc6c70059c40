//! The minimal AST interpreter used both to evaluate `core.hql` at
//! startup and to run macro bodies during expansion (spec §4.4
//! "Evaluation inside macro bodies"). Supports exactly: `quote`,
//! `quasiquote`/`unquote`/`unquote-splicing`, `if`, `def`, `defmacro`,
//! `js-import`, and function application.

use std::rc::Rc;

use crate::ast::{Literal, Node, NodeKind};
use crate::env::Env;
use crate::error::{CompileError, MacroErrorKind, Result};
use crate::span::Span;
use crate::value::{Macro, Value};

pub fn eval(node: &Node, env: &Rc<Env>) -> Result<Value> {
	match &node.kind {
		NodeKind::Literal(_) => Ok(Value::Node(node.clone())),
		NodeKind::Symbol(name) => env
			.lookup(name)
			.ok_or_else(|| CompileError::macro_error(MacroErrorKind::Undefined, name, 0, "unbound symbol")),
		NodeKind::List(items) => {
			if items.is_empty() {
				return Ok(Value::Node(node.clone()));
			}
			let head = items[0].as_symbol();
			match head {
				Some("quote") => Ok(Value::Node(items.get(1).cloned().unwrap_or_else(|| Node::nil(node.span)))),
				Some("quasiquote") => {
					let arg = items.get(1).cloned().unwrap_or_else(|| Node::nil(node.span));
					Ok(Value::Node(eval_quasiquote(&arg, env)?))
				}
				Some("if") => eval_if(items, env),
				Some("def") => eval_def(items, env, node.span),
				Some("defmacro") => eval_defmacro(items, env, node.span),
				Some("js-import") => eval_js_import(items, env, node.span),
				_ => eval_application(items, env, node.span),
			}
		}
	}
}

pub fn eval_sequence(forms: &[Node], env: &Rc<Env>) -> Result<Value> {
	let mut last = Value::Node(Node::nil(Span::synthetic()));
	for form in forms {
		last = eval(form, env)?;
	}
	Ok(last)
}

fn is_truthy(node: &Node) -> bool {
	!matches!(&node.kind, NodeKind::Literal(Literal::Bool(false)) | NodeKind::Literal(Literal::Null))
}

fn eval_if(items: &[Node], env: &Rc<Env>) -> Result<Value> {
	let test = items.get(1).ok_or_else(|| {
		CompileError::macro_error(MacroErrorKind::BadArity, "if", 0, "missing test expression")
	})?;
	let test = eval(test, env)?.into_node().unwrap_or_else(|| Node::nil(Span::synthetic()));
	if is_truthy(&test) {
		let cons = items.get(2).ok_or_else(|| {
			CompileError::macro_error(MacroErrorKind::BadArity, "if", 0, "missing consequent")
		})?;
		eval(cons, env)
	} else if let Some(alt) = items.get(3) {
		eval(alt, env)
	} else {
		Ok(Value::Node(Node::nil(Span::synthetic())))
	}
}

fn eval_def(items: &[Node], env: &Rc<Env>, span: Span) -> Result<Value> {
	let name = items
		.get(1)
		.and_then(|n| n.as_symbol())
		.ok_or_else(|| CompileError::macro_error(MacroErrorKind::ExpansionFailed, "def", 0, "expected a name"))?;
	let value_expr = items.get(2).cloned().unwrap_or_else(|| Node::nil(span));
	let value = eval(&value_expr, env)?;
	env.define(name, value.clone());
	Ok(value)
}

/// Splits a macro/fn parameter list on the `&rest` marker.
pub fn split_rest_marker(params: &[Node]) -> (Vec<String>, Option<String>) {
	let marker = params.iter().position(|p| p.as_symbol() == Some("&rest"));
	match marker {
		Some(index) => {
			let fixed = params[..index].iter().filter_map(|p| p.as_symbol().map(str::to_string)).collect();
			let rest = params.get(index + 1).and_then(|p| p.as_symbol()).map(str::to_string);
			(fixed, rest)
		}
		None => (params.iter().filter_map(|p| p.as_symbol().map(str::to_string)).collect(), None),
	}
}

fn eval_defmacro(items: &[Node], env: &Rc<Env>, span: Span) -> Result<Value> {
	let name = items
		.get(1)
		.and_then(|n| n.as_symbol())
		.ok_or_else(|| CompileError::macro_error(MacroErrorKind::ExpansionFailed, "defmacro", 0, "expected a name"))?
		.to_string();
	let params = items
		.get(2)
		.and_then(|n| n.as_list())
		.ok_or_else(|| CompileError::macro_error(MacroErrorKind::ExpansionFailed, &name, 0, "expected a parameter list"))?;
	let (params, rest_param) = split_rest_marker(params);
	let body = items.get(3..).unwrap_or(&[]).to_vec();
	env.define_macro(
		name,
		Macro::User {
			params,
			rest_param,
			body,
			captured_env: env.clone(),
		},
	);
	Ok(Value::Node(Node::nil(span)))
}

/// `js-import` evaluated from within macro/interpreter code (as opposed
/// to the dedicated pre-pass in the resolver, spec §4.5) registers an
/// empty module placeholder so later qualified lookups don't fail; the
/// resolver is the authority on actually reading and lowering imports.
fn eval_js_import(items: &[Node], env: &Rc<Env>, span: Span) -> Result<Value> {
	let name = items
		.get(1)
		.and_then(|n| n.as_symbol())
		.ok_or_else(|| CompileError::macro_error(MacroErrorKind::ExpansionFailed, "js-import", 0, "expected a binding name"))?;
	let module = Value::module();
	env.define(name, module.clone());
	let _ = span;
	Ok(module)
}

fn eval_application(items: &[Node], env: &Rc<Env>, span: Span) -> Result<Value> {
	let head = &items[0];
	let callee = eval(head, env)?;
	let args = items[1..]
		.iter()
		.map(|arg| eval(arg, env))
		.collect::<Result<Vec<_>>>()?;
	match callee {
		Value::Native(f) => f(&args, env),
		_ => {
			let name = head.as_symbol().unwrap_or("<expr>");
			Err(CompileError::macro_error(
				MacroErrorKind::Undefined,
				name,
				0,
				format!("value at {span} is not callable"),
			))
		}
	}
}

/// Shared by `interp::eval`'s `quasiquote` handling and the expander's
/// own quasiquote walk (spec §4.4 step 4): literals and symbols pass
/// through unchanged, `(unquote x)` evaluates `x`, and
/// `(unquote-splicing x)` must evaluate to a list whose elements are
/// spliced into the enclosing list.
pub fn eval_quasiquote(node: &Node, env: &Rc<Env>) -> Result<Node> {
	match &node.kind {
		NodeKind::List(items) if items.first().and_then(|n| n.as_symbol()) == Some("unquote") => {
			let expr = items.get(1).cloned().unwrap_or_else(|| Node::nil(node.span));
			let value = eval(&expr, env)?;
			Ok(value.into_node().unwrap_or_else(|| Node::nil(node.span)))
		}
		NodeKind::List(items) => {
			let mut out = Vec::with_capacity(items.len());
			for item in items.iter() {
				if let Some(splice_args) = splice_target(item) {
					let value = eval(splice_args, env)?;
					let node = value.into_node().unwrap_or_else(|| Node::nil(item.span));
					let elements = node.as_list().ok_or_else(|| {
						CompileError::macro_error(
							MacroErrorKind::ExpansionFailed,
							"unquote-splicing",
							0,
							"must evaluate to a list",
						)
					})?;
					out.extend(elements.iter().cloned());
				} else {
					out.push(eval_quasiquote(item, env)?);
				}
			}
			Ok(Node::list(out, node.span))
		}
		_ => Ok(node.clone()),
	}
}

fn splice_target(node: &Node) -> Option<&Node> {
	let items = node.as_list()?;
	if items.first().and_then(|n| n.as_symbol()) == Some("unquote-splicing") {
		items.get(1)
	} else {
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::primitives;
	use crate::reader::Reader;

	fn eval_src(src: &str, env: &Rc<Env>) -> Node {
		let mut nodes = Reader::read_all(src).unwrap();
		eval(&nodes.remove(0), env).unwrap().into_node().unwrap()
	}

	#[test]
	fn if_picks_consequent_or_alternate() {
		let env = Env::root();
		primitives::install(&env);
		assert_eq!(eval_src("(if true 1 2)", &env).kind, NodeKind::Literal(Literal::Number(1.0)));
		assert_eq!(eval_src("(if false 1 2)", &env).kind, NodeKind::Literal(Literal::Number(2.0)));
	}

	#[test]
	fn if_without_alternate_is_nil() {
		let env = Env::root();
		primitives::install(&env);
		assert_eq!(eval_src("(if false 1)", &env).kind, NodeKind::Literal(Literal::Null));
	}

	#[test]
	fn def_binds_into_env() {
		let env = Env::root();
		primitives::install(&env);
		eval_src("(def x 5)", &env);
		assert_eq!(env.lookup("x").unwrap().into_node().unwrap().kind, NodeKind::Literal(Literal::Number(5.0)));
	}

	#[test]
	fn quasiquote_unquote_and_splicing() {
		let env = Env::root();
		primitives::install(&env);
		eval_src("(def x 5)", &env);
		eval_src("(def xs (list 1 2))", &env);
		let node = eval_src("`(a ,x ,@xs b)", &env);
		let items = node.as_list().unwrap();
		let got: Vec<_> = items
			.iter()
			.map(|n| match &n.kind {
				NodeKind::Symbol(s) => s.clone(),
				NodeKind::Literal(Literal::Number(n)) => n.to_string(),
				other => format!("{other:?}"),
			})
			.collect();
		assert_eq!(got, vec!["a", "5", "1", "2", "b"]);
	}

	#[test]
	fn defmacro_registers_a_user_macro() {
		let env = Env::root();
		primitives::install(&env);
		eval_src("(defmacro sq (x) `(* ,x ,x))", &env);
		assert!(env.has_macro("sq"));
	}
}
