//! C3 primitives: host functions callable from macro bodies (spec §4.3).
//!
//! Every primitive takes already-evaluated [`Value`]s and returns a
//! `Value::Node` (the interpreter is homoiconic: arithmetic on numbers
//! just produces a new `Literal::Number` node).

use std::rc::Rc;

use crate::ast::{form, Literal, Node, NodeKind};
use crate::env::Env;
use crate::error::{CompileError, MacroErrorKind, Result};
use crate::span::Span;
use crate::value::Value;

pub fn install(env: &Rc<Env>) {
	macro_rules! native {
		($name:expr, $f:expr) => {
			env.define($name, Value::Native(Rc::new($f)));
		};
	}

	native!("+", |args, _env| fold_arith("+", args, 0.0, |a, b| a + b));
	native!("-", |args, _env| fold_arith_sub(args));
	native!("*", |args, _env| fold_arith("*", args, 1.0, |a, b| a * b));
	native!("/", |args, _env| fold_arith_div(args));
	native!("%", |args, _env| fold_arith("%", args, f64::NAN, |a, b| a % b));

	native!("=", |args, _env| compare("=", args, |a, b| a == b));
	native!("eq?", |args, _env| compare("eq?", args, |a, b| a == b));
	native!("!=", |args, _env| compare("!=", args, |a, b| a != b));
	native!("<", |args, _env| compare_num("<", args, |a, b| a < b));
	native!(">", |args, _env| compare_num(">", args, |a, b| a > b));
	native!("<=", |args, _env| compare_num("<=", args, |a, b| a <= b));
	native!(">=", |args, _env| compare_num(">=", args, |a, b| a >= b));

	native!("list", |args, _env| Ok(Value::Node(Node::synthetic(NodeKind::List(
		Rc::new(args.iter().map(value_to_node).collect::<Result<Vec<_>>>()?)
	)))));
	native!("first", |args, _env| list_of(args, "first").map(|items| {
		Value::Node(items.first().cloned().unwrap_or_else(|| Node::nil(Span::synthetic())))
	}));
	native!("second", |args, _env| list_of(args, "second").map(|items| {
		Value::Node(items.get(1).cloned().unwrap_or_else(|| Node::nil(Span::synthetic())))
	}));
	native!("rest", |args, _env| list_of(args, "rest").map(|items| {
		Value::Node(Node::synthetic(NodeKind::List(Rc::new(items.get(1..).unwrap_or(&[]).to_vec()))))
	}));
	native!("next", |args, _env| list_of(args, "next").map(|items| {
		let rest = items.get(1..).unwrap_or(&[]).to_vec();
		if rest.is_empty() {
			Value::Node(Node::nil(Span::synthetic()))
		} else {
			Value::Node(Node::synthetic(NodeKind::List(Rc::new(rest))))
		}
	}));
	native!("seq", |args, _env| list_of(args, "seq").map(|items| {
		if items.is_empty() {
			Value::Node(Node::nil(Span::synthetic()))
		} else {
			Value::Node(Node::synthetic(NodeKind::List(Rc::new(items))))
		}
	}));
	native!("length", |args, _env| list_of(args, "length").map(|items| {
		Value::Node(Node::literal(Literal::Number(items.len() as f64), Span::synthetic()))
	}));
	native!("empty?", |args, _env| list_of(args, "empty?").map(|items| {
		Value::Node(Node::literal(Literal::Bool(items.is_empty()), Span::synthetic()))
	}));
	native!("conj", |args, _env| {
		let (head, rest) = args.split_first().ok_or_else(|| arity_error("conj"))?;
		let mut items = node_list(head.as_node().ok_or_else(|| arity_error("conj"))?)
			.unwrap_or_default()
			.to_vec();
		for extra in rest {
			items.push(value_to_node(extra)?);
		}
		Ok(Value::Node(Node::synthetic(NodeKind::List(Rc::new(items)))))
	});
	native!("cons", |args, _env| {
		let (item, rest) = args.split_first().ok_or_else(|| arity_error("cons"))?;
		let list = rest.first().ok_or_else(|| arity_error("cons"))?;
		let mut items = vec![value_to_node(item)?];
		items.extend(node_list(&value_to_node(list)?).unwrap_or_default());
		Ok(Value::Node(Node::synthetic(NodeKind::List(Rc::new(items)))))
	});
	native!("concat", |args, _env| {
		let mut items = Vec::new();
		for arg in args {
			items.extend(list_of(std::slice::from_ref(arg), "concat")?);
		}
		Ok(Value::Node(Node::synthetic(NodeKind::List(Rc::new(items)))))
	});

	native!("symbol?", |args, _env| predicate(args, "symbol?", |n| matches!(n.kind, NodeKind::Symbol(_))));
	native!("list?", |args, _env| predicate(args, "list?", |n| matches!(n.kind, NodeKind::List(_))));
	native!("nil?", |args, _env| predicate(args, "nil?", |n| matches!(&n.kind, NodeKind::Literal(Literal::Null))));
	native!("map?", |args, _env| predicate(args, "map?", |n| n.head_symbol() == Some("hash-map")));

	native!("js-import", |args, _env| Ok(Value::Node(form(
		"js-import",
		args.iter().map(value_to_node).collect::<Result<Vec<_>>>()?,
	))));
	native!("js-export", |args, _env| Ok(Value::Node(form(
		"js-export",
		args.iter().map(value_to_node).collect::<Result<Vec<_>>>()?,
	))));
	native!("js-get", |args, _env| Ok(Value::Node(form(
		"js-get",
		args.iter().map(value_to_node).collect::<Result<Vec<_>>>()?,
	))));
	native!("js-call", |args, _env| Ok(Value::Node(form(
		"js-call",
		args.iter().map(value_to_node).collect::<Result<Vec<_>>>()?,
	))));

	native!("gensym", |args, env| {
		let hint = match args.first() {
			Some(value) => match value_to_node(value)?.kind {
				NodeKind::Symbol(name) => name,
				NodeKind::Literal(Literal::String(name)) => name,
				_ => "g".to_string(),
			},
			None => "g".to_string(),
		};
		Ok(Value::Node(Node::symbol(env.gensym(&hint), Span::synthetic())))
	});
}

fn arity_error(name: &str) -> CompileError {
	CompileError::macro_error(MacroErrorKind::BadArity, name, 0, "missing argument")
}

fn value_to_node(value: &Value) -> Result<Node> {
	value
		.as_node()
		.cloned()
		.ok_or_else(|| CompileError::macro_error(MacroErrorKind::ExpansionFailed, "<primitive>", 0, "expected an AST value"))
}

fn node_list(node: &Node) -> Option<Vec<Node>> {
	node.as_list().map(|items| items.to_vec())
}

fn list_of(args: &[Value], name: &str) -> Result<Vec<Node>> {
	let value = args.first().ok_or_else(|| arity_error(name))?;
	let node = value_to_node(value)?;
	Ok(node_list(&node).unwrap_or_default())
}

fn predicate(args: &[Value], name: &str, test: impl Fn(&Node) -> bool) -> Result<Value> {
	let node = value_to_node(args.first().ok_or_else(|| arity_error(name))?)?;
	Ok(Value::Node(Node::literal(Literal::Bool(test(&node)), Span::synthetic())))
}

fn as_number(value: &Value, op: &str) -> Result<f64> {
	let node = value_to_node(value)?;
	match node.kind {
		NodeKind::Literal(Literal::Number(n)) => Ok(n),
		_ => Err(CompileError::macro_error(MacroErrorKind::ExpansionFailed, op, 0, "expected a number")),
	}
}

fn fold_arith(op: &str, args: &[Value], identity: f64, f: impl Fn(f64, f64) -> f64) -> Result<Value> {
	if args.is_empty() {
		return Ok(Value::Node(Node::literal(Literal::Number(identity), Span::synthetic())));
	}
	let mut acc = as_number(&args[0], op)?;
	if args.len() == 1 {
		return Ok(Value::Node(Node::literal(Literal::Number(acc), Span::synthetic())));
	}
	for arg in &args[1..] {
		acc = f(acc, as_number(arg, op)?);
	}
	Ok(Value::Node(Node::literal(Literal::Number(acc), Span::synthetic())))
}

fn fold_arith_sub(args: &[Value]) -> Result<Value> {
	if args.len() == 1 {
		let n = as_number(&args[0], "-")?;
		return Ok(Value::Node(Node::literal(Literal::Number(-n), Span::synthetic())));
	}
	fold_arith("-", args, 0.0, |a, b| a - b)
}

fn fold_arith_div(args: &[Value]) -> Result<Value> {
	if args.len() == 1 {
		let n = as_number(&args[0], "/")?;
		return Ok(Value::Node(Node::literal(Literal::Number(1.0 / n), Span::synthetic())));
	}
	fold_arith("/", args, 1.0, |a, b| a / b)
}

fn compare(op: &str, args: &[Value], f: impl Fn(&Node, &Node) -> bool) -> Result<Value> {
	if args.len() != 2 {
		return Err(CompileError::macro_error(MacroErrorKind::BadArity, op, 0, "requires exactly two operands"));
	}
	let a = value_to_node(&args[0])?;
	let b = value_to_node(&args[1])?;
	Ok(Value::Node(Node::literal(Literal::Bool(f(&a, &b)), Span::synthetic())))
}

fn compare_num(op: &str, args: &[Value], f: impl Fn(f64, f64) -> bool) -> Result<Value> {
	if args.len() != 2 {
		return Err(CompileError::macro_error(MacroErrorKind::BadArity, op, 0, "requires exactly two operands"));
	}
	let a = as_number(&args[0], op)?;
	let b = as_number(&args[1], op)?;
	Ok(Value::Node(Node::literal(Literal::Bool(f(a, b)), Span::synthetic())))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn num(n: f64) -> Value {
		Value::Node(Node::literal(Literal::Number(n), Span::synthetic()))
	}

	#[test]
	fn arithmetic_is_left_folding() {
		let env = Env::root();
		install(&env);
		let plus = env.lookup("+").unwrap();
		let result = match plus {
			Value::Native(f) => f(&[num(1.0), num(2.0), num(3.0)], &env).unwrap(),
			_ => unreachable!(),
		};
		match result {
			Value::Node(node) => assert_eq!(node.kind, NodeKind::Literal(Literal::Number(6.0))),
			_ => unreachable!(),
		}
	}

	#[test]
	fn comparison_requires_exactly_two_operands() {
		let env = Env::root();
		install(&env);
		let lt = env.lookup("<").unwrap();
		match lt {
			Value::Native(f) => assert!(f(&[num(1.0)], &env).is_err()),
			_ => unreachable!(),
		}
	}

	#[test]
	fn cons_prepends_an_element_to_a_list() {
		let env = Env::root();
		install(&env);
		let cons = env.lookup("cons").unwrap();
		let list = Value::Node(Node::synthetic(NodeKind::List(Rc::new(vec![num(2.0), num(3.0)]))));
		let result = match cons {
			Value::Native(f) => f(&[num(1.0), list], &env).unwrap(),
			_ => unreachable!(),
		};
		let items = node_list(result.as_node().unwrap()).unwrap();
		assert_eq!(items.len(), 3);
		assert_eq!(items[0].kind, NodeKind::Literal(Literal::Number(1.0)));
	}

	#[test]
	fn gensym_yields_fresh_symbols() {
		let env = Env::root();
		install(&env);
		let gensym = env.lookup("gensym").unwrap();
		let (a, b) = match gensym {
			Value::Native(f) => (f(&[], &env).unwrap(), f(&[], &env).unwrap()),
			_ => unreachable!(),
		};
		assert_ne!(a.as_node().unwrap().as_symbol(), b.as_node().unwrap().as_symbol());
	}
}
