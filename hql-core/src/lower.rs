//! C6: AST→IR lowering (spec §4.6). Runs only after macro expansion has
//! fully resolved every user-level form down to kernel primitives.

use std::rc::Rc;

use crate::ast::{Literal as AstLiteral, Node, NodeKind};
use crate::error::{CompileError, Result};
use crate::interp;
use crate::ir::{ExportSpecifier, Ir, Literal as IrLiteral, VarKind};
use crate::span::Span;

const ARITH_OPS: &[&str] = &["+", "-", "*", "/", "%"];
const COMPARISON_OPS: &[&str] = &["=", "eq?", "!=", "<", ">", "<=", ">="];

const RESERVED_WORDS: &[&str] = &[
	"break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do", "else", "export",
	"extends", "finally", "for", "function", "if", "import", "in", "instanceof", "new", "return", "super", "switch",
	"this", "throw", "try", "typeof", "var", "void", "while", "with", "yield", "let", "static", "enum", "await",
	"implements", "package", "protected", "interface", "private", "public", "null", "true", "false",
];

/// `-` → `_`, leading digit prefixed with `_`, reserved words suffixed
/// with `_`. Symbols beginning with `js/` strip the prefix and are
/// emitted verbatim except for the hyphen rewrite (spec §4.6).
pub fn sanitize_ident(name: &str) -> (String, bool) {
	if let Some(stripped) = name.strip_prefix("js/") {
		return (stripped.replace('-', "_"), true);
	}
	let mut out = name.replace('-', "_");
	if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
		out = format!("_{out}");
	}
	if RESERVED_WORDS.contains(&out.as_str()) {
		out.push('_');
	}
	(out, false)
}

/// A spent `defmacro` expands to a bare `nil` node rather than vanishing
/// from the list outright (spec §4.4 step 2); at the top level of a
/// program or module body that residue would otherwise lower to inert
/// `null;` statements, so it's dropped here instead.
pub fn lower_program(nodes: &[Node]) -> Result<Ir> {
	let body = nodes
		.iter()
		.filter(|n| !matches!(n.kind, NodeKind::Literal(AstLiteral::Null)))
		.map(|n| lower(n).map(to_statement))
		.collect::<Result<Vec<_>>>()?;
	Ok(Ir::Program(body))
}

pub fn lower(node: &Node) -> Result<Ir> {
	match &node.kind {
		NodeKind::Literal(AstLiteral::Null) => Ok(Ir::Lit(IrLiteral::Null)),
		NodeKind::Literal(AstLiteral::Bool(b)) => Ok(Ir::Lit(IrLiteral::Bool(*b))),
		NodeKind::Literal(AstLiteral::Number(n)) => Ok(Ir::Lit(IrLiteral::Number(*n))),
		NodeKind::Literal(AstLiteral::String(s)) => Ok(Ir::Lit(IrLiteral::String(s.clone()))),
		NodeKind::Symbol(name) => {
			let (name, is_js) = sanitize_ident(name);
			Ok(Ir::Ident { name, is_js })
		}
		NodeKind::List(items) => lower_list(items, node.span),
	}
}

/// Wraps a lowered expression into a statement position, leaving
/// already-statement-shaped IR (declarations, returns, imports/exports)
/// untouched.
fn to_statement(ir: Ir) -> Ir {
	match ir {
		Ir::VariableDeclaration { .. }
		| Ir::ExportVariableDeclaration { .. }
		| Ir::ExpressionStatement(_)
		| Ir::ReturnStatement(_)
		| Ir::JsImportReference { .. }
		| Ir::ExportNamedDeclaration { .. } => ir,
		other => Ir::ExpressionStatement(Box::new(other)),
	}
}

fn lower_list(items: &Rc<Vec<Node>>, span: Span) -> Result<Ir> {
	if items.is_empty() {
		return Ok(Ir::ArrayExpr(Vec::new()));
	}
	let head = items[0].as_symbol();
	let rest = &items[1..];
	match head {
		Some("quote") => Ok(lower_quote(rest.first().unwrap_or(&Node::nil(span)))),
		Some("if") => lower_if(rest, span),
		Some("fn") => lower_fn(rest, span),
		Some("def") => lower_def(rest, span),
		Some("js-assign") => lower_assign(rest, span),
		Some("js-export") => lower_export(rest, span),
		Some("js-import") | Some("import") => lower_import(rest, span),
		Some("js-new") | Some("new") => lower_new(rest, span),
		Some("js-get") => lower_get(rest, span),
		Some("js-call") | Some("method-call") => lower_call(rest, span),
		Some("js-get-invoke") => lower_get_invoke(rest, span),
		Some("vector") => Ok(Ir::ArrayExpr(rest.iter().map(lower).collect::<Result<_>>()?)),
		Some("hash-map") => lower_hash_map(rest, span),
		Some("hash-set") => lower_hash_set(rest),
		Some("empty-array") => Ok(Ir::ArrayExpr(Vec::new())),
		Some("empty-map") => Ok(Ir::ObjectExpr(Vec::new())),
		Some("empty-set") => Ok(empty_set()),
		Some(op) if ARITH_OPS.contains(&op) => lower_arithmetic(op, rest, span),
		Some(op) if COMPARISON_OPS.contains(&op) => lower_comparison(op, rest, span),
		Some(head_sym) if head_sym.contains('.') => lower_dotted_head(head_sym, rest),
		_ => lower_generic_call(&items[0], rest),
	}
}

fn lower_quote(node: &Node) -> Ir {
	match &node.kind {
		NodeKind::Literal(AstLiteral::Null) => Ir::Lit(IrLiteral::Null),
		NodeKind::Literal(AstLiteral::Bool(b)) => Ir::Lit(IrLiteral::Bool(*b)),
		NodeKind::Literal(AstLiteral::Number(n)) => Ir::Lit(IrLiteral::Number(*n)),
		NodeKind::Literal(AstLiteral::String(s)) => Ir::Lit(IrLiteral::String(s.clone())),
		NodeKind::Symbol(s) => Ir::Lit(IrLiteral::String(s.clone())),
		NodeKind::List(items) => Ir::ArrayExpr(items.iter().map(lower_quote).collect()),
	}
}

fn lower_if(rest: &[Node], span: Span) -> Result<Ir> {
	let test = rest.first().ok_or_else(|| CompileError::lowering(span, "`if` requires a test expression"))?;
	let consequent = rest.get(1).ok_or_else(|| CompileError::lowering(span, "`if` requires a consequent"))?;
	let alternate = match rest.get(2) {
		Some(node) => lower(node)?,
		None => Ir::Lit(IrLiteral::Null),
	};
	Ok(Ir::ConditionalExpr {
		test: Box::new(lower(test)?),
		consequent: Box::new(lower(consequent)?),
		alternate: Box::new(alternate),
	})
}

fn lower_params(params: &[Node]) -> Vec<String> {
	let (fixed, rest) = interp::split_rest_marker(params);
	let mut out: Vec<String> = fixed.iter().map(|p| sanitize_ident(p).0).collect();
	if let Some(rest_name) = rest {
		out.push(format!("...{}", sanitize_ident(&rest_name).0));
	}
	out
}

fn lower_fn(rest: &[Node], span: Span) -> Result<Ir> {
	let params_node = rest.first().and_then(|n| n.as_list()).ok_or_else(|| CompileError::lowering(span, "`fn` requires a parameter list"))?;
	let params = lower_params(params_node);
	let body_nodes = rest.get(1..).unwrap_or(&[]);
	let body = lower_fn_body(body_nodes)?;
	Ok(Ir::FunctionExpression { params, body })
}

/// All but the last body form become statements; the last becomes a
/// `return`, with two special cases (spec §4.6): a trailing variable
/// declaration gets a synthesized `return <name>`, and a trailing
/// zero-arg call (the usual shape of an expanded `do`) is kept as a bare
/// statement followed by `return null`.
fn lower_fn_body(body_nodes: &[Node]) -> Result<Vec<Ir>> {
	if body_nodes.is_empty() {
		return Ok(vec![Ir::ReturnStatement(Box::new(Ir::Lit(IrLiteral::Null)))]);
	}
	let (init, last) = body_nodes.split_at(body_nodes.len() - 1);
	let mut stmts = Vec::with_capacity(body_nodes.len() + 1);
	for node in init {
		stmts.push(to_statement(lower(node)?));
	}
	let last_ir = lower(&last[0])?;
	match &last_ir {
		Ir::VariableDeclaration { name, .. } => {
			let name = name.clone();
			stmts.push(last_ir);
			stmts.push(Ir::ReturnStatement(Box::new(Ir::Ident { name, is_js: false })));
		}
		Ir::CallExpr { args, .. } if args.is_empty() => {
			stmts.push(Ir::ExpressionStatement(Box::new(last_ir)));
			stmts.push(Ir::ReturnStatement(Box::new(Ir::Lit(IrLiteral::Null))));
		}
		_ => stmts.push(Ir::ReturnStatement(Box::new(last_ir))),
	}
	Ok(stmts)
}

fn lower_def(rest: &[Node], span: Span) -> Result<Ir> {
	let name = rest.first().and_then(|n| n.as_symbol()).ok_or_else(|| CompileError::lowering(span, "`def` requires a name"))?;
	let value = rest.get(1).ok_or_else(|| CompileError::lowering(span, "`def` requires a value expression"))?;
	Ok(Ir::VariableDeclaration {
		kind: VarKind::Const,
		name: sanitize_ident(name).0,
		init: Box::new(lower(value)?),
	})
}

/// `(js-assign name value)`: produced only by the `fx` default-value
/// prologue, never written by hand — reassigns an existing binding
/// rather than introducing one, so it lowers to a plain JS assignment
/// instead of another `const` declaration.
fn lower_assign(rest: &[Node], span: Span) -> Result<Ir> {
	let name = rest.first().and_then(|n| n.as_symbol()).ok_or_else(|| CompileError::lowering(span, "`js-assign` requires a target name"))?;
	let value = rest.get(1).ok_or_else(|| CompileError::lowering(span, "`js-assign` requires a value expression"))?;
	Ok(Ir::AssignmentExpr { name: sanitize_ident(name).0, value: Box::new(lower(value)?) })
}

fn lower_export(rest: &[Node], span: Span) -> Result<Ir> {
	let name = rest.first().and_then(|n| n.as_symbol()).ok_or_else(|| CompileError::lowering(span, "`js-export` requires a binding name"))?;
	match rest.get(1) {
		Some(value_node) => Ok(Ir::ExportVariableDeclaration {
			declaration: Box::new(Ir::VariableDeclaration {
				kind: VarKind::Const,
				name: sanitize_ident(name).0,
				init: Box::new(lower(value_node)?),
			}),
			export_name: name.to_string(),
		}),
		None => Ok(Ir::ExportNamedDeclaration {
			specifiers: vec![ExportSpecifier { local: sanitize_ident(name).0, exported: name.to_string() }],
		}),
	}
}

fn lower_import(rest: &[Node], span: Span) -> Result<Ir> {
	let name = rest.first().and_then(|n| n.as_symbol()).ok_or_else(|| CompileError::lowering(span, "`js-import` requires a binding name"))?;
	let source = rest
		.get(1)
		.and_then(|n| match &n.kind {
			NodeKind::Literal(AstLiteral::String(s)) => Some(s.clone()),
			_ => None,
		})
		.ok_or_else(|| CompileError::lowering(span, "`js-import` requires a string source"))?;
	Ok(Ir::JsImportReference { name: sanitize_ident(name).0, source })
}

fn lower_new(rest: &[Node], span: Span) -> Result<Ir> {
	let ctor = rest.first().ok_or_else(|| CompileError::lowering(span, "`new` requires a constructor expression"))?;
	let args = rest.get(1..).unwrap_or(&[]).iter().map(lower).collect::<Result<_>>()?;
	Ok(Ir::NewExpr { callee: Box::new(lower(ctor)?), args })
}

fn property_as_string(node: &Node, span: Span) -> Result<String> {
	match &node.kind {
		NodeKind::Literal(AstLiteral::String(s)) => Ok(s.clone()),
		NodeKind::Symbol(s) => Ok(s.clone()),
		_ => Err(CompileError::lowering(span, "expected a property name")),
	}
}

fn lower_get(rest: &[Node], span: Span) -> Result<Ir> {
	let object = rest.first().ok_or_else(|| CompileError::lowering(span, "`js-get` requires an object expression"))?;
	let property = rest.get(1).ok_or_else(|| CompileError::lowering(span, "`js-get` requires a property name"))?;
	let property = property_as_string(property, span)?;
	Ok(Ir::MemberExpr { object: Box::new(lower(object)?), property, computed: false })
}

/// A trailing dot-chain segment with no arguments (`.length` in
/// `arr .filter f .length`) is indistinguishable at this point from an
/// explicit zero-arg call, so it's treated the same way `js-get-invoke`
/// and a bare dotted head are: a property read rather than an invocation,
/// since emitting `.length()` would call a non-function member.
fn lower_call(rest: &[Node], span: Span) -> Result<Ir> {
	let object = rest.first().ok_or_else(|| CompileError::lowering(span, "`js-call` requires a target expression"))?;
	let name_node = rest.get(1).ok_or_else(|| CompileError::lowering(span, "`js-call` requires a method name"))?;
	let name = property_as_string(name_node, span)?;
	let args = rest.get(2..).unwrap_or(&[]);
	if args.is_empty() {
		Ok(Ir::InteropIIFE { object: Box::new(lower(object)?), property: name })
	} else {
		let lowered = args.iter().map(lower).collect::<Result<_>>()?;
		Ok(Ir::CallMemberExpr { object: Box::new(lower(object)?), property: name, args: lowered })
	}
}

fn lower_get_invoke(rest: &[Node], span: Span) -> Result<Ir> {
	let object = rest.first().ok_or_else(|| CompileError::lowering(span, "`js-get-invoke` requires a target expression"))?;
	let name_node = rest.get(1).ok_or_else(|| CompileError::lowering(span, "`js-get-invoke` requires a member name"))?;
	let name = property_as_string(name_node, span)?;
	let args = rest.get(2..).unwrap_or(&[]);
	if args.is_empty() {
		Ok(Ir::InteropIIFE { object: Box::new(lower(object)?), property: name })
	} else {
		let lowered = args.iter().map(lower).collect::<Result<_>>()?;
		Ok(Ir::CallMemberExpr { object: Box::new(lower(object)?), property: name, args: lowered })
	}
}

fn lower_hash_map(rest: &[Node], span: Span) -> Result<Ir> {
	let mut pairs = Vec::new();
	let mut i = 0;
	while i + 1 < rest.len() {
		let key = &rest[i];
		let value = lower(&rest[i + 1])?;
		let key = match &key.kind {
			NodeKind::Literal(AstLiteral::String(s)) => s.clone(),
			NodeKind::Literal(AstLiteral::Number(n)) => n.to_string(),
			NodeKind::Symbol(s) => s.clone(),
			_ => return Err(CompileError::lowering(span, "`hash-map` keys must be literals or symbols")),
		};
		pairs.push((key, value));
		i += 2;
	}
	Ok(Ir::ObjectExpr(pairs))
}

fn lower_hash_set(rest: &[Node]) -> Result<Ir> {
	let elements = rest.iter().map(lower).collect::<Result<_>>()?;
	Ok(Ir::NewExpr { callee: Box::new(Ir::Ident { name: "Set".to_string(), is_js: true }), args: vec![Ir::ArrayExpr(elements)] })
}

fn empty_set() -> Ir {
	Ir::NewExpr { callee: Box::new(Ir::Ident { name: "Set".to_string(), is_js: true }), args: vec![Ir::ArrayExpr(Vec::new())] }
}

/// A dotted symbol used directly as a call head (`obj.member`), not
/// routed through `js-call`/`method-call` by the expander — e.g. `obj` is
/// an ordinary runtime value the expander never saw as a bound module.
fn lower_dotted_head(head: &str, rest: &[Node]) -> Result<Ir> {
	let (object_name, member) = head.split_once('.').expect("caller checked for '.'");
	let (object_name, is_js) = sanitize_ident(object_name);
	let object = Ir::Ident { name: object_name, is_js };
	if rest.is_empty() {
		Ok(Ir::InteropIIFE { object: Box::new(object), property: member.to_string() })
	} else {
		let args = rest.iter().map(lower).collect::<Result<_>>()?;
		Ok(Ir::CallMemberExpr { object: Box::new(object), property: member.to_string(), args })
	}
}

/// `(collection idx)` — a single non-special-form head applied to exactly
/// one argument — lowers to the `get` runtime helper rather than an
/// ordinary call (spec §4.6).
fn lower_generic_call(head_node: &Node, rest: &[Node]) -> Result<Ir> {
	if rest.len() == 1 {
		let collection = lower(head_node)?;
		let index = lower(&rest[0])?;
		return Ok(Ir::CallExpr { callee: Box::new(Ir::Ident { name: "get".to_string(), is_js: true }), args: vec![collection, index] });
	}
	let callee = lower(head_node)?;
	let args = rest.iter().map(lower).collect::<Result<_>>()?;
	Ok(Ir::CallExpr { callee: Box::new(callee), args })
}

fn lower_arithmetic(op: &str, rest: &[Node], span: Span) -> Result<Ir> {
	let mut lowered: Vec<Ir> = rest.iter().map(lower).collect::<Result<_>>()?;
	if lowered.is_empty() {
		let identity = match op {
			"+" => 0.0,
			"*" => 1.0,
			_ => return Err(CompileError::lowering(span, format!("`{op}` requires at least one operand"))),
		};
		return Ok(Ir::Lit(IrLiteral::Number(identity)));
	}
	if lowered.len() == 1 {
		let operand = lowered.remove(0);
		return Ok(match op {
			"-" => Ir::UnaryExpr { op: "-".to_string(), arg: Box::new(operand) },
			"/" => Ir::BinaryExpr { op: "/".to_string(), left: Box::new(Ir::Lit(IrLiteral::Number(1.0))), right: Box::new(operand) },
			_ => operand,
		});
	}
	let mut iter = lowered.into_iter();
	let mut acc = iter.next().expect("checked non-empty above");
	for next in iter {
		acc = Ir::BinaryExpr { op: op.to_string(), left: Box::new(acc), right: Box::new(next) };
	}
	Ok(acc)
}

fn lower_comparison(op: &str, rest: &[Node], span: Span) -> Result<Ir> {
	if rest.len() != 2 {
		return Err(CompileError::lowering(span, format!("`{op}` requires exactly two operands")));
	}
	let js_op = match op {
		"=" | "eq?" => "===",
		"!=" => "!==",
		other => other,
	};
	Ok(Ir::BinaryExpr { op: js_op.to_string(), left: Box::new(lower(&rest[0])?), right: Box::new(lower(&rest[1])?) })
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::reader::Reader;

	fn lower_src(src: &str) -> Ir {
		let mut nodes = Reader::read_all(src).unwrap();
		lower(&nodes.remove(0)).unwrap()
	}

	#[test]
	fn sanitizes_hyphens_digits_and_reserved_words() {
		assert_eq!(sanitize_ident("my-var").0, "my_var");
		assert_eq!(sanitize_ident("1x").0, "_1x");
		assert_eq!(sanitize_ident("class").0, "class_");
		assert_eq!(sanitize_ident("js/console-log"), ("console_log".to_string(), true));
	}

	#[test]
	fn if_without_alternate_becomes_null() {
		let ir = lower_src("(if true 1)");
		match ir {
			Ir::ConditionalExpr { alternate, .. } => assert_eq!(*alternate, Ir::Lit(IrLiteral::Null)),
			other => panic!("expected ConditionalExpr, got {other:?}"),
		}
	}

	#[test]
	fn arithmetic_with_three_operands_folds_left_associative() {
		let ir = lower_src("(+ 1 2 3)");
		match ir {
			Ir::BinaryExpr { op, left, .. } => {
				assert_eq!(op, "+");
				assert!(matches!(*left, Ir::BinaryExpr { .. }));
			}
			other => panic!("expected BinaryExpr, got {other:?}"),
		}
	}

	#[test]
	fn comparison_maps_eq_to_strict_equality() {
		let ir = lower_src("(= a b)");
		match ir {
			Ir::BinaryExpr { op, .. } => assert_eq!(op, "==="),
			other => panic!("expected BinaryExpr, got {other:?}"),
		}
	}

	#[test]
	fn single_argument_call_lowers_to_the_get_helper() {
		let ir = lower_src("(items 0)");
		match ir {
			Ir::CallExpr { callee, args } => {
				assert_eq!(*callee, Ir::Ident { name: "get".to_string(), is_js: true });
				assert_eq!(args.len(), 2);
			}
			other => panic!("expected CallExpr, got {other:?}"),
		}
	}

	#[test]
	fn zero_arg_dotted_head_becomes_interop_iife() {
		let ir = lower_src("(console.log)");
		assert!(matches!(ir, Ir::InteropIIFE { .. }));
	}

	#[test]
	fn zero_arg_method_call_is_a_property_read_not_an_invocation() {
		let ir = lower_src("(method-call arr \"length\")");
		match ir {
			Ir::InteropIIFE { property, .. } => assert_eq!(property, "length"),
			other => panic!("expected InteropIIFE, got {other:?}"),
		}
	}

	#[test]
	fn method_call_with_arguments_stays_a_call_member_expr() {
		let ir = lower_src("(method-call arr \"filter\" (fn (n) n))");
		assert!(matches!(ir, Ir::CallMemberExpr { .. }));
	}

	#[test]
	fn fn_body_return_handles_trailing_variable_declaration() {
		let ir = lower_src("(fn (x) (def y (+ x 1)) y)");
		match ir {
			Ir::FunctionExpression { body, .. } => {
				assert_eq!(body.len(), 3);
				assert!(matches!(body[0], Ir::VariableDeclaration { .. }));
				assert!(matches!(body[2], Ir::ReturnStatement(_)));
			}
			other => panic!("expected FunctionExpression, got {other:?}"),
		}
	}

	#[test]
	fn quote_of_a_list_becomes_an_array_of_string_symbols() {
		let ir = lower_src("(quote (a b))");
		assert_eq!(ir, Ir::ArrayExpr(vec![Ir::Lit(IrLiteral::String("a".into())), Ir::Lit(IrLiteral::String("b".into()))]));
	}

	#[test]
	fn js_assign_reassigns_rather_than_redeclares() {
		let ir = lower_src("(js-assign x 1)");
		match ir {
			Ir::AssignmentExpr { name, .. } => assert_eq!(name, "x"),
			other => panic!("expected AssignmentExpr, got {other:?}"),
		}
	}

	#[test]
	fn hash_map_drops_incomplete_trailing_pair() {
		let ir = lower_src("(hash-map \"a\" 1 \"b\")");
		match ir {
			Ir::ObjectExpr(pairs) => assert_eq!(pairs.len(), 1),
			other => panic!("expected ObjectExpr, got {other:?}"),
		}
	}
}
