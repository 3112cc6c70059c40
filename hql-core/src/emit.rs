//! C7: prints IR as indented ESM text (spec §4.7). Tabs for indentation,
//! matching the rest of this crate's source.

use crate::error::{CompileError, Result};
use crate::ir::{Ir, Literal as IrLiteral, VarKind};

pub fn emit_program(program: &Ir) -> Result<String> {
	let body = match program {
		Ir::Program(body) => body,
		_ => return Err(CompileError::emit("emit_program expects an Ir::Program")),
	};
	let mut out = String::new();
	for stmt in body {
		out.push_str(&emit_statement(stmt, 0)?);
		out.push('\n');
	}
	Ok(out)
}

fn pad(level: usize) -> String {
	"\t".repeat(level)
}

/// Emits a list of statements one per line at the given indent, without
/// the `Ir::Program` wrapper — used by the bundler to print each module's
/// body inside its own IIFE (spec §4.8).
pub fn emit_statements(body: &[Ir], level: usize) -> Result<String> {
	let mut out = String::new();
	for stmt in body {
		out.push_str(&emit_statement(stmt, level)?);
		out.push('\n');
	}
	Ok(out)
}

fn emit_statement(ir: &Ir, level: usize) -> Result<String> {
	let indent = pad(level);
	match ir {
		Ir::VariableDeclaration { kind, name, init } => {
			Ok(format!("{indent}{} {name} = {};", kind_keyword(kind), emit_expr(init, level)?))
		}
		Ir::ExportVariableDeclaration { declaration, export_name } => {
			let local = match declaration.as_ref() {
				Ir::VariableDeclaration { name, .. } => name.clone(),
				_ => return Err(CompileError::emit("ExportVariableDeclaration must wrap a VariableDeclaration")),
			};
			let decl = emit_statement(declaration, level)?;
			Ok(format!("{decl}\n{indent}export {{ {local} as {export_name} }};"))
		}
		Ir::ExportNamedDeclaration { specifiers } => {
			let list = specifiers
				.iter()
				.map(|s| if s.local == s.exported { s.local.clone() } else { format!("{} as {}", s.local, s.exported) })
				.collect::<Vec<_>>()
				.join(", ");
			Ok(format!("{indent}export {{ {list} }};"))
		}
		Ir::JsImportReference { name, source } => Ok(format!("{indent}import {name} from \"{}\";", escape_string(source))),
		Ir::ReturnStatement(expr) => Ok(format!("{indent}return {};", emit_expr(expr, level)?)),
		Ir::ExpressionStatement(expr) => Ok(format!("{indent}{};", emit_expr(expr, level)?)),
		other => Ok(format!("{indent}{};", emit_expr(other, level)?)),
	}
}

fn kind_keyword(kind: &VarKind) -> &'static str {
	match kind {
		VarKind::Const => "const",
		VarKind::Let => "let",
	}
}

fn emit_expr(ir: &Ir, level: usize) -> Result<String> {
	match ir {
		Ir::Lit(lit) => Ok(emit_literal(lit)),
		// `is_js` identifiers were already stripped of their `js/` prefix
		// and left otherwise verbatim at lowering time (spec §4.6); the
		// emitter never re-sanitizes, so printing the name plainly here
		// already satisfies "emit un-sanitized" for call callees too.
		Ir::Ident { name, .. } => Ok(name.clone()),
		Ir::ArrayExpr(items) => {
			let parts = items.iter().map(|i| emit_expr(i, level)).collect::<Result<Vec<_>>>()?;
			Ok(format!("[{}]", parts.join(", ")))
		}
		Ir::ObjectExpr(pairs) => {
			let parts = pairs
				.iter()
				.map(|(k, v)| Ok(format!("{}: {}", emit_key(k), emit_expr(v, level)?)))
				.collect::<Result<Vec<_>>>()?;
			Ok(format!("{{ {} }}", parts.join(", ")))
		}
		Ir::NewExpr { callee, args } => {
			let args_str = args.iter().map(|a| emit_expr(a, level)).collect::<Result<Vec<_>>>()?.join(", ");
			Ok(format!("new {}({args_str})", emit_expr(callee, level)?))
		}
		Ir::MemberExpr { object, property, computed } => {
			let object = emit_expr(object, level)?;
			if *computed {
				Ok(format!("{object}[{property}]"))
			} else {
				Ok(format!("{object}.{property}"))
			}
		}
		Ir::CallExpr { callee, args } => {
			let args_str = args.iter().map(|a| emit_expr(a, level)).collect::<Result<Vec<_>>>()?.join(", ");
			Ok(format!("{}({args_str})", emit_expr(callee, level)?))
		}
		Ir::CallMemberExpr { object, property, args } => {
			let args_str = args.iter().map(|a| emit_expr(a, level)).collect::<Result<Vec<_>>>()?.join(", ");
			Ok(format!("{}.{property}({args_str})", emit_expr(object, level)?))
		}
		Ir::InteropIIFE { object, property } => {
			let object = emit_expr(object, level)?;
			Ok(format!(
				"(function(){{ const m={object}[\"{property}\"]; return typeof m==='function'?m.bind({object}):m; }})()"
			))
		}
		Ir::AssignmentExpr { name, value } => Ok(format!("{name} = {}", emit_expr(value, level)?)),
		Ir::UnaryExpr { op, arg } => Ok(format!("{op}{}", emit_expr(arg, level)?)),
		Ir::BinaryExpr { op, left, right } => Ok(format!("({} {op} {})", emit_expr(left, level)?, emit_expr(right, level)?)),
		Ir::ConditionalExpr { test, consequent, alternate } => {
			Ok(format!("({} ? {} : {})", emit_expr(test, level)?, emit_expr(consequent, level)?, emit_expr(alternate, level)?))
		}
		Ir::FunctionExpression { params, body } => emit_function(params, body, level),
		Ir::VariableDeclaration { .. }
		| Ir::ExportVariableDeclaration { .. }
		| Ir::ExportNamedDeclaration { .. }
		| Ir::JsImportReference { .. }
		| Ir::ReturnStatement(_)
		| Ir::ExpressionStatement(_)
		| Ir::Program(_) => Err(CompileError::emit("statement-shaped IR used in expression position")),
	}
}

fn emit_function(params: &[String], body: &[Ir], level: usize) -> Result<String> {
	let params_str = params.join(", ");
	let mut out = format!("function({params_str}) {{\n");
	for stmt in body {
		out.push_str(&emit_statement(stmt, level + 1)?);
		out.push('\n');
	}
	out.push_str(&pad(level));
	out.push('}');
	Ok(out)
}

fn emit_literal(lit: &IrLiteral) -> String {
	match lit {
		IrLiteral::Null => "null".to_string(),
		IrLiteral::Bool(b) => b.to_string(),
		IrLiteral::Number(n) => format_number(*n),
		IrLiteral::String(s) => format!("\"{}\"", escape_string(s)),
	}
}

fn format_number(n: f64) -> String {
	if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
		format!("{}", n as i64)
	} else {
		n.to_string()
	}
}

fn escape_string(s: &str) -> String {
	s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn emit_key(key: &str) -> String {
	if is_valid_identifier(key) {
		key.to_string()
	} else {
		format!("\"{}\"", escape_string(key))
	}
}

fn is_valid_identifier(s: &str) -> bool {
	let mut chars = s.chars();
	match chars.next() {
		Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
		_ => return false,
	}
	chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::lower;
	use crate::reader::Reader;

	fn emit_src(src: &str) -> String {
		let mut nodes = Reader::read_all(src).unwrap();
		let ir = lower::lower(&nodes.remove(0)).unwrap();
		emit_expr(&ir, 0).unwrap()
	}

	#[test]
	fn binary_expr_is_parenthesized() {
		assert_eq!(emit_src("(+ 1 2)"), "(1 + 2)");
	}

	#[test]
	fn rest_param_is_emitted_verbatim() {
		let mut nodes = Reader::read_all("(fn (a &rest more) a)").unwrap();
		let ir = lower::lower(&nodes.remove(0)).unwrap();
		let text = emit_expr(&ir, 0).unwrap();
		assert!(text.contains("...more"));
	}

	#[test]
	fn interop_iife_matches_the_bound_member_shape() {
		let text = emit_src("(console.log)");
		assert!(text.starts_with("(function(){ const m=console[\"log\"];"));
		assert!(text.contains("m.bind(console)"));
	}

	#[test]
	fn export_variable_declaration_emits_declaration_then_export_clause() {
		let mut nodes = Reader::read_all("(js-export greet (fn (x) x))").unwrap();
		let ir = lower::lower(&nodes.remove(0)).unwrap();
		let text = emit_statement(&ir, 0).unwrap();
		assert!(text.contains("const greet = function"));
		assert!(text.contains("export { greet as greet };"));
	}

	#[test]
	fn conditional_expr_prints_ternary() {
		assert_eq!(emit_src("(if true 1 2)"), "(true ? 1 : 2)");
	}

	#[test]
	fn object_expr_quotes_non_identifier_keys() {
		let text = emit_src("(hash-map \"a-b\" 1 ok 2)");
		assert!(text.contains("\"a-b\": 1"));
		assert!(text.contains("ok: 2"));
	}
}
