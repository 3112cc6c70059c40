//! C8: bundler (spec §4.8). Wraps every reachable local `.hql` module's
//! compiled body in an IIFE that assigns to `exports`, aliases each
//! importer's chosen local name to that IIFE's result inside the scope
//! that imported it, and concatenates everything after the runtime
//! prelude in post-order of the dependency DAG.
//!
//! Local `.js`/`.ts`/`.mjs`/`.cjs` and remote specifiers are never
//! textually inlined — this crate has no JS parser to open them with, so
//! they stay exactly what lowering already makes them: a plain `import`
//! statement (see `DESIGN.md`).

use std::collections::HashMap;
use std::path::PathBuf;

use crate::ast::Node;
use crate::emit;
use crate::error::{BundleErrorKind, CompileError, Result};
use crate::ir::Ir;
use crate::lower;
use crate::prelude::PRELUDE_JS;
use crate::resolver::{ModuleKey, ModuleKind, ModuleRegistry};

/// `root_nodes` is the root program's own fully macro-expanded body;
/// `root_imports` is the list `resolve_imports` returned for it.
pub fn bundle(registry: &ModuleRegistry, root_nodes: &[Node], root_imports: &[(String, ModuleKey)]) -> Result<String> {
	check_no_cycles(registry)?;

	let binding_names = assign_binding_names(registry);
	let mut out = String::new();
	out.push_str(&PRELUDE_JS);
	out.push('\n');

	for key in registry.order() {
		let Some(module) = registry.get(key) else { continue };
		match &module.kind {
			ModuleKind::Remote | ModuleKind::Opaque => {}
			ModuleKind::Hql { nodes, .. } => {
				let var_name = &binding_names[key];
				let body = compile_module_body(nodes, &module.imports, registry, &binding_names)?;
				out.push_str(&format!("const {var_name} = (function() {{\n\tconst exports = {{}};\n"));
				out.push_str(&emit::emit_statements(&body, 1)?);
				out.push_str("\treturn exports;\n})();\n\n");
			}
		}
	}

	let root_body = compile_module_body(root_nodes, root_imports, registry, &binding_names)?;
	out.push_str(&emit::emit_statements(&root_body, 0)?);
	Ok(out)
}

/// One stable top-level JS variable per canonical local path, so a module
/// imported under different local names in different scopes still
/// compiles to a single IIFE (spec §4.8 step 6).
fn assign_binding_names(registry: &ModuleRegistry) -> HashMap<ModuleKey, String> {
	let mut names = HashMap::new();
	for (index, key) in registry.order().iter().enumerate() {
		if let ModuleKey::Local(_) = key {
			names.insert(key.clone(), format!("__hql_module_{index}"));
		}
	}
	names
}

/// Lowers a module's (or the root's) body, replacing each `(import name
/// "path")` / `(js-import name "path")` targeting a local `.hql` module
/// with a `const name = <canonical binding>;` alias, and splitting out
/// its own `js-export` statements into `exports.x = ...;` assignments.
fn compile_module_body(
	nodes: &[Node],
	imports: &[(String, ModuleKey)],
	registry: &ModuleRegistry,
	binding_names: &HashMap<ModuleKey, String>,
) -> Result<Vec<Ir>> {
	let hql_imports: HashMap<&str, &ModuleKey> = imports
		.iter()
		.filter(|(_, key)| matches!(registry.get(key).map(|m| &m.kind), Some(ModuleKind::Hql { .. })))
		.map(|(name, key)| (name.as_str(), key))
		.collect();

	let filtered: Vec<Node> = nodes.iter().filter(|n| !is_local_hql_import(n, &hql_imports)).cloned().collect();

	let program = lower::lower_program(&filtered)?;
	let body = match program {
		Ir::Program(body) => body,
		_ => return Err(CompileError::bundle(BundleErrorKind::DuplicateExport, &["<internal>".to_string()])),
	};

	let mut aliases = Vec::with_capacity(hql_imports.len());
	for (name, key) in &hql_imports {
		let canonical = binding_names.get(*key).cloned().unwrap_or_else(|| "undefined".to_string());
		aliases.push(Ir::VariableDeclaration {
			kind: crate::ir::VarKind::Const,
			name: name.to_string(),
			init: Box::new(Ir::Ident { name: canonical, is_js: true }),
		});
	}

	let (body, export_pairs) = strip_exports(body);
	aliases.extend(body);
	for (local, exported) in export_pairs {
		aliases.push(Ir::ExpressionStatement(Box::new(Ir::AssignmentExpr {
			name: format!("exports.{exported}"),
			value: Box::new(Ir::Ident { name: local, is_js: true }),
		})));
	}
	Ok(aliases)
}

fn is_local_hql_import(node: &Node, hql_imports: &HashMap<&str, &ModuleKey>) -> bool {
	let Some(items) = node.as_list() else { return false };
	let Some(head) = items.first().and_then(|n| n.as_symbol()) else { return false };
	if head != "import" && head != "js-import" {
		return false;
	}
	items.get(1).and_then(|n| n.as_symbol()).is_some_and(|name| hql_imports.contains_key(name))
}

/// Splits export-shaped statements out of a lowered body: the plain
/// declaration (or nothing, for a bare re-export) stays in `body`, and
/// each `(local, exported)` pair is returned separately so the caller can
/// turn it into an `exports.<exported> = <local>;` assignment instead of
/// an ESM `export` clause, which isn't legal inside a function body.
fn strip_exports(body: Vec<Ir>) -> (Vec<Ir>, Vec<(String, String)>) {
	let mut stmts = Vec::with_capacity(body.len());
	let mut pairs = Vec::new();
	for ir in body {
		match ir {
			Ir::ExportVariableDeclaration { declaration, export_name } => {
				if let Ir::VariableDeclaration { name, .. } = declaration.as_ref() {
					pairs.push((name.clone(), export_name));
				}
				stmts.push(*declaration);
			}
			Ir::ExportNamedDeclaration { specifiers } => {
				for spec in specifiers {
					pairs.push((spec.local, spec.exported));
				}
			}
			other => stmts.push(other),
		}
	}
	(stmts, pairs)
}

/// The resolver's processed-paths stack guard already rejects a cycle the
/// moment it's discovered mid-resolution (`ImportErrorKind::CircularAtCompile`,
/// spec §4.5), so by the time a registry reaches the bundler it cannot
/// contain one. This walks the recorded import edges anyway as a second,
/// independent check, matching spec §4.8's "at bundle time a cycle is
/// reported as `BundleError::CircularImport`" — see `DESIGN.md` for why
/// both checkpoints exist.
fn check_no_cycles(registry: &ModuleRegistry) -> Result<()> {
	for start in registry.order() {
		let mut path = Vec::new();
		let mut on_stack = Vec::new();
		if has_cycle(registry, start, &mut path, &mut on_stack) {
			let chain = path.iter().map(describe).collect::<Vec<_>>();
			return Err(CompileError::bundle(BundleErrorKind::CircularImport, &chain));
		}
	}
	Ok(())
}

fn has_cycle(registry: &ModuleRegistry, key: &ModuleKey, path: &mut Vec<ModuleKey>, on_stack: &mut Vec<ModuleKey>) -> bool {
	if on_stack.contains(key) {
		path.push(key.clone());
		return true;
	}
	let Some(module) = registry.get(key) else { return false };
	on_stack.push(key.clone());
	path.push(key.clone());
	for (_, next) in &module.imports {
		if has_cycle(registry, next, path, on_stack) {
			return true;
		}
	}
	path.pop();
	on_stack.pop();
	false
}

fn describe(key: &ModuleKey) -> String {
	match key {
		ModuleKey::Local(path) => path.display().to_string(),
		ModuleKey::Remote(spec) => spec.clone(),
	}
}
