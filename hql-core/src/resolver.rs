//! C5: import resolution (spec §4.5).
//!
//! Runs before macro expansion of the root program: walks the tree for
//! `(import name "path")` / `(js-import name "path")` forms, resolves
//! each against the rules table, and (for local `.hql` targets) fully
//! processes the target module — its own imports, then its own macro
//! expansion — before binding a module value into the importer's env.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::ast::{Node, NodeKind};
use crate::env::Env;
use crate::error::{CompileError, ImportErrorKind, Result};
use crate::expander;
use crate::io::SharedIo;
use crate::normalize;
use crate::reader::Reader;
use crate::span::Span;
use crate::value::Value;

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ModuleKey {
	Local(PathBuf),
	Remote(String),
}

pub enum ModuleKind {
	/// Fully macro-expanded body, ready for lowering (§4.6) by the bundler.
	Hql { nodes: Vec<Node>, exports: Vec<String> },
	/// Local `.js`/`.ts`/`.mjs`/`.cjs`: loaded opaquely, never parsed.
	Opaque,
	/// `http(s)://`, `jsr:`, `npm:`, `data:`: passed through untouched.
	Remote,
}

pub struct ResolvedModule {
	pub key: ModuleKey,
	pub kind: ModuleKind,
	/// `(local_name, canonical_key)` for every import this module itself
	/// declared, in source order. Used by the bundler to re-bind each
	/// module's chosen local names inside its own IIFE scope (spec §4.8
	/// step 3). Always empty for `Opaque`/`Remote`.
	pub imports: Vec<(String, ModuleKey)>,
}

#[derive(Default)]
pub struct ModuleRegistry {
	processed: HashMap<ModuleKey, Rc<ResolvedModule>>,
	order: Vec<ModuleKey>,
}

impl ModuleRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, key: &ModuleKey) -> Option<&Rc<ResolvedModule>> {
		self.processed.get(key)
	}

	/// Modules in the order they finished processing: since a module's own
	/// imports are always resolved before it is inserted, this is already
	/// a post-order traversal of the import DAG (spec §4.8 step 4).
	pub fn order(&self) -> &[ModuleKey] {
		&self.order
	}

	fn insert(&mut self, key: ModuleKey, module: Rc<ResolvedModule>) {
		self.processed.insert(key.clone(), module);
		self.order.push(key);
	}
}

fn is_remote(path: &str) -> bool {
	["http://", "https://", "jsr:", "npm:", "data:"]
		.iter()
		.any(|scheme| path.starts_with(scheme))
}

/// Collects every `(import ...)` / `(js-import ...)` leaf anywhere in the
/// tree, left-to-right, depth-first.
fn find_imports<'a>(node: &'a Node, out: &mut Vec<(&'a str, &'a str, Span)>) {
	let items = match &node.kind {
		NodeKind::List(items) => items,
		_ => return,
	};
	let head = items.first().and_then(|n| n.as_symbol());
	if matches!(head, Some("import") | Some("js-import")) && items.len() >= 3 {
		if let Some(name) = items[1].as_symbol() {
			if let NodeKind::Literal(crate::ast::Literal::String(path)) = &items[2].kind {
				out.push((name, path.as_str(), node.span));
				return;
			}
		}
	}
	for child in items.iter() {
		find_imports(child, out);
	}
}

/// Entry point: resolves every import reachable from `nodes`, populating
/// `importer_env` with module bindings and qualified macro names.
/// `base_env` is the shared ancestor (carrying prelude primitives and the
/// one flat macro table for the whole compilation) each newly-discovered
/// module's own environment branches from.
pub fn resolve_imports(
	nodes: &[Node],
	importer_dir: &Path,
	importer_env: &Rc<Env>,
	base_env: &Rc<Env>,
	io: &SharedIo,
	registry: &mut ModuleRegistry,
	stack: &mut Vec<PathBuf>,
) -> Result<Vec<(String, ModuleKey)>> {
	let mut found = Vec::new();
	for node in nodes {
		find_imports(node, &mut found);
	}
	let mut imports = Vec::with_capacity(found.len());
	for (name, path, span) in found {
		let key = process_import(name, path, span, importer_dir, importer_env, base_env, io, registry, stack)?;
		imports.push((name.to_string(), key));
	}
	Ok(imports)
}

fn bind_hql_module(name: &str, exports: &[String], env: &Rc<Env>) {
	let mut members = HashMap::new();
	for export in exports {
		members.insert(export.clone(), Value::Node(Node::nil(Span::synthetic())));
	}
	env.define(name, Value::module_with(members, false));
}

fn collect_exports(nodes: &[Node], module_env: &Rc<Env>) -> Result<Vec<String>> {
	let mut exports = Vec::new();
	for node in nodes {
		if node.head_symbol() != Some("js-export") {
			continue;
		}
		let rest = node.list_rest();
		let name = rest
			.first()
			.and_then(|n| n.as_symbol())
			.ok_or_else(|| CompileError::import(ImportErrorKind::ReadFailed, "<module>", "js-export requires a binding name"))?
			.to_string();
		if let Some(value_expr) = rest.get(1) {
			module_env.define(name.clone(), Value::Node(value_expr.clone()));
		} else if module_env.lookup(&name).is_none() {
			module_env.define(name.clone(), Value::Node(Node::nil(Span::synthetic())));
		}
		exports.push(name);
	}
	Ok(exports)
}

#[allow(clippy::too_many_arguments)]
fn process_import(
	name: &str,
	path: &str,
	span: Span,
	importer_dir: &Path,
	importer_env: &Rc<Env>,
	base_env: &Rc<Env>,
	io: &SharedIo,
	registry: &mut ModuleRegistry,
	stack: &mut Vec<PathBuf>,
) -> Result<ModuleKey> {
	if is_remote(path) {
		importer_env.define(name, Value::module_with(HashMap::new(), true));
		let key = ModuleKey::Remote(path.to_string());
		if registry.get(&key).is_none() {
			registry.insert(key.clone(), Rc::new(ResolvedModule { key: key.clone(), kind: ModuleKind::Remote, imports: Vec::new() }));
		}
		return Ok(key);
	}

	let resolved = io.resolve(importer_dir, path);
	let is_opaque_js = [".js", ".ts", ".mjs", ".cjs"].iter().any(|ext| path.ends_with(ext));

	if is_opaque_js {
		importer_env.define(name, Value::module_with(HashMap::new(), true));
		let key = ModuleKey::Local(resolved.clone());
		if registry.get(&key).is_none() {
			if !io.exists(&resolved) {
				return Err(CompileError::import(ImportErrorKind::NotFound, resolved.display().to_string(), "module file not found").with_span(span));
			}
			registry.insert(key.clone(), Rc::new(ResolvedModule { key: key.clone(), kind: ModuleKind::Opaque, imports: Vec::new() }));
		}
		return Ok(key);
	}

	if !path.ends_with(".hql") {
		return Err(CompileError::import(ImportErrorKind::UnsupportedScheme, path.to_string(), "unrecognized import specifier").with_span(span));
	}

	let key = ModuleKey::Local(resolved.clone());
	if let Some(existing) = registry.get(&key) {
		if let ModuleKind::Hql { exports, .. } = &existing.kind {
			bind_hql_module(name, exports, importer_env);
		}
		return Ok(key);
	}
	if stack.contains(&resolved) {
		return Err(CompileError::import(
			ImportErrorKind::CircularAtCompile,
			resolved.display().to_string(),
			format!("import cycle detected while resolving `{path}`"),
		)
		.with_span(span));
	}
	if !io.exists(&resolved) {
		return Err(CompileError::import(ImportErrorKind::NotFound, resolved.display().to_string(), "module file not found").with_span(span));
	}

	let text = io.read_text(&resolved)?;
	let parsed = Reader::read_all(&text)?;
	let module_nodes = normalize::normalize_all(parsed)?;
	let module_dir = io.dirname(&resolved);
	let module_env = base_env.child();

	stack.push(resolved.clone());
	let module_imports = match resolve_imports(&module_nodes, &module_dir, &module_env, base_env, io, registry, stack) {
		Ok(imports) => imports,
		Err(e) => {
			stack.pop();
			return Err(e);
		}
	};

	let before_macros = base_env.macro_names_set();
	let expansion = expander::expand_all(module_nodes, &module_env);
	if let Some(diag) = expansion.diagnostics.into_iter().next() {
		stack.pop();
		return Err(CompileError::Macro(diag));
	}
	if let Err(e) = expander::check_no_sentinels(&expansion.nodes) {
		stack.pop();
		return Err(e);
	}
	let after_macros = base_env.macro_names_set();

	let exports = match collect_exports(&expansion.nodes, &module_env) {
		Ok(exports) => exports,
		Err(e) => {
			stack.pop();
			return Err(e);
		}
	};

	for macro_name in after_macros.difference(&before_macros) {
		if let Some(macro_def) = module_env.get_macro(macro_name) {
			importer_env.define_macro(format!("{name}.{macro_name}"), (*macro_def).clone());
		}
	}

	stack.pop();
	let return_key = key.clone();
	registry.insert(
		key,
		Rc::new(ResolvedModule {
			key: ModuleKey::Local(resolved),
			kind: ModuleKind::Hql { nodes: expansion.nodes, exports: exports.clone() },
			imports: module_imports,
		}),
	);

	bind_hql_module(name, &exports, importer_env);
	Ok(return_key)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::io::memory::MemoryIo;
	use crate::primitives;
	use std::path::PathBuf;

	fn root_env() -> Rc<Env> {
		let env = Env::root();
		primitives::install(&env);
		env
	}

	#[test]
	fn resolves_a_local_hql_module_and_registers_its_macro() {
		let mem = MemoryIo::new();
		mem.add("/proj/lib.hql", "(defmacro sq (x) `(* ,x ,x)) (js-export sq)");
		let io: SharedIo = Rc::new(mem);

		let base = root_env();
		let importer = base.child();
		let mut registry = ModuleRegistry::new();
		let mut stack = Vec::new();

		let program = Reader::read_all("(import lib \"./lib.hql\")").unwrap();
		resolve_imports(&program, &PathBuf::from("/proj"), &importer, &base, &io, &mut registry, &mut stack).unwrap();

		assert!(importer.has_macro("lib.sq"));
		assert!(importer.lookup("lib").is_some());
	}

	#[test]
	fn cycle_between_two_modules_is_rejected() {
		let mem = MemoryIo::new();
		mem.add("/proj/a.hql", "(import b \"./b.hql\")");
		mem.add("/proj/b.hql", "(import a \"./a.hql\")");
		let io: SharedIo = Rc::new(mem);

		let base = root_env();
		let importer = base.child();
		let mut registry = ModuleRegistry::new();
		let mut stack = vec![PathBuf::from("/proj/a.hql")];

		let program = Reader::read_all("(import a \"./a.hql\")").unwrap();
		let result = resolve_imports(&program, &PathBuf::from("/proj"), &importer, &base, &io, &mut registry, &mut stack);
		assert!(result.is_err());
	}

	#[test]
	fn remote_specifier_binds_a_catch_all_module() {
		let io: SharedIo = Rc::new(MemoryIo::new());
		let base = root_env();
		let importer = base.child();
		let mut registry = ModuleRegistry::new();
		let mut stack = Vec::new();

		let program = Reader::read_all("(import chalk \"https://esm.sh/chalk\")").unwrap();
		resolve_imports(&program, &PathBuf::from("/proj"), &importer, &base, &io, &mut registry, &mut stack).unwrap();

		assert!(importer.lookup("chalk").is_some());
		assert_eq!(registry.order().len(), 1);
	}
}
