//! Orchestrates the full reader → normalizer → import resolver → macro
//! expander → lowering → emitter → bundler pipeline (spec §4, §9
//! "Lifecycle"). The CLI's `compile` subcommand is a thin wrapper over
//! this module.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::ast::Node;
use crate::bundler;
use crate::emit;
use crate::env::Env;
use crate::error::{CompileError, Phase, Result, Warning};
use crate::expander;
use crate::io::{fs_io, SharedIo};
use crate::lower;
use crate::normalize;
use crate::prelude::{CORE_HQL, PRELUDE_JS};
use crate::primitives;
use crate::reader::Reader;
use crate::resolver::{self, ModuleKey, ModuleRegistry};

/// A freshly-built root environment with host primitives installed and
/// the bundled `core.hql` macros evaluated into it (spec §4.3, "core
/// macros loaded from a bundled `core.hql` text").
pub fn root_env_with_core() -> Result<Rc<Env>> {
	let env = Env::root();
	primitives::install(&env);
	let core_nodes = Reader::read_all(CORE_HQL)?;
	let core_nodes = normalize::normalize_all(core_nodes)?;
	let expansion = expander::expand_all(core_nodes, &env);
	if let Some(diag) = expansion.diagnostics.into_iter().next() {
		return Err(CompileError::Macro(diag));
	}
	Ok(env)
}

/// Result of a single-file compile: always includes the runtime prelude;
/// `bundled` is `true` when local imports were inlined rather than left
/// as a standalone module expecting its own imports to be resolved by a
/// downstream bundler (spec §6.3, §6.4 `--bundle`).
pub struct CompileOutput {
	pub js: String,
	pub bundled: bool,
	pub warnings: Vec<Warning>,
}

/// Compiles `path` end to end. With `bundle = true`, every transitively
/// reachable local module is inlined as an IIFE (spec §4.8); otherwise
/// only the root file's own body is lowered and emitted, with its local
/// imports left as `import` statements (bundling is the caller's job).
pub fn compile_file(path: &Path, bundle: bool) -> Result<CompileOutput> {
	let io = fs_io();
	compile_with_io(path, bundle, &io)
}

pub fn compile_with_io(path: &Path, bundle: bool, io: &SharedIo) -> Result<CompileOutput> {
	let base_env = root_env_with_core()?;
	let root_env = base_env.child();

	let text = io.read_text(path)?;
	let parsed = Reader::read_all(&text)?;
	let normalized = normalize::normalize_all(parsed)?;

	let dir = io.dirname(path);
	let mut registry = ModuleRegistry::new();
	let mut stack: Vec<PathBuf> = vec![path.to_path_buf()];
	let root_imports = resolver::resolve_imports(&normalized, &dir, &root_env, &base_env, io, &mut registry, &mut stack)?;

	// Unused-import detection has to look at the tree *before* expansion:
	// a qualified macro call like `m.sq` is exactly the kind of "use" this
	// warning must not miss, but step 5 of the expander consumes `m.sq`
	// entirely, rewriting it away with no trace of `m` left behind.
	let mut diagnostics = unused_import_warnings(&root_imports, &normalized);

	let expansion = expander::expand_all(normalized, &root_env);
	if let Some(diag) = expansion.diagnostics.into_iter().next() {
		return Err(CompileError::Macro(diag));
	}
	expander::check_no_sentinels(&expansion.nodes)?;
	diagnostics.extend(expansion.warnings);

	if bundle {
		let js = bundler::bundle(&registry, &expansion.nodes, &root_imports)?;
		return Ok(CompileOutput { js, bundled: true, warnings: diagnostics });
	}

	let program = lower::lower_program(&expansion.nodes)?;
	let mut js = PRELUDE_JS.clone();
	js.push('\n');
	js.push_str(&emit::emit_program(&program)?);
	Ok(CompileOutput { js, bundled: false, warnings: diagnostics })
}

/// Spec §7's "unused import" warning: a local name bound by `(import name
/// "...")` that never occurs anywhere else in the root program's expanded
/// body.
fn unused_import_warnings(imports: &[(String, ModuleKey)], nodes: &[Node]) -> Vec<Warning> {
	imports
		.iter()
		.filter(|(name, _)| !symbol_is_used(nodes, name))
		.map(|(name, _)| Warning::new(Phase::Import, format!("unused import `{name}`")))
		.collect()
}

fn symbol_is_used(nodes: &[Node], name: &str) -> bool {
	nodes.iter().any(|n| node_references(n, name, true))
}

/// Walks a node looking for any symbol that is `name` itself or a
/// qualified reference `name.member`, skipping the import form's own
/// binding-name position so the declaration doesn't count as a use.
fn node_references(node: &Node, name: &str, is_top_level_form: bool) -> bool {
	if let Some(sym) = node.as_symbol() {
		return sym == name || sym.starts_with(&format!("{name}."));
	}
	let Some(items) = node.as_list() else { return false };
	let is_import_form = is_top_level_form && matches!(items.first().and_then(|n| n.as_symbol()), Some("import") | Some("js-import"));
	items
		.iter()
		.skip(if is_import_form { 2 } else { 0 })
		.any(|child| node_references(child, name, false))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::io::memory::MemoryIo;

	#[test]
	fn compiles_a_standalone_file_without_bundling() {
		let mem = MemoryIo::new();
		mem.add("/proj/main.hql", "(def x (+ 1 2 3))");
		let io: SharedIo = Rc::new(mem);

		let output = compile_with_io(&PathBuf::from("/proj/main.hql"), false, &io).unwrap();
		assert!(output.js.contains("function get("));
		assert!(output.js.contains("const x ="));
		assert!(!output.bundled);
	}

	#[test]
	fn bundles_cross_module_macro_use() {
		let mem = MemoryIo::new();
		mem.add("/proj/m.hql", "(defmacro sq (x) `(* ,x ,x)) (js-export unused 1)");
		mem.add("/proj/main.hql", "(import m \"./m.hql\") (def result (m.sq 5))");
		let io: SharedIo = Rc::new(mem);

		let output = compile_with_io(&PathBuf::from("/proj/main.hql"), true, &io).unwrap();
		assert!(output.bundled);
		assert!(output.js.contains("5 * 5"));
	}

	#[test]
	fn an_import_never_referenced_again_produces_a_warning() {
		let mem = MemoryIo::new();
		mem.add("/proj/m.hql", "(js-export unused 1)");
		mem.add("/proj/main.hql", "(import m \"./m.hql\") (def x 1)");
		let io: SharedIo = Rc::new(mem);

		let output = compile_with_io(&PathBuf::from("/proj/main.hql"), false, &io).unwrap();
		assert!(output.warnings.iter().any(|w| w.message.contains("unused import `m`")));
	}

	#[test]
	fn a_qualified_macro_use_does_not_count_as_unused() {
		let mem = MemoryIo::new();
		mem.add("/proj/m.hql", "(defmacro sq (x) `(* ,x ,x))");
		mem.add("/proj/main.hql", "(import m \"./m.hql\") (def result (m.sq 5))");
		let io: SharedIo = Rc::new(mem);

		let output = compile_with_io(&PathBuf::from("/proj/main.hql"), true, &io).unwrap();
		assert!(!output.warnings.iter().any(|w| w.message.contains("unused import")));
	}

	#[test]
	fn core_macros_are_available_to_user_source() {
		let mem = MemoryIo::new();
		mem.add("/proj/main.hql", "(when true (def x 1))");
		let io: SharedIo = Rc::new(mem);

		let output = compile_with_io(&PathBuf::from("/proj/main.hql"), false, &io).unwrap();
		assert!(output.js.contains("const x = 1"));
	}
}
