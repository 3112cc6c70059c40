//! REPL-facing fragment API (spec §6.7). The REPL itself is out of scope;
//! this is the seam it's built on: evaluate one top-level form against a
//! persistent environment without bundling.

use std::rc::Rc;

use crate::ast::{Node, NodeKind};
use crate::emit;
use crate::env::Env;
use crate::error::{CompileError, Result, Warning};
use crate::expander;
use crate::lower;
use crate::normalize;
use crate::pipeline::root_env_with_core;
use crate::reader::Reader;
use crate::value::Value;

/// One compiled fragment: its JS text, and the names it bound at the top
/// level (so a REPL can report them to the user).
pub struct Fragment {
	pub js: String,
	pub new_bindings: Vec<String>,
	pub warnings: Vec<Warning>,
}

pub struct Session {
	env: Rc<Env>,
}

impl Session {
	pub fn new() -> Result<Self> {
		Ok(Self { env: root_env_with_core()? })
	}

	/// Compiles a single top-level form against this session's persistent
	/// environment: reader → normalizer → expander → lowering → emitter,
	/// with no import resolution or bundling (spec §6.7).
	pub fn compile_fragment(&mut self, source: &str) -> Result<Fragment> {
		let nodes = Reader::read_all(source)?;
		let nodes = normalize::normalize_all(nodes)?;
		if nodes.len() != 1 {
			return Err(CompileError::syntax(
				nodes.first().map(|n| n.span).unwrap_or_else(crate::span::Span::synthetic),
				"a fragment must be exactly one top-level form",
			));
		}

		let expansion = expander::expand_all(nodes, &self.env);
		if let Some(diag) = expansion.diagnostics.into_iter().next() {
			return Err(CompileError::Macro(diag));
		}
		expander::check_no_sentinels(&expansion.nodes)?;

		let new_bindings = record_top_level_bindings(&expansion.nodes, &self.env);

		let program = lower::lower_program(&expansion.nodes)?;
		let js = emit::emit_program(&program)?;
		Ok(Fragment { js, new_bindings, warnings: expansion.warnings })
	}

	/// Discards all bindings and macros accumulated so far, returning to a
	/// fresh environment seeded only with primitives and `core.hql`.
	pub fn reset_env(&mut self) -> Result<()> {
		self.env = root_env_with_core()?;
		Ok(())
	}
}

/// `(def name value)` / `(js-export name value)` at the top level of a
/// fragment become bindings future fragments can refer to, mirroring how
/// the import resolver registers a module's own exports (spec §4.5).
fn record_top_level_bindings(nodes: &[Node], env: &Rc<Env>) -> Vec<String> {
	let mut names = Vec::new();
	for node in nodes {
		let NodeKind::List(items) = &node.kind else { continue };
		let head = items.first().and_then(|n| n.as_symbol());
		if !matches!(head, Some("def") | Some("js-export")) {
			continue;
		}
		let Some(name) = items.get(1).and_then(|n| n.as_symbol()) else { continue };
		if let Some(value) = items.get(2) {
			env.define(name, Value::Node(value.clone()));
		}
		names.push(name.to_string());
	}
	names
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn compiles_a_single_fragment_and_reports_its_binding() {
		let mut session = Session::new().unwrap();
		let fragment = session.compile_fragment("(def x 1)").unwrap();
		assert!(fragment.js.contains("const x = 1"));
		assert_eq!(fragment.new_bindings, vec!["x".to_string()]);
	}

	#[test]
	fn a_binding_from_one_fragment_is_visible_while_expanding_the_next() {
		let mut session = Session::new().unwrap();
		session.compile_fragment("(def x 1)").unwrap();
		let fragment = session.compile_fragment("(def y x)").unwrap();
		assert!(fragment.js.contains("const y = x"));
	}

	#[test]
	fn rejects_a_fragment_with_more_than_one_top_level_form() {
		let mut session = Session::new().unwrap();
		assert!(session.compile_fragment("(def x 1) (def y 2)").is_err());
	}

	#[test]
	fn reset_env_forgets_prior_bindings_but_keeps_core_macros() {
		let mut session = Session::new().unwrap();
		session.compile_fragment("(defmacro double (x) `(* ,x 2))").unwrap();
		session.reset_env().unwrap();
		let fragment = session.compile_fragment("(when true 1)").unwrap();
		assert!(fragment.js.contains("1"));
	}
}
