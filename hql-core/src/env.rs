//! C3: the nested macro environment (spec §3, §4.3).
//!
//! `bindings` are scoped lexically through the `parent` chain; a fresh
//! child is created for every macro expansion so that parameters don't
//! leak into the caller's scope. `macros` is a single flat map shared by
//! every env in a compilation (spec §9 "keep macros in a flat map keyed
//! by the full string"), so `module.name` qualified lookups are O(1)
//! without needing a second nested structure.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::value::{Macro, Value};

const GENSYM_PREFIX: &str = "g#"; // `#` can't appear in reader-produced symbols.

pub struct Env {
	bindings: RefCell<HashMap<String, Value>>,
	macros: Rc<RefCell<HashMap<String, Rc<Macro>>>>,
	gensym_counter: Rc<Cell<u64>>,
	parent: Option<Rc<Env>>,
}

impl Env {
	pub fn root() -> Rc<Env> {
		Rc::new(Env {
			bindings: RefCell::new(HashMap::new()),
			macros: Rc::new(RefCell::new(HashMap::new())),
			gensym_counter: Rc::new(Cell::new(0)),
			parent: None,
		})
	}

	/// A fresh child scope for the duration of a single macro expansion.
	pub fn child(self: &Rc<Env>) -> Rc<Env> {
		Rc::new(Env {
			bindings: RefCell::new(HashMap::new()),
			macros: self.macros.clone(),
			gensym_counter: self.gensym_counter.clone(),
			parent: Some(self.clone()),
		})
	}

	pub fn define(&self, name: impl Into<String>, value: Value) {
		self.bindings.borrow_mut().insert(name.into(), value);
	}

	pub fn lookup(&self, name: &str) -> Option<Value> {
		if let Some(value) = self.bindings.borrow().get(name) {
			return Some(value.clone());
		}
		self.parent.as_ref().and_then(|parent| parent.lookup(name))
	}

	pub fn define_macro(&self, name: impl Into<String>, macro_def: Macro) {
		self.macros.borrow_mut().insert(name.into(), Rc::new(macro_def));
	}

	pub fn has_macro(&self, name: &str) -> bool {
		self.macros.borrow().contains_key(name)
	}

	pub fn get_macro(&self, name: &str) -> Option<Rc<Macro>> {
		self.macros.borrow().get(name).cloned()
	}

	/// Snapshot of every macro name currently registered anywhere in this
	/// compilation, used by the import resolver to diff which macros a
	/// freshly-processed module just introduced (spec §4.5).
	pub fn macro_names_set(&self) -> HashSet<String> {
		self.macros.borrow().keys().cloned().collect()
	}

	/// Resolves a dotted `module.name` against a bound module value,
	/// without consulting the macro table (used by the expander's
	/// qualified-value-call path, spec §4.4 step 5).
	pub fn lookup_module_member(&self, module: &str, member: &str) -> Option<Value> {
		let module = self.lookup(module)?;
		let record = module.as_module()?;
		if let Some(value) = record.members.borrow().get(member) {
			return Some(value.clone());
		}
		if record.catch_all {
			return Some(Value::Node(crate::ast::Node::nil(crate::span::Span::synthetic())));
		}
		None
	}

	/// Guaranteed-fresh symbol name (spec §4.3 `gensym`, §9). The prefix
	/// contains `#`, which the reader never produces in a symbol token,
	/// so collision with source identifiers is structurally impossible.
	pub fn gensym(&self, hint: &str) -> String {
		let n = self.gensym_counter.get();
		self.gensym_counter.set(n + 1);
		format!("{GENSYM_PREFIX}{hint}_{n}")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::{Literal, Node};
	use crate::span::Span;

	#[test]
	fn child_scope_does_not_leak_into_parent() {
		let root = Env::root();
		root.define("x", Value::Node(Node::literal(Literal::Number(1.0), Span::synthetic())));
		let child = root.child();
		child.define("y", Value::Node(Node::literal(Literal::Number(2.0), Span::synthetic())));

		assert!(child.lookup("x").is_some()); // inherited
		assert!(root.lookup("y").is_none()); // not leaked upward
	}

	#[test]
	fn macros_are_visible_from_every_descendant() {
		let root = Env::root();
		root.define_macro(
			"m",
			Macro::Native(Rc::new(|_args, _env| Ok(Node::nil(Span::synthetic())))),
		);
		let child = root.child().child();
		assert!(child.has_macro("m"));
	}

	#[test]
	fn gensym_is_unique_within_a_compilation() {
		let root = Env::root();
		let a = root.gensym("x");
		let b = root.gensym("x");
		assert_ne!(a, b);
		assert!(a.contains('#'));
	}
}
