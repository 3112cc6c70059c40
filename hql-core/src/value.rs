//! Values that live in the macro environment (spec §3 "Macro environment").
//!
//! The interpreter is homoiconic: most values *are* AST nodes (numbers,
//! strings, lists all double as both code and data). The two exceptions
//! are native primitives and imported modules, which need a host-side
//! representation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::Node;
use crate::error::Result;

pub type NativeFn = Rc<dyn Fn(&[Value], &Rc<crate::env::Env>) -> Result<Value>>;

/// A bound module value (spec §4.5). `members` holds whatever exports the
/// resolver could actually enumerate; `catch_all` is set for opaque
/// `.js`/`.ts` imports and for the interpreter's own ad-hoc `js-import`
/// placeholder, where membership can't be known statically and every
/// dotted access is allowed to pass through to `js-call`.
pub struct ModuleRecord {
	pub members: RefCell<HashMap<String, Value>>,
	pub catch_all: bool,
}

#[derive(Clone)]
pub enum Value {
	Node(Node),
	Native(NativeFn),
	Module(Rc<ModuleRecord>),
}

impl Value {
	pub fn as_node(&self) -> Option<&Node> {
		match self {
			Value::Node(node) => Some(node),
			_ => None,
		}
	}

	pub fn into_node(self) -> Option<Node> {
		match self {
			Value::Node(node) => Some(node),
			_ => None,
		}
	}

	/// An empty, catch-all module placeholder (interpreter-level
	/// `js-import`, spec §4.4 note).
	pub fn module() -> Value {
		Value::Module(Rc::new(ModuleRecord {
			members: RefCell::new(HashMap::new()),
			catch_all: true,
		}))
	}

	pub fn module_with(members: HashMap<String, Value>, catch_all: bool) -> Value {
		Value::Module(Rc::new(ModuleRecord {
			members: RefCell::new(members),
			catch_all,
		}))
	}

	pub fn as_module(&self) -> Option<&Rc<ModuleRecord>> {
		match self {
			Value::Module(record) => Some(record),
			_ => None,
		}
	}
}

impl std::fmt::Debug for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Node(node) => write!(f, "Value::Node({node:?})"),
			Value::Native(_) => write!(f, "Value::Native(..)"),
			Value::Module(_) => write!(f, "Value::Module(..)"),
		}
	}
}

/// A user-defined macro captured as AST plus its defining environment, or
/// a host-native macro hook. Kept separate from [`Value`] because macros
/// live in their own table (spec §3: `macros: map name→MacroFn`).
#[derive(Clone)]
pub enum Macro {
	User {
		params: Vec<String>,
		rest_param: Option<String>,
		body: Vec<Node>,
		captured_env: Rc<crate::env::Env>,
	},
	Native(NativeMacroFn),
}

pub type NativeMacroFn = Rc<dyn Fn(&[Node], &Rc<crate::env::Env>) -> Result<Node>>;
