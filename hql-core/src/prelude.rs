//! Runtime prelude: the tiny block of JS helpers every compiled artifact
//! is prefixed with (spec §3, §4.6 "the `get` runtime helper"), plus the
//! bundled `core.hql` macro source loaded into the root environment once
//! per process (spec §4.3).

use once_cell::sync::Lazy;

/// `(collection idx)` lowers to `get(collection, idx)` (spec §4.6); this
/// is its definition. Falls back to plain indexing for arrays/objects and
/// dispatches to `.get` for `Map`/`Set`-shaped values, since HQL source
/// doesn't distinguish the two at the call site.
pub const RUNTIME_GET: &str = "function get(collection, key) {\n\tif (collection == null) return undefined;\n\tif (typeof collection.get === 'function') return collection.get(key);\n\treturn collection[key];\n}";

/// Safe property read, exposed to compiled output for interop code that
/// wants a null-propagating member access without going through the
/// bind-on-read `InteropIIFE` shape.
pub const RUNTIME_GET_PROPERTY: &str = "function getProperty(object, name) {\n\tif (object == null) return undefined;\n\treturn object[name];\n}";

/// The exact text prepended to every compiled artifact (spec §6.3 "always
/// begins with the runtime prelude").
pub static PRELUDE_JS: Lazy<String> = Lazy::new(|| format!("{RUNTIME_GET}\n\n{RUNTIME_GET_PROPERTY}\n"));

/// Core macros (`when`, `unless`, `str`) defined in terms of kernel forms,
/// read once into the root environment before any user source is
/// processed.
pub static CORE_HQL: &str = include_str!("core.hql");

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prelude_defines_both_helpers() {
		assert!(PRELUDE_JS.contains("function get("));
		assert!(PRELUDE_JS.contains("function getProperty("));
	}

	#[test]
	fn core_hql_is_not_empty() {
		assert!(CORE_HQL.contains("defmacro"));
	}
}
