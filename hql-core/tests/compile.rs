//! End-to-end tests driving the public `compile_file` entry point against
//! real files on disk (spec §8). Unlike the in-crate unit tests, which use
//! the `#[cfg(test)]`-only `MemoryIo`, this crate boundary only has the real
//! filesystem to work with.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use hql_core::pipeline::compile_file;

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// A scratch directory unique to one test, cleaned up when it drops.
struct Scratch {
	dir: PathBuf,
}

impl Scratch {
	fn new(name: &str) -> Self {
		let n = COUNTER.fetch_add(1, Ordering::SeqCst);
		let dir = std::env::temp_dir().join(format!("hql_compile_test_{name}_{}_{n}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		Self { dir }
	}

	fn write(&self, relative: &str, contents: &str) -> PathBuf {
		let path = self.dir.join(relative);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).unwrap();
		}
		std::fs::write(&path, contents).unwrap();
		path
	}

	fn path(&self, relative: &str) -> PathBuf {
		self.dir.join(relative)
	}
}

impl Drop for Scratch {
	fn drop(&mut self) {
		let _ = std::fs::remove_dir_all(&self.dir);
	}
}

#[test]
fn arithmetic_folds_left_associative_into_a_binary_expression_chain() {
	let scratch = Scratch::new("arithmetic");
	scratch.write("main.hql", "(def x (+ 1 2 3))");

	let output = compile_file(&scratch.path("main.hql"), false).unwrap();
	assert!(output.js.contains("const x = ((1 + 2) + 3)"));
}

#[test]
fn method_chain_tail_property_read_is_not_invoked_as_a_call() {
	let scratch = Scratch::new("method_chain");
	scratch.write("main.hql", "(def n (arr .filter (fn (x) (> x 0)) .length))");

	let output = compile_file(&scratch.path("main.hql"), false).unwrap();
	assert!(output.js.contains("arr.filter"));
	assert!(!output.js.contains(".length()"));
}

#[test]
fn quoted_list_becomes_an_array_literal() {
	let scratch = Scratch::new("quote");
	scratch.write("main.hql", "(def xs '(1 2 3))");

	let output = compile_file(&scratch.path("main.hql"), false).unwrap();
	assert!(output.js.contains("const xs = [1, 2, 3]"));
}

#[test]
fn cross_module_macro_use_is_inlined_when_bundled() {
	let scratch = Scratch::new("cross_module");
	scratch.write("m.hql", "(defmacro sq (x) `(* ,x ,x))");
	scratch.write("main.hql", "(import m \"./m.hql\") (def result (m.sq 5))");

	let output = compile_file(&scratch.path("main.hql"), true).unwrap();
	assert!(output.bundled);
	assert!(output.js.contains("5 * 5"));
	assert!(output.js.contains("__hql_module_"));
}

#[test]
fn a_two_file_import_cycle_is_rejected() {
	let scratch = Scratch::new("cycle");
	scratch.write("a.hql", "(import b \"./b.hql\")");
	scratch.write("b.hql", "(import a \"./a.hql\")");

	let result = compile_file(&scratch.path("a.hql"), true);
	assert!(result.is_err());
}

#[test]
fn a_remote_import_passes_through_as_a_plain_js_import() {
	let scratch = Scratch::new("remote");
	scratch.write("main.hql", "(import chalk \"https://esm.sh/chalk\")");

	let output = compile_file(&scratch.path("main.hql"), false).unwrap();
	assert!(output.js.contains("import chalk from \"https://esm.sh/chalk\";"));
}

#[test]
fn a_local_opaque_js_module_stays_an_import_even_when_bundled() {
	let scratch = Scratch::new("opaque");
	scratch.write("helpers.js", "export function id(x) { return x; }");
	scratch.write("main.hql", "(import helpers \"./helpers.js\") (def y (helpers.id 1))");

	let output = compile_file(&scratch.path("main.hql"), true).unwrap();
	assert!(output.js.contains("import helpers from"));
}

#[test]
fn compiling_a_nonexistent_file_reports_an_import_error_rather_than_panicking() {
	let missing = Path::new("/definitely/not/a/real/path/for/hql/tests.hql");
	let result = compile_file(missing, false);
	assert!(result.is_err());
}

#[test]
fn core_macros_expand_without_needing_a_user_level_import() {
	let scratch = Scratch::new("core_macros");
	scratch.write("main.hql", "(def greeting (str \"hi \" \"there\"))");

	let output = compile_file(&scratch.path("main.hql"), false).unwrap();
	assert!(output.js.contains(".join("));
}
