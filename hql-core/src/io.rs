//! Filesystem access is behind a trait so the resolver (§4.5) and its
//! tests never have to touch the real disk.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{CompileError, ImportErrorKind, Result};

pub trait IoProvider {
	fn read_text(&self, path: &Path) -> Result<String>;
	fn exists(&self, path: &Path) -> bool;
	/// Resolves `specifier` relative to `from_dir`, canonicalizing where
	/// possible. Absolute specifiers are returned as-is.
	fn resolve(&self, from_dir: &Path, specifier: &str) -> PathBuf;
	fn dirname(&self, path: &Path) -> PathBuf;
}

#[derive(Default)]
pub struct FsIo;

impl IoProvider for FsIo {
	fn read_text(&self, path: &Path) -> Result<String> {
		std::fs::read_to_string(path)
			.map_err(|e| CompileError::import(ImportErrorKind::ReadFailed, path.display().to_string(), e.to_string()))
	}

	fn exists(&self, path: &Path) -> bool {
		path.exists()
	}

	fn resolve(&self, from_dir: &Path, specifier: &str) -> PathBuf {
		let joined = if Path::new(specifier).is_absolute() {
			PathBuf::from(specifier)
		} else {
			from_dir.join(specifier)
		};
		joined.canonicalize().unwrap_or(joined)
	}

	fn dirname(&self, path: &Path) -> PathBuf {
		path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
	}
}

pub type SharedIo = Rc<dyn IoProvider>;

pub fn fs_io() -> SharedIo {
	Rc::new(FsIo)
}

/// An in-memory provider for tests and for the REPL-style
/// `Session::compile_fragment` entry point (§6.7), where there is no real
/// file backing the source text.
#[cfg(test)]
pub mod memory {
	use super::*;
	use std::cell::RefCell;
	use std::collections::HashMap;

	#[derive(Default)]
	pub struct MemoryIo {
		files: RefCell<HashMap<PathBuf, String>>,
	}

	impl MemoryIo {
		pub fn new() -> Self {
			Self::default()
		}

		pub fn add(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
			self.files.borrow_mut().insert(path.into(), contents.into());
		}
	}

	impl IoProvider for MemoryIo {
		fn read_text(&self, path: &Path) -> Result<String> {
			self.files
				.borrow()
				.get(path)
				.cloned()
				.ok_or_else(|| CompileError::import(ImportErrorKind::NotFound, path.display().to_string(), "no such file"))
		}

		fn exists(&self, path: &Path) -> bool {
			self.files.borrow().contains_key(path)
		}

		fn resolve(&self, from_dir: &Path, specifier: &str) -> PathBuf {
			if Path::new(specifier).is_absolute() {
				PathBuf::from(specifier)
			} else {
				normalize(&from_dir.join(specifier))
			}
		}

		fn dirname(&self, path: &Path) -> PathBuf {
			path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
		}
	}

	fn normalize(path: &Path) -> PathBuf {
		let mut out = PathBuf::new();
		for component in path.components() {
			use std::path::Component;
			match component {
				Component::CurDir => {}
				Component::ParentDir => {
					out.pop();
				}
				other => out.push(other.as_os_str()),
			}
		}
		out
	}
}
