use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hql", version, about = "Compiles HQL source to JavaScript")]
pub struct Cli {
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
	/// Compile an `.hql` file to JavaScript.
	Compile(CompileArgs),
}

#[derive(Args)]
pub struct CompileArgs {
	/// Path to the `.hql` source file.
	pub input: PathBuf,

	/// Where to write the compiled JavaScript; stdout when omitted.
	#[arg(short, long)]
	pub output: Option<PathBuf>,

	/// Emit a debug-level trace of each pipeline phase.
	#[arg(long)]
	pub verbose: bool,

	/// Inline every transitively reachable local module as an IIFE
	/// instead of leaving imports for a downstream bundler.
	#[arg(long)]
	pub bundle: bool,
}
