mod args;

use std::process::ExitCode;

use clap::Parser;

use args::{Cli, Command, CompileArgs};
use hql_core::pipeline;

fn main() -> ExitCode {
	let cli = Cli::parse();
	let Command::Compile(compile_args) = cli.command;

	if compile_args.verbose {
		tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("hql=debug".parse().unwrap())).init();
	}

	match run(&compile_args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			eprintln!("{err}");
			ExitCode::FAILURE
		}
	}
}

fn run(args: &CompileArgs) -> hql_core::Result<()> {
	tracing::info!(file = %args.input.display(), bundle = args.bundle, "compiling");

	let output = pipeline::compile_file(&args.input, args.bundle)?;

	match &args.output {
		Some(path) => {
			std::fs::write(path, &output.js)?;
			tracing::debug!(path = %path.display(), "wrote output");
		}
		None => print!("{}", output.js),
	}

	for warning in &output.warnings {
		eprintln!("{warning}");
	}

	Ok(())
}
