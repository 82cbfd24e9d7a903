use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ski_core::{parse_string, Evaluation, EvalError, Interpreter};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Steps a single REPL line may take before it is abandoned
const REPL_STEP_LIMIT: u64 = 10_000_000;

#[derive(Parser)]
#[command(name = "ski")]
#[command(about = "Unlambda interpreter. Starts a REPL when no command is given")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an Unlambda program file
    Run {
        /// Path to the program
        file: PathBuf,
        #[command(flatten)]
        options: RunOptions,
    },
    /// Evaluate inline Unlambda code
    Eval {
        /// The code to evaluate
        code: String,
        #[command(flatten)]
        options: RunOptions,
    },
    /// Check that a program parses
    Check {
        /// Path to the program
        file: PathBuf,
    },
}

#[derive(Args)]
struct RunOptions {
    /// Characters for `@` to read
    #[arg(long, conflicts_with = "stdin")]
    input: Option<String>,
    /// Read everything on standard input and hand it to the program
    #[arg(long)]
    stdin: bool,
    /// Give up after this many reduction steps
    #[arg(long)]
    max_steps: Option<u64>,
    /// Print the final value after the output
    #[arg(long)]
    show_result: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env().init();

    let cli = Cli::parse();

    match cli.command {
        None => repl(),
        Some(Commands::Run { file, options }) => {
            let source = read_program(&file)?;
            run_program(&source, &options)
        },
        Some(Commands::Eval { code, options }) => run_program(&code, &options),
        Some(Commands::Check { file }) => check_program(&file),
    }
}

fn read_program(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))
}

fn run_program(source: &str, options: &RunOptions) -> Result<()> {
    let program = parse_string(source).context("failed to parse program")?;

    let input = match &options.input {
        Some(input) => input.clone(),
        None if options.stdin => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input).context("failed to read standard input")?;
            input
        },
        None => String::new(),
    };

    log::info!("running {} primitives with {} input characters", program.size(), input.chars().count());

    let mut interpreter = Interpreter::new(&input);

    if let Some(limit) = options.max_steps {
        interpreter = interpreter.with_step_limit(limit);
    }

    match interpreter.evaluate(&program) {
        Ok(evaluation) => print_evaluation(&evaluation, options.show_result),
        Err(EvalError::StepLimitExceeded { limit, output }) => {
            print!("{output}");
            io::stdout().flush()?;
            anyhow::bail!("program did not finish within {limit} steps");
        },
        Err(error) => Err(error.into()),
    }
}

fn print_evaluation(evaluation: &Evaluation, show_result: bool) -> Result<()> {
    let mut stdout = io::stdout().lock();

    stdout.write_all(evaluation.output().as_bytes())?;

    if show_result {
        if !evaluation.output().is_empty() && !evaluation.output().ends_with('\n') {
            writeln!(stdout)?;
        }

        writeln!(stdout, "=> {}", evaluation.result)?;
    }

    stdout.flush()?;

    Ok(())
}

fn check_program(file: &Path) -> Result<()> {
    let source = read_program(file)?;
    let program = parse_string(&source).with_context(|| format!("{} does not parse", file.display()))?;

    println!("{}: ok, {} primitives", file.display(), program.size());

    Ok(())
}

fn repl() -> Result<()> {
    // one program per line, run with no input
    loop {
        print!("ski> ");
        io::stdout().flush()?;

        let mut line = String::new();

        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(());
        }

        if line.trim().is_empty() {
            continue;
        }

        let evaluation = parse_string(&line)
            .map_err(anyhow::Error::from)
            .and_then(|program| {
                Interpreter::new("")
                    .with_step_limit(REPL_STEP_LIMIT)
                    .evaluate(&program)
                    .map_err(anyhow::Error::from)
            });

        match evaluation {
            Ok(evaluation) => print_evaluation(&evaluation, true)?,
            Err(error) => println!("{error}"),
        }
    }
}
