use std::{
    env, fs,
    io::{self, BufRead, Write},
    process::ExitCode,
    time::Instant,
};

use kestrel::{ReplSession, eval};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some(path) => run_file(path),
        None => repl(),
    }
}

fn run_file(path: &str) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: failed to read {path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let start = Instant::now();
    match eval(&source, path) {
        Ok(value) => {
            let elapsed = start.elapsed();
            println!("{value}");
            eprintln!("evaluated in {elapsed:?}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Line-oriented interactive session: each line is one submission, and
/// installs stay visible to later lines.
fn repl() -> ExitCode {
    let mut session = ReplSession::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!(">>> ");
        if io::stdout().flush().is_err() {
            return ExitCode::FAILURE;
        }
        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(err)) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
            None => return ExitCode::SUCCESS,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match session.execute(line) {
            Ok(value) => println!("{value}"),
            Err(err) => eprintln!("error: {err}"),
        }
    }
}
