use ripple::Error;
use ripple::Interpreter;
use ripple::ast::Value;
use ripple::builtinops::MemoryFileStore;
use ripple::environment::Globals;
use ripple::formatter::{format, format_closure_with_bindings};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;
use std::sync::Arc;

fn main() {
    init_tracing();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

/// Enable with `RUST_LOG=ripple=debug` or `RUST_LOG=ripple=trace`.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn new_session() -> Interpreter {
    Interpreter::new().with_file_store(Arc::new(MemoryFileStore::new()))
}

fn run_repl() {
    println!("Ripple expression evaluator");
    println!("Enter expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");
    let mut interp = new_session();
    // Global tables as they were before each evaluated line
    let mut history: Vec<Globals> = Vec::new();

    loop {
        match rl.readline("ripple> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(interp.globals());
                        continue;
                    }
                    ":undo" => {
                        match history.pop() {
                            Some(previous) => {
                                interp.restore(previous);
                                println!("Undone.");
                            }
                            None => println!("Nothing to undo."),
                        }
                        continue;
                    }
                    ":clear" => {
                        interp = new_session();
                        history.clear();
                        println!("Session cleared.");
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                let before = interp.snapshot();
                match interp.eval_all(line) {
                    Ok(entries) => {
                        let echo = entries.len() > 1;
                        for entry in entries {
                            if echo {
                                println!("> {}", entry.source);
                            }
                            print_result(entry.result);
                        }
                        history.push(before);
                    }
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_result(result: Result<Value, Error>) {
    match result.and_then(|value| format(&value)) {
        Ok(text) => println!("{text}"),
        Err(e) => println!("Error: {e}"),
    }
}

fn print_help() {
    println!("Ripple REPL commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current global bindings");
    println!("  :undo      - Revert the global table to before the last line");
    println!("  :clear     - Start over with a fresh session");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Several expressions on one line are evaluated as a batch;");
    println!("an error in one does not stop the others.");
    println!();
    println!("Special forms: if, and, or, define, let, function");
    println!("Values: 42, -1.5, \"text\", true, false, null, (cons 1 null)");
    println!();
    println!("Examples:");
    println!("  (define square (function (x) (* x x)))");
    println!("  (square 12)");
    println!("  (let x 5 (if (> x 3) \"big\" \"small\"))");
    println!("  (spit \"notes\" \"hello\") (slurp \"notes\")");
    println!();
}

fn print_environment(globals: &Globals) {
    let user_defined = globals.user_defined();
    let primitive_count = globals.len() - user_defined.len();

    println!("Primitives: {primitive_count}");
    if user_defined.is_empty() {
        println!("No user-defined values.");
        return;
    }

    println!("User-defined values ({}):", user_defined.len());
    for (name, value) in user_defined {
        let text = match &value {
            Value::Closure(closure) => format_closure_with_bindings(closure),
            other => format(other),
        };
        match text {
            Ok(text) => println!("  {name} = {text}"),
            Err(e) => println!("  {name} = <{e}>"),
        }
    }
}
