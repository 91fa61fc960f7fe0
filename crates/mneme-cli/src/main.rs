use std::{env, fs, process::ExitCode, time::Instant};

use mneme::{run, Ctx, CtxOptions, RunOutcome, Value};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let file_path = if args.len() > 1 { &args[1] } else { "example.py" };
    let code = match read_file(file_path) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let timeout_ms = env::var("MNEME_TIMEOUT_MS").ok().and_then(|v| v.parse().ok());
    let mut ctx = Ctx::new(CtxOptions {
        timeout_ms,
        ..CtxOptions::default()
    });

    let start = Instant::now();
    let outcome = run(&code, &mut ctx);
    let elapsed = start.elapsed();

    print!("{}", ctx.output());
    match outcome {
        Ok(RunOutcome::Complete(value)) => {
            if !matches!(value, Value::None) {
                eprintln!("result: {}", mneme::py_repr(&value));
            }
            eprintln!(
                "success after {elapsed:?} ({} events, {:?} compute)",
                ctx.events().len(),
                ctx.compute_time()
            );
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Suspended) => {
            eprintln!("suspended after {elapsed:?} ({} events)", ctx.events().len());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error after {elapsed:?}\n{err}");
            ExitCode::FAILURE
        }
    }
}

fn read_file(file_path: &str) -> Result<String, String> {
    match fs::metadata(file_path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("{file_path} is not a file"));
            }
        }
        Err(err) => {
            return Err(format!("cannot read {file_path}: {err}"));
        }
    }
    fs::read_to_string(file_path).map_err(|err| format!("cannot read {file_path}: {err}"))
}
