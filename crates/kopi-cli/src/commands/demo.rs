//! `kopi demo`: run a bundled sample.

use anyhow::Context;
use kopi_core::{CapturedOutput, CompilationUnit, OutputStreams, Runtime, RuntimeOptions, RuntimeResult, StreamId, UnitId};

pub fn list() {
    for sample in kopi_examples::all() {
        println!("{:<24} {}", sample.name, sample.summary);
    }
}

pub fn execute(name: &str, verify: bool) -> anyhow::Result<()> {
    let sample = kopi_examples::find(name).with_context(|| format!("unknown sample '{}'", name))?;

    if !verify {
        let mut runtime = Runtime::new(RuntimeOptions::default())?;
        let result = runtime.run_unit(sample.unit);
        runtime.flush()?;
        result?;
        return Ok(());
    }

    let (streams, captured) = OutputStreams::captured();
    let runtime = Runtime::with_streams(RuntimeOptions::default(), streams)?;
    let result = run_and_echo(runtime, &captured, sample.unit);
    result.with_context(|| format!("sample '{}' failed", sample.name))?;

    let actual = captured.stdout_lines();
    if actual != sample.expected_stdout {
        anyhow::bail!(
            "sample '{}' printed {:?}, expected {:?}",
            sample.name,
            actual,
            sample.expected_stdout
        );
    }
    eprintln!("{}: ok ({} lines)", sample.name, actual.len());
    Ok(())
}

/// Runs `unit` and echoes whatever it printed, even when it fails part way
fn run_and_echo(mut runtime: Runtime, captured: &CapturedOutput, unit: CompilationUnit) -> RuntimeResult<UnitId> {
    let result = runtime.run_unit(unit);
    for (stream, line) in captured.lines() {
        match stream {
            StreamId::Out => println!("{}", line),
            StreamId::Err => eprintln!("{}", line),
        }
    }
    result
}
