#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn test_run_pandas_cell_simple() {
        if !pandas_available() {
            eprintln!("skipping: python3 with pandas not available");
            return;
        }
        let dir = tempdir().unwrap();
        let input = df!("age" => &[Some(1i64), None, Some(3)]).unwrap();
        let out = run_pandas_cell(dir.path(), "df = df.dropna()\nrows = len(df)", &input).unwrap();
        assert!(out.ok, "{}", out.message);
        let result = out.dataset.unwrap();
        assert_eq!(result.height(), 2);
        assert_eq!(out.bindings.get("rows").and_then(|v| v.as_i64()), Some(2));
    }

    #[test]
    fn test_run_pandas_cell_reports_failure() {
        if !pandas_available() {
            eprintln!("skipping: python3 with pandas not available");
            return;
        }
        let dir = tempdir().unwrap();
        let input = df!("age" => &[1i64, 2]).unwrap();
        let out = run_pandas_cell(dir.path(), "df = df['no_such_column']", &input).unwrap();
        assert!(!out.ok);
        assert!(out.dataset.is_none());
    }
}

use std::{
    fs,
    io::{BufRead, BufReader},
    path::Path,
    process::{Child, Command, Stdio},
    thread,
};
use tracing::{debug, info};

use crate::dataset;
use crate::executors::ExecOutcome;
use anyhow::Result;
use polars::prelude::DataFrame;

/// Fixed harness executed by the interpreter. It rebuilds the dataset copy
/// under the conventional `df` binding, runs the generated code inside a
/// namespace that exposes nothing beyond the interpreter's own defaults,
/// then dumps the transformed frame and every other binding back to disk.
const DRIVER: &str = r#"import json

import pandas as pd

with open("cell.py") as f:
    code = f.read()

df = pd.read_csv("input.csv")
namespace = {"df": df}
exec(code, {}, namespace)

namespace["df"].to_csv("output.csv", index=False)

extra = {}
for name, value in namespace.items():
    if name == "df":
        continue
    try:
        json.dumps(value)
        extra[name] = value
    except (TypeError, ValueError):
        extra[name] = repr(value)

with open("bindings.json", "w") as f:
    json.dump(extra, f, indent=2, default=str)
"#;

fn python_program() -> String {
    std::env::var("CHATPIPE_PYTHON").unwrap_or_else(|_| "python3".into())
}

pub fn pandas_available() -> bool {
    Command::new(python_program())
        .args(["-c", "import pandas"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn spawn_log_threads(child: &mut Child) -> (thread::JoinHandle<String>, thread::JoinHandle<String>) {
    let out_handle = {
        let stdout = child.stdout.take();
        thread::spawn(move || {
            let mut buf = String::new();
            if let Some(stdout) = stdout {
                let reader = BufReader::new(stdout);
                for line in reader.lines().flatten() {
                    let line = line.trim_end_matches(&['\r', '\n'][..]).to_string();
                    tracing::info!(target = "exec::stdout", "{line}");
                    buf.push_str(&line);
                    buf.push('\n');
                }
            }
            buf
        })
    };
    let err_handle = {
        let stderr = child.stderr.take();
        thread::spawn(move || {
            let mut buf = String::new();
            if let Some(stderr) = stderr {
                let reader = BufReader::new(stderr);
                for line in reader.lines().flatten() {
                    let line = line.trim_end_matches(&['\r', '\n'][..]).to_string();
                    tracing::warn!(target = "exec::stderr", "{line}");
                    buf.push_str(&line);
                    buf.push('\n');
                }
            }
            buf
        })
    };
    (out_handle, err_handle)
}

fn tail(s: &str, n: usize) -> String {
    let lines: Vec<&str> = s.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Runs the generated code against a copy of `input` through the local
/// interpreter. No security isolation: the code runs with the interpreter's
/// full host access (see the README's security model). Callers must treat
/// the code as untrusted.
#[tracing::instrument(skip_all, fields(run_dir = %run_dir.display()))]
pub fn run_pandas_cell(run_dir: &Path, code: &str, input: &DataFrame) -> Result<ExecOutcome> {
    fs::create_dir_all(run_dir)?;
    fs::write(run_dir.join("input.csv"), dataset::csv_bytes(input)?)?;
    fs::write(run_dir.join("cell.py"), code)?;
    let driver_path = run_dir.join("driver.py");
    fs::write(&driver_path, DRIVER)?;
    debug!(script = %driver_path.display(), "wrote pandas cell");

    let mut cmd = Command::new(python_program());
    cmd.arg("driver.py")
        .current_dir(run_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    info!("spawning python");
    let mut child = cmd.spawn().map_err(|e| anyhow::anyhow!("spawn failed: {e}"))?;
    let (t_out, t_err) = spawn_log_threads(&mut child);

    let status = child.wait().map_err(|e| anyhow::anyhow!("wait failed: {e}"))?;
    let out = t_out.join().unwrap_or_default();
    let err = t_err.join().unwrap_or_default();

    if !status.success() {
        return Ok(ExecOutcome {
            ok: false,
            message: if err.is_empty() { out.clone() } else { err.clone() },
            dataset: None,
            bindings: Default::default(),
            stdout_tail: Some(tail(&out, 120)),
            stderr_tail: Some(tail(&err, 120)),
        });
    }

    let result = dataset::read_csv_bytes(&fs::read(run_dir.join("output.csv"))?)?;
    let bindings = match fs::read(run_dir.join("bindings.json")) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => Default::default(),
    };

    Ok(ExecOutcome {
        ok: true,
        message: out.clone(),
        dataset: Some(result),
        bindings,
        stdout_tail: Some(tail(&out, 120)),
        stderr_tail: Some(tail(&err, 120)),
    })
}
