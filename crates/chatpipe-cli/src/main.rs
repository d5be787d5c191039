use anyhow::{Context, Result};
use chatpipe_core::codegen::{generate_code, CodegenConfig};
use chatpipe_core::cycle::execute_generated;
use chatpipe_core::dataset::load_csv;
use chatpipe_core::guard::GuardAction;
use chatpipe_core::history::HistoryStore;
use chatpipe_core::present::{download_artifact, preview};
use chatpipe_core::session::{CycleOutcome, GenerationGate, GuardResolution, Session};
use chatpipe_core::util::{default_history_root, default_runs_root, env_flag};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(version, about = "ChatPipe: natural-language tabular transformations via an LLM")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override history dir (requires CHATPIPE_ALLOW_OVERRIDE=1)
    #[arg(long)]
    history_dir: Option<PathBuf>,

    /// Override runs dir (requires CHATPIPE_ALLOW_OVERRIDE=1)
    #[arg(long)]
    runs_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Environment doctor checks
    Doctor,
    /// Preview a CSV and its missing-value insights
    Inspect {
        #[arg(long)]
        file: PathBuf,
    },
    /// One full transformation cycle: load, guard, generate, execute, save
    Transform {
        #[arg(long)]
        file: PathBuf,
        /// Free-text transformation intent; read from stdin when omitted
        #[arg(long)]
        instruction: Option<String>,
        /// Non-interactive answer for the missing-value guard
        #[arg(long, value_enum)]
        on_missing: Option<MissingChoice>,
        /// Directory for transformed_data.csv (default: current dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Inspect past generation attempts
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// List the most recent records
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Case-insensitive substring search across record contents
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MissingChoice {
    /// Remove every row with a missing value in a flagged column
    Drop,
    /// Proceed with the dataset unchanged
    Keep,
    /// Abort the cycle
    Cancel,
}

impl From<MissingChoice> for GuardAction {
    fn from(choice: MissingChoice) -> Self {
        match choice {
            MissingChoice::Drop => GuardAction::DropRows,
            MissingChoice::Keep => GuardAction::KeepAll,
            MissingChoice::Cancel => GuardAction::Cancel,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    install_tracing();
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let history_root = if env_flag("CHATPIPE_ALLOW_OVERRIDE") {
        cli.history_dir.clone().or_else(|| default_history_root().ok())
    } else {
        default_history_root().ok()
    }
    .expect("history root unavailable");

    let runs_root = if env_flag("CHATPIPE_ALLOW_OVERRIDE") {
        cli.runs_dir.clone().or_else(|| default_runs_root().ok())
    } else {
        default_runs_root().ok()
    }
    .expect("runs root unavailable");

    match cli.command {
        Commands::Doctor => cmd_doctor(&history_root, &runs_root),
        Commands::Inspect { file } => cmd_inspect(&file),
        Commands::Transform { file, instruction, on_missing, out } => {
            cmd_transform(&history_root, &runs_root, &file, instruction, on_missing, out).await
        }
        Commands::History { command } => match command {
            HistoryCommands::List { limit } => cmd_history_list(&history_root, limit),
            HistoryCommands::Search { query, limit } => cmd_history_search(&history_root, &query, limit),
        },
    }
}

fn install_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}

fn cmd_doctor(history_root: &Path, runs_root: &Path) -> Result<()> {
    println!("ChatPipe doctor:");
    println!(" - history dir: {}", history_root.display());
    println!(" - runs dir: {}", runs_root.display());
    for cmd in ["python3 --version", "python3 -c 'import pandas; print(pandas.__version__)'"] {
        let out = std::process::Command::new("bash").arg("-lc").arg(cmd).output();
        match out {
            Ok(o) if o.status.success() => {
                let s = String::from_utf8_lossy(&o.stdout);
                println!("   $ {} -> {}", cmd, s.trim());
            }
            Ok(_) => println!("   $ {} -> unavailable", cmd),
            Err(e) => println!("   $ {} -> error: {}", cmd, e),
        }
    }
    println!(
        " - OPENAI_API_KEY: {}",
        if std::env::var("OPENAI_API_KEY").is_ok() { "set" } else { "missing" }
    );
    Ok(())
}

fn print_insights(session: &Session) {
    let df = session.dataset().expect("dataset loaded");
    println!("Preview of your dataset:");
    println!("{}", preview(df, 5));
    println!("Dataset insights:");
    let report = session.missing_report();
    if report.is_clean() {
        println!("  no missing values detected");
    } else {
        let total = df.height();
        for col in report.columns_with_missing() {
            let pct = 100.0 * col.count as f64 / total as f64;
            println!("  `{}` has {} missing values ({:.1}%)", col.name, col.count, pct);
        }
    }
}

fn cmd_inspect(file: &Path) -> Result<()> {
    let mut session = Session::new();
    session.load_dataset(load_csv(file)?);
    print_insights(&session);
    Ok(())
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_guard_choice(flagged: &[String]) -> Result<GuardAction> {
    println!("Your instruction involves columns with missing values: {flagged:?}");
    println!("  [1] Drop rows   [2] Keep all   [3] Cancel");
    loop {
        match read_line("> ")?.as_str() {
            "1" => return Ok(GuardAction::DropRows),
            "2" => return Ok(GuardAction::KeepAll),
            "3" => return Ok(GuardAction::Cancel),
            _ => println!("please answer 1, 2 or 3"),
        }
    }
}

fn codegen_config_from_env() -> Result<CodegenConfig> {
    let openai_api_key =
        std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY missing")?;
    Ok(CodegenConfig {
        openai_api_key,
        openai_model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".into()),
        openai_base: std::env::var("OPENAI_BASE").ok(),
    })
}

async fn cmd_transform(
    history_root: &Path,
    runs_root: &Path,
    file: &Path,
    instruction: Option<String>,
    on_missing: Option<MissingChoice>,
    out: Option<PathBuf>,
) -> Result<()> {
    let cfg = codegen_config_from_env()?;
    let history = HistoryStore::new(history_root.to_path_buf());

    let mut session = Session::new();
    session.load_dataset(load_csv(file)?);
    print_insights(&session);

    let instruction = match instruction {
        Some(text) => text,
        None => read_line("What do you want to do with this dataset? ")?,
    };
    if instruction.is_empty() {
        anyhow::bail!("empty instruction");
    }
    session.submit_instruction(&instruction)?;

    if let GenerationGate::NeedsGuardChoice(flagged) = session.request_generation()? {
        let action = match on_missing {
            Some(choice) => choice.into(),
            None => prompt_guard_choice(&flagged)?,
        };
        match session.resolve_guard(action)? {
            GuardResolution::Cancelled => {
                println!("Cancelled; nothing was generated.");
                return Ok(());
            }
            GuardResolution::Proceed { rows_dropped: 0 } => {
                println!("Proceeding without dropping missing values.");
            }
            GuardResolution::Proceed { rows_dropped } => {
                println!("Dropped {rows_dropped} row(s) with missing values in {flagged:?}");
            }
        }
    }

    let prompt = session.prompt()?;
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner());
    spinner.set_message("calling the model...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let generated = generate_code(&prompt, &cfg).await;
    spinner.finish_and_clear();

    let code = match generated {
        Ok(code) => code,
        Err(e) => {
            let outcome = session.fail_generation(format!("{e:#}"));
            report_failure(&outcome);
            return Ok(());
        }
    };

    println!("Generated code:");
    println!("{code}");

    let report = execute_generated(&mut session, &history, runs_root, &prompt, &code)?;
    tracing::debug!(record = %report.record_path.display(), run = %report.run_dir.display(), "cycle artifacts");

    match report.outcome {
        CycleOutcome::Executed => {
            println!("Transformation applied successfully.");
            let result = session.last_result().expect("result after successful execution");
            println!("Transformed data preview:");
            println!("{}", preview(result, 5));

            let artifact = download_artifact(result)?;
            let out_path = out.unwrap_or_else(|| PathBuf::from(".")).join(artifact.filename);
            std::fs::write(&out_path, &artifact.bytes)
                .with_context(|| format!("write {}", out_path.display()))?;
            println!("Saved {} ({})", out_path.display(), artifact.mime);

            for (name, value) in session.last_bindings() {
                println!("Output `{name}`: {value}");
            }
        }
        ref failed => report_failure(failed),
    }
    Ok(())
}

fn report_failure(outcome: &CycleOutcome) {
    if let CycleOutcome::Failed(err) = outcome {
        // Both domains are non-fatal: report and return to idle.
        eprintln!("{err}");
    }
}

fn cmd_history_list(history_root: &Path, limit: usize) -> Result<()> {
    let store = HistoryStore::new(history_root.to_path_buf());
    let records = store.list(limit)?;
    println!("Last {} record(s) under {}", records.len(), history_root.display());
    for path in records {
        let record = store.read_record(&path)?;
        let first_line = record.code.lines().next().unwrap_or("");
        println!("- {}  {}", path.display(), first_line);
    }
    Ok(())
}

fn cmd_history_search(history_root: &Path, query: &str, limit: usize) -> Result<()> {
    let mut count = 0usize;
    for entry in walkdir::WalkDir::new(history_root).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() && entry.path().extension().map(|e| e == "json").unwrap_or(false) {
            let s = std::fs::read_to_string(entry.path())?;
            if s.to_lowercase().contains(&query.to_lowercase()) {
                println!("{}", entry.path().display());
                count += 1;
                if count >= limit {
                    break;
                }
            }
        }
    }
    println!("Matched {} record(s).", count);
    Ok(())
}
