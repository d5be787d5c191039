use anyhow::Result;
use directories::ProjectDirs;
use std::{env, fs, path::{Path, PathBuf}};
use uuid::Uuid;

pub fn app_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "ChatPipe", "ChatPipe").ok_or_else(|| anyhow::anyhow!("ProjectDirs unavailable"))
}

pub fn default_history_root() -> Result<PathBuf> {
    if let Ok(custom_dir) = env::var("CHATPIPE_HISTORY_DIR") {
        let root = PathBuf::from(custom_dir);
        fs::create_dir_all(&root)?;
        return Ok(root);
    }
    let pd = app_dirs()?;
    let root = pd.data_dir().join("history");
    fs::create_dir_all(&root)?;
    Ok(root)
}

pub fn default_runs_root() -> Result<PathBuf> {
    if let Ok(custom_dir) = env::var("CHATPIPE_RUNS_DIR") {
        let root = PathBuf::from(custom_dir);
        fs::create_dir_all(&root)?;
        return Ok(root);
    }
    let pd = app_dirs()?;
    let root = pd.data_dir().join("runs");
    fs::create_dir_all(&root)?;
    Ok(root)
}

pub fn new_run_dir(base: Option<&Path>) -> Result<PathBuf> {
    let id = Uuid::new_v4().to_string();
    let root = match base {
        Some(b) => b.to_path_buf(),
        None => default_runs_root()?,
    };
    let dir = root.join(id);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn env_flag(name: &str) -> bool {
    env::var(name).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}
