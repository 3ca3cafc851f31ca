//! `.env` loading at startup: the working directory first, then the linker
//! home. Variables already set in the process environment are never replaced.

use crate::linker::paths::resolve_linker_home;
use std::env;
use std::path::{Path, PathBuf};

const DOTENV_FILE: &str = ".env";

fn try_load(dir: &Path) -> Option<PathBuf> {
    let path = dir.join(DOTENV_FILE);
    if path.is_file() && dotenvy::from_path(&path).is_ok() {
        return Some(path);
    }
    None
}

/// Loads the first `.env` found. The linker home is resolved only after the
/// working-directory file had its chance to set `LINKER_HOME`.
pub fn load_dotenv() -> Option<PathBuf> {
    if let Some(loaded) = env::current_dir().ok().and_then(|cwd| try_load(&cwd)) {
        return Some(loaded);
    }
    resolve_linker_home().ok().and_then(|home| try_load(&home))
}
