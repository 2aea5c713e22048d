use std::fs;
use std::path::PathBuf;

const APP_DIR_NAME: &str = "agentype";

pub(crate) fn config_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("AGENTYPE_CONFIG_DIR") {
    let trimmed = dir.trim();
    if !trimmed.is_empty() {
      let path = PathBuf::from(trimmed);
      let _ = fs::create_dir_all(&path);
      return path;
    }
  }
  let base = dirs::config_dir()
    .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
  let dir = base.join(APP_DIR_NAME);
  let _ = fs::create_dir_all(&dir);
  dir
}

pub(crate) fn data_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("AGENTYPE_DATA_DIR") {
    let trimmed = dir.trim();
    if !trimmed.is_empty() {
      let path = PathBuf::from(trimmed);
      let _ = fs::create_dir_all(&path);
      return path;
    }
  }
  let base = dirs::data_dir()
    .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
  let dir = base.join(APP_DIR_NAME);
  let _ = fs::create_dir_all(&dir);
  dir
}

pub(crate) fn logs_dir() -> PathBuf {
  let dir = data_dir().join("logs");
  let _ = fs::create_dir_all(&dir);
  dir
}
