use crate::errors::AppError;
use crate::history::HistoryEntry;
use crate::settings::{Settings, StoredSettings};
use serde::Serialize;

pub mod desktop;

/// Persisted state access. Load paths swallow missing or corrupt data and
/// return an empty value so startup never fails on a bad store.
pub trait Storage {
    fn load_settings(&self) -> Option<StoredSettings>;
    fn save_settings(&self, settings: &Settings) -> Result<(), AppError>;
    fn load_history(&self) -> Vec<HistoryEntry>;
    fn save_history(&self, history: &[HistoryEntry]) -> Result<(), AppError>;
    fn load_api_key(&self) -> String;
    fn save_api_key(&self, api_key: &str) -> Result<(), AppError>;
}

pub trait ClipboardAccess {
    fn read_text(&self) -> Result<String, AppError>;
    fn write_text(&self, text: &str) -> Result<(), AppError>;
}

pub trait Capture {
    /// Runs the interactive region screenshot and returns the PNG as base64.
    fn screenshot_to_base64(&self) -> Result<String, AppError>;
}

pub trait Ocr {
    /// Extracts text from a base64 PNG using the OS text recognizer.
    fn system_ocr(&self, image_base64: &str) -> Result<String, AppError>;
}

pub trait InsertText {
    /// Types the text into whatever control currently holds focus.
    fn insert_text(&self, text: &str) -> Result<(), AppError>;
}

/// What the host can actually do. Callers check the flag before touching
/// the matching handle on [`Platform`]; the handle being `Some` is not a
/// substitute for the flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub hotkey: bool,
    pub screenshot: bool,
    pub system_ocr: bool,
    pub insert_text: bool,
    pub clipboard_read: bool,
    pub clipboard_write: bool,
}

impl Capabilities {
    pub fn none() -> Self {
        Self {
            hotkey: false,
            screenshot: false,
            system_ocr: false,
            insert_text: false,
            clipboard_read: false,
            clipboard_write: false,
        }
    }
}

/// Everything the pipeline needs from the host, assembled once at startup.
pub struct Platform {
    pub capabilities: Capabilities,
    pub storage: Box<dyn Storage>,
    pub clipboard: Box<dyn ClipboardAccess>,
    pub capture: Option<Box<dyn Capture>>,
    pub ocr: Option<Box<dyn Ocr>>,
    pub insert: Option<Box<dyn InsertText>>,
}
