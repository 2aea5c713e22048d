use crate::constants::{
    API_KEY_ENV, HISTORY_FILE_NAME, KEYRING_SERVICE, KEYRING_USER, KEY_FALLBACK_FILE_NAME,
    PROMPT_FILE_NAME, SCREENSHOT_POLL_INTERVAL_MS, SCREENSHOT_WAIT_TIMEOUT_MS, SETTINGS_FILE_NAME,
};
use crate::errors::AppError;
use crate::history::HistoryEntry;
use crate::paths;
use crate::platform::{Capabilities, Capture, ClipboardAccess, InsertText, Ocr, Platform, Storage};
use crate::settings::{Settings, StoredSettings};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Millisecond timestamp used to give temp files unique names.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Settings and the key fallback live in the config dir, history and the
/// prompt file in the data dir.
pub struct FileStorage {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl FileStorage {
    pub fn new() -> Self {
        Self {
            config_dir: paths::config_dir(),
            data_dir: paths::data_dir(),
        }
    }

    /// Storage rooted at explicit directories. Tests point this at a
    /// temporary location.
    pub fn at(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self { config_dir, data_dir }
    }

    pub fn prompt_path(&self) -> PathBuf {
        self.data_dir.join(PROMPT_FILE_NAME)
    }

    fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE_NAME)
    }

    fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE_NAME)
    }

    fn key_fallback_path(&self) -> PathBuf {
        self.config_dir.join(KEY_FALLBACK_FILE_NAME)
    }

    fn load_fallback_key(&self) -> String {
        let path = self.key_fallback_path();
        if !path.exists() {
            return String::new();
        }
        let raw = fs::read_to_string(&path).unwrap_or_default();
        let store: FallbackKeyStore = serde_json::from_str(&raw).unwrap_or_default();
        store.api_key
    }

    fn save_fallback_key(&self, api_key: &str) -> Result<(), AppError> {
        let store = FallbackKeyStore {
            api_key: api_key.to_string(),
        };
        let raw = serde_json::to_string_pretty(&store)
            .map_err(|error| AppError::Storage(format!("Failed to serialize key store: {}", error)))?;
        fs::write(self.key_fallback_path(), raw)
            .map_err(|error| AppError::Storage(format!("Failed to write key store: {}", error)))
    }

    fn clear_api_key(&self) -> Result<(), AppError> {
        if let Err(error) = try_delete_from_keyring() {
            warn!("System keyring delete unavailable: {}. Cleaning file fallback.", error);
        }
        let path = self.key_fallback_path();
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|error| AppError::Storage(format!("Failed to remove key store: {}", error)))?;
        }
        Ok(())
    }
}

impl Default for FileStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FallbackKeyStore {
    api_key: String,
}

impl Storage for FileStorage {
    fn load_settings(&self) -> Option<StoredSettings> {
        let path = self.settings_path();
        if !path.exists() {
            return None;
        }
        let raw = fs::read_to_string(&path).unwrap_or_default();
        match serde_json::from_str(&raw) {
            Ok(stored) => Some(stored),
            Err(error) => {
                warn!("Failed to parse {}: {}", path.display(), error);
                None
            }
        }
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), AppError> {
        let raw = serde_json::to_string_pretty(settings)
            .map_err(|error| AppError::Storage(format!("Failed to serialize settings: {}", error)))?;
        fs::write(self.settings_path(), raw)
            .map_err(|error| AppError::Storage(format!("Failed to write settings: {}", error)))
    }

    fn load_history(&self) -> Vec<HistoryEntry> {
        let path = self.history_path();
        if !path.exists() {
            return Vec::new();
        }
        let raw = fs::read_to_string(&path).unwrap_or_default();
        match serde_json::from_str(&raw) {
            Ok(history) => history,
            Err(error) => {
                warn!("Failed to parse {}: {}", path.display(), error);
                Vec::new()
            }
        }
    }

    fn save_history(&self, history: &[HistoryEntry]) -> Result<(), AppError> {
        let raw = serde_json::to_string_pretty(history)
            .map_err(|error| AppError::Storage(format!("Failed to serialize history: {}", error)))?;
        fs::write(self.history_path(), raw)
            .map_err(|error| AppError::Storage(format!("Failed to write history: {}", error)))
    }

    fn load_api_key(&self) -> String {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            let trimmed = key.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
        match try_read_from_keyring() {
            Ok(Some(key)) if !key.trim().is_empty() => return key,
            Ok(_) => {}
            Err(error) => {
                warn!("System keyring read unavailable: {}. Falling back to file storage.", error);
            }
        }
        self.load_fallback_key()
    }

    fn save_api_key(&self, api_key: &str) -> Result<(), AppError> {
        let key = api_key.trim();
        if key.is_empty() {
            return self.clear_api_key();
        }
        if let Err(error) = try_store_in_keyring(key) {
            warn!("System keyring storage unavailable: {}. Falling back to file storage.", error);
            return self.save_fallback_key(key);
        }
        // The keyring copy is now authoritative.
        let path = self.key_fallback_path();
        if path.exists() {
            let _ = fs::remove_file(path);
        }
        Ok(())
    }
}

fn try_store_in_keyring(api_key: &str) -> Result<(), String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)
        .map_err(|e| format!("Failed to create keyring entry: {}", e))?;
    entry
        .set_password(api_key)
        .map_err(|e| format!("Failed to store key in system keyring: {}", e))
}

fn try_read_from_keyring() -> Result<Option<String>, String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)
        .map_err(|e| format!("Failed to create keyring entry: {}", e))?;
    match entry.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(format!("Failed to read key from system keyring: {}", err)),
    }
}

fn try_delete_from_keyring() -> Result<(), String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)
        .map_err(|e| format!("Failed to create keyring entry: {}", e))?;
    match entry.delete_password() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(err) => Err(format!("Failed to delete key from system keyring: {}", err)),
    }
}

pub struct SystemClipboard;

impl ClipboardAccess for SystemClipboard {
    fn read_text(&self) -> Result<String, AppError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|error| AppError::Clipboard(error.to_string()))?;
        clipboard
            .get_text()
            .map_err(|error| AppError::Clipboard(error.to_string()))
    }

    fn write_text(&self, text: &str) -> Result<(), AppError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|error| AppError::Clipboard(error.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|error| AppError::Clipboard(error.to_string()))
    }
}

/// Interactive region capture via the OS screenshot tool. The tool writes
/// to the clipboard, so completion is detected by polling for an image.
pub struct ScreenCapture;

impl ScreenCapture {
    fn trigger() -> Result<(), AppError> {
        #[cfg(target_os = "macos")]
        {
            let status = std::process::Command::new("screencapture")
                .args(["-i", "-c"])
                .status()
                .map_err(|error| {
                    AppError::Capture(format!("failed to launch screenshot tool: {}", error))
                })?;
            if !status.success() {
                return Err(AppError::Capture(
                    "screenshot tool exited with a failure".to_string(),
                ));
            }
            return Ok(());
        }

        #[cfg(target_os = "windows")]
        {
            let status = std::process::Command::new("explorer.exe")
                .arg("ms-screenclip:")
                .status()
                .map_err(|error| {
                    AppError::Capture(format!("failed to launch screenshot tool: {}", error))
                })?;
            if !status.success() {
                return Err(AppError::Capture(
                    "screenshot tool exited with a failure".to_string(),
                ));
            }
            return Ok(());
        }

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        Err(AppError::Capture(
            "screenshot capture is not supported on this platform".to_string(),
        ))
    }

    fn wait_for_clipboard_image() -> Result<String, AppError> {
        let started = Instant::now();
        let timeout = Duration::from_millis(SCREENSHOT_WAIT_TIMEOUT_MS);
        loop {
            if let Ok(mut clipboard) = arboard::Clipboard::new() {
                if let Ok(image) = clipboard.get_image() {
                    return encode_png_base64(image);
                }
            }
            if started.elapsed() >= timeout {
                return Err(AppError::Capture(
                    "timed out waiting for the screenshot".to_string(),
                ));
            }
            thread::sleep(Duration::from_millis(SCREENSHOT_POLL_INTERVAL_MS));
        }
    }
}

impl Capture for ScreenCapture {
    fn screenshot_to_base64(&self) -> Result<String, AppError> {
        Self::trigger()?;
        Self::wait_for_clipboard_image()
    }
}

fn encode_png_base64(image: arboard::ImageData) -> Result<String, AppError> {
    let buffer = image::RgbaImage::from_raw(
        image.width as u32,
        image.height as u32,
        image.bytes.into_owned(),
    )
    .ok_or_else(|| AppError::Capture("clipboard image has an unexpected layout".to_string()))?;
    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(buffer)
        .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
        .map_err(|error| AppError::Capture(format!("failed to encode screenshot: {}", error)))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(&png))
}

/// OS text recognition, shelling out to the native recognizer.
pub struct SystemOcr;

impl Ocr for SystemOcr {
    fn system_ocr(&self, image_base64: &str) -> Result<String, AppError> {
        let image_path = write_temp_image(image_base64)?;
        let result = run_system_ocr(&image_path);
        if let Err(error) = fs::remove_file(&image_path) {
            warn!("failed to clean up temp image: {}", error);
        }
        result
    }
}

fn write_temp_image(image_base64: &str) -> Result<PathBuf, AppError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(image_base64)
        .map_err(|error| AppError::Ocr(format!("invalid base64 image: {}", error)))?;
    let mut path = std::env::temp_dir();
    path.push(format!("agentype-ocr-{}.png", now_ms()));
    fs::write(&path, bytes)
        .map_err(|error| AppError::Ocr(format!("failed to write temp image: {}", error)))?;
    Ok(path)
}

fn run_system_ocr(image_path: &Path) -> Result<String, AppError> {
    #[cfg(target_os = "macos")]
    {
        return macos_ocr(image_path);
    }

    #[cfg(target_os = "windows")]
    {
        return windows_ocr(image_path);
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let _ = image_path;
        Err(AppError::Ocr(
            "system OCR is not supported on this platform".to_string(),
        ))
    }
}

#[cfg(target_os = "macos")]
fn macos_ocr(image_path: &Path) -> Result<String, AppError> {
    let script = r#"
import Vision
import AppKit
import Foundation

let imagePath = CommandLine.arguments[1]
guard let image = NSImage(contentsOfFile: imagePath) else {
  exit(1)
}
var rect = CGRect(origin: .zero, size: image.size)
guard let cgImage = image.cgImage(forProposedRect: &rect, context: nil, hints: nil) else {
  exit(1)
}

let request = VNRecognizeTextRequest()
request.recognitionLevel = .accurate
request.usesLanguageCorrection = true

let handler = VNImageRequestHandler(cgImage: cgImage, options: [:])
try handler.perform([request])

let results = request.results as? [VNRecognizedTextObservation] ?? []
let text = results.compactMap { $0.topCandidates(1).first?.string }.joined(separator: "\n")
print(text)
"#;

    let mut script_path = std::env::temp_dir();
    script_path.push(format!("agentype-ocr-{}.swift", now_ms()));
    fs::write(&script_path, script)
        .map_err(|error| AppError::Ocr(format!("failed to write swift script: {}", error)))?;

    let output = std::process::Command::new("swift")
        .arg(&script_path)
        .arg(image_path)
        .output()
        .map_err(|error| AppError::Ocr(format!("failed to run swift: {}", error)));

    if let Err(error) = fs::remove_file(&script_path) {
        warn!("failed to clean up temp script: {}", error);
    }
    let output = output?;

    if !output.status.success() {
        return Err(AppError::Ocr("macOS OCR failed to run".to_string()));
    }

    String::from_utf8(output.stdout).map_err(|error| AppError::Ocr(format!("OCR output error: {}", error)))
}

#[cfg(target_os = "windows")]
fn windows_ocr(image_path: &Path) -> Result<String, AppError> {
    let script = r#"
$ErrorActionPreference = 'Stop'
$path = $args[0]
Add-Type -AssemblyName System.Runtime.WindowsRuntime
[Windows.Graphics.Imaging.BitmapDecoder,Windows.Graphics.Imaging,ContentType=WindowsRuntime] | Out-Null
[Windows.Media.Ocr.OcrEngine,Windows.Media.Ocr,ContentType=WindowsRuntime] | Out-Null
[Windows.Storage.Streams.InMemoryRandomAccessStream,Windows.Storage.Streams,ContentType=WindowsRuntime] | Out-Null
[Windows.Storage.Streams.DataWriter,Windows.Storage.Streams,ContentType=WindowsRuntime] | Out-Null

$bytes = [System.IO.File]::ReadAllBytes($path)
$stream = [Windows.Storage.Streams.InMemoryRandomAccessStream]::new()
$writer = [Windows.Storage.Streams.DataWriter]::new($stream)
$writer.WriteBytes($bytes)
$writer.StoreAsync().GetAwaiter().GetResult() | Out-Null
$stream.Seek(0)

$decoder = [Windows.Graphics.Imaging.BitmapDecoder]::CreateAsync($stream).GetAwaiter().GetResult()
$softwareBitmap = $decoder.GetSoftwareBitmapAsync().GetAwaiter().GetResult()
$engine = [Windows.Media.Ocr.OcrEngine]::TryCreateFromUserProfileLanguages()
if ($engine -eq $null) {
  throw 'OCR engine unavailable'
}
$result = $engine.RecognizeAsync($softwareBitmap).GetAwaiter().GetResult()
$result.Text
"#;

    let mut script_path = std::env::temp_dir();
    script_path.push(format!("agentype-ocr-{}.ps1", now_ms()));
    fs::write(&script_path, script)
        .map_err(|error| AppError::Ocr(format!("failed to write powershell script: {}", error)))?;

    let output = std::process::Command::new("powershell")
        .args(["-NoProfile", "-ExecutionPolicy", "Bypass", "-File"])
        .arg(&script_path)
        .arg(image_path)
        .output()
        .map_err(|error| AppError::Ocr(format!("failed to run powershell: {}", error)));

    if let Err(error) = fs::remove_file(&script_path) {
        warn!("failed to clean up temp script: {}", error);
    }
    let output = output?;

    if !output.status.success() {
        return Err(AppError::Ocr("Windows OCR failed to run".to_string()));
    }

    String::from_utf8(output.stdout).map_err(|error| AppError::Ocr(format!("OCR output error: {}", error)))
}

/// Types text into the focused control via synthetic keystrokes.
pub struct KeystrokeInserter;

#[cfg(any(target_os = "macos", target_os = "windows"))]
impl InsertText for KeystrokeInserter {
    fn insert_text(&self, text: &str) -> Result<(), AppError> {
        use enigo::{Enigo, KeyboardControllable};
        let mut enigo = Enigo::new();
        enigo.key_sequence(text);
        Ok(())
    }
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
impl InsertText for KeystrokeInserter {
    fn insert_text(&self, _text: &str) -> Result<(), AppError> {
        Err(AppError::Insert(
            "text insertion is not supported on this platform".to_string(),
        ))
    }
}

fn ocr_supported() -> bool {
    if cfg!(target_os = "macos") {
        which::which("swift").is_ok()
    } else if cfg!(target_os = "windows") {
        which::which("powershell").is_ok()
    } else {
        false
    }
}

pub fn detect_capabilities() -> Capabilities {
    let desktop = cfg!(any(target_os = "macos", target_os = "windows"));
    Capabilities {
        // No global event loop in a one-shot process.
        hotkey: false,
        screenshot: desktop,
        system_ocr: ocr_supported(),
        insert_text: desktop,
        clipboard_read: true,
        clipboard_write: true,
    }
}

/// Assembles the host platform: file-backed storage, system clipboard and
/// whatever capture, OCR and insertion support the OS offers.
pub fn create_platform() -> Platform {
    let capabilities = detect_capabilities();
    Platform {
        capabilities,
        storage: Box::new(FileStorage::new()),
        clipboard: Box::new(SystemClipboard),
        capture: capabilities
            .screenshot
            .then(|| Box::new(ScreenCapture) as Box<dyn Capture>),
        ocr: capabilities
            .system_ocr
            .then(|| Box::new(SystemOcr) as Box<dyn Ocr>),
        insert: capabilities
            .insert_text
            .then(|| Box::new(KeystrokeInserter) as Box<dyn InsertText>),
    }
}
