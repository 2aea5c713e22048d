use crate::errors::AppError;
use crate::history::{prepend_entry, remove_entry, Candidate, HistoryEntry, InputSource};
use crate::hotkeys::validate_hotkey_format;
use crate::i18n::translate;
use crate::openai::{CompletionApi, CompletionRequest};
use crate::platform::{Capabilities, Platform};
use crate::prompt::{build_style_lines, render_prompt, PromptConfig, PromptSource};
use crate::settings::{self, merge_settings, OcrMode, Settings, Slot, SlotUpdate, UiLanguage};
use crate::status::{Status, StatusSink};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// What a trigger surface hands to the pipeline.
pub struct GenerationInput {
    pub text: String,
    pub image_base64: Option<String>,
    pub source: InputSource,
}

struct ResolvedInput {
    text: String,
    use_vision: bool,
}

/// Releases the single-flight flag when a run ends, whatever way it ends.
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self { flag: flag.clone() })
        }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// The whole pipeline behind one handle: settings, history, candidates and
/// the capability surface they run against. Constructed once per process.
pub struct App {
    platform: Platform,
    api: Box<dyn CompletionApi>,
    status: Box<dyn StatusSink>,
    prompts: PromptConfig,
    settings: Settings,
    history: Vec<HistoryEntry>,
    candidates: Vec<Candidate>,
    api_key: String,
    busy: Arc<AtomicBool>,
}

impl App {
    /// Loads and repairs persisted state, then persists the repaired form
    /// back. Never fails: a missing or corrupt store starts from defaults.
    pub fn bootstrap(
        platform: Platform,
        api: Box<dyn CompletionApi>,
        status: Box<dyn StatusSink>,
        prompt_source: &PromptSource,
    ) -> Self {
        let prompts = prompt_source.resolve();
        let mut settings = merge_settings(platform.storage.load_settings());
        if !platform.capabilities.system_ocr && settings.ocr_mode != OcrMode::Vision {
            settings.ocr_mode = OcrMode::Vision;
        }
        let api_key = platform.storage.load_api_key();
        if api_key.is_empty() {
            settings.model_options = Vec::new();
            settings.model = String::new();
        }

        let mut history = platform.storage.load_history();
        history.truncate(settings.history_limit);

        let mut app = Self {
            platform,
            api,
            status,
            prompts,
            settings,
            history,
            candidates: Vec::new(),
            api_key,
            busy: Arc::new(AtomicBool::new(false)),
        };

        // First run with a key: fill the model list quietly. A persisted
        // list is left alone, even when the selected model is not in it.
        if !app.api_key.is_empty() && app.settings.model_options.is_empty() {
            if let Ok(models) = app.api.list_models(&app.api_key) {
                if !models.is_empty() {
                    if !models.contains(&app.settings.model) {
                        app.settings.model = models[0].clone();
                    }
                    app.settings.model_options = models;
                }
            }
        }

        app.persist_settings_quietly();
        app
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn capabilities(&self) -> Capabilities {
        self.platform.capabilities
    }

    pub fn prompts(&self) -> &PromptConfig {
        &self.prompts
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn t(&self, key: &str) -> String {
        translate(self.settings.ui_language, key)
    }

    fn persist_settings(&self) -> Result<(), AppError> {
        self.platform.storage.save_settings(&self.settings)
    }

    fn persist_settings_quietly(&self) {
        if let Err(error) = self.persist_settings() {
            warn!("Failed to persist settings: {}", error);
        }
    }

    fn persist_history_quietly(&self) {
        if let Err(error) = self.platform.storage.save_history(&self.history) {
            warn!("Failed to persist history: {}", error);
        }
    }

    /// One generation run. Holds the single-flight flag for its whole
    /// duration; an overlapping call fails fast with `Busy`.
    pub fn process_input(&mut self, input: GenerationInput) -> Result<Vec<Candidate>, AppError> {
        let _guard = match BusyGuard::acquire(&self.busy) {
            Some(guard) => guard,
            None => {
                let error = AppError::Busy;
                self.status.update(Status::error(error.to_string()));
                return Err(error);
            }
        };
        self.generate(input)
    }

    fn generate(&mut self, input: GenerationInput) -> Result<Vec<Candidate>, AppError> {
        if self.api_key.is_empty() {
            self.status.update(Status::error(self.t("status.noApiKey")));
            return Err(AppError::MissingApiKey);
        }
        if self.settings.model.is_empty() {
            self.status.update(Status::error(self.t("status.noModel")));
            return Err(AppError::MissingModel);
        }

        let resolved = self.resolve_input(&input.text, input.image_base64.as_deref());
        if resolved.text.trim().is_empty() && !resolved.use_vision {
            self.status.update(Status::error(self.t("status.noContent")));
            return Err(AppError::NoContent);
        }

        let slots = self.settings.slots.clone();
        let styles = build_style_lines(&slots);
        let system_prompt = if resolved.use_vision {
            self.prompts.image_system.clone()
        } else {
            self.prompts.system.clone()
        };
        let placeholder = self.t("label.screenshotContent");
        let prompt_input = if resolved.text.is_empty() {
            placeholder.as_str()
        } else {
            resolved.text.as_str()
        };
        let user_prompt = render_prompt(&self.prompts.template, prompt_input, slots.len(), &styles);

        self.status.update(Status::working(self.t("status.generating")));
        let request = CompletionRequest {
            api_key: &self.api_key,
            model: &self.settings.model,
            system_prompt: &system_prompt,
            user_prompt: &user_prompt,
            image_base64: if resolved.use_vision {
                input.image_base64.as_deref()
            } else {
                None
            },
        };
        let response_text = match self.api.chat_completion(&request) {
            Ok(text) => text,
            Err(error) => {
                self.status.update(Status::error(error.to_string()));
                return Err(error);
            }
        };

        let parsed: serde_json::Value = match serde_json::from_str(&response_text) {
            Ok(value) => value,
            Err(_) => {
                self.status.update(Status::error(self.t("status.parseFailed")));
                return Err(AppError::ParseFailed);
            }
        };
        let items = match parsed.as_array() {
            Some(items) => items,
            None => {
                self.status.update(Status::error(self.t("status.parseFailed")));
                return Err(AppError::ParseFailed);
            }
        };

        let normalized = normalize_candidates(items, &slots);
        if normalized.is_empty() {
            self.status.update(Status::error(self.t("status.noCandidates")));
            return Err(AppError::NoCandidates);
        }

        self.candidates = normalized.clone();
        self.status.update(Status::success(self.t("status.candidatesReady")));

        let history_input = if !resolved.text.is_empty() {
            resolved.text
        } else if !input.text.is_empty() {
            input.text
        } else {
            placeholder
        };
        let entry = HistoryEntry::new(history_input, input.source, normalized.clone(), slots);
        prepend_entry(&mut self.history, entry, self.settings.history_limit);
        self.persist_history_quietly();

        Ok(normalized)
    }

    /// Decides what actually gets sent: recognized text, the image, or
    /// both pieces of the fallback chain depending on the OCR mode.
    fn resolve_input(&self, text: &str, image_base64: Option<&str>) -> ResolvedInput {
        let mut final_text = text.to_string();
        let mut use_vision = image_base64.is_some();
        if let Some(image) = image_base64 {
            if self.settings.ocr_mode != OcrMode::Vision {
                match self.run_system_ocr(image) {
                    Ok(ocr_text) => {
                        let trimmed = ocr_text.trim();
                        if !trimmed.is_empty() {
                            final_text = trimmed.to_string();
                            use_vision = false;
                        } else if self.settings.ocr_mode == OcrMode::System {
                            self.status.update(Status::working(self.t("status.ocrEmpty")));
                            use_vision = true;
                        }
                    }
                    Err(_) => {
                        if self.settings.ocr_mode == OcrMode::System {
                            self.status.update(Status::working(self.t("status.ocrUnavailable")));
                        } else {
                            self.status.update(Status::working(self.t("status.ocrFailed")));
                        }
                        use_vision = true;
                    }
                }
            }
        }
        ResolvedInput {
            text: final_text,
            use_vision,
        }
    }

    fn run_system_ocr(&self, image_base64: &str) -> Result<String, AppError> {
        if !self.platform.capabilities.system_ocr {
            return Err(AppError::Ocr("system OCR capability is not available".to_string()));
        }
        match &self.platform.ocr {
            Some(ocr) => ocr.system_ocr(image_base64),
            None => Err(AppError::Ocr("system OCR capability is not available".to_string())),
        }
    }

    pub fn manual_generate(&mut self, text: &str) -> Result<Vec<Candidate>, AppError> {
        if text.trim().is_empty() {
            self.status.update(Status::error(self.t("status.needInput")));
            return Err(AppError::NoContent);
        }
        self.process_input(GenerationInput {
            text: text.to_string(),
            image_base64: None,
            source: InputSource::Manual,
        })
    }

    pub fn image_generate(&mut self, image_base64: String) -> Result<Vec<Candidate>, AppError> {
        self.process_input(GenerationInput {
            text: String::new(),
            image_base64: Some(image_base64),
            source: InputSource::Image,
        })
    }

    /// Reads a PNG from disk and runs generation on it.
    pub fn image_generate_from_path(&mut self, path: &Path) -> Result<Vec<Candidate>, AppError> {
        self.status.update(Status::working(self.t("status.readingImage")));
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(error) => {
                self.status.update(Status::error(self.t("status.imageReadFailed")));
                return Err(AppError::Other(format!(
                    "could not read {}: {}",
                    path.display(),
                    error
                )));
            }
        };
        self.image_generate(STANDARD.encode(bytes))
    }

    pub fn capture_and_generate(&mut self) -> Result<Vec<Candidate>, AppError> {
        let capture = match (self.platform.capabilities.screenshot, &self.platform.capture) {
            (true, Some(capture)) => capture,
            _ => {
                self.status.update(Status::error(self.t("status.screenshotFailed")));
                return Err(AppError::Capture(
                    "screenshot capability is not available".to_string(),
                ));
            }
        };
        self.status.update(Status::working(self.t("status.waitingScreenshot")));
        let image = match capture.screenshot_to_base64() {
            Ok(image) => image,
            Err(error) => {
                self.status.update(Status::error(error.to_string()));
                return Err(error);
            }
        };
        self.process_input(GenerationInput {
            text: String::new(),
            image_base64: Some(image),
            source: InputSource::Screenshot,
        })
    }

    pub fn clipboard_generate(&mut self) -> Result<Vec<Candidate>, AppError> {
        self.status.update(Status::working(self.t("status.clipboardReading")));
        let text = match self.read_clipboard() {
            Ok(text) => text,
            Err(error) => {
                self.status.update(Status::error(error.to_string()));
                return Err(error);
            }
        };
        if text.trim().is_empty() {
            self.status.update(Status::error(self.t("status.clipboardEmpty")));
            return Err(AppError::NoContent);
        }
        self.process_input(GenerationInput {
            text,
            image_base64: None,
            source: InputSource::Clipboard,
        })
    }

    fn read_clipboard(&self) -> Result<String, AppError> {
        if !self.platform.capabilities.clipboard_read {
            return Err(AppError::Clipboard(self.t("status.clipboardFailed")));
        }
        self.platform.clipboard.read_text()
    }

    fn write_clipboard(&self, text: &str) -> Result<(), AppError> {
        if !self.platform.capabilities.clipboard_write {
            return Err(AppError::Clipboard(self.t("status.clipboardFailed")));
        }
        self.platform.clipboard.write_text(text)
    }

    pub fn copy_text(&self, text: &str) -> Result<(), AppError> {
        match self.write_clipboard(text) {
            Ok(()) => {
                self.status.update(Status::success(self.t("status.copied")));
                Ok(())
            }
            Err(error) => {
                self.status.update(Status::error(error.to_string()));
                Err(error)
            }
        }
    }

    /// Inserting is best effort. Hosts without the capability copy instead,
    /// and an insertion failure degrades to copy without becoming an error.
    pub fn insert_or_copy(&self, text: &str) -> Result<(), AppError> {
        let can_insert = self.platform.capabilities.insert_text;
        match (can_insert, &self.platform.insert) {
            (true, Some(insert)) => {
                self.status.update(Status::working(self.t("status.inserting")));
                match insert.insert_text(text) {
                    Ok(()) => {
                        self.status.update(Status::success(self.t("status.inserted")));
                        Ok(())
                    }
                    Err(_) => {
                        let _ = self.write_clipboard(text);
                        self.status.update(Status::error(self.t("status.insertFailedCopied")));
                        Ok(())
                    }
                }
            }
            _ => self.copy_text(text),
        }
    }

    /// Saves the key, then refreshes the model list against it. An empty
    /// key clears both the stored key and the model selection.
    pub fn set_api_key(&mut self, api_key: &str) -> Result<(), AppError> {
        self.platform.storage.save_api_key(api_key)?;
        self.api_key = api_key.trim().to_string();
        self.status.update(Status::success(self.t("status.apiKeySaved")));
        if self.api_key.is_empty() {
            self.settings.model_options = Vec::new();
            self.settings.model = String::new();
            return self.persist_settings();
        }
        // The key is saved either way; a failed refresh only leaves the
        // model list stale.
        let _ = self.refresh_models();
        Ok(())
    }

    pub fn refresh_models(&mut self) -> Result<Vec<String>, AppError> {
        if self.api_key.is_empty() {
            self.status.update(Status::error(self.t("status.noApiKey")));
            return Err(AppError::MissingApiKey);
        }
        let models = match self.api.list_models(&self.api_key) {
            Ok(models) => models,
            Err(error) => {
                self.status.update(Status::error(error.to_string()));
                return Err(error);
            }
        };
        if models.is_empty() {
            self.status.update(Status::error(self.t("status.modelsFailed")));
            return Err(AppError::Api(self.t("status.modelsFailed")));
        }
        if !models.contains(&self.settings.model) {
            self.settings.model = models[0].clone();
        }
        self.settings.model_options = models.clone();
        self.persist_settings()?;
        self.status.update(Status::success(self.t("status.modelsUpdated")));
        Ok(models)
    }

    pub fn set_model(&mut self, model: &str) -> Result<(), AppError> {
        self.settings.model = model.to_string();
        self.persist_settings()
    }

    pub fn set_ocr_mode(&mut self, mode: OcrMode) -> Result<(), AppError> {
        if mode != OcrMode::Vision && !self.platform.capabilities.system_ocr {
            return Err(AppError::Other(
                "system OCR is not available on this host".to_string(),
            ));
        }
        self.settings.ocr_mode = mode;
        self.persist_settings()
    }

    pub fn set_ui_language(&mut self, language: UiLanguage) -> Result<(), AppError> {
        self.settings.ui_language = language;
        self.persist_settings()
    }

    /// Lowering the limit truncates the ledger immediately.
    pub fn set_history_limit(&mut self, limit: usize) -> Result<(), AppError> {
        if limit < 1 {
            return Err(AppError::Other("history limit must be at least 1".to_string()));
        }
        self.settings.history_limit = limit;
        if self.history.len() > limit {
            self.history.truncate(limit);
            self.persist_history_quietly();
        }
        self.persist_settings()
    }

    pub fn set_hotkey(&mut self, hotkey: &str) -> Result<String, AppError> {
        let validation = validate_hotkey_format(hotkey);
        if !validation.valid {
            return Err(AppError::Other(
                validation.error.unwrap_or_else(|| "invalid hotkey".to_string()),
            ));
        }
        let formatted = validation.formatted.unwrap_or_else(|| hotkey.to_string());
        self.settings.hotkey = formatted.clone();
        self.persist_settings()?;
        Ok(formatted)
    }

    pub fn add_slot(&mut self) -> Result<String, AppError> {
        let label = self.t("label.slot");
        let id = settings::add_slot(&mut self.settings, &label)?;
        self.persist_settings()?;
        Ok(id)
    }

    pub fn remove_slot(&mut self, slot_id: &str) -> Result<(), AppError> {
        settings::remove_slot(&mut self.settings, slot_id)?;
        self.persist_settings()
    }

    pub fn update_slot(&mut self, slot_id: &str, update: SlotUpdate) -> Result<(), AppError> {
        settings::update_slot(&mut self.settings, slot_id, update)?;
        self.persist_settings()
    }

    pub fn clear_history(&mut self) -> Result<(), AppError> {
        self.history.clear();
        self.platform.storage.save_history(&self.history)
    }

    pub fn remove_history_entry(&mut self, id: &str) -> Result<bool, AppError> {
        let removed = remove_entry(&mut self.history, id);
        if removed {
            self.platform.storage.save_history(&self.history)?;
        }
        Ok(removed)
    }
}

/// `id` falls back to the slot at the same position, `text` is coerced to a
/// string and trimmed, and empty candidates are dropped.
pub(crate) fn normalize_candidates(items: &[serde_json::Value], slots: &[Slot]) -> Vec<Candidate> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let id = item["id"]
                .as_str()
                .filter(|id| !id.is_empty())
                .map(|id| id.to_string())
                .unwrap_or_else(|| {
                    slots
                        .get(index)
                        .map(|slot| slot.id.clone())
                        .unwrap_or_else(|| format!("slot{}", index + 1))
                });
            let text = match &item["text"] {
                serde_json::Value::String(text) => text.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            Candidate {
                id,
                text: text.trim().to_string(),
            }
        })
        .filter(|candidate| !candidate.text.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Capture, ClipboardAccess, InsertText, Ocr, Storage};
    use crate::settings::{StoredSettings, UiLanguage};
    use crate::status::StatusState;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct MemoryStorage(Rc<MemoryStorageInner>);

    #[derive(Default)]
    struct MemoryStorageInner {
        settings: RefCell<Option<StoredSettings>>,
        saved_settings: RefCell<Option<Settings>>,
        history: RefCell<Vec<HistoryEntry>>,
        api_key: RefCell<String>,
    }

    impl MemoryStorage {
        fn with_settings(settings: StoredSettings) -> Self {
            let storage = Self::default();
            *storage.0.settings.borrow_mut() = Some(settings);
            storage
        }

        fn set_api_key(&self, key: &str) {
            *self.0.api_key.borrow_mut() = key.to_string();
        }

        fn saved_settings(&self) -> Option<Settings> {
            self.0.saved_settings.borrow().clone()
        }

        fn saved_history(&self) -> Vec<HistoryEntry> {
            self.0.history.borrow().clone()
        }
    }

    impl Storage for MemoryStorage {
        fn load_settings(&self) -> Option<StoredSettings> {
            self.0.settings.borrow().clone()
        }

        fn save_settings(&self, settings: &Settings) -> Result<(), AppError> {
            *self.0.saved_settings.borrow_mut() = Some(settings.clone());
            Ok(())
        }

        fn load_history(&self) -> Vec<HistoryEntry> {
            self.0.history.borrow().clone()
        }

        fn save_history(&self, history: &[HistoryEntry]) -> Result<(), AppError> {
            *self.0.history.borrow_mut() = history.to_vec();
            Ok(())
        }

        fn load_api_key(&self) -> String {
            self.0.api_key.borrow().clone()
        }

        fn save_api_key(&self, api_key: &str) -> Result<(), AppError> {
            *self.0.api_key.borrow_mut() = api_key.to_string();
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct MockApi(Rc<MockApiInner>);

    struct MockApiInner {
        completion: RefCell<Result<String, AppError>>,
        models: RefCell<Result<Vec<String>, AppError>>,
        completion_calls: Cell<usize>,
        model_calls: Cell<usize>,
        last_had_image: Cell<bool>,
        last_system: RefCell<String>,
        last_user: RefCell<String>,
    }

    impl Default for MockApiInner {
        fn default() -> Self {
            Self {
                completion: RefCell::new(Ok(String::new())),
                models: RefCell::new(Ok(Vec::new())),
                completion_calls: Cell::new(0),
                model_calls: Cell::new(0),
                last_had_image: Cell::new(false),
                last_system: RefCell::new(String::new()),
                last_user: RefCell::new(String::new()),
            }
        }
    }

    impl MockApi {
        fn completing_with(response: &str) -> Self {
            let api = Self::default();
            *api.0.completion.borrow_mut() = Ok(response.to_string());
            api
        }

        fn failing_with(error: AppError) -> Self {
            let api = Self::default();
            *api.0.completion.borrow_mut() = Err(error);
            api
        }

        fn with_models(self, models: &[&str]) -> Self {
            *self.0.models.borrow_mut() = Ok(models.iter().map(|m| m.to_string()).collect());
            self
        }
    }

    impl CompletionApi for MockApi {
        fn chat_completion(&self, request: &CompletionRequest) -> Result<String, AppError> {
            self.0.completion_calls.set(self.0.completion_calls.get() + 1);
            self.0.last_had_image.set(request.image_base64.is_some());
            *self.0.last_system.borrow_mut() = request.system_prompt.to_string();
            *self.0.last_user.borrow_mut() = request.user_prompt.to_string();
            self.0.completion.borrow().clone()
        }

        fn list_models(&self, _api_key: &str) -> Result<Vec<String>, AppError> {
            self.0.model_calls.set(self.0.model_calls.get() + 1);
            self.0.models.borrow().clone()
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink(Rc<RefCell<Vec<Status>>>);

    impl StatusSink for RecordingSink {
        fn update(&self, status: Status) {
            self.0.borrow_mut().push(status);
        }
    }

    impl RecordingSink {
        fn messages(&self) -> Vec<String> {
            self.0.borrow().iter().map(|s| s.message.clone()).collect()
        }

        fn last(&self) -> Option<Status> {
            self.0.borrow().last().cloned()
        }
    }

    #[derive(Clone)]
    enum OcrBehavior {
        Text(String),
        Fail,
    }

    #[derive(Clone)]
    struct MockOcr {
        behavior: OcrBehavior,
        calls: Rc<Cell<usize>>,
    }

    impl MockOcr {
        fn returning(text: &str) -> Self {
            Self {
                behavior: OcrBehavior::Text(text.to_string()),
                calls: Rc::new(Cell::new(0)),
            }
        }

        fn failing() -> Self {
            Self {
                behavior: OcrBehavior::Fail,
                calls: Rc::new(Cell::new(0)),
            }
        }
    }

    impl Ocr for MockOcr {
        fn system_ocr(&self, _image_base64: &str) -> Result<String, AppError> {
            self.calls.set(self.calls.get() + 1);
            match &self.behavior {
                OcrBehavior::Text(text) => Ok(text.clone()),
                OcrBehavior::Fail => Err(AppError::Ocr("no recognizer".to_string())),
            }
        }
    }

    #[derive(Clone, Default)]
    struct MockClipboard {
        text: Rc<RefCell<String>>,
        written: Rc<RefCell<Vec<String>>>,
    }

    impl ClipboardAccess for MockClipboard {
        fn read_text(&self) -> Result<String, AppError> {
            Ok(self.text.borrow().clone())
        }

        fn write_text(&self, text: &str) -> Result<(), AppError> {
            self.written.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    struct MockCapture {
        image: String,
    }

    impl Capture for MockCapture {
        fn screenshot_to_base64(&self) -> Result<String, AppError> {
            Ok(self.image.clone())
        }
    }

    struct FailingInserter;

    impl InsertText for FailingInserter {
        fn insert_text(&self, _text: &str) -> Result<(), AppError> {
            Err(AppError::Insert("no focused control".to_string()))
        }
    }

    struct Harness {
        storage: MemoryStorage,
        api: MockApi,
        sink: RecordingSink,
        clipboard: MockClipboard,
        ocr_calls: Rc<Cell<usize>>,
    }

    fn caps(system_ocr: bool) -> Capabilities {
        Capabilities {
            hotkey: false,
            screenshot: true,
            system_ocr,
            insert_text: false,
            clipboard_read: true,
            clipboard_write: true,
        }
    }

    fn build_app(
        stored: Option<StoredSettings>,
        api_key: &str,
        api: MockApi,
        ocr: Option<MockOcr>,
        capabilities: Capabilities,
    ) -> (App, Harness) {
        let storage = match stored {
            Some(stored) => MemoryStorage::with_settings(stored),
            None => MemoryStorage::default(),
        };
        storage.set_api_key(api_key);
        let sink = RecordingSink::default();
        let clipboard = MockClipboard::default();
        let ocr_calls = ocr
            .as_ref()
            .map(|o| o.calls.clone())
            .unwrap_or_else(|| Rc::new(Cell::new(0)));
        let platform = Platform {
            capabilities,
            storage: Box::new(storage.clone()),
            clipboard: Box::new(clipboard.clone()),
            capture: Some(Box::new(MockCapture {
                image: "UE5H".to_string(),
            })),
            ocr: ocr.map(|o| Box::new(o) as Box<dyn Ocr>),
            insert: None,
        };
        let app = App::bootstrap(
            platform,
            Box::new(api.clone()),
            Box::new(sink.clone()),
            &PromptSource::Builtin,
        );
        (
            app,
            Harness {
                storage,
                api,
                sink,
                clipboard,
                ocr_calls,
            },
        )
    }

    fn ready_settings() -> StoredSettings {
        serde_json::from_value(json!({
            "model": "gpt-4o-mini",
            "modelOptions": ["gpt-4o-mini", "gpt-4o"],
            "ocrMode": "vision",
            "uiLanguage": "en"
        }))
        .unwrap()
    }

    // --- bootstrap ---

    #[test]
    fn bootstrap_without_store_starts_from_defaults() {
        let (app, harness) = build_app(None, "", MockApi::default(), None, caps(false));
        assert!(!app.settings().slots.is_empty());
        assert!(app.history().is_empty());
        assert!(!app.has_api_key());
        // The repaired settings are persisted back.
        assert!(harness.storage.saved_settings().is_some());
    }

    #[test]
    fn bootstrap_forces_vision_when_host_lacks_ocr() {
        let stored: StoredSettings =
            serde_json::from_value(json!({ "ocrMode": "system" })).unwrap();
        let (app, _harness) = build_app(Some(stored), "", MockApi::default(), None, caps(false));
        assert_eq!(app.settings().ocr_mode, OcrMode::Vision);
    }

    #[test]
    fn bootstrap_keeps_system_mode_when_host_has_ocr() {
        let stored: StoredSettings =
            serde_json::from_value(json!({ "ocrMode": "system" })).unwrap();
        let (app, _harness) = build_app(
            Some(stored),
            "",
            MockApi::default(),
            Some(MockOcr::returning("x")),
            caps(true),
        );
        assert_eq!(app.settings().ocr_mode, OcrMode::System);
    }

    #[test]
    fn bootstrap_preserves_stale_model_when_options_exist() {
        let stored: StoredSettings = serde_json::from_value(json!({
            "model": "retired-model",
            "modelOptions": ["gpt-4o-mini", "gpt-4o"]
        }))
        .unwrap();
        let api = MockApi::default().with_models(&["gpt-4o"]);
        let (app, harness) = build_app(Some(stored), "sk-test", api, None, caps(false));
        assert_eq!(app.settings().model, "retired-model");
        assert_eq!(harness.api.0.model_calls.get(), 0);
    }

    #[test]
    fn bootstrap_fills_empty_model_options_once() {
        let api = MockApi::default().with_models(&["gpt-4o", "gpt-4o-mini"]);
        let (app, harness) = build_app(None, "sk-test", api, None, caps(false));
        assert_eq!(harness.api.0.model_calls.get(), 1);
        assert_eq!(app.settings().model, "gpt-4o");
        assert_eq!(app.settings().model_options.len(), 2);
    }

    #[test]
    fn bootstrap_without_key_clears_model_selection() {
        let stored: StoredSettings = serde_json::from_value(json!({
            "model": "gpt-4o",
            "modelOptions": ["gpt-4o"]
        }))
        .unwrap();
        let (app, _harness) = build_app(Some(stored), "", MockApi::default(), None, caps(false));
        assert!(app.settings().model.is_empty());
        assert!(app.settings().model_options.is_empty());
    }

    #[test]
    fn bootstrap_truncates_history_to_limit() {
        let storage = MemoryStorage::with_settings(
            serde_json::from_value(json!({ "historyLimit": 2 })).unwrap(),
        );
        let entries: Vec<HistoryEntry> = (0..5)
            .map(|n| {
                HistoryEntry::new(format!("e{}", n), InputSource::Manual, Vec::new(), Vec::new())
            })
            .collect();
        storage.save_history(&entries).unwrap();
        let platform = Platform {
            capabilities: caps(false),
            storage: Box::new(storage.clone()),
            clipboard: Box::new(MockClipboard::default()),
            capture: None,
            ocr: None,
            insert: None,
        };
        let app = App::bootstrap(
            platform,
            Box::new(MockApi::default()),
            Box::new(RecordingSink::default()),
            &PromptSource::Builtin,
        );
        assert_eq!(app.history().len(), 2);
    }

    // --- preconditions ---

    #[test]
    fn generation_requires_api_key_before_any_call() {
        let (mut app, harness) =
            build_app(Some(ready_settings()), "", MockApi::default(), None, caps(false));
        let error = app.manual_generate("hello").unwrap_err();
        assert_eq!(error, AppError::MissingApiKey);
        assert_eq!(harness.api.0.completion_calls.get(), 0);
    }

    #[test]
    fn generation_requires_model() {
        let stored: StoredSettings =
            serde_json::from_value(json!({ "uiLanguage": "en" })).unwrap();
        let (mut app, harness) =
            build_app(Some(stored), "sk-test", MockApi::default(), None, caps(false));
        let error = app.manual_generate("hello").unwrap_err();
        assert_eq!(error, AppError::MissingModel);
        assert_eq!(harness.api.0.completion_calls.get(), 0);
    }

    #[test]
    fn blank_manual_input_is_rejected() {
        let (mut app, harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            MockApi::default(),
            None,
            caps(false),
        );
        let error = app.manual_generate("   ").unwrap_err();
        assert_eq!(error, AppError::NoContent);
        assert_eq!(harness.api.0.completion_calls.get(), 0);
    }

    // --- OCR resolution ---

    fn two_slot_settings(ocr_mode: &str) -> StoredSettings {
        serde_json::from_value(json!({
            "model": "gpt-4o-mini",
            "modelOptions": ["gpt-4o-mini"],
            "ocrMode": ocr_mode,
            "uiLanguage": "en",
            "slots": [
                {"id": "slot1", "name": "正式", "toneClass": "formal", "language": "zh", "length": "medium", "emailFormat": true},
                {"id": "slot2", "name": "简短", "toneClass": "concise", "language": "en", "length": "short", "emailFormat": false}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn vision_mode_never_invokes_ocr() {
        let api = MockApi::completing_with(r#"[{"id":"slot1","text":"ok"}]"#);
        let (mut app, harness) = build_app(
            Some(two_slot_settings("vision")),
            "sk-test",
            api,
            Some(MockOcr::returning("should not be used")),
            caps(true),
        );
        app.image_generate("UE5H".to_string()).unwrap();
        assert_eq!(harness.ocr_calls.get(), 0);
        assert!(harness.api.0.last_had_image.get());
    }

    #[test]
    fn successful_ocr_sends_text_without_image() {
        let api = MockApi::completing_with(r#"[{"id":"slot1","text":"ok"}]"#);
        let (mut app, harness) = build_app(
            Some(two_slot_settings("system")),
            "sk-test",
            api,
            Some(MockOcr::returning("  recognized line  ")),
            caps(true),
        );
        app.image_generate("UE5H".to_string()).unwrap();
        assert_eq!(harness.ocr_calls.get(), 1);
        assert!(!harness.api.0.last_had_image.get());
        assert!(harness.api.0.last_user.borrow().contains("recognized line"));
        // The history entry records the recognized text, not the placeholder.
        assert_eq!(app.history()[0].input, "recognized line");
    }

    #[test]
    fn empty_ocr_in_system_mode_falls_back_to_vision_with_notice() {
        let api = MockApi::completing_with(r#"[{"id":"slot1","text":"ok"}]"#);
        let (mut app, harness) = build_app(
            Some(two_slot_settings("system")),
            "sk-test",
            api,
            Some(MockOcr::returning("   ")),
            caps(true),
        );
        app.image_generate("UE5H".to_string()).unwrap();
        assert!(harness.api.0.last_had_image.get());
        let messages = harness.sink.messages();
        assert!(messages
            .iter()
            .any(|m| m == "System OCR returned no text, continuing with the vision model"));
        // The placeholder stands in for the missing text.
        assert!(harness.api.0.last_user.borrow().contains("[screenshot content]"));
        assert_eq!(app.history()[0].input, "[screenshot content]");
    }

    #[test]
    fn failed_ocr_falls_back_to_vision_in_both_modes() {
        for (mode, notice) in [
            ("system", "System OCR unavailable, continuing with the vision model"),
            (
                "system_fallback_vision",
                "System OCR failed, continuing with the vision model",
            ),
        ] {
            let api = MockApi::completing_with(r#"[{"id":"slot1","text":"ok"}]"#);
            let (mut app, harness) = build_app(
                Some(two_slot_settings(mode)),
                "sk-test",
                api,
                Some(MockOcr::failing()),
                caps(true),
            );
            app.image_generate("UE5H".to_string()).unwrap();
            assert!(harness.api.0.last_had_image.get());
            assert!(harness.sink.messages().iter().any(|m| m == notice));
        }
    }

    #[test]
    fn absent_ocr_capability_behaves_like_a_failing_recognizer() {
        let api = MockApi::completing_with(r#"[{"id":"slot1","text":"ok"}]"#);
        // Capability flag set but no handle installed.
        let (mut app, harness) = build_app(
            Some(two_slot_settings("system")),
            "sk-test",
            api,
            None,
            caps(true),
        );
        app.image_generate("UE5H".to_string()).unwrap();
        assert!(harness.api.0.last_had_image.get());
        assert!(harness
            .sink
            .messages()
            .iter()
            .any(|m| m == "System OCR unavailable, continuing with the vision model"));
    }

    #[test]
    fn vision_requests_use_the_image_instruction_variant() {
        let api = MockApi::completing_with(r#"[{"id":"slot1","text":"ok"}]"#);
        let (mut app, harness) = build_app(
            Some(two_slot_settings("vision")),
            "sk-test",
            api,
            None,
            caps(false),
        );
        app.image_generate("UE5H".to_string()).unwrap();
        assert_eq!(
            harness.api.0.last_system.borrow().as_str(),
            crate::prompt::IMAGE_SYSTEM_PROMPT
        );

        // A recognized-text run goes back to the plain variant.
        let api = MockApi::completing_with(r#"[{"id":"slot1","text":"ok"}]"#);
        let (mut app, harness) = build_app(
            Some(two_slot_settings("system")),
            "sk-test",
            api,
            Some(MockOcr::returning("text")),
            caps(true),
        );
        app.image_generate("UE5H".to_string()).unwrap();
        assert_eq!(
            harness.api.0.last_system.borrow().as_str(),
            crate::prompt::SYSTEM_PROMPT
        );
    }

    // --- response validation ---

    #[test]
    fn non_json_response_fails_parse_and_leaves_state_alone() {
        let api = MockApi::completing_with("I refuse to answer in JSON");
        let (mut app, harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            api,
            None,
            caps(false),
        );
        let error = app.manual_generate("hello").unwrap_err();
        assert_eq!(error, AppError::ParseFailed);
        assert!(app.history().is_empty());
        assert!(app.candidates().is_empty());
        assert_eq!(
            harness.sink.last().unwrap().message,
            "Could not parse the response, adjust the prompt template"
        );
    }

    #[test]
    fn non_array_json_response_fails_parse() {
        let api = MockApi::completing_with(r#"{"id": "slot1", "text": "not wrapped"}"#);
        let (mut app, _harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            api,
            None,
            caps(false),
        );
        assert_eq!(app.manual_generate("hello").unwrap_err(), AppError::ParseFailed);
    }

    #[test]
    fn whitespace_only_candidates_produce_no_candidates_error() {
        let api = MockApi::completing_with(r#"[{"id":"slot1","text":"   "}, {"id":"slot2"}]"#);
        let (mut app, _harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            api,
            None,
            caps(false),
        );
        let error = app.manual_generate("hello").unwrap_err();
        assert_eq!(error, AppError::NoCandidates);
        assert!(app.history().is_empty());
    }

    #[test]
    fn failed_run_keeps_previous_candidates() {
        let api = MockApi::completing_with(r#"[{"id":"slot1","text":"first run"}]"#);
        let (mut app, harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            api,
            None,
            caps(false),
        );
        app.manual_generate("hello").unwrap();
        assert_eq!(app.candidates().len(), 1);

        *harness.api.0.completion.borrow_mut() = Ok("garbage".to_string());
        assert!(app.manual_generate("again").is_err());
        assert_eq!(app.candidates()[0].text, "first run");
        assert_eq!(app.history().len(), 1);
    }

    #[test]
    fn transport_errors_surface_the_server_body() {
        let api = MockApi::failing_with(AppError::Api("quota exceeded".to_string()));
        let (mut app, harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            api,
            None,
            caps(false),
        );
        let error = app.manual_generate("hello").unwrap_err();
        assert_eq!(error, AppError::Api("quota exceeded".to_string()));
        assert!(harness
            .sink
            .last()
            .unwrap()
            .message
            .contains("quota exceeded"));
    }

    // --- normalization ---

    #[test]
    fn candidate_ids_fall_back_positionally_then_synthetically() {
        let slots = crate::settings::default_slots();
        let items = vec![
            json!({"text": "a"}),
            json!({"id": "", "text": "b"}),
            json!({"text": "c"}),
            json!({"text": "d"}),
        ];
        let normalized = normalize_candidates(&items, &slots);
        assert_eq!(normalized[0].id, "slot1");
        assert_eq!(normalized[1].id, "slot2");
        assert_eq!(normalized[2].id, "slot3");
        assert_eq!(normalized[3].id, "slot4");
    }

    #[test]
    fn candidate_text_is_coerced_and_trimmed() {
        let slots = crate::settings::default_slots();
        let items = vec![
            json!({"id": "a", "text": 42}),
            json!({"id": "b", "text": "  padded  "}),
            json!({"id": "c", "text": null}),
            json!({"id": "d"}),
        ];
        let normalized = normalize_candidates(&items, &slots);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].text, "42");
        assert_eq!(normalized[1].text, "padded");
    }

    // --- the full happy path ---

    #[test]
    fn manual_generation_end_to_end() {
        let api = MockApi::completing_with(
            r#"[{"id":"slot1","text":"已确认会议时间。"},{"id":"slot2","text":"Confirmed."}]"#,
        );
        let (mut app, harness) = build_app(
            Some(two_slot_settings("vision")),
            "sk-test",
            api,
            None,
            caps(false),
        );
        let candidates = app.manual_generate("明天的会议定在几点？").unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].text, "已确认会议时间。");
        assert_eq!(candidates[1].id, "slot2");

        // Styles and input both land in the rendered user prompt.
        let user = harness.api.0.last_user.borrow().clone();
        assert!(user.contains("明天的会议定在几点？"));
        assert!(user.contains("slot1: tone=Formal, language=Chinese"));
        assert!(user.contains("slot2: tone=Concise, language=English"));

        // History holds a snapshot and was persisted.
        assert_eq!(app.history().len(), 1);
        assert_eq!(app.history()[0].source, InputSource::Manual);
        assert_eq!(app.history()[0].slots.len(), 2);
        assert_eq!(harness.storage.saved_history().len(), 1);

        // Status ran working -> success.
        let statuses = harness.sink.0.borrow();
        let states: Vec<StatusState> = statuses.iter().map(|s| s.state).collect();
        assert!(states.contains(&StatusState::Working));
        assert_eq!(statuses.last().unwrap().state, StatusState::Success);
    }

    #[test]
    fn ledger_at_capacity_drops_the_oldest_entry() {
        let mut stored = two_slot_settings("vision");
        stored.history_limit = Some(2);
        let api = MockApi::completing_with(r#"[{"id":"slot1","text":"reply"}]"#);
        let (mut app, _harness) = build_app(Some(stored), "sk-test", api, None, caps(false));

        app.manual_generate("first").unwrap();
        app.manual_generate("second").unwrap();
        app.manual_generate("third").unwrap();
        assert_eq!(app.history().len(), 2);
        assert_eq!(app.history()[0].input, "third");
        assert_eq!(app.history()[1].input, "second");
    }

    #[test]
    fn later_slot_edits_do_not_rewrite_history_snapshots() {
        let api = MockApi::completing_with(r#"[{"id":"slot1","text":"reply"}]"#);
        let (mut app, _harness) = build_app(
            Some(two_slot_settings("vision")),
            "sk-test",
            api,
            None,
            caps(false),
        );
        app.manual_generate("hello").unwrap();
        let before = app.history()[0].slots[0].name.clone();
        app.remove_slot("slot2").unwrap();
        assert_eq!(app.history()[0].slots.len(), 2);
        assert_eq!(app.history()[0].slots[0].name, before);
    }

    // --- busy guard ---

    #[test]
    fn overlapping_runs_are_rejected() {
        let api = MockApi::completing_with(r#"[{"id":"slot1","text":"ok"}]"#);
        let (mut app, _harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            api,
            None,
            caps(false),
        );
        app.busy.store(true, Ordering::Release);
        let error = app.manual_generate("hello").unwrap_err();
        assert_eq!(error, AppError::Busy);
        assert!(app.history().is_empty());

        app.busy.store(false, Ordering::Release);
        app.manual_generate("hello").unwrap();
        assert_eq!(app.history().len(), 1);
    }

    #[test]
    fn busy_flag_releases_after_success_and_failure() {
        let api = MockApi::completing_with("garbage");
        let (mut app, harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            api,
            None,
            caps(false),
        );
        assert!(app.manual_generate("hello").is_err());
        assert!(!app.busy.load(Ordering::Acquire));

        *harness.api.0.completion.borrow_mut() = Ok(r#"[{"id":"slot1","text":"ok"}]"#.to_string());
        app.manual_generate("hello").unwrap();
        assert!(!app.busy.load(Ordering::Acquire));
    }

    // --- clipboard and insertion ---

    #[test]
    fn clipboard_generation_uses_clipboard_text() {
        let api = MockApi::completing_with(r#"[{"id":"slot1","text":"ok"}]"#);
        let (mut app, harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            api,
            None,
            caps(false),
        );
        *harness.clipboard.text.borrow_mut() = "pasted question".to_string();
        app.clipboard_generate().unwrap();
        assert_eq!(app.history()[0].source, InputSource::Clipboard);
        assert_eq!(app.history()[0].input, "pasted question");
    }

    #[test]
    fn empty_clipboard_is_reported_without_a_call() {
        let (mut app, harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            MockApi::default(),
            None,
            caps(false),
        );
        let error = app.clipboard_generate().unwrap_err();
        assert_eq!(error, AppError::NoContent);
        assert_eq!(harness.api.0.completion_calls.get(), 0);
        assert_eq!(harness.sink.last().unwrap().message, "Clipboard has no text");
    }

    #[test]
    fn image_file_generation_reads_and_encodes() {
        let api = MockApi::completing_with(r#"[{"id":"slot1","text":"ok"}]"#);
        let (mut app, harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            api,
            None,
            caps(false),
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, b"fake png bytes").unwrap();
        app.image_generate_from_path(&path).unwrap();
        assert!(harness.api.0.last_had_image.get());
        assert_eq!(app.history()[0].source, InputSource::Image);
    }

    #[test]
    fn unreadable_image_file_reports_before_any_call() {
        let (mut app, harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            MockApi::default(),
            None,
            caps(false),
        );
        let error = app
            .image_generate_from_path(Path::new("/definitely/not/here.png"))
            .unwrap_err();
        assert!(matches!(error, AppError::Other(_)));
        assert_eq!(harness.api.0.completion_calls.get(), 0);
        assert_eq!(harness.sink.last().unwrap().message, "Could not read the image");
    }

    #[test]
    fn slot_edits_persist_and_validate() {
        let (mut app, harness) = build_app(
            Some(ready_settings()),
            "",
            MockApi::default(),
            None,
            caps(false),
        );
        app.update_slot(
            "slot2",
            SlotUpdate {
                tone_class: Some("friendly".to_string()),
                ..SlotUpdate::default()
            },
        )
        .unwrap();
        assert_eq!(app.settings().slots[1].tone_class, "friendly");
        assert_eq!(
            harness.storage.saved_settings().unwrap().slots[1].tone_class,
            "friendly"
        );

        let bad = app.update_slot(
            "slot2",
            SlotUpdate {
                length: Some("epic".to_string()),
                ..SlotUpdate::default()
            },
        );
        assert!(bad.is_err());
    }

    #[test]
    fn capture_generation_tags_the_screenshot_source() {
        let api = MockApi::completing_with(r#"[{"id":"slot1","text":"ok"}]"#);
        let (mut app, _harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            api,
            None,
            caps(false),
        );
        app.capture_and_generate().unwrap();
        assert_eq!(app.history()[0].source, InputSource::Screenshot);
    }

    #[test]
    fn insert_without_capability_copies_instead() {
        let (app, harness) = build_app(
            Some(ready_settings()),
            "",
            MockApi::default(),
            None,
            caps(false),
        );
        app.insert_or_copy("chosen reply").unwrap();
        assert_eq!(harness.clipboard.written.borrow().as_slice(), ["chosen reply"]);
        assert_eq!(harness.sink.last().unwrap().message, "Copied to clipboard");
    }

    #[test]
    fn failed_insert_copies_and_reports_without_erroring() {
        let storage = MemoryStorage::default();
        let sink = RecordingSink::default();
        let clipboard = MockClipboard::default();
        let mut capabilities = caps(false);
        capabilities.insert_text = true;
        let platform = Platform {
            capabilities,
            storage: Box::new(storage),
            clipboard: Box::new(clipboard.clone()),
            capture: None,
            ocr: None,
            insert: Some(Box::new(FailingInserter)),
        };
        let app = App::bootstrap(
            platform,
            Box::new(MockApi::default()),
            Box::new(sink.clone()),
            &PromptSource::Builtin,
        );
        app.insert_or_copy("reply").unwrap();
        assert_eq!(clipboard.written.borrow().as_slice(), ["reply"]);
        assert_eq!(
            sink.last().unwrap().message,
            "Insert failed, copied to clipboard instead"
        );
    }

    // --- key and model management ---

    #[test]
    fn saving_a_key_refreshes_models_and_keeps_a_member_selection() {
        let api = MockApi::default().with_models(&["gpt-4o", "gpt-4o-mini"]);
        let (mut app, harness) = build_app(
            Some(ready_settings()),
            "sk-old",
            api,
            None,
            caps(false),
        );
        app.set_api_key("sk-new").unwrap();
        assert_eq!(app.settings().model, "gpt-4o-mini");
        assert_eq!(app.settings().model_options, vec!["gpt-4o", "gpt-4o-mini"]);
        assert_eq!(harness.storage.0.api_key.borrow().as_str(), "sk-new");
    }

    #[test]
    fn saving_a_key_picks_the_first_model_when_selection_vanishes() {
        let stored: StoredSettings = serde_json::from_value(json!({
            "model": "gone-model",
            "modelOptions": ["gone-model"],
            "uiLanguage": "en"
        }))
        .unwrap();
        let api = MockApi::default().with_models(&["gpt-4o"]);
        let (mut app, _harness) = build_app(Some(stored), "sk-old", api, None, caps(false));
        app.set_api_key("sk-new").unwrap();
        assert_eq!(app.settings().model, "gpt-4o");
    }

    #[test]
    fn clearing_the_key_clears_model_state() {
        let (mut app, harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            MockApi::default(),
            None,
            caps(false),
        );
        app.set_api_key("").unwrap();
        assert!(!app.has_api_key());
        assert!(app.settings().model.is_empty());
        assert!(app.settings().model_options.is_empty());
        assert!(harness.storage.0.api_key.borrow().is_empty());
    }

    #[test]
    fn model_refresh_with_empty_result_is_an_error() {
        let api = MockApi::default().with_models(&[]);
        let (mut app, _harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            api,
            None,
            caps(false),
        );
        assert!(app.refresh_models().is_err());
    }

    // --- settings operations ---

    #[test]
    fn lowering_the_history_limit_truncates_immediately() {
        let api = MockApi::completing_with(r#"[{"id":"slot1","text":"ok"}]"#);
        let (mut app, harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            api,
            None,
            caps(false),
        );
        for n in 0..4 {
            app.manual_generate(&format!("m{}", n)).unwrap();
        }
        app.set_history_limit(2).unwrap();
        assert_eq!(app.history().len(), 2);
        assert_eq!(harness.storage.saved_history().len(), 2);
        assert!(app.set_history_limit(0).is_err());
    }

    #[test]
    fn hotkey_updates_go_through_validation() {
        let (mut app, _harness) = build_app(
            Some(ready_settings()),
            "",
            MockApi::default(),
            None,
            caps(false),
        );
        let formatted = app.set_hotkey("ctrl+shift+r").unwrap();
        assert_eq!(formatted, "Ctrl+Shift+R");
        assert_eq!(app.settings().hotkey, "Ctrl+Shift+R");
        assert!(app.set_hotkey("R").is_err());
    }

    #[test]
    fn added_slots_use_the_localized_label() {
        let stored: StoredSettings =
            serde_json::from_value(json!({ "uiLanguage": "zh" })).unwrap();
        let (mut app, _harness) = build_app(Some(stored), "", MockApi::default(), None, caps(false));
        let id = app.add_slot().unwrap();
        assert_eq!(id, "slot4");
        assert_eq!(app.settings().slots.last().unwrap().name, "风格 4");
        assert_eq!(app.settings().ui_language, UiLanguage::Zh);
    }

    #[test]
    fn ocr_mode_cannot_leave_vision_without_the_capability() {
        let (mut app, _harness) = build_app(
            Some(ready_settings()),
            "",
            MockApi::default(),
            None,
            caps(false),
        );
        assert!(app.set_ocr_mode(OcrMode::System).is_err());
        assert!(app.set_ocr_mode(OcrMode::Vision).is_ok());
    }

    #[test]
    fn history_remove_and_clear_persist() {
        let api = MockApi::completing_with(r#"[{"id":"slot1","text":"ok"}]"#);
        let (mut app, harness) = build_app(
            Some(ready_settings()),
            "sk-test",
            api,
            None,
            caps(false),
        );
        app.manual_generate("one").unwrap();
        app.manual_generate("two").unwrap();
        let id = app.history()[1].id.clone();
        assert!(app.remove_history_entry(&id).unwrap());
        assert!(!app.remove_history_entry(&id).unwrap());
        assert_eq!(harness.storage.saved_history().len(), 1);

        app.clear_history().unwrap();
        assert!(app.history().is_empty());
        assert!(harness.storage.saved_history().is_empty());
    }
}
