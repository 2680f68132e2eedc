pub mod config;
pub mod decode;
pub mod error;
pub mod paginator;
pub mod reader;
pub mod seek_index;

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

pub use config::ReaderConfig;
pub use decode::LineDecoder;
pub use error::ReaderError;
pub use paginator::{parse_page_input, total_pages, PageLayout, Paginator};
pub use reader::{BookProvider, FileFingerprint, FsBookProvider, LineRead, LineReader};
pub use seek_index::{SeekIndex, DEFAULT_CHECKPOINT_INTERVAL, MIN_CHECKPOINTS};

pub type DocumentId = Uuid;

static DOCUMENT_NAMESPACE: Lazy<Uuid> = Lazy::new(|| {
    Uuid::parse_str("3f6d2a4e-8c1b-5e7f-9a20-6b4c1d8e0f53").expect("valid namespace UUID")
});

pub fn document_id_for_path(path: &Path) -> DocumentId {
    let resolved = path
        .canonicalize()
        .or_else(|_| {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                std::env::current_dir().map(|cwd| cwd.join(path))
            }
        })
        .unwrap_or_else(|_| path.to_path_buf());
    let rendered = resolved.to_string_lossy();
    Uuid::new_v5(&*DOCUMENT_NAMESPACE, rendered.as_bytes())
}

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub path: PathBuf,
    pub total_lines: usize,
}

/// Reading position saved between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedReadingState {
    /// Line after the last one rendered.
    pub current_line: usize,
}

/// What the front end should currently display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageView {
    pub text: String,
    pub current_line: usize,
    pub current_page: usize,
    pub total_pages: usize,
}

impl PageView {
    pub fn status_label(&self) -> String {
        format!("{}/{}", self.current_page, self.total_pages)
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    NextPage,
    PrevPage,
    GotoPage { page: usize },
    JumpInput { input: String },
    Refresh { config: ReaderConfig },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    BookOpened(DocumentId),
    BookClosed(DocumentId),
    RedrawNeeded(DocumentId),
    Notice(String),
}

pub trait StateStore: Send + Sync {
    fn load(&self, doc: &DocumentInfo) -> Result<Option<PersistedReadingState>>;
    fn save(&self, doc: &DocumentInfo, state: &PersistedReadingState) -> Result<()>;
}

pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create state directory at {:?}", root))?;
        Ok(Self { root })
    }

    fn state_path(&self, doc: &DocumentInfo) -> PathBuf {
        self.root.join(format!("{}.json", doc.id))
    }
}

impl StateStore for FileStateStore {
    fn load(&self, doc: &DocumentInfo) -> Result<Option<PersistedReadingState>> {
        let path = self.state_path(doc);
        if !path.exists() {
            return Ok(None);
        }
        let mut file =
            File::open(&path).with_context(|| format!("failed to open state file {:?}", path))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        let state = serde_json::from_str(&buf)
            .with_context(|| format!("failed to decode state file {:?}", path))?;
        Ok(Some(state))
    }

    fn save(&self, doc: &DocumentInfo, state: &PersistedReadingState) -> Result<()> {
        let path = self.state_path(doc);
        let tmp = path.with_extension("json.tmp");
        let payload = serde_json::to_string_pretty(state)?;
        let mut file = File::create(&tmp)
            .with_context(|| format!("failed to open temp state file {:?}", tmp))?;
        file.write_all(payload.as_bytes())?;
        file.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }
}

pub struct MemoryStateStore {
    inner: Mutex<HashMap<DocumentId, PersistedReadingState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, doc: &DocumentInfo) -> Result<Option<PersistedReadingState>> {
        Ok(self.inner.lock().get(&doc.id).cloned())
    }

    fn save(&self, doc: &DocumentInfo, state: &PersistedReadingState) -> Result<()> {
        self.inner.lock().insert(doc.id, state.clone());
        Ok(())
    }
}

/// Drives one book: applies commands, keeps the view current and writes the
/// reading position back after every page.
pub struct Session {
    config: ReaderConfig,
    paginator: Paginator,
    document: Option<DocumentInfo>,
    store: Arc<dyn StateStore>,
    events: Arc<Mutex<Vec<SessionEvent>>>,
    view: PageView,
}

impl Session {
    pub fn new(
        config: ReaderConfig,
        provider: Arc<dyn BookProvider>,
        store: Arc<dyn StateStore>,
    ) -> Result<Self> {
        config.validate()?;
        let paginator = Paginator::new(provider, config.layout());
        Ok(Self {
            config,
            paginator,
            document: None,
            store,
            events: Arc::new(Mutex::new(Vec::new())),
            view: PageView::default(),
        })
    }

    pub fn events(&self) -> Arc<Mutex<Vec<SessionEvent>>> {
        Arc::clone(&self.events)
    }

    pub fn view(&self) -> &PageView {
        &self.view
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn paginator(&self) -> &Paginator {
        &self.paginator
    }

    pub fn document(&self) -> Option<&DocumentInfo> {
        self.document.as_ref()
    }

    /// Opens the book named in the config, if any.
    pub fn open_configured(&mut self) -> Result<bool> {
        match self.config.book().map(Path::to_path_buf) {
            Some(path) => {
                self.open(path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Opens `path` and shows the page the reader last left off on.
    #[instrument(skip(self))]
    pub fn open(&mut self, path: PathBuf) -> Result<()> {
        self.close()?;
        let info = self.load_document(path)?;
        let state = self.store.load(&info)?.unwrap_or_default();
        self.document = Some(info);
        self.resume(state.current_line)
    }

    pub fn apply(&mut self, command: Command) -> Result<()> {
        if let Command::Refresh { config } = command {
            return self.refresh(config);
        }
        if self.document.is_none() {
            return Ok(());
        }

        match command {
            Command::NextPage => {
                if let Some(text) = self.paginator.page_forward()? {
                    self.show(text)?;
                }
            }
            Command::PrevPage => {
                let text = self.paginator.page_backward()?;
                self.show(text)?;
            }
            Command::GotoPage { page } => {
                let text = self.paginator.jump_to_page(page)?;
                self.show(text)?;
            }
            Command::JumpInput { input } => match self.paginator.jump_to_input(&input) {
                Ok(text) => self.show(text)?,
                Err(err @ ReaderError::InvalidLineNumberInput { .. }) => {
                    self.notice(err.user_message());
                }
                Err(err) => return Err(err.into()),
            },
            Command::Refresh { .. } => {}
        }
        Ok(())
    }

    /// Re-applies a freshly read config. A different book is loaded from its
    /// first line; the same book keeps its position and is only re-indexed when
    /// the index looks stale.
    #[instrument(skip(self, config))]
    pub fn refresh(&mut self, config: ReaderConfig) -> Result<()> {
        config.validate()?;
        let interval_changed = config.checkpoint_interval != self.config.checkpoint_interval;
        self.config = config;
        self.paginator.set_layout(self.config.layout());

        let requested = self.config.book().map(Path::to_path_buf);
        match requested {
            None => {
                self.close()?;
                self.notice("no book configured".to_string());
                return Ok(());
            }
            Some(path) if Some(path.as_path()) != self.paginator.path() => {
                self.close()?;
                let info = self.load_document(path)?;
                self.document = Some(info);
            }
            Some(path) => {
                let line = match &self.document {
                    Some(doc) => self
                        .store
                        .load(doc)?
                        .map(|state| state.current_line)
                        .unwrap_or_else(|| self.paginator.current_line()),
                    None => self.paginator.current_line(),
                };
                if interval_changed || self.paginator.needs_rebuild()? {
                    info!("rebuilding seek index");
                    match self.paginator.load(&path, self.config.checkpoint_interval) {
                        Ok(total_lines) => {
                            if let Some(doc) = self.document.as_mut() {
                                doc.total_lines = total_lines;
                            }
                        }
                        Err(err) => {
                            self.document = None;
                            self.view = PageView::default();
                            return Err(anyhow::Error::new(err)
                                .context(format!("failed to rebuild the index for {:?}", path)));
                        }
                    }
                }
                self.paginator.restore_line(line);
            }
        }

        self.view = PageView {
            text: "refreshed".to_string(),
            ..self.snapshot_view(String::new())
        };
        self.notice("refreshed".to_string());
        self.redraw();
        Ok(())
    }

    /// Saves the position of the open book, if any.
    pub fn persist(&self) -> Result<()> {
        if let Some(doc) = &self.document {
            let state = PersistedReadingState {
                current_line: self.paginator.current_line(),
            };
            self.store.save(doc, &state)?;
        }
        Ok(())
    }

    /// Saves the position and unloads the book.
    pub fn close(&mut self) -> Result<()> {
        if let Some(doc) = self.document.take() {
            let state = PersistedReadingState {
                current_line: self.paginator.current_line(),
            };
            self.store.save(&doc, &state)?;
            self.events.lock().push(SessionEvent::BookClosed(doc.id));
        }
        self.paginator.unload();
        self.view = PageView::default();
        Ok(())
    }

    fn load_document(&mut self, path: PathBuf) -> Result<DocumentInfo> {
        let total_lines = self
            .paginator
            .load(&path, self.config.checkpoint_interval)
            .with_context(|| format!("failed to open {:?}", path))?;
        let info = DocumentInfo {
            id: document_id_for_path(&path),
            path,
            total_lines,
        };
        self.events.lock().push(SessionEvent::BookOpened(info.id));
        Ok(info)
    }

    fn resume(&mut self, line: usize) -> Result<()> {
        let page_size = self.paginator.layout().page_size();
        let line = line.min(self.paginator.total_lines());
        let page_start = if line == 0 {
            0
        } else {
            (line - 1) / page_size * page_size
        };
        self.paginator.seek_to_line(page_start)?;
        let text = self.paginator.read_page()?;
        self.show(text)
    }

    fn show(&mut self, text: String) -> Result<()> {
        self.view = self.snapshot_view(text);
        self.persist()?;
        self.redraw();
        Ok(())
    }

    fn snapshot_view(&self, text: String) -> PageView {
        PageView {
            text,
            current_line: self.paginator.current_line(),
            current_page: self.paginator.current_page(),
            total_pages: self.paginator.total_pages(),
        }
    }

    fn redraw(&self) {
        if let Some(doc) = &self.document {
            self.events.lock().push(SessionEvent::RedrawNeeded(doc.id));
        }
    }

    fn notice(&self, message: String) {
        self.events.lock().push(SessionEvent::Notice(message));
    }
}
