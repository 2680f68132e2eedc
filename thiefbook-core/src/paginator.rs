//! Page-at-a-time reading over a [`SeekIndex`].
//!
//! The paginator tracks the line *after* the last rendered one, the same way a
//! file cursor points past the bytes it has consumed. Moving back one page
//! therefore rewinds to the page before the one containing `current_line - 1`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::decode::LineDecoder;
use crate::error::{ReaderError, Result};
use crate::reader::{BookProvider, FileFingerprint, LineRead};
use crate::seek_index::{SeekIndex, DEFAULT_CHECKPOINT_INTERVAL, MIN_CHECKPOINTS};

/// Page geometry: how many lines per page and how many blank lines between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    page_size: usize,
    line_spacing: usize,
}

impl PageLayout {
    pub fn new(page_size: usize, line_spacing: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            line_spacing,
        }
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub fn line_spacing(&self) -> usize {
        self.line_spacing
    }

    fn separator(&self) -> String {
        "\n".repeat(self.line_spacing + 1)
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::new(5, 0)
    }
}

/// Number of pages needed for `total_lines`; a partial last page counts.
pub fn total_pages(total_lines: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    if total_lines % page_size == 0 {
        total_lines / page_size
    } else {
        total_lines / page_size + 1
    }
}

/// Parses a page number typed by the user. Accepts `"12"` as well as the
/// `"12 / 40"` form shown in the status line.
pub fn parse_page_input(input: &str) -> Result<usize> {
    let head = input.split('/').next().unwrap_or_default().trim();
    head.parse::<usize>()
        .map_err(|_| ReaderError::InvalidLineNumberInput {
            input: input.to_string(),
        })
}

#[derive(Debug, Clone)]
struct LoadedBook {
    path: PathBuf,
    fingerprint: Option<FileFingerprint>,
}

pub struct Paginator {
    provider: Arc<dyn BookProvider>,
    layout: PageLayout,
    decoder: LineDecoder,
    book: Option<LoadedBook>,
    index: SeekIndex,
    current_line: usize,
    current_offset: u64,
    total_lines: usize,
    needs_seek: bool,
}

impl Paginator {
    pub fn new(provider: Arc<dyn BookProvider>, layout: PageLayout) -> Self {
        Self {
            provider,
            layout,
            decoder: LineDecoder::new(),
            book: None,
            index: SeekIndex::new(DEFAULT_CHECKPOINT_INTERVAL),
            current_line: 0,
            current_offset: 0,
            total_lines: 0,
            needs_seek: false,
        }
    }

    /// Scans the whole book once, counting lines and recording a checkpoint every
    /// `checkpoint_interval` lines. Replaces any previously loaded book; on failure
    /// nothing stays loaded.
    #[instrument(skip(self, file_path), fields(path = ?file_path.as_ref()))]
    pub fn load(&mut self, file_path: impl AsRef<Path>, checkpoint_interval: usize) -> Result<usize> {
        let path = file_path.as_ref().to_path_buf();
        self.unload();

        let fingerprint = self.provider.fingerprint(&path)?;
        let (index, total_lines) = self.scan(&path, checkpoint_interval)?;

        self.index = index;
        self.total_lines = total_lines;
        self.book = Some(LoadedBook { path, fingerprint });
        info!(
            total_lines,
            checkpoints = self.index.len(),
            interval = self.index.interval(),
            "book loaded"
        );
        Ok(total_lines)
    }

    /// Loads the current book again from scratch.
    pub fn reload(&mut self) -> Result<usize> {
        let path = self.require_book()?.to_path_buf();
        let interval = self.index.interval();
        self.load(path, interval)
    }

    /// Drops the loaded book, its index and the reading position.
    pub fn unload(&mut self) {
        self.book = None;
        self.index.clear();
        self.current_line = 0;
        self.current_offset = 0;
        self.total_lines = 0;
        self.needs_seek = false;
    }

    fn scan(&self, path: &Path, interval: usize) -> Result<(SeekIndex, usize)> {
        let mut reader = self.provider.open(path)?;
        let mut index = SeekIndex::new(interval);
        index.record(0, reader.position());

        let mut buf = Vec::with_capacity(256);
        let mut lines = 0;
        loop {
            buf.clear();
            let more = reader
                .read_line(&mut buf)
                .map_err(|source| ReaderError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
            if !more {
                break;
            }
            lines += 1;
            if index.is_boundary(lines) {
                index.record(lines, reader.position());
            }
        }
        Ok((index, lines))
    }

    /// Positions the cursor at the start of `target_line`, scanning forward from
    /// the nearest checkpoint and filling in any checkpoints passed on the way.
    pub fn seek_to_line(&mut self, target_line: usize) -> Result<()> {
        let path = self.require_book()?.to_path_buf();
        let target = target_line.min(self.total_lines);
        let (anchor, anchor_offset) = self.index.nearest_checkpoint_at_or_below(target);

        let mut line = anchor;
        let mut offset = anchor_offset;
        if line < target {
            let mut reader = self.open_at(&path, anchor_offset)?;
            let mut buf = Vec::with_capacity(256);
            while line < target {
                buf.clear();
                let more = reader
                    .read_line(&mut buf)
                    .map_err(|source| ReaderError::Read {
                        path: path.clone(),
                        source,
                    })?;
                if !more {
                    warn!(
                        reached = line,
                        target, "book ended before the target line, index may be stale"
                    );
                    break;
                }
                line += 1;
                offset = reader.position();
                if self.index.is_boundary(line) && !self.index.contains(line) {
                    self.index.record(line, offset);
                    debug!(line, offset, "checkpoint recorded during seek");
                }
            }
        }

        debug!(target, anchor, line, offset, "seek resolved");
        self.current_line = line;
        self.current_offset = offset;
        self.needs_seek = false;
        Ok(())
    }

    /// Renders up to one page starting at the cursor and advances past it.
    ///
    /// Returns an empty string at the end of the book. Lines that are not valid
    /// in the book's encoding are rendered with replacement characters.
    pub fn read_page(&mut self) -> Result<String> {
        let path = self.require_book()?.to_path_buf();
        if self.needs_seek {
            self.seek_to_line(self.current_line)?;
        }
        let mut reader = self.open_at(&path, self.current_offset)?;
        let separator = self.layout.separator();

        let mut page = String::new();
        let mut buf = Vec::with_capacity(256);
        let mut rendered = 0;
        while rendered < self.layout.page_size() {
            buf.clear();
            match reader.read_line(&mut buf) {
                Ok(true) => {}
                Ok(false) => break,
                Err(source) if rendered == 0 => {
                    return Err(ReaderError::Read { path, source });
                }
                Err(err) => {
                    warn!(%err, line = self.current_line, "page cut short by a read error");
                    break;
                }
            }

            let text = match self.decoder.decode(&buf, self.current_line) {
                Ok(text) => text,
                Err(err) => {
                    warn!(%err, "rendering line with replacement characters");
                    self.decoder.decode_lossy(&buf)
                }
            };
            if rendered > 0 {
                page.push_str(&separator);
            }
            page.push_str(&text);
            rendered += 1;

            self.current_line += 1;
            self.current_offset = reader.position();
            if self.index.is_boundary(self.current_line) && !self.index.contains(self.current_line)
            {
                self.index.record(self.current_line, self.current_offset);
            }
        }

        debug!(rendered, line = self.current_line, "page read");
        Ok(page)
    }

    /// Renders the next page, or returns `None` when the book is exhausted.
    pub fn page_forward(&mut self) -> Result<Option<String>> {
        self.require_book()?;
        if self.current_line >= self.total_lines {
            return Ok(None);
        }
        self.read_page().map(Some)
    }

    /// Renders the page before the one last shown. Stays on the first page.
    pub fn page_backward(&mut self) -> Result<String> {
        self.require_book()?;
        let page_size = self.layout.page_size();
        let shown_start = self.current_line.min(self.total_lines).saturating_sub(1) / page_size
            * page_size;
        let target = shown_start.saturating_sub(page_size);
        self.seek_to_line(target)?;
        self.read_page()
    }

    /// Renders page `page_number` (1-based), clamped to the pages that exist.
    pub fn jump_to_page(&mut self, page_number: usize) -> Result<String> {
        self.require_book()?;
        let page_size = self.layout.page_size();
        let page = page_number.clamp(1, self.total_pages().max(1));
        let target = ((page - 1) * page_size).min(self.total_lines);
        self.seek_to_line(target)?;
        self.read_page()
    }

    /// Jumps to the page typed by the user. Invalid input leaves the position as is.
    pub fn jump_to_input(&mut self, input: &str) -> Result<String> {
        let page = parse_page_input(input)?;
        self.jump_to_page(page)
    }

    /// Sets the reading position without resolving its byte offset. The next
    /// page read seeks first.
    pub fn restore_line(&mut self, line: usize) {
        self.current_line = line.min(self.total_lines);
        self.needs_seek = true;
    }

    /// True when the index is too thin to trust or the book changed on disk.
    pub fn needs_rebuild(&self) -> Result<bool> {
        let book = self.book.as_ref().ok_or(ReaderError::NoBookLoaded)?;
        if self.index.is_sparse_enough(MIN_CHECKPOINTS, self.total_lines) {
            return Ok(true);
        }
        let fingerprint = self.provider.fingerprint(&book.path)?;
        Ok(fingerprint != book.fingerprint)
    }

    pub fn set_layout(&mut self, layout: PageLayout) {
        self.layout = layout;
    }

    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    pub fn index(&self) -> &SeekIndex {
        &self.index
    }

    pub fn path(&self) -> Option<&Path> {
        self.book.as_ref().map(|book| book.path.as_path())
    }

    pub fn is_loaded(&self) -> bool {
        self.book.is_some()
    }

    pub fn current_line(&self) -> usize {
        self.current_line
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    pub fn total_lines(&self) -> usize {
        self.total_lines
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.total_lines, self.layout.page_size())
    }

    /// Page holding the last rendered line, 0 before anything was read.
    pub fn current_page(&self) -> usize {
        let page_size = self.layout.page_size();
        (self.current_line + page_size - 1) / page_size
    }

    fn require_book(&self) -> Result<&Path> {
        self.path().ok_or(ReaderError::NoBookLoaded)
    }

    fn open_at(&self, path: &Path, offset: u64) -> Result<Box<dyn LineRead>> {
        let mut reader = self.provider.open(path)?;
        reader
            .seek_to(offset)
            .map_err(|source| ReaderError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(reader)
    }
}
