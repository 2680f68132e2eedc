use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;
use std::time::SystemTime;

use crate::error::{ReaderError, Result};

/// A seekable reader handing out one raw line at a time.
pub trait LineRead {
    /// Moves the cursor to `offset` bytes from the start of the file.
    fn seek_to(&mut self, offset: u64) -> io::Result<()>;

    /// Appends the next line to `buf` without its terminator. Returns `false` at EOF.
    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<bool>;

    /// Byte offset right after the last line read.
    fn position(&self) -> u64;
}

/// Opens books for reading. Each handle lives for a single operation.
pub trait BookProvider: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn LineRead>>;

    /// Cheap change detector for the file at `path`.
    fn fingerprint(&self, _path: &Path) -> Result<Option<FileFingerprint>> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFingerprint {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

/// Line reader over any buffered, seekable source.
///
/// Lines end at `\n`, `\r\n` or a lone `\r`. A trailing line without a
/// terminator still counts as a line.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    position: u64,
}

enum Step {
    Done,
    CarriageReturn,
    More,
}

impl<R: BufRead + Seek> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }
}

impl<R: BufRead + Seek> LineRead for LineReader<R> {
    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.position = offset;
        Ok(())
    }

    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<bool> {
        let mut consumed_any = false;
        let mut after_cr = false;

        loop {
            let (used, step) = {
                let available = match self.inner.fill_buf() {
                    Ok(available) => available,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err),
                };
                if available.is_empty() {
                    return Ok(consumed_any);
                }

                if after_cr {
                    (usize::from(available[0] == b'\n'), Step::Done)
                } else {
                    match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
                        Some(at) => {
                            buf.extend_from_slice(&available[..at]);
                            let step = if available[at] == b'\n' {
                                Step::Done
                            } else {
                                Step::CarriageReturn
                            };
                            (at + 1, step)
                        }
                        None => {
                            buf.extend_from_slice(available);
                            (available.len(), Step::More)
                        }
                    }
                }
            };

            self.inner.consume(used);
            self.position += used as u64;
            consumed_any = true;

            match step {
                Step::Done => return Ok(true),
                Step::CarriageReturn => after_cr = true,
                Step::More => {}
            }
        }
    }

    #[inline]
    fn position(&self) -> u64 {
        self.position
    }
}

/// Opens books straight from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsBookProvider;

impl FsBookProvider {
    pub fn new() -> Self {
        Self
    }
}

impl BookProvider for FsBookProvider {
    fn open(&self, path: &Path) -> Result<Box<dyn LineRead>> {
        let file = File::open(path).map_err(|err| ReaderError::from_open(path.to_path_buf(), err))?;
        Ok(Box::new(LineReader::new(BufReader::new(file))))
    }

    fn fingerprint(&self, path: &Path) -> Result<Option<FileFingerprint>> {
        let metadata =
            fs::metadata(path).map_err(|err| ReaderError::from_open(path.to_path_buf(), err))?;
        Ok(Some(FileFingerprint {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lines_of(data: &[u8]) -> Vec<(String, u64)> {
        // Small capacity forces terminators to straddle buffer refills.
        let mut reader = LineReader::new(BufReader::with_capacity(3, Cursor::new(data.to_vec())));
        let mut out = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if !reader.read_line(&mut buf).unwrap() {
                break;
            }
            out.push((String::from_utf8(buf.clone()).unwrap(), reader.position()));
        }
        out
    }

    #[test]
    fn handles_every_terminator_style() {
        let lines = lines_of(b"one\ntwo\r\nthree\rfour");
        assert_eq!(
            lines,
            vec![
                ("one".to_string(), 4),
                ("two".to_string(), 9),
                ("three".to_string(), 15),
                ("four".to_string(), 19),
            ]
        );
    }

    #[test]
    fn empty_lines_are_lines() {
        let lines = lines_of(b"\n\r\n\r\nend\n");
        let text: Vec<_> = lines.iter().map(|(line, _)| line.as_str()).collect();
        assert_eq!(text, vec!["", "", "", "end"]);
        assert_eq!(lines.last().unwrap().1, 9);
    }

    #[test]
    fn empty_input_has_no_lines() {
        assert!(lines_of(b"").is_empty());
    }

    #[test]
    fn carriage_return_at_eof_ends_the_line() {
        let lines = lines_of(b"a\r");
        assert_eq!(lines, vec![("a".to_string(), 2)]);
    }

    #[test]
    fn seek_resumes_mid_file() {
        let mut reader = LineReader::new(Cursor::new(b"alpha\nbeta\ngamma\n".to_vec()));
        reader.seek_to(6).unwrap();
        let mut buf = Vec::new();
        assert!(reader.read_line(&mut buf).unwrap());
        assert_eq!(buf, b"beta");
        assert_eq!(reader.position(), 11);
    }

    #[test]
    fn fs_provider_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        match FsBookProvider::new().open(&missing) {
            Err(ReaderError::FileNotFound { path }) => assert_eq!(path, missing),
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("opened a missing file"),
        }
    }

    #[test]
    fn fs_provider_fingerprint_tracks_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.txt");
        std::fs::write(&path, b"one\n").unwrap();
        let first = FsBookProvider::new().fingerprint(&path).unwrap().unwrap();
        std::fs::write(&path, b"one\ntwo\n").unwrap();
        let second = FsBookProvider::new().fingerprint(&path).unwrap().unwrap();
        assert_eq!(first.len, 4);
        assert_eq!(second.len, 8);
        assert_ne!(first, second);
    }
}
