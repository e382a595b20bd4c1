//! File-backed FIFO of byte records.
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! header  : magic "RAQF" | version u32 | element count u32 | reserved u32 | head u64 | tail u64
//! element : len u32 | crc32 u32 | payload[len]
//! ```
//!
//! Elements live contiguously between `head` and `tail`. An append writes the
//! element past `tail` and syncs it before the header is rewritten, so a crash
//! mid-append leaves bytes the header never references. Removal only advances
//! `head`; the dead prefix is reclaimed by truncation when the queue empties or
//! by copy-and-rename compaction once it dominates the file.

use super::{RecordStore, RecordVisitor, StorageError, StoreKind};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const MAGIC: [u8; 4] = *b"RAQF";
const FORMAT_VERSION: u32 = 1;
pub const HEADER_LEN: u64 = 32;
const ELEMENT_HEADER_LEN: u64 = 8;
/// Hard per-element limit of the file format.
pub const MAX_ELEMENT_LEN: usize = 16 * 1024 * 1024;
/// Dead bytes before `head` that make compaction worthwhile.
const COMPACTION_THRESHOLD: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    element_count: u32,
    head: u64,
    tail: u64,
}

impl Header {
    const EMPTY: Header = Header {
        element_count: 0,
        head: HEADER_LEN,
        tail: HEADER_LEN,
    };

    fn to_bytes(self) -> [u8; HEADER_LEN as usize] {
        let mut buf = [0u8; HEADER_LEN as usize];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&FORMAT_VERSION.to_be_bytes());
        buf[8..12].copy_from_slice(&self.element_count.to_be_bytes());
        buf[16..24].copy_from_slice(&self.head.to_be_bytes());
        buf[24..32].copy_from_slice(&self.tail.to_be_bytes());
        buf
    }

    fn from_bytes(buf: &[u8; HEADER_LEN as usize], file_len: u64) -> Result<Self, StorageError> {
        if buf[0..4] != MAGIC {
            return Err(StorageError::corrupt("bad magic"));
        }
        let version = be_u32(&buf[4..8]);
        if version != FORMAT_VERSION {
            return Err(StorageError::corrupt(format!(
                "unsupported format version {version}"
            )));
        }

        let header = Header {
            element_count: be_u32(&buf[8..12]),
            head: be_u64(&buf[16..24]),
            tail: be_u64(&buf[24..32]),
        };

        if header.head < HEADER_LEN || header.head > header.tail || header.tail > file_len {
            return Err(StorageError::corrupt(format!(
                "head {} / tail {} out of bounds for file of {} bytes",
                header.head, header.tail, file_len
            )));
        }
        if header.element_count == 0 && header.head != header.tail {
            return Err(StorageError::corrupt("empty queue with non-empty region"));
        }

        Ok(header)
    }

    fn live_bytes(self) -> u64 {
        self.tail - self.head
    }
}

fn be_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_be_bytes(buf)
}

fn be_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(buf)
}

fn read_element_header<R: Read>(reader: &mut R) -> io::Result<(u32, u32)> {
    let mut buf = [0u8; ELEMENT_HEADER_LEN as usize];
    reader.read_exact(&mut buf)?;
    Ok((be_u32(&buf[0..4]), be_u32(&buf[4..8])))
}

#[derive(Debug)]
pub struct QueueFile {
    path: PathBuf,
    file: Option<File>,
    header: Header,
}

impl QueueFile {
    /// Opens `path`, creating an empty queue when the file is missing or
    /// empty. An existing file that fails the integrity check yields
    /// [`StorageError::Corrupt`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let file_len = file.metadata()?.len();

        let header = if file_len == 0 {
            let header = Header::EMPTY;
            file.write_all(&header.to_bytes())?;
            file.sync_all()?;
            header
        } else {
            let header = read_header(&mut file, file_len)?;
            verify_elements(&mut file, header)?;
            header
        };

        debug!(
            "Opened queue file {} with {} records",
            path.display(),
            header.element_count
        );

        Ok(Self {
            path,
            file: Some(file),
            header,
        })
    }

    /// Opens the queue named `name` inside `dir`, creating the directory if
    /// needed. A corrupt file is deleted and replaced by an empty queue.
    pub fn open_or_recreate(dir: &Path, name: &str) -> Result<Self, StorageError> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(StorageError::InvalidStoragePath(format!(
                "queue name '{name}' is not a plain file name"
            )));
        }

        fs::create_dir_all(dir)?;
        let path = dir.join(name);

        match Self::open(&path) {
            Err(e) if e.is_corruption() => {
                warn!(
                    "Queue file {} failed integrity check ({}), recreating it empty",
                    path.display(),
                    e
                );
                fs::remove_file(&path)?;
                Self::open(&path)
            }
            result => result,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    fn file_mut(&mut self) -> Result<&mut File, StorageError> {
        self.file.as_mut().ok_or(StorageError::Closed)
    }

    fn write_header(&mut self, header: Header) -> Result<(), StorageError> {
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header.to_bytes())?;
        file.sync_data()?;
        self.header = header;
        Ok(())
    }

    fn compaction_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".compact");
        PathBuf::from(name)
    }

    fn maybe_compact(&mut self) {
        let header = self.header;
        let dead = header.head - HEADER_LEN;
        if dead < COMPACTION_THRESHOLD || dead < header.live_bytes() {
            return;
        }

        let tmp_path = self.compaction_path();
        match self.compact(&tmp_path) {
            Ok(()) => info!(
                "Compacted queue file {} ({} dead bytes reclaimed)",
                self.path.display(),
                dead
            ),
            Err(e) => {
                warn!("Queue file compaction failed: {}", e);
                let _ = fs::remove_file(&tmp_path);
            }
        }
    }

    fn compact(&mut self, tmp_path: &Path) -> Result<(), StorageError> {
        let header = self.header;
        let live = header.live_bytes();
        let compacted = Header {
            element_count: header.element_count,
            head: HEADER_LEN,
            tail: HEADER_LEN + live,
        };

        {
            let mut tmp = File::create(tmp_path)?;
            tmp.write_all(&compacted.to_bytes())?;

            let file = self.file_mut()?;
            file.seek(SeekFrom::Start(header.head))?;
            let mut live_region = Read::take(file, live);
            let copied = io::copy(&mut live_region, &mut tmp)?;
            if copied != live {
                return Err(StorageError::corrupt(format!(
                    "expected {live} live bytes, copied {copied}"
                )));
            }
            tmp.sync_all()?;
        }

        fs::rename(tmp_path, &self.path)?;
        self.file = Some(OpenOptions::new().read(true).write(true).open(&self.path)?);
        self.header = compacted;
        Ok(())
    }
}

fn read_header(file: &mut File, file_len: u64) -> Result<Header, StorageError> {
    if file_len < HEADER_LEN {
        return Err(StorageError::corrupt(format!(
            "file of {file_len} bytes is shorter than the header"
        )));
    }
    let mut buf = [0u8; HEADER_LEN as usize];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut buf)?;
    Header::from_bytes(&buf, file_len)
}

fn verify_elements(file: &mut File, header: Header) -> Result<(), StorageError> {
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(header.head))?;

    let mut chunk = vec![0u8; 8192];
    let mut offset = header.head;
    let mut count: u32 = 0;

    while offset < header.tail {
        if offset + ELEMENT_HEADER_LEN > header.tail {
            return Err(StorageError::corrupt(format!(
                "truncated element header at offset {offset}"
            )));
        }
        let (len, expected_crc) = read_element_header(&mut reader)?;
        let end = offset + ELEMENT_HEADER_LEN + u64::from(len);
        if len as usize > MAX_ELEMENT_LEN || end > header.tail {
            return Err(StorageError::corrupt(format!(
                "element at offset {offset} overruns the tail"
            )));
        }

        let mut hasher = crc32fast::Hasher::new();
        let mut remaining = len as usize;
        while remaining > 0 {
            let n = remaining.min(chunk.len());
            reader.read_exact(&mut chunk[..n])?;
            hasher.update(&chunk[..n]);
            remaining -= n;
        }
        if hasher.finalize() != expected_crc {
            return Err(StorageError::corrupt(format!(
                "checksum mismatch for element at offset {offset}"
            )));
        }

        offset = end;
        count += 1;
    }

    if count != header.element_count {
        return Err(StorageError::corrupt(format!(
            "header claims {} elements, found {}",
            header.element_count, count
        )));
    }
    Ok(())
}

impl RecordStore for QueueFile {
    fn size(&self) -> usize {
        self.header.element_count as usize
    }

    fn append(&mut self, record: &[u8]) -> Result<(), StorageError> {
        if record.len() > MAX_ELEMENT_LEN {
            return Err(StorageError::RecordTooLarge {
                len: record.len(),
                max: MAX_ELEMENT_LEN,
            });
        }
        let header = self.header;
        let element_count = header
            .element_count
            .checked_add(1)
            .ok_or_else(|| io::Error::other("queue element count overflow"))?;

        let mut element = Vec::with_capacity(ELEMENT_HEADER_LEN as usize + record.len());
        element.extend_from_slice(&(record.len() as u32).to_be_bytes());
        element.extend_from_slice(&crc32fast::hash(record).to_be_bytes());
        element.extend_from_slice(record);

        {
            let file = self.file_mut()?;
            file.seek(SeekFrom::Start(header.tail))?;
            file.write_all(&element)?;
            file.sync_data()?;
        }

        self.write_header(Header {
            element_count,
            head: header.head,
            tail: header.tail + element.len() as u64,
        })
    }

    fn remove_first(&mut self, n: usize) -> Result<(), StorageError> {
        if n == 0 {
            return Ok(());
        }
        let available = self.size();
        if n > available {
            return Err(StorageError::RemoveOutOfRange {
                requested: n,
                available,
            });
        }

        if n == available {
            self.write_header(Header::EMPTY)?;
            self.file_mut()?.set_len(HEADER_LEN)?;
            return Ok(());
        }

        let header = self.header;
        let new_head = {
            let file = self.file_mut()?;
            let mut offset = header.head;
            for _ in 0..n {
                file.seek(SeekFrom::Start(offset))?;
                let (len, _) = read_element_header(file)?;
                offset += ELEMENT_HEADER_LEN + u64::from(len);
                if offset > header.tail {
                    return Err(StorageError::corrupt(format!(
                        "element chain passes the tail at offset {offset}"
                    )));
                }
            }
            offset
        };

        self.write_header(Header {
            element_count: header.element_count - n as u32,
            head: new_head,
            tail: header.tail,
        })?;
        self.maybe_compact();
        Ok(())
    }

    fn for_each(&mut self, visit: &mut RecordVisitor<'_>) -> Result<usize, StorageError> {
        let header = self.header;
        let file = self.file_mut()?;
        let mut offset = header.head;
        let mut visited = 0;

        for _ in 0..header.element_count {
            file.seek(SeekFrom::Start(offset))?;
            let (len, _) = read_element_header(file)?;
            let next = offset + ELEMENT_HEADER_LEN + u64::from(len);
            if next > header.tail {
                return Err(StorageError::corrupt(format!(
                    "element at offset {offset} overruns the tail"
                )));
            }

            let mut element = Read::take(&mut *file, u64::from(len));
            visited += 1;
            let keep_going = visit(&mut element, len as usize)?;
            if !keep_going {
                break;
            }
            offset = next;
        }

        Ok(visited)
    }

    fn close(&mut self) -> Result<(), StorageError> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
            debug!("Closed queue file {}", self.path.display());
        }
        Ok(())
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Persistent
    }
}
