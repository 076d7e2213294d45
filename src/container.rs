//! Self-describing binary container files.
//!
//! Layout: `[magic:4][version:u16le][schema_len:u32le][schema descriptor
//! JSON]` followed by zero or more framed records `[len:u32le][body]`.
//! Record bodies encode per the header schema: strings as
//! `[len:u32le][utf8]`, longs as `i64le`. The file is valid at any frame
//! boundary, so writes are append-only streaming and reads are
//! forward-only streaming.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{TcError, TcResult};
use crate::model::{Record, Schema, SchemaType};

pub const CONTAINER_MAGIC: [u8; 4] = *b"TCF1";
pub const CONTAINER_VERSION: u16 = 1;

/// Upper bound on a single record frame. Anything larger is treated as
/// corruption rather than an allocation request.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Upper bound on the schema descriptor in the header.
const MAX_SCHEMA_LEN: u32 = 1024 * 1024;

fn supported_shape(schema: &Schema) -> bool {
    match schema {
        Schema::Primitive(SchemaType::String) => true,
        Schema::Record { fields, .. } => {
            fields.len() == 2
                && fields[0].field_type == SchemaType::String
                && fields[1].field_type == SchemaType::Long
        }
        Schema::Primitive(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Streaming append-only container writer.
///
/// Records are framed as they arrive; `finish` flushes and syncs. Dropping
/// an unfinished writer still flushes best-effort, so no exit path leaks a
/// dirty handle.
pub struct ContainerWriter {
    writer: BufWriter<File>,
    schema: Schema,
    path: PathBuf,
    /// Reusable scratch buffer for record bodies. A record that fails to
    /// encode never touches the output stream.
    scratch: Vec<u8>,
    records_written: u64,
    finished: bool,
}

impl ContainerWriter {
    /// Create (overwriting) a container at `path`, creating intermediate
    /// directories as needed, and write the header.
    pub fn create(path: &Path, schema: Schema) -> TcResult<Self> {
        if !supported_shape(&schema) {
            return Err(TcError::Encoding(format!(
                "unsupported schema shape: {}",
                schema.to_descriptor()
            )));
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|error| TcError::workspace(parent, error.to_string()))?;
        }

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let descriptor = serde_json::to_vec(&schema.to_descriptor())?;
        #[allow(clippy::cast_possible_truncation)]
        let descriptor_len = descriptor.len() as u32;

        writer.write_all(&CONTAINER_MAGIC)?;
        writer.write_all(&CONTAINER_VERSION.to_le_bytes())?;
        writer.write_all(&descriptor_len.to_le_bytes())?;
        writer.write_all(&descriptor)?;

        Ok(Self {
            writer,
            schema,
            path: path.to_path_buf(),
            scratch: Vec::with_capacity(256),
            records_written: 0,
            finished: false,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Append one record, failing if it does not conform to the writer's
    /// schema.
    pub fn append(&mut self, record: &Record) -> TcResult<()> {
        if !self.schema.conforms(record) {
            return Err(TcError::Encoding(format!(
                "record `{record}` does not match schema {}",
                self.schema.to_descriptor()
            )));
        }

        self.scratch.clear();
        match record {
            Record::Text(line) => encode_str(&mut self.scratch, line),
            Record::Pair { key, value } => {
                encode_str(&mut self.scratch, key);
                self.scratch.extend_from_slice(&value.to_le_bytes());
            }
        }

        if self.scratch.len() > MAX_FRAME_LEN as usize {
            return Err(TcError::Encoding(format!(
                "record frame of {} bytes exceeds the {MAX_FRAME_LEN}-byte cap",
                self.scratch.len()
            )));
        }

        #[allow(clippy::cast_possible_truncation)]
        let frame_len = self.scratch.len() as u32;
        self.writer.write_all(&frame_len.to_le_bytes())?;
        self.writer.write_all(&self.scratch)?;
        self.records_written += 1;
        Ok(())
    }

    /// Append every record in `records`, in order.
    pub fn append_all<'a, I>(&mut self, records: I) -> TcResult<()>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        for record in records {
            self.append(record)?;
        }
        Ok(())
    }

    /// Flush, sync, and release the file handle.
    pub fn finish(mut self) -> TcResult<u64> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.finished = true;
        Ok(self.records_written)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ContainerWriter {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.writer.flush();
        }
    }
}

fn encode_str(buf: &mut Vec<u8>, text: &str) {
    #[allow(clippy::cast_possible_truncation)]
    let len = text.len() as u32;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(text.as_bytes());
}

/// Convenience: write `lines` as a text container at `path`.
pub fn write_lines<I, S>(path: &Path, lines: I) -> TcResult<u64>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut writer = ContainerWriter::create(path, Schema::text())?;
    for line in lines {
        writer.append(&Record::Text(line.as_ref().to_owned()))?;
    }
    writer.finish()
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Lazy, forward-only container reader.
///
/// Implements `Iterator<Item = TcResult<Record>>`. The traversal is
/// single-pass and not restartable; re-reading requires reopening the file.
/// The handle is released when the reader is dropped, including after an
/// early termination of the traversal.
#[derive(Debug)]
pub struct ContainerReader {
    reader: BufReader<File>,
    schema: Schema,
    path: PathBuf,
    done: bool,
}

impl ContainerReader {
    /// Open `path` and parse its header.
    pub fn open(path: &Path) -> TcResult<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|_| TcError::corrupt(path, "truncated header"))?;
        if magic != CONTAINER_MAGIC {
            return Err(TcError::corrupt(path, format!("bad magic {magic:02x?}")));
        }

        let mut version_buf = [0u8; 2];
        reader
            .read_exact(&mut version_buf)
            .map_err(|_| TcError::corrupt(path, "truncated header"))?;
        let version = u16::from_le_bytes(version_buf);
        if version != CONTAINER_VERSION {
            return Err(TcError::corrupt(
                path,
                format!("unsupported container version {version}"),
            ));
        }

        let mut len_buf = [0u8; 4];
        reader
            .read_exact(&mut len_buf)
            .map_err(|_| TcError::corrupt(path, "truncated header"))?;
        let schema_len = u32::from_le_bytes(len_buf);
        if schema_len > MAX_SCHEMA_LEN {
            return Err(TcError::corrupt(
                path,
                format!("schema descriptor of {schema_len} bytes exceeds cap"),
            ));
        }

        let mut descriptor = vec![0u8; schema_len as usize];
        reader
            .read_exact(&mut descriptor)
            .map_err(|_| TcError::corrupt(path, "truncated schema descriptor"))?;
        let schema = serde_json::from_slice(&descriptor)
            .map_err(|error| TcError::corrupt(path, format!("schema header: {error}")))
            .and_then(|value| {
                Schema::from_descriptor(&value)
                    .map_err(|error| TcError::corrupt(path, error.to_string()))
            })?;
        if !supported_shape(&schema) {
            return Err(TcError::corrupt(
                path,
                format!("unsupported schema shape: {}", schema.to_descriptor()),
            ));
        }

        Ok(Self {
            reader,
            schema,
            path: path.to_path_buf(),
            done: false,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_frame(&mut self) -> TcResult<Option<Vec<u8>>> {
        let mut len_buf = [0u8; 4];
        match read_exact_or_eof(&mut self.reader, &mut len_buf)? {
            HeaderRead::Eof => return Ok(None),
            HeaderRead::Partial => {
                return Err(TcError::corrupt(&self.path, "truncated frame length"));
            }
            HeaderRead::Full => {}
        }

        let frame_len = u32::from_le_bytes(len_buf);
        if frame_len > MAX_FRAME_LEN {
            return Err(TcError::corrupt(
                &self.path,
                format!("frame of {frame_len} bytes exceeds the {MAX_FRAME_LEN}-byte cap"),
            ));
        }

        let mut body = vec![0u8; frame_len as usize];
        self.reader
            .read_exact(&mut body)
            .map_err(|_| TcError::corrupt(&self.path, "truncated record frame"))?;
        Ok(Some(body))
    }

    fn decode(&self, body: &[u8]) -> TcResult<Record> {
        let mut cursor = SliceCursor::new(body);
        let record = match &self.schema {
            Schema::Primitive(_) => Record::Text(cursor.take_str(&self.path)?),
            Schema::Record { .. } => {
                let key = cursor.take_str(&self.path)?;
                let value = cursor.take_long(&self.path)?;
                Record::Pair { key, value }
            }
        };
        if !cursor.is_empty() {
            return Err(TcError::corrupt(
                &self.path,
                format!("record frame has {} trailing bytes", cursor.remaining()),
            ));
        }
        Ok(record)
    }
}

impl Iterator for ContainerReader {
    type Item = TcResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_frame() {
            Ok(None) => {
                self.done = true;
                None
            }
            Ok(Some(body)) => match self.decode(&body) {
                Ok(record) => Some(Ok(record)),
                Err(error) => {
                    self.done = true;
                    Some(Err(error))
                }
            },
            Err(error) => {
                self.done = true;
                Some(Err(error))
            }
        }
    }
}

enum HeaderRead {
    Full,
    Partial,
    Eof,
}

/// Fill `buf`, distinguishing a clean end-of-file (no bytes at all) from a
/// torn read (some bytes then EOF).
fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> TcResult<HeaderRead> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            return Ok(if filled == 0 {
                HeaderRead::Eof
            } else {
                HeaderRead::Partial
            });
        }
        filled += n;
    }
    Ok(HeaderRead::Full)
}

struct SliceCursor<'a> {
    body: &'a [u8],
    pos: usize,
}

impl<'a> SliceCursor<'a> {
    fn new(body: &'a [u8]) -> Self {
        Self { body, pos: 0 }
    }

    fn take(&mut self, n: usize, path: &Path) -> TcResult<&'a [u8]> {
        if self.pos + n > self.body.len() {
            return Err(TcError::corrupt(path, "record body shorter than declared"));
        }
        let slice = &self.body[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_str(&mut self, path: &Path) -> TcResult<String> {
        let len_bytes = self.take(4, path)?;
        let len = u32::from_le_bytes(len_bytes.try_into().expect("4-byte slice")) as usize;
        let raw = self.take(len, path)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| TcError::corrupt(path, "string field is not valid utf-8"))
    }

    fn take_long(&mut self, path: &Path) -> TcResult<i64> {
        let raw = self.take(8, path)?;
        Ok(i64::from_le_bytes(raw.try_into().expect("8-byte slice")))
    }

    fn is_empty(&self) -> bool {
        self.pos == self.body.len()
    }

    fn remaining(&self) -> usize {
        self.body.len() - self.pos
    }
}
