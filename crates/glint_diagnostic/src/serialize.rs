//! Cache record serialization.
//!
//! The on-disk layout is pinned for interop with prior-run caches:
//!
//! ```text
//! u32  format version tag
//! u64  analyzer content-version stamp
//! u64  text-version stamp
//! u64  data-version stamp
//! u32  item count
//! per item:
//!   str×7   id, category, message, message template, title,
//!           description, help link
//!   u8×4    severity, default severity, enabled-by-default, suppressed
//!   u32     warning level
//!   u32×2   primary span start / length
//!   block   primary location (presence flag + optional span +
//!           original path + 4 ints + mapped path + 4 ints)
//!   block   additional locations (count + location blocks)
//!   block   custom tags (count + strings)
//!   block   properties (count + key/value string pairs)
//! ```
//!
//! All integers are little-endian; strings are a u32 byte length plus
//! UTF-8 bytes. A reader that hits end-of-stream, a tag mismatch, or any
//! decode error treats the entire record as absent — a partial record is
//! never materialized.

use std::collections::BTreeMap;
use std::sync::Arc;

use glint_core::{AnalysisKey, Span, VersionStamp};

use crate::data::{DiagnosticData, DiagnosticLocation, FileLine};
use crate::descriptor::Severity;

/// Bump when the record layout changes; readers treat any other tag as
/// a cache miss.
pub const FORMAT_VERSION: u32 = 1;

/// A decoded cache record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedRecord {
    pub text_version: VersionStamp,
    pub data_version: VersionStamp,
    pub items: Vec<DiagnosticData>,
}

/// Encode a diagnostic set with its version stamps.
pub fn encode(
    analyzer_version: VersionStamp,
    text_version: VersionStamp,
    data_version: VersionStamp,
    items: &[DiagnosticData],
) -> Vec<u8> {
    let mut w = Writer::default();
    w.u32(FORMAT_VERSION);
    w.u64(analyzer_version.raw());
    w.u64(text_version.raw());
    w.u64(data_version.raw());
    w.u32(items.len() as u32);
    for item in items {
        write_item(&mut w, item);
    }
    w.buf
}

/// Decode a cache record.
///
/// `key` supplies the document/project attribution, which is keyed
/// externally and not part of the payload. Returns `None` on format
/// version mismatch, analyzer version mismatch, or any malformed input.
pub fn decode(
    bytes: &[u8],
    expected_analyzer_version: VersionStamp,
    key: AnalysisKey,
) -> Option<CachedRecord> {
    let mut r = Reader::new(bytes);
    if r.u32()? != FORMAT_VERSION {
        return None;
    }
    if !VersionStamp::from_raw(r.u64()?).matches(expected_analyzer_version) {
        return None;
    }
    let text_version = VersionStamp::from_raw(r.u64()?);
    let data_version = VersionStamp::from_raw(r.u64()?);
    let count = r.u32()? as usize;
    let mut items = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        items.push(read_item(&mut r, key)?);
    }
    Some(CachedRecord {
        text_version,
        data_version,
        items,
    })
}

fn write_item(w: &mut Writer, item: &DiagnosticData) {
    w.str(&item.id);
    w.str(&item.category);
    w.str(&item.message);
    w.str(&item.message_format);
    w.str(&item.title);
    w.str(&item.description);
    w.str(&item.help_link);
    w.u8(item.severity.as_u8());
    w.u8(item.default_severity.as_u8());
    w.u8(u8::from(item.enabled_by_default));
    w.u8(u8::from(item.is_suppressed));
    w.u32(item.warning_level);
    w.u32(item.span.start);
    w.u32(item.span.len());
    write_location_opt(w, item.location.as_ref());
    w.u32(item.additional_locations.len() as u32);
    for location in &item.additional_locations {
        write_location(w, location);
    }
    w.u32(item.custom_tags.len() as u32);
    for tag in &item.custom_tags {
        w.str(tag);
    }
    w.u32(item.properties.len() as u32);
    for (key, value) in &item.properties {
        w.str(key);
        w.str(value);
    }
}

fn read_item(r: &mut Reader<'_>, key: AnalysisKey) -> Option<DiagnosticData> {
    let id: Arc<str> = Arc::from(r.str()?);
    let category = r.str()?;
    let message = r.str()?;
    let message_format = r.str()?;
    let title = r.str()?;
    let description = r.str()?;
    let help_link = r.str()?;
    let severity = Severity::from_u8(r.u8()?)?;
    let default_severity = Severity::from_u8(r.u8()?)?;
    let enabled_by_default = r.bool()?;
    let is_suppressed = r.bool()?;
    let warning_level = r.u32()?;
    let span_start = r.u32()?;
    let span_len = r.u32()?;
    let span = Span::new(span_start, span_start.checked_add(span_len)?);
    let location = read_location_opt(r)?;

    let additional_count = r.u32()? as usize;
    let mut additional_locations = Vec::with_capacity(additional_count.min(64));
    for _ in 0..additional_count {
        additional_locations.push(read_location(r)?);
    }

    let tag_count = r.u32()? as usize;
    let mut custom_tags = Vec::with_capacity(tag_count.min(64));
    for _ in 0..tag_count {
        custom_tags.push(r.str()?);
    }

    let property_count = r.u32()? as usize;
    let mut properties = BTreeMap::new();
    for _ in 0..property_count {
        let property_key = r.str()?;
        let property_value = r.str()?;
        properties.insert(property_key, property_value);
    }

    // Attribution is keyed externally: a located item belongs to the
    // record's document, an unlocated one to its project only.
    let document = if location.is_some() {
        key.document()
    } else {
        None
    };

    Some(DiagnosticData {
        id,
        category,
        message,
        message_format,
        title,
        description,
        help_link,
        severity,
        default_severity,
        enabled_by_default,
        is_suppressed,
        warning_level,
        custom_tags,
        properties,
        project: key.project(),
        document,
        span,
        location,
        additional_locations,
    })
}

fn write_location_opt(w: &mut Writer, location: Option<&DiagnosticLocation>) {
    match location {
        Some(location) => {
            w.u8(1);
            write_location(w, location);
        }
        None => w.u8(0),
    }
}

fn read_location_opt(r: &mut Reader<'_>) -> Option<Option<DiagnosticLocation>> {
    match r.u8()? {
        0 => Some(None),
        1 => Some(Some(read_location(r)?)),
        _ => None,
    }
}

fn write_location(w: &mut Writer, location: &DiagnosticLocation) {
    match location.span {
        Some(span) => {
            w.u8(1);
            w.u32(span.start);
            w.u32(span.len());
        }
        None => w.u8(0),
    }
    write_file_line(w, &location.original);
    write_file_line(w, &location.mapped);
}

fn read_location(r: &mut Reader<'_>) -> Option<DiagnosticLocation> {
    let span = match r.u8()? {
        0 => None,
        1 => {
            let start = r.u32()?;
            let len = r.u32()?;
            Some(Span::new(start, start.checked_add(len)?))
        }
        _ => return None,
    };
    let original = read_file_line(r)?;
    let mapped = read_file_line(r)?;
    Some(DiagnosticLocation {
        span,
        original,
        mapped,
    })
}

fn write_file_line(w: &mut Writer, position: &FileLine) {
    w.str(&position.path);
    w.u32(position.start_line);
    w.u32(position.start_column);
    w.u32(position.end_line);
    w.u32(position.end_column);
}

fn read_file_line(r: &mut Reader<'_>) -> Option<FileLine> {
    Some(FileLine {
        path: r.str()?,
        start_line: r.u32()?,
        start_column: r.u32()?,
        end_line: r.u32()?,
        end_column: r.u32()?,
    })
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn str(&mut self, value: &str) {
        self.u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.bytes.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn u8(&mut self) -> Option<u8> {
        Some(self.take(1)?[0])
    }

    /// Strict boolean: any byte other than 0 or 1 is a malformed record.
    fn bool(&mut self) -> Option<bool> {
        match self.u8()? {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }
    }

    fn u32(&mut self) -> Option<u32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }

    fn u64(&mut self) -> Option<u64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().ok()?;
        Some(u64::from_le_bytes(bytes))
    }

    fn str(&mut self) -> Option<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).ok()
    }
}
