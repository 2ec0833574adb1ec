use std::fmt;
use std::fmt::Formatter;
use std::io::{self, Cursor, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_enum::TryFromPrimitive;

use crate::error::{Error, Result};

const TAG_TERMINATOR: u8 = 0x00;
const TAG_NUMERIC: u8 = 0xff;

/// Standard numeric resource types of 16-bit Windows.
#[derive(Debug,PartialEq,Eq,Hash,Clone,Copy,TryFromPrimitive)]
#[repr(u16)]
pub enum ResourceKind {
    Cursor = 1,
    Bitmap = 2,
    Icon = 3,
    Menu = 4,
    Dialog = 5,
    String = 6,
    FontDir = 7,
    Font = 8,
    Accelerator = 9,
    RcData = 10,
    GroupCursor = 12,
    GroupIcon = 14,
    Version = 16,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Cursor => { write!(f, "cursor") },
            ResourceKind::Bitmap => { write!(f, "bitmap") },
            ResourceKind::Icon => { write!(f, "icon") },
            ResourceKind::Menu => { write!(f, "menu") },
            ResourceKind::Dialog => { write!(f, "dialog") },
            ResourceKind::String => { write!(f, "string") },
            ResourceKind::FontDir => { write!(f, "fontdir") },
            ResourceKind::Font => { write!(f, "font") },
            ResourceKind::Accelerator => { write!(f, "accel") },
            ResourceKind::RcData => { write!(f, "rcdata") },
            ResourceKind::GroupCursor => { write!(f, "grpcursor") },
            ResourceKind::GroupIcon => { write!(f, "grpicon") },
            ResourceKind::Version => { write!(f, "version") },
        }
    }
}

/// Type or name of a resource: either an ordinal (`0xff` prefix) or an
/// inline nul-terminated ASCII string.
#[derive(Debug,PartialEq,Eq,Hash,Clone)]
pub enum ResourceTag {
    Numeric(u16),
    Name(String),
}

impl ResourceTag {
    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<usize> {
        match self {
            ResourceTag::Numeric(n) => {
                w.write_u8(TAG_NUMERIC)?;
                w.write_u16::<LittleEndian>(*n)?;
                Ok(3)
            },
            ResourceTag::Name(s) => {
                w.write_all(s.as_bytes())?;
                w.write_u8(0)?;
                Ok(s.len() + 1)
            }
        }
    }
}

impl fmt::Display for ResourceTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ResourceTag::Numeric(n) => { write!(f, "{}", n) },
            ResourceTag::Name(s) => { write!(f, "\"{}\"", s) }
        }
    }
}

/// Memory flags stored with every resource entry.
#[derive(Debug,PartialEq,Eq,Clone,Copy)]
pub struct MemoryFlags(pub u16);

impl MemoryFlags {
    pub const MOVEABLE: u16 = 0x0010;
    pub const PURE: u16 = 0x0020;
    pub const PRELOAD: u16 = 0x0040;
    pub const DISCARDABLE: u16 = 0x1000;

    pub fn contains(&self, flag: u16) -> bool {
        self.0 & flag == flag
    }
}

impl fmt::Display for MemoryFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let names = [
            (MemoryFlags::MOVEABLE, "moveable"),
            (MemoryFlags::PURE, "pure"),
            (MemoryFlags::PRELOAD, "preload"),
            (MemoryFlags::DISCARDABLE, "discardable"),
        ];
        let set: Vec<&str> = names.iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "fixed")
        } else {
            write!(f, "{}", set.join(","))
        }
    }
}

/// One entry of a resource container. The payload borrows from the
/// container buffer.
#[derive(Debug,PartialEq,Eq,Clone)]
pub struct ResourceRecord<'a> {
    pub rtype: ResourceTag,
    pub id: ResourceTag,
    pub flags: u16,
    pub payload: &'a [u8],
}

impl<'a> ResourceRecord<'a> {
    pub fn kind(&self) -> Option<ResourceKind> {
        match self.rtype {
            ResourceTag::Numeric(n) => ResourceKind::try_from(n).ok(),
            ResourceTag::Name(_) => None
        }
    }

    /// Returns the ordinal of a bitmap resource; named bitmaps and other
    /// resource types yield `None`.
    pub fn bitmap_id(&self) -> Option<u16> {
        match (self.kind(), &self.id) {
            (Some(ResourceKind::Bitmap), ResourceTag::Numeric(n)) => Some(*n),
            _ => None
        }
    }

    pub fn memory_flags(&self) -> MemoryFlags {
        MemoryFlags(self.flags)
    }
}

impl fmt::Display for ResourceRecord<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{}.{}", kind, self.id),
            None => write!(f, "{}.{}", self.rtype, self.id)
        }
    }
}

/// Walks a resource container from offset 0, yielding one record at a time.
///
/// Stops at the `0x00` terminator or the end of the buffer. The first
/// error ends the iteration.
pub struct ResourceReader<'a> {
    rdr: Cursor<&'a [u8]>,
    done: bool,
}

fn truncated(offset: usize, reason: &'static str) -> Error {
    Error::TruncatedContainer{ offset, reason }
}

impl<'a> ResourceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ResourceReader{ rdr: Cursor::new(data), done: false }
    }

    fn offset(&self) -> usize {
        self.rdr.position() as usize
    }

    fn read_tag(&mut self, what: &'static str) -> Result<ResourceTag> {
        let data: &'a [u8] = *self.rdr.get_ref();
        let offset = self.offset();
        let first = *data.get(offset).ok_or_else(|| truncated(offset, what))?;
        if first == TAG_NUMERIC {
            self.rdr.set_position((offset + 1) as u64);
            let n = self.rdr.read_u16::<LittleEndian>()
                .map_err(|_| truncated(offset, what))?;
            return Ok(ResourceTag::Numeric(n));
        }

        let rest = &data[offset..];
        let len = rest.iter().position(|&b| b == 0)
            .ok_or_else(|| truncated(offset, "missing nul terminator"))?;
        let name = &rest[..len];
        if !name.is_ascii() {
            return Err(truncated(offset, "non-ASCII resource name"));
        }
        self.rdr.set_position((offset + len + 1) as u64);
        Ok(ResourceTag::Name(name.iter().map(|&b| b as char).collect()))
    }

    fn read_record(&mut self) -> Result<ResourceRecord<'a>> {
        let rtype = self.read_tag("resource type")?;
        let id = self.read_tag("resource name")?;

        let offset = self.offset();
        let flags = self.rdr.read_u16::<LittleEndian>()
            .map_err(|_| truncated(offset, "memory flags"))?;
        let size = self.rdr.read_u32::<LittleEndian>()
            .map_err(|_| truncated(offset + 2, "resource size"))?;

        let data: &'a [u8] = *self.rdr.get_ref();
        let start = self.offset();
        let end = start.checked_add(size as usize)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| truncated(start, "payload extends past end of container"))?;
        let payload = &data[start..end];

        // entries are word aligned
        let next = if end % 2 == 1 { end + 1 } else { end };
        self.rdr.set_position(next as u64);
        Ok(ResourceRecord{ rtype, id, flags, payload })
    }
}

impl<'a> Iterator for ResourceReader<'a> {
    type Item = Result<ResourceRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let offset = self.offset();
        match self.rdr.get_ref().get(offset) {
            None | Some(&TAG_TERMINATOR) => {
                self.done = true;
                return None;
            },
            Some(_) => { }
        }
        match self.read_record() {
            Ok(record) => {
                log::debug!("resource {} at {:#x}: flags {:#06x}, {} bytes",
                    record, offset, record.flags, record.payload.len());
                Some(Ok(record))
            },
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn payload_size(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput,
        format!("payload of {} bytes exceeds the 32-bit size field", len)))
}

/// Serializes records in container format, keeping entries word aligned.
pub struct ResourceWriter<W: Write> {
    out: W,
    offset: usize,
}

impl<W: Write> ResourceWriter<W> {
    pub fn new(out: W) -> Self {
        ResourceWriter{ out, offset: 0 }
    }

    /// Writes one record. An empty name tag would read back as the
    /// terminator, so callers must not pass one as the type.
    pub fn write_record(&mut self, record: &ResourceRecord<'_>) -> io::Result<()> {
        let size = payload_size(record.payload.len())?;
        self.offset += record.rtype.write_to(&mut self.out)?;
        self.offset += record.id.write_to(&mut self.out)?;
        self.out.write_u16::<LittleEndian>(record.flags)?;
        self.out.write_u32::<LittleEndian>(size)?;
        self.out.write_all(record.payload)?;
        self.offset += 6 + record.payload.len();
        if self.offset % 2 == 1 {
            self.out.write_u8(0)?;
            self.offset += 1;
        }
        Ok(())
    }

    /// Writes the terminator and hands back the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.write_u8(TAG_TERMINATOR)?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(records: &[ResourceRecord<'_>]) -> Vec<u8> {
        let mut writer = ResourceWriter::new(Vec::new());
        for record in records {
            writer.write_record(record).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn oversized_payload_is_rejected() {
        assert_eq!(payload_size(0x1234).unwrap(), 0x1234);
        assert_eq!(payload_size(u32::MAX as usize).unwrap(), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        {
            let err = payload_size(u32::MAX as usize + 1).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn roundtrip_numeric_and_named_tags() {
        let records = vec![
            ResourceRecord{
                rtype: ResourceTag::Numeric(2),
                id: ResourceTag::Numeric(7),
                flags: 0x1030,
                payload: &[1, 2, 3],
            },
            ResourceRecord{
                rtype: ResourceTag::Name("CARDS".to_string()),
                id: ResourceTag::Name("BACK".to_string()),
                flags: 0x0010,
                payload: &[9, 8, 7, 6],
            },
        ];
        let data = build(&records);
        let parsed: Vec<_> = ResourceReader::new(&data).collect::<Result<_>>().unwrap();
        assert_eq!(parsed, records);
    }

    #[test]
    fn odd_length_entry_is_padded() {
        // 3 + 3 + 6 + 3 = 15 bytes, padded to 16
        let record = ResourceRecord{
            rtype: ResourceTag::Numeric(2),
            id: ResourceTag::Numeric(1),
            flags: 0,
            payload: &[0xaa, 0xbb, 0xcc],
        };
        let data = build(&[record.clone(), record.clone()]);
        assert_eq!(data.len(), 16 * 2 + 1);
        assert_eq!(data[15], 0);
        let parsed: Vec<_> = ResourceReader::new(&data).collect::<Result<_>>().unwrap();
        assert_eq!(parsed, vec![record.clone(), record]);
    }

    #[test]
    fn stops_at_terminator() {
        let data = [0x00, 0xff, 0x02, 0x00];
        assert_eq!(ResourceReader::new(&data).count(), 0);
        assert_eq!(ResourceReader::new(&[]).count(), 0);
    }

    #[test]
    fn end_of_buffer_without_terminator() {
        let record = ResourceRecord{
            rtype: ResourceTag::Numeric(2),
            id: ResourceTag::Numeric(1),
            flags: 0,
            payload: &[1, 2],
        };
        let mut data = build(&[record.clone()]);
        data.pop();
        let parsed: Vec<_> = ResourceReader::new(&data).collect::<Result<_>>().unwrap();
        assert_eq!(parsed, vec![record]);
    }

    #[test]
    fn payload_past_end_is_truncation() {
        let mut data = vec![0xff, 0x02, 0x00, 0xff, 0x01, 0x00, 0x00, 0x00];
        data.extend_from_slice(&100u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 10]);
        let mut rdr = ResourceReader::new(&data);
        match rdr.next() {
            Some(Err(Error::TruncatedContainer{ offset, .. })) => assert_eq!(offset, 12),
            other => panic!("unexpected {:?}", other),
        }
        assert!(rdr.next().is_none());
    }

    #[test]
    fn missing_nul_is_truncation() {
        let data = b"BITMAP";
        let results: Vec<_> = ResourceReader::new(data).collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(Error::TruncatedContainer{ offset: 0, .. })));
    }

    #[test]
    fn short_numeric_tag_is_truncation() {
        let data = [0xff, 0x02, 0x00, 0xff, 0x01];
        let results: Vec<_> = ResourceReader::new(&data).collect();
        assert!(matches!(results.as_slice(), [Err(Error::TruncatedContainer{ offset: 3, .. })]));
    }

    #[test]
    fn bitmap_selection() {
        let bitmap = ResourceRecord{
            rtype: ResourceTag::Numeric(2),
            id: ResourceTag::Numeric(53),
            flags: 0x1030,
            payload: &[],
        };
        assert_eq!(bitmap.kind(), Some(ResourceKind::Bitmap));
        assert_eq!(bitmap.bitmap_id(), Some(53));
        assert_eq!(bitmap.to_string(), "bitmap.53");
        assert_eq!(bitmap.memory_flags().to_string(), "moveable,pure,discardable");

        let named = ResourceRecord{ id: ResourceTag::Name("LOGO".to_string()), ..bitmap.clone() };
        assert_eq!(named.bitmap_id(), None);

        let icon = ResourceRecord{ rtype: ResourceTag::Numeric(3), ..bitmap };
        assert_eq!(icon.bitmap_id(), None);
        assert_eq!(icon.memory_flags().to_string(), "moveable,pure,discardable");
        assert_eq!(MemoryFlags(0).to_string(), "fixed");
    }
}
