use packed_struct::prelude::*;

use crate::error::{Error, Result};

pub const FILE_HEADER_SIZE: usize = 14;
pub const CORE_HEADER_SIZE: u32 = 12;
pub const INFO_HEADER_SIZE: u32 = 40;

/// "BM", read as a little-endian word
pub const BMP_SIGNATURE: u16 = 0x4d42;

pub const BI_RGB: u32 = 0;
pub const BI_BITFIELDS: u32 = 3;

#[derive(PackedStruct,Debug,Clone,Copy,PartialEq)]
#[packed_struct(endian="lsb")]
pub struct BitmapFileHeader {
    pub signature: u16,
    pub file_size: u32,
    pub reserved1: u16,
    pub reserved2: u16,
    pub pixel_offset: u32,
}

/// OS/2 1.x `BITMAPCOREHEADER`
#[derive(PackedStruct,Debug,Clone,Copy,PartialEq)]
#[packed_struct(endian="lsb")]
pub struct BitmapCoreHeader {
    pub header_size: u32,
    pub width: u16,
    pub height: u16,
    pub planes: u16,
    pub bit_count: u16,
}

/// Windows 3.x `BITMAPINFOHEADER`. Later header versions start with the
/// same 40 bytes.
#[derive(PackedStruct,Debug,Clone,Copy,PartialEq)]
#[packed_struct(endian="lsb")]
pub struct BitmapInfoHeader {
    pub header_size: u32,
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: u32,
    pub image_size: u32,
    pub x_pels_per_meter: i32,
    pub y_pels_per_meter: i32,
    pub clr_used: u32,
    pub clr_important: u32,
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::MalformedBitmap(format!("{} of {} bytes does not fit a bitmap file", what, value)))
}

/// Prefixes a DIB with a `BM` file header whose pixel offset is `pixel_offset`
/// bytes from the start of the file.
pub fn wrap_dib(dib: &[u8], pixel_offset: usize) -> Result<Vec<u8>> {
    let header = BitmapFileHeader{
        signature: BMP_SIGNATURE,
        file_size: to_u32(FILE_HEADER_SIZE + dib.len(), "file")?,
        reserved1: 0,
        reserved2: 0,
        pixel_offset: to_u32(pixel_offset, "pixel offset")?,
    }.pack()?;

    let mut out = Vec::with_capacity(FILE_HEADER_SIZE + dib.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(dib);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_header_layout() {
        let out = wrap_dib(&[0xaa; 6], 18).unwrap();
        assert_eq!(&out[0..2], b"BM");
        assert_eq!(&out[2..6], &20u32.to_le_bytes());
        assert_eq!(&out[6..10], &[0; 4]);
        assert_eq!(&out[10..14], &18u32.to_le_bytes());
        assert_eq!(&out[14..], &[0xaa; 6]);

        let header = BitmapFileHeader::unpack_from_slice(&out[0..14]).unwrap();
        assert_eq!(header.signature, BMP_SIGNATURE);
        assert_eq!(header.file_size, 20);
    }

    #[test]
    fn core_header_is_little_endian() {
        let raw = [12, 0, 0, 0, 0x34, 0x12, 2, 0, 1, 0, 8, 0];
        let header = BitmapCoreHeader::unpack_from_slice(&raw).unwrap();
        assert_eq!(header, BitmapCoreHeader{ header_size: 12, width: 0x1234, height: 2, planes: 1, bit_count: 8 });
        assert_eq!(header.pack().unwrap(), raw);
    }

    #[test]
    fn info_header_signed_height() {
        let header = BitmapInfoHeader{
            header_size: INFO_HEADER_SIZE,
            width: 3,
            height: -2,
            planes: 1,
            bit_count: 24,
            compression: BI_RGB,
            image_size: 24,
            x_pels_per_meter: 0,
            y_pels_per_meter: 0,
            clr_used: 0,
            clr_important: 0,
        };
        let raw = header.pack().unwrap();
        assert_eq!(raw.len(), 40);
        assert_eq!(&raw[8..12], &(-2i32).to_le_bytes());
        assert_eq!(BitmapInfoHeader::unpack_from_slice(&raw).unwrap(), header);
    }
}
