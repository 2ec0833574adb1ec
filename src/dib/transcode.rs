use byteorder::{ByteOrder, LittleEndian};
use packed_struct::prelude::*;

use crate::dib::expand;
use crate::dib::header::{
    self, BitmapCoreHeader, BitmapInfoHeader, BI_BITFIELDS, BI_RGB, CORE_HEADER_SIZE,
    FILE_HEADER_SIZE, INFO_HEADER_SIZE,
};
use crate::dib::layout::{self, RowLayout};
use crate::dib::palette::Palette;
use crate::error::{Error, Result};

const SUPPORTED_DEPTHS: [u16; 6] = [1, 4, 8, 16, 24, 32];
const BITFIELD_MASKS_SIZE: usize = 12;

/// A transcoded bitmap: the payload behind a plain file header, and the
/// payload rebuilt as a 32-bit aligned `BITMAPINFOHEADER` DIB.
#[derive(Debug,Clone,PartialEq,Eq)]
pub struct OutputBitmap {
    pub width: i32,
    pub height: i32,
    pub bit_depth: u16,
    pub legacy: Vec<u8>,
    pub modern: Vec<u8>,
}

/// Parsed view of a DIB payload.
#[derive(Debug,Clone)]
pub struct DibPayload<'a> {
    pub header_size: u32,
    pub width: i32,
    /// Negative for top-down bitmaps
    pub height: i32,
    pub planes: u16,
    pub bit_depth: u16,
    pub compression: u32,
    pub image_size: u32,
    pub layout: RowLayout,
    pub palette: Palette,
    /// Colour table bytes as stored in the payload
    pub colour_table: &'a [u8],
    pub masks: &'a [u8],
    pub pixels: &'a [u8],
    /// Source row stride; zero for compressed bitmaps
    pub stride: usize,
}

fn malformed(msg: String) -> Error {
    Error::MalformedBitmap(msg)
}

fn default_palette_size(bit_depth: u16) -> usize {
    if bit_depth <= 8 { 1 << bit_depth } else { 0 }
}

impl<'a> DibPayload<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<DibPayload<'a>> {
        if payload.len() < 4 {
            return Err(malformed(format!("payload of {} bytes has no header", payload.len())));
        }
        let header_size = LittleEndian::read_u32(&payload[0..4]);
        if header_size as usize > payload.len() {
            return Err(malformed(format!("header of {} bytes exceeds {} byte payload", header_size, payload.len())));
        }
        match header_size {
            CORE_HEADER_SIZE => Self::parse_core(payload),
            n if n >= INFO_HEADER_SIZE => Self::parse_info(payload),
            n => Err(malformed(format!("unsupported header size {}", n)))
        }
    }

    fn parse_core(payload: &'a [u8]) -> Result<DibPayload<'a>> {
        let header = BitmapCoreHeader::unpack_from_slice(&payload[0..CORE_HEADER_SIZE as usize])?;
        let dib = DibPayload{
            header_size: header.header_size,
            width: header.width.into(),
            height: header.height.into(),
            planes: header.planes,
            bit_depth: header.bit_count,
            compression: BI_RGB,
            image_size: 0,
            layout: RowLayout::LEGACY,
            palette: Palette::default(),
            colour_table: &[],
            masks: &[],
            pixels: &[],
            stride: 0,
        };
        let colours = default_palette_size(dib.bit_depth);
        dib.attach(payload, CORE_HEADER_SIZE as usize, colours)
    }

    fn parse_info(payload: &'a [u8]) -> Result<DibPayload<'a>> {
        let header = BitmapInfoHeader::unpack_from_slice(&payload[0..INFO_HEADER_SIZE as usize])?;
        let mut dib = DibPayload{
            header_size: header.header_size,
            width: header.width,
            height: header.height,
            planes: header.planes,
            bit_depth: header.bit_count,
            compression: header.compression,
            image_size: header.image_size,
            layout: RowLayout::MODERN,
            palette: Palette::default(),
            colour_table: &[],
            masks: &[],
            pixels: &[],
            stride: 0,
        };

        // bitfield masks follow a plain info header, later versions embed them
        let mut table_start = header.header_size as usize;
        if header.compression == BI_BITFIELDS {
            let masks_end = INFO_HEADER_SIZE as usize + BITFIELD_MASKS_SIZE;
            dib.masks = payload.get(INFO_HEADER_SIZE as usize..masks_end)
                .ok_or_else(|| malformed("bitfield masks exceed payload".to_string()))?;
            table_start = table_start.max(masks_end);
        }

        let colours = match header.clr_used as usize {
            0 => default_palette_size(header.bit_count),
            n => n
        };
        dib.attach(payload, table_start, colours)
    }

    /// Locates palette and pixel data and settles the source stride.
    fn attach(mut self, payload: &'a [u8], table_start: usize, colours: usize) -> Result<DibPayload<'a>> {
        if !SUPPORTED_DEPTHS.contains(&self.bit_depth) {
            return Err(malformed(format!("unsupported bit depth {}", self.bit_depth)));
        }
        if self.width <= 0 || self.height == 0 {
            return Err(malformed(format!("bad dimensions {}x{}", self.width, self.height)));
        }

        let entry_size = self.layout.palette_entry_size;
        let pixel_start = colours.checked_mul(entry_size)
            .and_then(|n| n.checked_add(table_start))
            .filter(|&n| n <= payload.len())
            .ok_or_else(|| malformed(format!("palette of {} entries exceeds {} byte payload", colours, payload.len())))?;
        self.colour_table = &payload[table_start..pixel_start];
        self.palette = Palette::parse(self.colour_table, colours, entry_size)?;
        self.pixels = &payload[pixel_start..];

        if self.compression == BI_RGB {
            let width = self.width as usize;
            let bpp = self.bit_depth as usize;
            let nominal = self.layout.stride(width, bpp)?;
            self.stride = layout::resolve_stride(self.pixels.len(), self.rows(), nominal)?;
            let significant = layout::significant_bytes(width, bpp)?;
            if self.stride < significant {
                return Err(malformed(format!("negative padding: {} significant bytes in a {} byte row",
                    significant, self.stride)));
            }
        }
        Ok(self)
    }

    pub fn rows(&self) -> usize {
        self.height.unsigned_abs() as usize
    }

    /// Builds the normalized `BITMAPINFOHEADER` file. Returns the output bit
    /// depth and the file bytes.
    ///
    /// Info bitmaps keep their colour table and pixel rows as stored, apart
    /// from 1 bpp images which are always expanded. Core bitmaps get RGBQUADs
    /// and 32-bit aligned rows.
    pub fn to_modern(&self) -> Result<(u16, Vec<u8>)> {
        let width = self.width as usize;
        let passthrough = self.compression != BI_RGB
            || (self.layout == RowLayout::MODERN && self.bit_depth != 1);
        let (bit_depth, colour_table, clr_used, pixels) = if passthrough {
            let clr_used = if self.bit_depth <= 8 { self.palette.len() } else { 0 };
            (self.bit_depth, self.colour_table.to_vec(), clr_used, self.pixels.to_vec())
        } else if self.bit_depth == 1 {
            let pixels = expand::expand_1bpp_to_4bpp(self.pixels, width, self.rows(), self.stride)?;
            let palette = expand::expand_palette(&self.palette);
            (4, palette.to_quads(), palette.len(), pixels)
        } else {
            let bpp = self.bit_depth as usize;
            let pixels = layout::repad_rows(
                self.pixels,
                self.rows(),
                self.stride,
                layout::significant_bytes(width, bpp)?,
                RowLayout::MODERN.stride(width, bpp)?,
            )?;
            let clr_used = if self.bit_depth <= 8 { self.palette.len() } else { 0 };
            (self.bit_depth, self.palette.to_quads(), clr_used, pixels)
        };

        let image_size = if self.compression == BI_RGB {
            u32::try_from(pixels.len()).map_err(|_| malformed("pixel data too large".to_string()))?
        } else {
            self.image_size
        };

        let info = BitmapInfoHeader{
            header_size: INFO_HEADER_SIZE,
            width: self.width,
            height: self.height,
            planes: self.planes,
            bit_count: bit_depth,
            compression: self.compression,
            image_size,
            x_pels_per_meter: 0,
            y_pels_per_meter: 0,
            clr_used: clr_used as u32,
            clr_important: 0,
        }.pack()?;

        let mut dib = Vec::with_capacity(info.len() + self.masks.len() + colour_table.len() + pixels.len());
        dib.extend_from_slice(&info);
        dib.extend_from_slice(self.masks);
        dib.extend_from_slice(&colour_table);
        dib.extend_from_slice(&pixels);

        let pixel_offset = FILE_HEADER_SIZE + dib.len() - pixels.len();
        Ok((bit_depth, header::wrap_dib(&dib, pixel_offset)?))
    }

    /// Wraps the untouched payload in a file header.
    pub fn to_legacy(&self, payload: &[u8]) -> Result<Vec<u8>> {
        header::wrap_dib(payload, FILE_HEADER_SIZE + self.header_size as usize)
    }
}

/// Converts one bitmap resource payload into its legacy and modern files.
pub fn transcode(payload: &[u8]) -> Result<OutputBitmap> {
    let dib = DibPayload::parse(payload)?;
    let (bit_depth, modern) = dib.to_modern()?;
    let legacy = dib.to_legacy(payload)?;
    Ok(OutputBitmap{ width: dib.width, height: dib.height, bit_depth, legacy, modern })
}
