//! Promotion of monochrome bitmaps to 16 colours.

use crate::dib::layout::{significant_bytes, RowLayout};
use crate::dib::palette::{Palette, PaletteEntry};
use crate::error::{Error, Result};

const EXPANDED_COLOURS: usize = 16;

/// Unpacks one row of 1-bit pixels, most significant bit first.
pub fn unpack_1bpp(row: &[u8], width: usize) -> Vec<u8> {
    (0..width)
        .map(|x| (row[x / 8] >> (7 - (x % 8))) & 1)
        .collect()
}

/// Packs pixel values two per byte, high nibble first. An odd trailing
/// pixel fills both nibbles.
pub fn pack_4bpp(pixels: &[u8]) -> Vec<u8> {
    pixels.chunks(2)
        .map(|pair| {
            let hi = pair[0];
            let lo = *pair.get(1).unwrap_or(&hi);
            (hi << 4) | lo
        })
        .collect()
}

/// Converts `rows` rows of 1-bit pixels stored at `src_stride` into 4-bit
/// rows at the 32-bit aligned stride.
pub fn expand_1bpp_to_4bpp(pixels: &[u8], width: usize, rows: usize, src_stride: usize) -> Result<Vec<u8>> {
    let significant = significant_bytes(width, 1)?;
    if src_stride == 0 || src_stride < significant {
        return Err(Error::MalformedBitmap(format!("negative padding: {} significant bytes in a {} byte source row",
            significant, src_stride)));
    }
    if src_stride.checked_mul(rows).map_or(true, |len| len > pixels.len()) {
        return Err(Error::MalformedBitmap(format!("{} rows of {} bytes exceed {} bytes of pixel data",
            rows, src_stride, pixels.len())));
    }
    let dst_stride = RowLayout::MODERN.stride(width, 4)?;

    let mut out = Vec::with_capacity(dst_stride * rows);
    for row in pixels.chunks_exact(src_stride).take(rows) {
        let packed = pack_4bpp(&unpack_1bpp(&row[..significant], width));
        let padding = dst_stride.checked_sub(packed.len())
            .ok_or_else(|| Error::MalformedBitmap("negative padding in expanded row".to_string()))?;
        out.extend_from_slice(&packed);
        out.extend(std::iter::repeat(0u8).take(padding));
    }
    Ok(out)
}

/// Builds the 16 entry colour table for an expanded bitmap. Indices 0 and 1
/// keep the source colours; the rest repeat colour 1 so that stray indices
/// still resolve.
pub fn expand_palette(source: &Palette) -> Palette {
    let (zero, one) = match (source.get(0), source.get(1)) {
        (Some(zero), Some(one)) => (zero, one),
        (Some(only), None) => (only, only),
        _ => (PaletteEntry::BLACK, PaletteEntry::WHITE),
    };
    let mut entries = Vec::with_capacity(EXPANDED_COLOURS);
    entries.push(zero);
    entries.resize(EXPANDED_COLOURS, one);
    Palette{ entries }
}
