use crate::error::{Error, Result};

/// Row and palette conventions of a DIB flavour.
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub struct RowLayout {
    pub palette_entry_size: usize,
    pub row_align_bits: usize,
}

impl RowLayout {
    /// OS/2 core bitmaps: RGB triples, rows padded to 16 bits
    pub const LEGACY: RowLayout = RowLayout{ palette_entry_size: 3, row_align_bits: 16 };
    /// Windows info bitmaps: RGBQUADs, rows padded to 32 bits
    pub const MODERN: RowLayout = RowLayout{ palette_entry_size: 4, row_align_bits: 32 };

    pub fn stride(&self, width: usize, bit_depth: usize) -> Result<usize> {
        let bits = row_bits(width, bit_depth)?;
        Ok(bits.div_ceil(self.row_align_bits) * (self.row_align_bits / 8))
    }
}

fn row_bits(width: usize, bit_depth: usize) -> Result<usize> {
    width.checked_mul(bit_depth)
        .ok_or_else(|| Error::MalformedBitmap(format!("row of {} pixels at {} bpp overflows", width, bit_depth)))
}

/// Number of bytes in a row that carry pixel data.
pub fn significant_bytes(width: usize, bit_depth: usize) -> Result<usize> {
    Ok(row_bits(width, bit_depth)?.div_ceil(8))
}

/// Checks `stride * rows` against the pixel data length. Some encoders
/// disagree with the nominal stride; if the data still divides evenly into
/// rows the stride is taken from the data instead.
pub fn resolve_stride(pixel_len: usize, rows: usize, nominal: usize) -> Result<usize> {
    if rows == 0 {
        return Err(Error::MalformedBitmap("bitmap has no rows".to_string()));
    }
    if nominal.checked_mul(rows) == Some(pixel_len) {
        return Ok(nominal);
    }
    if pixel_len % rows == 0 {
        let stride = pixel_len / rows;
        log::warn!("stride mismatch: {} rows of {} bytes do not fill {} bytes, using stride {}",
            rows, nominal, pixel_len, stride);
        return Ok(stride);
    }
    Err(Error::MalformedBitmap(format!("stride mismatch: {} bytes of pixel data for {} rows of {} bytes",
        pixel_len, rows, nominal)))
}

/// Copies the first `significant` bytes of each source row into rows of
/// `dst_stride` bytes, zero-filling the remainder.
pub fn repad_rows(pixels: &[u8], rows: usize, src_stride: usize, significant: usize, dst_stride: usize) -> Result<Vec<u8>> {
    let padding = dst_stride.checked_sub(significant)
        .ok_or_else(|| Error::MalformedBitmap(format!("negative padding: {} significant bytes in a {} byte row",
            significant, dst_stride)))?;
    if src_stride == 0 || src_stride < significant {
        return Err(Error::MalformedBitmap(format!("negative padding: {} significant bytes in a {} byte source row",
            significant, src_stride)));
    }
    if src_stride.checked_mul(rows).map_or(true, |len| len > pixels.len()) {
        return Err(Error::MalformedBitmap(format!("{} rows of {} bytes exceed {} bytes of pixel data",
            rows, src_stride, pixels.len())));
    }

    let mut out = Vec::with_capacity(dst_stride * rows);
    for row in pixels.chunks_exact(src_stride).take(rows) {
        out.extend_from_slice(&row[..significant]);
        out.extend(std::iter::repeat(0u8).take(padding));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_for_24bpp() {
        assert_eq!(RowLayout::LEGACY.stride(3, 24).unwrap(), 10);
        assert_eq!(RowLayout::MODERN.stride(3, 24).unwrap(), 12);
        assert_eq!(significant_bytes(3, 24).unwrap(), 9);
    }

    #[test]
    fn strides_for_packed_depths() {
        assert_eq!(RowLayout::LEGACY.stride(5, 1).unwrap(), 2);
        assert_eq!(RowLayout::MODERN.stride(5, 1).unwrap(), 4);
        assert_eq!(RowLayout::LEGACY.stride(17, 1).unwrap(), 4);
        assert_eq!(RowLayout::MODERN.stride(33, 1).unwrap(), 8);
        assert_eq!(RowLayout::MODERN.stride(5, 4).unwrap(), 4);
        assert_eq!(RowLayout::MODERN.stride(9, 4).unwrap(), 8);
        assert_eq!(significant_bytes(5, 1).unwrap(), 1);
        assert_eq!(significant_bytes(9, 4).unwrap(), 5);
    }

    #[test]
    fn overflow_is_malformed() {
        assert!(matches!(RowLayout::MODERN.stride(usize::MAX, 24), Err(Error::MalformedBitmap(_))));
    }

    #[test]
    fn nominal_stride_kept() {
        assert_eq!(resolve_stride(20, 2, 10).unwrap(), 10);
    }

    #[test]
    fn stride_inferred_from_length() {
        assert_eq!(resolve_stride(24, 2, 10).unwrap(), 12);
    }

    #[test]
    fn stride_unrepairable() {
        assert!(matches!(resolve_stride(21, 2, 10), Err(Error::MalformedBitmap(_))));
        assert!(matches!(resolve_stride(0, 0, 10), Err(Error::MalformedBitmap(_))));
    }

    #[test]
    fn repad_copies_significant_bytes_only() {
        let pixels = [1, 2, 3, 0xee, 4, 5, 6, 0xee];
        let out = repad_rows(&pixels, 2, 4, 3, 8).unwrap();
        assert_eq!(out, vec![1, 2, 3, 0, 0, 0, 0, 0, 4, 5, 6, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn repad_rejects_negative_padding() {
        assert!(matches!(repad_rows(&[0; 8], 2, 4, 5, 4), Err(Error::MalformedBitmap(_))));
        assert!(matches!(repad_rows(&[0; 8], 2, 4, 6, 8), Err(Error::MalformedBitmap(_))));
    }
}
