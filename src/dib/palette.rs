use crate::error::{Error, Result};

/// One colour table entry, in the blue-green-red order both DIB flavours
/// store it in.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Default)]
pub struct PaletteEntry {
    pub blue: u8,
    pub green: u8,
    pub red: u8,
}

impl PaletteEntry {
    pub const BLACK: PaletteEntry = PaletteEntry{ blue: 0x00, green: 0x00, red: 0x00 };
    pub const WHITE: PaletteEntry = PaletteEntry{ blue: 0xff, green: 0xff, red: 0xff };
}

#[derive(Debug,Clone,PartialEq,Eq,Default)]
pub struct Palette {
    pub entries: Vec<PaletteEntry>,
}

impl Palette {
    /// Reads `count` entries of `entry_size` bytes (3 for RGB triples, 4 for
    /// RGBQUADs). The reserved byte of a quad is dropped.
    pub fn parse(data: &[u8], count: usize, entry_size: usize) -> Result<Palette> {
        let needed = count.checked_mul(entry_size)
            .filter(|&n| n <= data.len())
            .ok_or_else(|| Error::MalformedBitmap(format!("palette of {} entries exceeds {} bytes", count, data.len())))?;
        let entries = data[..needed]
            .chunks_exact(entry_size)
            .map(|e| PaletteEntry{ blue: e[0], green: e[1], red: e[2] })
            .collect();
        Ok(Palette{ entries })
    }

    pub fn from_triples(data: &[u8]) -> Palette {
        Palette{ entries: data.chunks_exact(3).map(|e| PaletteEntry{ blue: e[0], green: e[1], red: e[2] }).collect() }
    }

    pub fn from_quads(data: &[u8]) -> Palette {
        Palette{ entries: data.chunks_exact(4).map(|e| PaletteEntry{ blue: e[0], green: e[1], red: e[2] }).collect() }
    }

    /// Serializes as RGBQUADs with a zero reserved byte.
    pub fn to_quads(&self) -> Vec<u8> {
        self.entries.iter()
            .flat_map(|e| [e.blue, e.green, e.red, 0])
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<PaletteEntry> {
        self.entries.get(index).copied()
    }
}
