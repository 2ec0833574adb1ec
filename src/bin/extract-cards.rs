extern crate stopbus_cards;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

use stopbus_cards::dib::{self, header, DibPayload};
use stopbus_cards::winres::resource::{ResourceKind, ResourceReader};

#[derive(Subcommand)]
enum CliCommands {
    /// Lists all resources
    List {
        /// Input resource file
        res_file: PathBuf,
    },
    /// Extracts bitmap resources as .bmp files
    Extract {
        /// Input resource file
        res_file: PathBuf,
        /// Output directory for files keeping the original DIB header
        legacy_dir: PathBuf,
        /// Output directory for files with a BITMAPINFOHEADER
        modern_dir: PathBuf,
        #[clap(long, default_value = "card")]
        /// Output file name prefix
        prefix: String,
        #[clap(long, default_value_t=false)]
        /// Skip malformed bitmaps instead of aborting
        keep_going: bool,
    },
    /// Checks that all .bmp files in a directory have a modern header
    Check {
        /// Directory to check
        dir: PathBuf,
    },
}

/// Extracts card bitmaps from a 16-bit Windows .RES file
#[derive(Parser)]
struct Cli {
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: CliCommands
}

fn read_container(res_file: &Path) -> Result<Vec<u8>> {
    fs::read(res_file).with_context(|| format!("unable to read {}", res_file.display()))
}

fn list(res_file: &Path) -> Result<()> {
    let data = read_container(res_file)?;
    println!("resource         flags                       size  bitmap");
    for record in ResourceReader::new(&data) {
        let record = record?;
        let bitmap = if record.kind() == Some(ResourceKind::Bitmap) {
            match DibPayload::parse(record.payload) {
                Ok(dib) => format!("{}x{} {}-bpp, {} byte header", dib.width, dib.height, dib.bit_depth, dib.header_size),
                Err(e) => format!("!! {}", e),
            }
        } else {
            String::new()
        };
        println!("{:16} {:26} {:6}  {}", record.to_string(), record.memory_flags().to_string(), record.payload.len(), bitmap);
    }
    Ok(())
}

fn extract(res_file: &Path, legacy_dir: &Path, modern_dir: &Path, prefix: &str, keep_going: bool) -> Result<()> {
    let data = read_container(res_file)?;
    for dir in [legacy_dir, modern_dir] {
        fs::create_dir_all(dir).with_context(|| format!("unable to create {}", dir.display()))?;
    }

    let mut count = 0;
    let mut skipped = 0;
    for record in ResourceReader::new(&data) {
        let record = record.with_context(|| format!("corrupt resource file {}", res_file.display()))?;
        let Some(id) = record.bitmap_id() else {
            continue;
        };

        let bitmap = match dib::transcode(record.payload) {
            Ok(bitmap) => bitmap,
            Err(e) if keep_going => {
                log::warn!("bitmap {}: {}, skipping", id, e);
                skipped += 1;
                continue;
            },
            Err(e) => {
                return Err(e).with_context(|| format!("unable to convert bitmap {}", id));
            }
        };

        let fname = format!("{}{:02}.bmp", prefix, id);
        fs::write(legacy_dir.join(&fname), &bitmap.legacy)?;
        fs::write(modern_dir.join(&fname), &bitmap.modern)?;
        log::info!("Card {:02}: {}x{}, {}-bpp", id, bitmap.width, bitmap.height, bitmap.bit_depth);
        count += 1;
    }

    log::info!("Extracted {} card bitmaps from {}", count, res_file.display());
    if skipped > 0 {
        return Err(anyhow!("{} malformed bitmaps were skipped", skipped));
    }
    Ok(())
}

fn check_modern_header(data: &[u8]) -> Result<()> {
    if data.len() < header::FILE_HEADER_SIZE + 4 || &data[0..2] != b"BM" {
        return Err(anyhow!("not a BMP file"));
    }
    let dib_size = LittleEndian::read_u32(&data[14..18]);
    if dib_size < header::INFO_HEADER_SIZE {
        return Err(anyhow!("still uses an OS/2 BMP header ({} bytes)", dib_size));
    }
    Ok(())
}

fn check(dir: &Path) -> Result<()> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("unable to read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("bmp")))
        .collect();
    paths.sort();

    let mut failures = 0;
    for path in &paths {
        let data = fs::read(path)?;
        if let Err(e) = check_modern_header(&data) {
            log::error!("{}: {}", path.display(), e);
            failures += 1;
            continue;
        }
        if let Err(e) = bmp::open(path) {
            log::warn!("{}: bmp reader cannot decode it: {}", path.display(), e);
        }
    }

    log::info!("Checked {} bitmaps in {}", paths.len(), dir.display());
    if failures > 0 {
        return Err(anyhow!("{} bitmaps lack a modern header", failures));
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    match &args.command {
        CliCommands::List{ res_file } => {
            list(res_file)
        },
        CliCommands::Extract{ res_file, legacy_dir, modern_dir, prefix, keep_going } => {
            extract(res_file, legacy_dir, modern_dir, prefix, *keep_going)
        },
        CliCommands::Check{ dir } => {
            check(dir)
        },
    }
}
