pub mod expand;
pub mod header;
pub mod layout;
pub mod palette;
pub mod transcode;

pub use transcode::{transcode, DibPayload, OutputBitmap};
