//! SFT Snapshot Format and Loader
//!
//! A compiled rate-mode filter serialized as a sectioned, CRC32-checked
//! little-endian byte image. `sift-compiler` writes it; `Snapshot` reads it
//! back into a `Filter`.

mod format;
mod loader;

pub use format::*;
pub use loader::*;
