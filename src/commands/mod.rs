//! CLI command implementations
//!
//! Each command opens a [`crate::session::Session`], which brings up the
//! transfer engine against the emulated chip, and then drives it through the
//! blocking or DMA path as selected by `--dma`.

mod info;
mod list;
mod read;
mod selftest;
mod write;

pub use info::run_info;
pub use list::list_devices;
pub use read::run_read;
pub use selftest::run_selftest;
pub use write::run_write;
