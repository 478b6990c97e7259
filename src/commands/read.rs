//! Read command implementation

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::session::{progress_bar, Session};

/// Run the read command
pub fn run_read(
    session: &mut Session,
    output: &Path,
    offset: u32,
    length: Option<u32>,
    elem_size: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    let size = session.profile().size();
    if offset >= size {
        return Err(format!(
            "Offset 0x{:X} is past the end of the device (0x{:X})",
            offset, size
        )
        .into());
    }
    let length = length.unwrap_or(size - offset);

    log::info!(
        "Reading {} bytes at offset 0x{:X} ({})",
        length,
        offset,
        if session.uses_dma() { "DMA" } else { "blocking" }
    );

    let mut data = vec![0u8; length as usize];
    let pb = progress_bar(length as u64)?;
    session.read(offset, &mut data, elem_size, Some(&pb))?;
    pb.finish_with_message("Read complete");

    let mut file = File::create(output)?;
    file.write_all(&data)?;

    println!("Wrote {} bytes to {:?}", data.len(), output);

    Ok(())
}
