//! Write command implementation

use std::fs;
use std::path::Path;

use crate::session::{progress_bar, Session};

/// Run the write command
pub fn run_write(
    session: &mut Session,
    input: &Path,
    offset: u32,
    elem_size: u8,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    if data.is_empty() {
        println!("Nothing to write, {:?} is empty", input);
        return Ok(());
    }

    log::info!(
        "Writing {} bytes at offset 0x{:X} ({})",
        data.len(),
        offset,
        if session.uses_dma() { "DMA" } else { "blocking" }
    );

    let pb = progress_bar(data.len() as u64)?;
    session.write(offset, &data, elem_size, Some(&pb))?;
    pb.finish_with_message("Write complete");

    if verify {
        let mut readback = vec![0u8; data.len()];
        let pb = progress_bar(data.len() as u64)?;
        session.read(offset, &mut readback, elem_size, Some(&pb))?;
        pb.finish_with_message("Verify complete");

        if let Some(pos) = first_mismatch(&data, &readback) {
            return Err(format!(
                "Verification failed at offset 0x{:X}: expected 0x{:02X}, got 0x{:02X}",
                offset as usize + pos,
                data[pos],
                readback[pos]
            )
            .into());
        }
        println!("Verified {} bytes", data.len());
    }

    session.save_image()?;
    println!("Wrote {} bytes from {:?}", data.len(), input);

    Ok(())
}

fn first_mismatch(expected: &[u8], actual: &[u8]) -> Option<usize> {
    expected.iter().zip(actual).position(|(a, b)| a != b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_mismatch() {
        assert_eq!(first_mismatch(&[1, 2, 3], &[1, 2, 3]), None);
        assert_eq!(first_mismatch(&[1, 2, 3], &[1, 9, 3]), Some(1));
    }
}
