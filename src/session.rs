//! Emulated PSRAM session shared by the commands
//!
//! Every command runs the transfer engine against the dummy chip. The
//! memory array can be backed by an image file so data survives between
//! invocations.

use std::fs;

use indicatif::{ProgressBar, ProgressStyle};
use qpsram_core::bus::Direction;
use qpsram_core::profile::DeviceProfile;
use qpsram_core::transfer::{DmaBuffer, DmaState, DmaStatus};
use qpsram_core::{EngineConfig, Psram};
use qpsram_dummy::{DummyConfig, DummyDma, DummyPsram, DummyQspi};

use crate::cli::DeviceArgs;

/// Engine type driven by the CLI
pub type Engine = Psram<DummyQspi, DummyDma>;

/// Bytes moved per engine call, so the progress bar has something to show
const TRANSFER_STEP: usize = 64 * 1024;

/// An initialized engine and the emulator behind it
pub struct Session {
    pub dummy: DummyPsram,
    pub psram: Engine,
    args: DeviceArgs,
    status: &'static DmaStatus,
}

impl Session {
    /// Build the emulator, load the image and bring up the engine
    pub fn open(
        profile: DeviceProfile,
        args: &DeviceArgs,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let dummy = DummyPsram::new(DummyConfig::for_profile(profile));

        if let Some(path) = &args.image {
            if path.exists() {
                let data = fs::read(path)?;
                if data.len() > profile.size() as usize {
                    return Err(format!(
                        "Image {:?} is {} bytes, device holds {}",
                        path,
                        data.len(),
                        profile.size()
                    )
                    .into());
                }
                dummy.fill(0, &data);
                log::info!("Loaded {} bytes from {:?}", data.len(), path);
            } else {
                log::info!("Image {:?} does not exist yet, starting blank", path);
            }
        }

        let config = EngineConfig {
            dma_chunk_bytes: args.dma_chunk,
            ..EngineConfig::default()
        };
        let psram = Psram::init(dummy.controller(), dummy.dma(), profile, config)?;

        Ok(Self {
            dummy,
            psram,
            args: args.clone(),
            // One per session; the engine needs it for the life of a chain
            status: Box::leak(Box::new(DmaStatus::new())),
        })
    }

    /// Profile the engine was brought up with
    pub fn profile(&self) -> DeviceProfile {
        *self.psram.profile()
    }

    /// Returns true when transfers go through DMA chains
    pub fn uses_dma(&self) -> bool {
        self.args.dma
    }

    /// Select the DMA or blocking path, returning the previous choice
    pub fn set_dma(&mut self, dma: bool) -> bool {
        std::mem::replace(&mut self.args.dma, dma)
    }

    /// Read `buf.len()` bytes starting at device `offset`
    pub fn read(
        &mut self,
        offset: u32,
        buf: &mut [u8],
        elem_size: u8,
        pb: Option<&ProgressBar>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.transfer(Direction::Read, offset, buf, elem_size, pb)
    }

    /// Write `data` starting at device `offset`
    pub fn write(
        &mut self,
        offset: u32,
        data: &[u8],
        elem_size: u8,
        pb: Option<&ProgressBar>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        // The DMA path takes a mutable buffer even when it only reads it
        let mut buf = data.to_vec();
        self.transfer(Direction::Write, offset, &mut buf, elem_size, pb)
    }

    fn transfer(
        &mut self,
        dir: Direction,
        offset: u32,
        buf: &mut [u8],
        elem_size: u8,
        pb: Option<&ProgressBar>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if elem_size == 0 || buf.len() % elem_size as usize != 0 {
            return Err(format!(
                "Length {} is not a multiple of the element size {}",
                buf.len(),
                elem_size
            )
            .into());
        }

        let base = self.psram.profile().base_address;
        let step = TRANSFER_STEP - TRANSFER_STEP % elem_size as usize;
        let mut done = 0usize;

        for chunk in buf.chunks_mut(step) {
            let addr = base + offset + done as u32;
            let count = (chunk.len() / elem_size as usize) as u32;

            if self.args.dma {
                self.transfer_dma(dir, addr, chunk, elem_size, count)?;
            } else {
                match dir {
                    Direction::Read => self.psram.read_blocking(addr, chunk, elem_size, count)?,
                    Direction::Write => self.psram.write_blocking(addr, chunk, elem_size, count)?,
                }
            }

            done += chunk.len();
            if let Some(pb) = pb {
                pb.set_position(done as u64);
            }
        }

        Ok(())
    }

    fn transfer_dma(
        &mut self,
        dir: Direction,
        addr: u32,
        chunk: &mut [u8],
        elem_size: u8,
        count: u32,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let status = self.status;
        status.reset();
        // SAFETY: the emulator delivers every completion from the drain loop
        // below, so the chain ends before `chunk` is touched again.
        let buffer = unsafe { DmaBuffer::from_raw(chunk.as_mut_ptr(), chunk.len()) };

        match dir {
            Direction::Read => self.psram.read_dma(addr, buffer, elem_size, count, status)?,
            Direction::Write => self.psram.write_dma(addr, buffer, elem_size, count, status)?,
        }

        while let Some((event, channel)) = self.dummy.take_completion() {
            let step = self.psram.on_dma_complete(event, channel);
            log::trace!("DMA {:?} on channel {}: {:?}", event, channel, step);
        }

        match status.get() {
            DmaState::Done => Ok(()),
            DmaState::Fail => Err(qpsram_core::Error::Failed.into()),
            DmaState::None => Err("DMA chain stopped without reporting".into()),
        }
    }

    /// Write the memory array back to the image file, if one was given
    pub fn save_image(&self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(path) = &self.args.image {
            let data = self.dummy.read_memory(0, self.profile().size() as usize);
            fs::write(path, &data)?;
            log::info!("Saved {} bytes to {:?}", data.len(), path);
        }
        Ok(())
    }

    /// Protocol violations the emulated chip has seen so far
    pub fn protocol_errors(&self) -> usize {
        self.dummy.protocol_errors()
    }
}

/// Progress bar in the style used by every transfer command
pub fn progress_bar(total: u64) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qpsram_core::profile::APS6404L_3SQR;

    fn args(dma: bool) -> DeviceArgs {
        DeviceArgs {
            device: String::from("APS6404L-3SQR"),
            image: None,
            dma,
            dma_chunk: None,
        }
    }

    #[test]
    fn test_blocking_round_trip() {
        let mut session = Session::open(APS6404L_3SQR, &args(false)).unwrap();
        let data: Vec<u8> = (0..200u32).map(|i| i as u8).collect();
        session.write(0x3F8, &data, 1, None).unwrap();

        let mut back = vec![0u8; data.len()];
        session.read(0x3F8, &mut back, 1, None).unwrap();
        assert_eq!(back, data);
        assert_eq!(session.protocol_errors(), 0);
    }

    #[test]
    fn test_dma_round_trip_halfwords() {
        let mut session = Session::open(APS6404L_3SQR, &args(true)).unwrap();
        let data: Vec<u8> = (0..512u32).map(|i| (i * 7) as u8).collect();
        session.write(0x100, &data, 2, None).unwrap();

        let mut back = vec![0u8; data.len()];
        session.read(0x100, &mut back, 2, None).unwrap();
        assert_eq!(back, data);
        assert!(session.dummy.is_auto());
    }

    #[test]
    fn test_length_must_fit_elements() {
        let mut session = Session::open(APS6404L_3SQR, &args(false)).unwrap();
        assert!(session.write(0, &[1, 2, 3], 2, None).is_err());
    }
}
