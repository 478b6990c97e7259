//! Command header decoding for the emulated chip

use qpsram_core::bus::{opcodes, swap_address, BusWidth, PhaseEncoding};
use qpsram_core::profile::{DeviceProfile, ProfileFeatures};

/// One FIFO word as it was shifted onto the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Shifted {
    pub width: BusWidth,
    pub bits: u8,
    pub value: u32,
}

/// Reads an MSB-first bit stream out of shifted words
struct BitReader<'a> {
    words: &'a [Shifted],
    next: usize,
    acc: u64,
    acc_bits: u32,
}

impl<'a> BitReader<'a> {
    fn new(words: &'a [Shifted]) -> Self {
        Self {
            words,
            next: 0,
            acc: 0,
            acc_bits: 0,
        }
    }

    /// Take `bits` bits (at most 32) and the width of the word they ended in
    fn take(&mut self, bits: u32) -> Option<(u32, BusWidth)> {
        let mut width = self.words.get(self.next.saturating_sub(1))?.width;
        while self.acc_bits < bits {
            let word = self.words.get(self.next)?;
            self.next += 1;
            self.acc = (self.acc << word.bits) | (word.value as u64 & mask(word.bits as u32));
            self.acc_bits += word.bits as u32;
            width = word.width;
        }
        self.acc_bits -= bits;
        let value = (self.acc >> self.acc_bits) & mask(bits);
        self.acc &= mask(self.acc_bits);
        Some((value as u32, width))
    }

    /// Words after the header, if the header ended on a word boundary
    fn rest(&self) -> Option<&'a [Shifted]> {
        (self.acc_bits == 0).then(|| &self.words[self.next..])
    }
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Decoded command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    ArrayRead { addr: u32 },
    ArrayWrite { addr: u32 },
    ReadId,
    ModeRegRead,
    ModeRegWrite { value: u8 },
    EnterQpi,
    ExitQpi,
    ResetEnable,
    Reset,
    /// Burst toggle in QPI mode, half sleep in SPI mode
    ToggleOrSleep,
}

/// Why a transaction was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    Incomplete,
    Misaligned,
    WrongWidth { expected: BusWidth, got: BusWidth },
    UnknownOpcode(u8),
    BadExtension(u8),
}

/// A decoded header and the words following it
pub(crate) struct Header<'a> {
    pub opcode: u8,
    pub command: Command,
    pub data: &'a [Shifted],
}

/// Decode the header of a transaction as the chip sees it
///
/// Only the command phase width is checked against the interface mode; the
/// widths of later phases are taken from the profile the chip is wired for.
pub(crate) fn decode<'a>(
    words: &'a [Shifted],
    profile: &DeviceProfile,
    qpi: bool,
) -> Result<Header<'a>, Fault> {
    let mut rd = BitReader::new(words);
    let (opcode, width) = rd.take(8).ok_or(Fault::Incomplete)?;
    let opcode = opcode as u8;

    let expected = if qpi { BusWidth::Quad } else { BusWidth::Single };
    if width != expected {
        return Err(Fault::WrongWidth {
            expected,
            got: width,
        });
    }

    let command = if opcode == profile.read_opcode || opcode == profile.write_opcode {
        let addr = array_address(&mut rd, profile)?;
        if opcode == profile.read_opcode {
            let dummy = profile.read_dummy_bits();
            if dummy > 0 {
                rd.take(dummy).ok_or(Fault::Incomplete)?;
            }
            Command::ArrayRead { addr }
        } else {
            Command::ArrayWrite { addr }
        }
    } else {
        match opcode {
            opcodes::READ_ID => {
                if qpi {
                    return Err(Fault::UnknownOpcode(opcode));
                }
                rd.take(24).ok_or(Fault::Incomplete)?;
                Command::ReadId
            }
            opcodes::MODE_REG_READ => {
                rd.take(24).ok_or(Fault::Incomplete)?;
                rd.take(if qpi { 24 } else { 8 }).ok_or(Fault::Incomplete)?;
                Command::ModeRegRead
            }
            opcodes::MODE_REG_WRITE => {
                rd.take(24).ok_or(Fault::Incomplete)?;
                let (value, _) = rd.take(8).ok_or(Fault::Incomplete)?;
                Command::ModeRegWrite { value: value as u8 }
            }
            opcodes::ENTER_QPI => Command::EnterQpi,
            opcodes::EXIT_QPI => Command::ExitQpi,
            opcodes::RESET_ENABLE => Command::ResetEnable,
            opcodes::RESET => Command::Reset,
            opcodes::BURST_LENGTH_TOGGLE => Command::ToggleOrSleep,
            _ => return Err(Fault::UnknownOpcode(opcode)),
        }
    };

    let data = rd.rest().ok_or(Fault::Misaligned)?;
    Ok(Header {
        opcode,
        command,
        data,
    })
}

fn array_address(rd: &mut BitReader<'_>, profile: &DeviceProfile) -> Result<u32, Fault> {
    if profile.features.contains(ProfileFeatures::CMD_16BIT) {
        let (ext, _) = rd.take(8).ok_or(Fault::Incomplete)?;
        if ext as u8 != profile.cmd_ext {
            return Err(Fault::BadExtension(ext as u8));
        }
    }

    let (mut addr, _) = rd
        .take(profile.address_width.bits() as u32)
        .ok_or(Fault::Incomplete)?;
    let split = PhaseEncoding::for_profile(profile).is_split();
    if split && profile.features.contains(ProfileFeatures::BYTE_SWAP) {
        addr = swap_address(addr);
    }

    if profile.features.contains(ProfileFeatures::EXTRA_BYTE) {
        rd.take(8).ok_or(Fault::Incomplete)?;
    }
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qpsram_core::profile::APS6404L_3SQR;

    fn bytes(width: BusWidth, data: &[u8]) -> Vec<Shifted> {
        data.iter()
            .map(|&b| Shifted {
                width,
                bits: 8,
                value: b as u32,
            })
            .collect()
    }

    #[test]
    fn test_packed_read_header() {
        let words = bytes(BusWidth::Quad, &[0xEB, 0x01, 0x02, 0x03, 0, 0, 0]);
        let header = decode(&words, &APS6404L_3SQR, true).unwrap();
        assert_eq!(header.command, Command::ArrayRead { addr: 0x01_0203 });
        assert!(header.data.is_empty());
    }

    #[test]
    fn test_write_data_follows_header() {
        let mut words = bytes(BusWidth::Quad, &[0x38, 0, 0, 0x10]);
        words.push(Shifted {
            width: BusWidth::Quad,
            bits: 32,
            value: 0xDEAD_BEEF,
        });
        let header = decode(&words, &APS6404L_3SQR, true).unwrap();
        assert_eq!(header.command, Command::ArrayWrite { addr: 0x10 });
        assert_eq!(header.data.len(), 1);
    }

    #[test]
    fn test_split_words_reassemble() {
        // 16-bit command, then a 24-bit address in one word
        let mut profile = APS6404L_3SQR;
        profile.features |= ProfileFeatures::CMD_16BIT;
        profile.cmd_ext = 0x5A;
        let words = [
            Shifted {
                width: BusWidth::Quad,
                bits: 16,
                value: 0x385A,
            },
            Shifted {
                width: BusWidth::Quad,
                bits: 24,
                value: 0x12_3456,
            },
        ];
        let header = decode(&words, &profile, true).unwrap();
        assert_eq!(header.command, Command::ArrayWrite { addr: 0x12_3456 });
    }

    #[test]
    fn test_command_width_must_match_interface() {
        let words = bytes(BusWidth::Single, &[0x35]);
        assert!(decode(&words, &APS6404L_3SQR, false).is_ok());
        assert_eq!(
            decode(&words, &APS6404L_3SQR, true).err(),
            Some(Fault::WrongWidth {
                expected: BusWidth::Quad,
                got: BusWidth::Single
            })
        );
    }

    #[test]
    fn test_read_id_rejected_in_qpi() {
        let words = bytes(BusWidth::Quad, &[0x9F, 0, 0, 0]);
        assert_eq!(
            decode(&words, &APS6404L_3SQR, true).err(),
            Some(Fault::UnknownOpcode(0x9F))
        );
    }

    #[test]
    fn test_truncated_header() {
        let words = bytes(BusWidth::Quad, &[0xEB, 0x00]);
        assert_eq!(
            decode(&words, &APS6404L_3SQR, true).err(),
            Some(Fault::Incomplete)
        );
    }
}
