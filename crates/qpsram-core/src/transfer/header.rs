//! Command/address header sequencing

use crate::bus::{packed_header, swap_address, BusWidth, Direction, ElementSize, PhaseEncoding};
use crate::controller::{PhaseDriver, QspiController};
use crate::error::Result;
use crate::profile::{DeviceProfile, ProfileFeatures};

/// Drive the header of a read or write at device offset `offset`
///
/// Leaves chip select asserted and the bus width set for the data phase.
pub(crate) fn drive_header<C: QspiController + ?Sized>(
    drv: &mut PhaseDriver<'_, C>,
    profile: &DeviceProfile,
    encoding: PhaseEncoding,
    dir: Direction,
    offset: u32,
) -> Result<()> {
    let (cmd, dummy_bits) = match dir {
        Direction::Read => (profile.read_opcode, profile.read_dummy_bits()),
        Direction::Write => (profile.write_opcode, 0),
    };
    let addr = profile.address_width.mask(offset);

    match encoding {
        PhaseEncoding::Split {
            cmd_width,
            addr_width,
        } => {
            if profile.features.contains(ProfileFeatures::CMD_16BIT) {
                let word = ((cmd as u32) << 8) | profile.cmd_ext as u32;
                drv.drive_phase(cmd_width, 16, word)?;
            } else {
                drv.drive_phase(cmd_width, 8, cmd as u32)?;
            }

            let addr = if profile.features.contains(ProfileFeatures::BYTE_SWAP) {
                swap_address(addr)
            } else {
                addr
            };
            drv.drive_phase(addr_width, profile.address_width.bits(), addr)?;

            if profile.features.contains(ProfileFeatures::EXTRA_BYTE) {
                drv.drive_phase(profile.widths.extra_byte, 8, 0)?;
            }
            if dummy_bits > 0 {
                drv.drive_phase(profile.widths.dummy, dummy_bits as u8, 0)?;
            }
        }
        PhaseEncoding::Packed { flat_width } => {
            let header = packed_header(cmd, addr, profile.address_width, (dummy_bits / 8) as u8);
            drv.pump_write(&header, ElementSize::Byte, flat_width, true)?;
        }
    }

    drv.select_width(profile.widths.data);
    Ok(())
}

/// Send a plain command byte sequence at the device's interface width
pub(crate) fn send_command<C: QspiController + ?Sized>(
    drv: &mut PhaseDriver<'_, C>,
    width: BusWidth,
    bytes: &[u8],
    keep_cs: bool,
) -> Result<()> {
    log::trace!("command {:02x?}", bytes);
    drv.pump_write(bytes, ElementSize::Byte, width, keep_cs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::mock::{MockQspi, Op};
    use crate::profile::APS6404L_3SQR;

    #[test]
    fn test_packed_read_header() {
        let profile = APS6404L_3SQR;
        let mut ctrl = MockQspi::new();
        let mut drv = PhaseDriver::new(&mut ctrl, 0, 100);
        drive_header(
            &mut drv,
            &profile,
            PhaseEncoding::for_profile(&profile),
            Direction::Read,
            0x12_3456,
        )
        .unwrap();

        let pushed: std::vec::Vec<u32> = ctrl
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Push(8, b) => Some(*b),
                _ => None,
            })
            .collect();
        // 6 quad dummy cycles = 3 bytes
        assert_eq!(pushed, [0xEB, 0x12, 0x34, 0x56, 0, 0, 0]);
        assert!(!ctrl.ops.contains(&Op::DeassertCs));
    }

    #[test]
    fn test_split_header_with_swap_and_extension() {
        let mut profile = APS6404L_3SQR;
        profile.widths.instruction = BusWidth::Single;
        profile.cmd_ext = 0x5A;
        profile.features |= ProfileFeatures::CMD_16BIT | ProfileFeatures::BYTE_SWAP;
        let encoding = PhaseEncoding::for_profile(&profile);
        assert!(encoding.is_split());

        let mut ctrl = MockQspi::new();
        let mut drv = PhaseDriver::new(&mut ctrl, 0, 100);
        drive_header(&mut drv, &profile, encoding, Direction::Write, 0x01_0203).unwrap();

        assert_eq!(
            ctrl.ops,
            [
                Op::Width(BusWidth::Single),
                Op::Push(16, 0x385A),
                Op::TriggerWrite,
                Op::Width(BusWidth::Quad),
                Op::Push(24, 0x03_0201),
                Op::TriggerWrite,
            ]
        );
    }
}
