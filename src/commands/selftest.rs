//! Selftest command implementation
//!
//! Runs the transfer paths and every optional device command the profile
//! supports against the emulator, checking data and chip state after each.

use qpsram_core::profile::{ProfileFeatures, WrapSize};

use crate::session::Session;

type CheckResult = Result<Outcome, Box<dyn std::error::Error>>;

enum Outcome {
    Pass,
    Skip(&'static str),
}

/// Run the selftest command
pub fn run_selftest(session: &mut Session, length: u32) -> Result<(), Box<dyn std::error::Error>> {
    let size = session.profile().size();
    if length == 0 || length > size / 2 {
        return Err(format!("Pattern length must be between 1 and 0x{:X}", size / 2).into());
    }

    let checks: [(&str, fn(&mut Session, u32) -> CheckResult); 9] = [
        ("read ID", check_read_id),
        ("blocking byte round trip", check_blocking_bytes),
        ("blocking word round trip", check_blocking_words),
        ("DMA round trip", check_dma),
        ("memory-mapped readback", check_mapped),
        ("burst length toggle", check_toggle),
        ("wrap size", check_wrap_size),
        ("half sleep", check_half_sleep),
        ("protocol", check_protocol),
    ];

    let mut failed = 0;
    for (name, check) in checks {
        match check(session, length) {
            Ok(Outcome::Pass) => println!("  [PASS] {}", name),
            Ok(Outcome::Skip(why)) => println!("  [SKIP] {} ({})", name, why),
            Err(e) => {
                println!("  [FAIL] {}: {}", name, e);
                failed += 1;
            }
        }
    }

    println!();
    if failed > 0 {
        return Err(format!("{} of {} checks failed", failed, checks.len()).into());
    }
    println!("All checks passed");
    Ok(())
}

fn pattern(len: u32, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) ^ (i >> 8) as u8)
        .collect()
}

fn round_trip(
    session: &mut Session,
    offset: u32,
    len: u32,
    elem_size: u8,
    seed: u8,
) -> CheckResult {
    let len = len - len % elem_size as u32;
    let data = pattern(len, seed);

    session.write(offset, &data, elem_size, None)?;
    let mut back = vec![0u8; len as usize];
    session.read(offset, &mut back, elem_size, None)?;

    match data.iter().zip(&back).position(|(a, b)| a != b) {
        Some(pos) => Err(format!(
            "mismatch at offset 0x{:X}: wrote 0x{:02X}, read 0x{:02X}",
            offset as usize + pos,
            data[pos],
            back[pos]
        )
        .into()),
        None => Ok(Outcome::Pass),
    }
}

fn check_read_id(session: &mut Session, _length: u32) -> CheckResult {
    let id = session.psram.read_id()?;
    let expected = session.profile().id;
    if id.id != expected {
        return Err(format!(
            "got {:02X}/{:02X}, expected {:02X}/{:02X}",
            id.id.manufacturer, id.id.kgd, expected.manufacturer, expected.kgd
        )
        .into());
    }
    Ok(Outcome::Pass)
}

fn check_blocking_bytes(session: &mut Session, length: u32) -> CheckResult {
    // Start just short of a page so the first chunk is a partial one
    let offset = session.profile().page_size * 64 - 8;
    let was_dma = session.set_dma(false);
    let result = round_trip(session, offset, length, 1, 0x11);
    session.set_dma(was_dma);
    result
}

fn check_blocking_words(session: &mut Session, length: u32) -> CheckResult {
    let was_dma = session.set_dma(false);
    let result = round_trip(session, 0x800, length, 4, 0x22);
    session.set_dma(was_dma);
    result
}

fn check_dma(session: &mut Session, length: u32) -> CheckResult {
    let was_dma = session.set_dma(true);
    let result = round_trip(session, 0x1004, length, 2, 0x33);
    session.set_dma(was_dma);
    result
}

fn check_mapped(session: &mut Session, length: u32) -> CheckResult {
    let len = length.min(4096);
    let data = pattern(len, 0x44);
    session.write(0, &data, 1, None)?;

    let base = session.profile().base_address;
    match session.dummy.mapped_read(base, len as usize) {
        Some(back) if back == data => Ok(Outcome::Pass),
        Some(_) => Err("mapped data differs from what was written".into()),
        None => Err("controller is not in auto mode".into()),
    }
}

fn check_toggle(session: &mut Session, length: u32) -> CheckResult {
    let profile = session.profile();
    if !profile.features.contains(ProfileFeatures::BURST_TOGGLE) {
        return Ok(Outcome::Skip("not supported"));
    }
    if !session.psram.is_qpi() {
        return Ok(Outcome::Skip("needs QPI mode"));
    }

    session.psram.toggle_burst_length()?;
    if session.psram.wrap_size() != profile.toggle_wrap
        || session.dummy.wrap_size() != profile.toggle_wrap
    {
        return Err(format!(
            "wrap is {} (device {}), expected {}",
            session.psram.wrap_size(),
            session.dummy.wrap_size(),
            profile.toggle_wrap
        )
        .into());
    }
    let result = round_trip(session, 0x2010, length, 1, 0x55);
    session.psram.toggle_burst_length()?;
    result
}

fn check_wrap_size(session: &mut Session, length: u32) -> CheckResult {
    if !session
        .profile()
        .features
        .contains(ProfileFeatures::MODE_REG_WRAP)
    {
        return Ok(Outcome::Skip("not supported"));
    }

    session.psram.set_wrap_size(WrapSize::Wrap32)?;
    if session.dummy.wrap_size() != 32 {
        return Err(format!("device wrap is {}, expected 32", session.dummy.wrap_size()).into());
    }
    let result = round_trip(session, 0x3004, length, 1, 0x66);

    // Reset brings the wrap back to its power-up value
    session.psram.reset()?;
    if session.psram.wrap_size() != session.dummy.wrap_size() {
        return Err("wrap size out of sync after reset".into());
    }
    result
}

fn check_half_sleep(session: &mut Session, length: u32) -> CheckResult {
    if !session
        .profile()
        .features
        .contains(ProfileFeatures::HALF_SLEEP)
    {
        return Ok(Outcome::Skip("not supported"));
    }

    let len = length.min(4096);
    let data = pattern(len, 0x77);
    session.write(0x4000, &data, 1, None)?;

    session.psram.sleep()?;
    if !session.dummy.is_sleeping() {
        return Err("device did not enter half sleep".into());
    }
    let mut back = vec![0u8; len as usize];
    if session.read(0x4000, &mut back, 1, None).is_ok() {
        return Err("transfer accepted while sleeping".into());
    }

    session.psram.wakeup()?;
    session.read(0x4000, &mut back, 1, None)?;
    if back != data {
        return Err("data lost across half sleep".into());
    }
    Ok(Outcome::Pass)
}

fn check_protocol(session: &mut Session, _length: u32) -> CheckResult {
    match session.protocol_errors() {
        0 => Ok(Outcome::Pass),
        n => Err(format!("device saw {} protocol errors", n).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::DeviceArgs;
    use qpsram_core::profile::{APS1604M_3SQR, APS6404L_3SQR, APS6404L_3SQR_SPI};

    fn open(profile: qpsram_core::profile::DeviceProfile, dma: bool) -> Session {
        let args = DeviceArgs {
            device: String::new(),
            image: None,
            dma,
            dma_chunk: None,
        };
        Session::open(profile, &args).unwrap()
    }

    #[test]
    fn test_selftest_qpi_profile() {
        let mut session = open(APS6404L_3SQR, false);
        run_selftest(&mut session, 0x1000).unwrap();
    }

    #[test]
    fn test_selftest_spi_profile_with_dma() {
        let mut session = open(APS6404L_3SQR_SPI, true);
        run_selftest(&mut session, 0x400).unwrap();
        assert!(!session.psram.is_qpi());
    }

    #[test]
    fn test_selftest_small_device() {
        let mut session = open(APS1604M_3SQR, false);
        run_selftest(&mut session, 0x100).unwrap();
    }

    #[test]
    fn test_selftest_rejects_oversized_pattern() {
        let mut session = open(APS1604M_3SQR, false);
        assert!(run_selftest(&mut session, 0x20_0000).is_err());
    }
}
