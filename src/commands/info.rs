//! Info command implementation

use qpsram_core::profile::{ProfileDatabase, ProfileFeatures};

use super::list::format_size;
use crate::session::Session;

/// Identify the device and print its profile and current state
pub fn run_info(
    session: &mut Session,
    db: &ProfileDatabase,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = session.psram.read_id()?;
    let profile = session.profile();

    println!("Device Information");
    println!("==================");
    println!(
        "Read ID:          MFID 0x{:02X}, KGD 0x{:02X}, EID {:02X?}",
        id.id.manufacturer, id.id.kgd, id.eid
    );
    for named in db.find_by_id(id.id) {
        println!("Matches:          {} {}", named.vendor, named.name);
    }
    println!(
        "Size:             {} ({} bytes)",
        format_size(profile.size()),
        profile.size()
    );
    println!("Base address:     0x{:08X}", profile.base_address);
    println!("Page size:        {} bytes", profile.page_size);
    println!("Chip select:      {}", profile.chip_select);
    println!(
        "Read command:     0x{:02X}, {} dummy cycles",
        profile.read_opcode, profile.read_dummy_cycles
    );
    println!("Write command:    0x{:02X}", profile.write_opcode);
    println!("Header encoding:  {:?}", session.psram.encoding());
    println!("Features:         {}", format_features(profile.features));
    println!();
    println!("Interface:        {}", if session.psram.is_qpi() { "QPI" } else { "SPI" });
    println!("Burst wrap:       {} bytes", session.psram.wrap_size());
    println!("Device state:     {:?}", session.psram.device_state());
    println!("Bus mode:         {:?}", session.psram.bus_mode());

    Ok(())
}

fn format_features(features: ProfileFeatures) -> String {
    let names: Vec<&str> = features.iter_names().map(|(name, _)| name).collect();
    if names.is_empty() {
        String::from("none")
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_features() {
        assert_eq!(format_features(ProfileFeatures::empty()), "none");
        assert_eq!(
            format_features(ProfileFeatures::QPI | ProfileFeatures::HALF_SLEEP),
            "QPI, HALF_SLEEP"
        );
    }
}
