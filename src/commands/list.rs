//! List command implementation

use qpsram_core::profile::{ProfileDatabase, ProfileFeatures};

/// List all known device profiles
pub fn list_devices(db: &ProfileDatabase, vendor_filter: Option<&str>) {
    println!("Known PSRAM devices:");
    println!();
    println!(
        "{:<12} {:<20} {:>10} {:>8} {:>10}",
        "Vendor", "Name", "Size", "ID", "Interface"
    );
    println!("{}", "-".repeat(64));

    for named in db.profiles() {
        if let Some(vendor) = vendor_filter {
            if !named.vendor.to_lowercase().contains(&vendor.to_lowercase()) {
                continue;
            }
        }

        let profile = &named.profile;
        let id_str = format!("{:02X} {:02X}", profile.id.manufacturer, profile.id.kgd);
        let interface = if profile.features.contains(ProfileFeatures::QPI) {
            "QPI"
        } else {
            "SPI"
        };

        println!(
            "{:<12} {:<20} {:>10} {:>8} {:>10}",
            named.vendor,
            named.name,
            format_size(profile.size()),
            id_str,
            interface
        );
    }
}

pub(crate) fn format_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(8 * 1024 * 1024), "8 MiB");
        assert_eq!(format_size(2048), "2 KiB");
        assert_eq!(format_size(16), "16 B");
    }
}
