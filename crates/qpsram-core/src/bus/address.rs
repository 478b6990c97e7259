//! Address width types

/// Width of the address phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum AddressWidth {
    /// 8-bit address
    Bits8,
    /// 16-bit address
    Bits16,
    /// 24-bit address - supports up to 16 MiB
    #[default]
    Bits24,
    /// 32-bit address
    Bits32,
}

impl AddressWidth {
    /// Returns the number of address bits
    pub const fn bits(&self) -> u8 {
        self.bytes() * 8
    }

    /// Returns the number of address bytes
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::Bits8 => 1,
            Self::Bits16 => 2,
            Self::Bits24 => 3,
            Self::Bits32 => 4,
        }
    }

    /// Truncate an address to the bits sent on the wire
    pub const fn mask(&self, address: u32) -> u32 {
        match self {
            Self::Bits32 => address,
            _ => address & ((1u32 << self.bits()) - 1),
        }
    }

    /// Encode an address into bytes, most significant byte first
    ///
    /// Returns the number of bytes written.
    pub fn encode(&self, address: u32, buf: &mut [u8]) -> usize {
        let n = self.bytes() as usize;
        let be = address.to_be_bytes();
        buf[..n].copy_from_slice(&be[4 - n..]);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_24bit() {
        let mut buf = [0u8; 4];
        let n = AddressWidth::Bits24.encode(0x0A12_3456, &mut buf);
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], &[0x12, 0x34, 0x56]);
    }

    #[test]
    fn test_mask() {
        assert_eq!(AddressWidth::Bits8.mask(0x1234), 0x34);
        assert_eq!(AddressWidth::Bits16.mask(0x12_3456), 0x3456);
        assert_eq!(AddressWidth::Bits24.mask(0x0A12_3456), 0x12_3456);
        assert_eq!(AddressWidth::Bits32.mask(0x0A12_3456), 0x0A12_3456);
    }
}
