//! Bus widths and element sizes

use crate::error::{Error, Result};

/// Number of data lines used by one phase of a QSPI transaction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum BusWidth {
    /// One line (standard SPI)
    #[default]
    Single,
    /// Two lines
    Dual,
    /// Four lines (QPI when used for every phase)
    Quad,
}

impl BusWidth {
    /// Returns the number of data lines
    pub const fn lines(&self) -> u8 {
        match self {
            Self::Single => 1,
            Self::Dual => 2,
            Self::Quad => 4,
        }
    }

    /// Controller bus-mode field value for this width
    pub const fn mode_bits(&self) -> u32 {
        match self {
            Self::Single => 0,
            Self::Dual => 1,
            Self::Quad => 2,
        }
    }
}

/// Size of one transfer element (the controller's `hsize`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementSize {
    /// 8-bit elements
    Byte,
    /// 16-bit elements
    HalfWord,
    /// 32-bit elements
    Word,
}

impl ElementSize {
    /// Returns the element size in bytes
    pub const fn bytes(&self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::HalfWord => 2,
            Self::Word => 4,
        }
    }

    /// Returns the element size in bits
    pub const fn bits(&self) -> u8 {
        (self.bytes() * 8) as u8
    }

    /// Assemble one element from little-endian bytes
    ///
    /// `bytes` must hold at least [`Self::bytes`] bytes.
    pub fn load(&self, bytes: &[u8]) -> u32 {
        match self {
            Self::Byte => bytes[0] as u32,
            Self::HalfWord => u16::from_le_bytes([bytes[0], bytes[1]]) as u32,
            Self::Word => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }

    /// Store one element as little-endian bytes
    pub fn store(&self, value: u32, bytes: &mut [u8]) {
        let n = self.bytes() as usize;
        bytes[..n].copy_from_slice(&value.to_le_bytes()[..n]);
    }
}

impl TryFrom<u8> for ElementSize {
    type Error = Error;

    fn try_from(size: u8) -> Result<Self> {
        match size {
            1 => Ok(Self::Byte),
            2 => Ok(Self::HalfWord),
            4 => Ok(Self::Word),
            _ => Err(Error::InvalidSize),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_size_from_u8() {
        assert_eq!(ElementSize::try_from(1), Ok(ElementSize::Byte));
        assert_eq!(ElementSize::try_from(2), Ok(ElementSize::HalfWord));
        assert_eq!(ElementSize::try_from(4), Ok(ElementSize::Word));
        assert_eq!(ElementSize::try_from(0), Err(Error::InvalidSize));
        assert_eq!(ElementSize::try_from(3), Err(Error::InvalidSize));
        assert_eq!(ElementSize::try_from(8), Err(Error::InvalidSize));
    }

    #[test]
    fn test_load_store_little_endian() {
        let mut buf = [0u8; 4];
        ElementSize::HalfWord.store(0xBEEF, &mut buf);
        assert_eq!(buf, [0xEF, 0xBE, 0, 0]);
        assert_eq!(ElementSize::HalfWord.load(&buf), 0xBEEF);

        ElementSize::Word.store(0x1234_5678, &mut buf);
        assert_eq!(buf, [0x78, 0x56, 0x34, 0x12]);
        assert_eq!(ElementSize::Byte.load(&buf), 0x78);
    }
}
