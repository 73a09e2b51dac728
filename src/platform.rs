use alloc::vec;
use embedded_storage::nor_flash::{MultiwriteNorFlash, ReadNorFlash};

/// See README.md for an example implementation.
///
/// Removing a bond programs its state word a second time, so the flash has to tolerate multiple
/// writes to the same word without an erase in between. Drivers that only implement [`NorFlash`]
/// are rejected:
///
/// ```compile_fail
/// use bond_store::BondList;
/// use bond_store::platform::BlankCheck;
/// use embedded_storage::nor_flash::{ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash};
///
/// struct EccFlash;
///
/// impl ErrorType for EccFlash {
///     type Error = NorFlashErrorKind;
/// }
///
/// impl ReadNorFlash for EccFlash {
///     const READ_SIZE: usize = 4;
///
///     fn read(&mut self, _offset: u32, _bytes: &mut [u8]) -> Result<(), Self::Error> {
///         Ok(())
///     }
///
///     fn capacity(&self) -> usize {
///         144
///     }
/// }
///
/// impl NorFlash for EccFlash {
///     const WRITE_SIZE: usize = 4;
///     const ERASE_SIZE: usize = 144;
///
///     fn erase(&mut self, _from: u32, _to: u32) -> Result<(), Self::Error> {
///         Ok(())
///     }
///
///     fn write(&mut self, _offset: u32, _bytes: &[u8]) -> Result<(), Self::Error> {
///         Ok(())
///     }
/// }
///
/// impl BlankCheck for EccFlash {}
///
/// let _bonds = BondList::new(0, 144, EccFlash);
/// ```
///
/// [`NorFlash`]: embedded_storage::nor_flash::NorFlash
pub trait Platform: BlankCheck + MultiwriteNorFlash {}

impl<T: BlankCheck + MultiwriteNorFlash> Platform for T {}

/// Chunk size used by the provided [`BlankCheck::blank_check`] implementation.
const BLANK_CHECK_CHUNK_SIZE: usize = 64;

pub trait BlankCheck: ReadNorFlash {
    /// Returns `true` if all `len` bytes starting at `offset` read back as erased (`0xFF`).
    ///
    /// The provided implementation reads the range in small chunks. Flash controllers with a
    /// hardware blank check should override it.
    fn blank_check(&mut self, offset: u32, len: usize) -> Result<bool, Self::Error> {
        let mut buf = vec![0u8; align_ceil(BLANK_CHECK_CHUNK_SIZE, Self::READ_SIZE)];

        let mut checked = 0;
        while checked < len {
            let chunk = align_ceil(buf.len().min(len - checked), Self::READ_SIZE);
            let chunk = &mut buf[..chunk];
            self.read(offset + checked as u32, chunk)?;
            if chunk.iter().any(|&b| b != 0xFF) {
                return Ok(false);
            }
            checked += chunk.len();
        }

        Ok(true)
    }
}

impl<T: BlankCheck> BlankCheck for &mut T {
    fn blank_check(&mut self, offset: u32, len: usize) -> Result<bool, Self::Error> {
        (**self).blank_check(offset, len)
    }
}

pub trait AlignedOps: Platform {
    fn align_read(size: usize) -> usize {
        align_ceil(size, Self::READ_SIZE)
    }

    fn align_write_floor(size: usize) -> usize {
        align_floor(size, Self::WRITE_SIZE)
    }
}

#[inline(always)]
const fn align_ceil(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size.saturating_add(alignment - 1) & !(alignment - 1)
    } else {
        size.saturating_add(alignment - 1) / alignment * alignment
    }
}

#[inline(always)]
const fn align_floor(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size & !(alignment - 1)
    } else {
        size / alignment * alignment
    }
}

impl<T: Platform> AlignedOps for T {}
