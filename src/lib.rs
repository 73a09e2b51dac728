#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

pub mod error;
mod find;
mod internal;
pub mod platform;
mod raw;

const KEY_LENGTH: usize = 16;
const ADDRESS_LENGTH: usize = 6;

/// A 128-bit security key (LTK, IRK or CSRK).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Key([u8; KEY_LENGTH]);

impl Key {
    /// Usage: `Key::from_array(&irk)`
    ///
    /// Tip: use a const context for fixed keys in tests:
    ///   `let irk = const { Key::from_array(&[0xAA; 16]) };`
    pub const fn from_array(src: &[u8; KEY_LENGTH]) -> Self {
        Self(*src)
    }

    pub const fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key(")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<[u8; KEY_LENGTH]> for Key {
    fn from(value: [u8; KEY_LENGTH]) -> Self {
        Self(value)
    }
}

/// A 48-bit Bluetooth device address in over-the-air (little endian) byte order.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub const fn from_array(src: &[u8; ADDRESS_LENGTH]) -> Self {
        Self(*src)
    }

    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // most significant byte first, the way addresses are usually displayed
        let [a, b, c, d, e, g] = self.0;
        write!(f, "Address({g:02X}:{e:02X}:{d:02X}:{c:02X}:{b:02X}:{a:02X})")
    }
}

/// Identity of a peer: its address together with the address type byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerAddress {
    pub addr: Address,
    pub addr_type: u8,
}

impl PeerAddress {
    pub const fn new(addr: Address, addr_type: u8) -> Self {
        Self { addr, addr_type }
    }

    pub const fn public(addr: Address) -> Self {
        Self::new(addr, AddressType::Public as u8)
    }

    pub const fn random(addr: Address) -> Self {
        Self::new(addr, AddressType::Random as u8)
    }
}

pub use find::Find;
pub use raw::{AddressType, BondRecord};

extern crate alloc;

use crate::error::Error;
use crate::platform::Platform;
use crate::raw::{MAX_CAPACITY, RECORD_SIZE, SlotState};
use alloc::vec::Vec;
use core::fmt;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BondListStatistics {
    pub empty: u16,
    pub valid: u16,
    pub invalid: u16,
    pub illegal: u16,
}

/// A fixed capacity list of bonds stored in a dedicated flash region.
///
/// Nothing is cached in memory, every query scans the flash. The region is split into slots of
/// [`BondRecord`] size. New records are appended to the first empty slot, removed records leave a
/// hole until the region runs out of empty slots and gets defragmented.
pub struct BondList<T: Platform> {
    pub(crate) hal: T,
    pub(crate) base_address: usize,
    pub(crate) sectors: u16,
    pub(crate) capacity: u16,
}

impl<T: Platform> BondList<T> {
    /// Creates a bond list on top of the region `region_offset..region_offset + region_size`.
    ///
    /// The region has to be aligned to flash sectors, lie within the flash and a sector has to fit
    /// a whole number of records. Nothing is read or written, existing records are picked up by the first query.
    pub fn new(region_offset: usize, region_size: usize, hal: T) -> Result<BondList<T>, Error> {
        if !T::ERASE_SIZE.is_multiple_of(RECORD_SIZE)
            || !RECORD_SIZE.is_multiple_of(T::READ_SIZE)
            || !RECORD_SIZE.is_multiple_of(T::WRITE_SIZE)
        {
            return Err(Error::InvalidSectorSize);
        }

        if !region_offset.is_multiple_of(T::ERASE_SIZE) {
            return Err(Error::InvalidPartitionOffset);
        }

        if region_size == 0 || !region_size.is_multiple_of(T::ERASE_SIZE) {
            return Err(Error::InvalidPartitionSize);
        }

        // flash offsets are u32, the region has to be addressable and inside the flash
        match region_offset.checked_add(region_size) {
            Some(end) if end <= hal.capacity() && end <= u32::MAX as usize => {}
            _ => return Err(Error::InvalidPartitionSize),
        }

        let sectors = region_size / T::ERASE_SIZE;
        let capacity = region_size / RECORD_SIZE;
        if sectors > u16::MAX as usize || capacity > MAX_CAPACITY {
            return Err(Error::InvalidPartitionSize);
        }

        Ok(Self {
            hal,
            base_address: region_offset,
            sectors: sectors as u16,
            capacity: capacity as u16,
        })
    }

    /// Maximum number of bonds the region can hold.
    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    /// Number of valid bonds.
    pub fn size(&mut self) -> Result<u16, Error> {
        self.count_valid()
    }

    /// IRKs of all valid bonds in storage order, e.g. to populate the resolving list.
    pub fn get_all_irks(&mut self) -> Result<Vec<Key>, Error> {
        self.collect_valid(|record| record.irk)
    }

    /// All valid bonds in storage order.
    pub fn records(&mut self) -> Result<Vec<BondRecord>, Error> {
        self.collect_valid(|record| *record)
    }

    /// Look up a bond.
    ///
    /// Supported queries are an IRK (`&Key`), a peer identity (`&PeerAddress`) and the logical
    /// index (`u16`) returned by [`BondList::add`]. If several bonds match, the first one in
    /// storage order wins.
    pub fn find<Q>(&mut self, query: Q) -> Result<Option<BondRecord>, Error>
    where
        BondList<T>: Find<Q>,
    {
        Find::find(self, query)
    }

    pub fn find_by_irk(&mut self, irk: &Key) -> Result<Option<BondRecord>, Error> {
        self.find(irk)
    }

    pub fn find_by_addr(
        &mut self,
        addr: &Address,
        addr_type: u8,
    ) -> Result<Option<BondRecord>, Error> {
        self.find(&PeerAddress::new(*addr, addr_type))
    }

    /// Look up a bond by the logical index returned from [`BondList::add`].
    pub fn get(&mut self, index: u16) -> Result<Option<BondRecord>, Error> {
        self.find(index)
    }

    /// Writes a new bond and returns its logical index, starting at 1.
    ///
    /// The region is defragmented first if there is no empty slot left behind the last record.
    /// Returns [`Error::StoreFull`] if all slots hold valid bonds.
    pub fn add(&mut self, record: &BondRecord) -> Result<u16, Error> {
        self.add_record(record)
    }

    /// Invalidates the bond with the given logical index. The slot is reclaimed by the next
    /// defragmentation.
    pub fn remove(&mut self, index: u16) -> Result<(), Error> {
        self.remove_record(index)
    }

    /// Erases every sector of the region that is not blank already.
    pub fn remove_all(&mut self) -> Result<(), Error> {
        self.erase_region()
    }

    /// Moves all valid bonds to the start of the region and renumbers them densely in storage
    /// order, starting at 1. Previously returned indices become stale.
    ///
    /// The records are staged in RAM while the region is erased. A flash error after the erase
    /// loses the records that were not written back yet.
    pub fn defragment(&mut self) -> Result<(), Error> {
        self.compact()
    }

    /// Slot usage of the region.
    pub fn statistics(&mut self) -> Result<BondListStatistics, Error> {
        let mut statistics = BondListStatistics {
            empty: 0,
            valid: 0,
            invalid: 0,
            illegal: 0,
        };

        for slot in 0..self.capacity {
            match self.load_slot_state(slot)? {
                SlotState::Empty => statistics.empty += 1,
                SlotState::Valid(_) => statistics.valid += 1,
                SlotState::Invalid => statistics.invalid += 1,
                SlotState::Illegal(_) => statistics.illegal += 1,
            }
        }

        Ok(statistics)
    }

    /// Releases the flash handle.
    pub fn into_inner(self) -> T {
        self.hal
    }
}
