use crate::platform::{AlignedOps, Platform};
use crate::{Address, Key};
use alloc::vec;
use core::mem::size_of;
#[cfg(feature = "defmt")]
use defmt::trace;

pub(crate) const RECORD_SIZE: usize = size_of::<BondRecord>();

/// The bit pattern of an erased state word. No record was ever written to the slot.
pub(crate) const STATE_EMPTY: u16 = 0xFFFF;

/// A record was written to the slot and invalidated afterwards.
pub(crate) const STATE_INVALID: u16 = 0x0000;

/// Logical indices are stored in the state word and must not collide with [`STATE_EMPTY`].
pub(crate) const MAX_CAPACITY: usize = STATE_EMPTY as usize - 1;

// Compile-time assertion to ensure the persisted layout doesn't change by accident
const _: () = assert!(RECORD_SIZE == 72, "Bond record must be 72 bytes");

/// Bonding information of a single peer as it is persisted in flash.
///
/// The layout is fixed: records written by an older firmware have to be readable by a newer one.
/// `state` is managed by the store. Whatever is passed to [`crate::BondList::add`] is replaced by
/// the assigned index.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BondRecord {
    pub state: u16,
    pub pairing_level: u8,
    /// Non-zero if the CSRK has been exchanged
    pub csrk_exchanged: u8,
    /// Long term key
    pub ltk: Key,
    /// Encryption diversifier
    pub ediv: u16,
    pub reserved: [u8; 2],
    pub addr: Address,
    pub addr_type: u8,
    /// Non-zero if the IRK has been exchanged
    pub irk_exchanged: u8,
    /// Connection signature resolving key
    pub csrk: Key,
    /// Identity resolving key
    pub irk: Key,
    pub rand: [u8; 8],
}

impl Default for BondRecord {
    fn default() -> Self {
        Self {
            state: STATE_INVALID,
            pairing_level: 0,
            csrk_exchanged: 0,
            ltk: Key::from_array(&[0; 16]),
            ediv: 0,
            reserved: [0xFF; 2],
            addr: Address::from_array(&[0; 6]),
            addr_type: 0,
            irk_exchanged: 0,
            csrk: Key::from_array(&[0; 16]),
            irk: Key::from_array(&[0; 16]),
            rand: [0; 8],
        }
    }
}

impl BondRecord {
    /// Interprets `addr_type`. Returns `None` for reserved values.
    pub fn address_type(&self) -> Option<AddressType> {
        AddressType::from_repr(self.addr_type)
    }

    pub(crate) fn to_bytes(self) -> [u8; RECORD_SIZE] {
        let raw = RawBondRecord { record: self };
        // Safety: BondRecord is repr(C) without padding, so every byte is initialized
        unsafe { raw.raw }
    }

    pub(crate) fn from_bytes(raw: [u8; RECORD_SIZE]) -> Self {
        let raw = RawBondRecord { raw };
        // Safety: BondRecord only consists of integers and byte arrays, any bit pattern is valid
        unsafe { raw.record }
    }
}

pub(crate) union RawBondRecord {
    pub(crate) record: BondRecord,
    pub(crate) raw: [u8; RECORD_SIZE],
}

#[derive(strum::FromRepr, strum::Display, Debug, Eq, PartialEq, Copy, Clone)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressType {
    Public = 0x00,
    Random = 0x01,
}

/// Classification of a slot based on its state word.
#[derive(Debug, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum SlotState {
    // All bits set, default state after flash erase.
    Empty,

    // Holds a live record with the contained logical index.
    Valid(u16),

    // Record was removed and is waiting for defragmentation.
    Invalid,

    // Neither of the above. Not produced by this crate, e.g. a torn write or foreign data.
    Illegal(u16),
}

impl SlotState {
    pub(crate) fn from_raw(state: u16, capacity: u16) -> Self {
        match state {
            STATE_EMPTY => SlotState::Empty,
            STATE_INVALID => SlotState::Invalid,
            index if is_valid_state(index, capacity) => SlotState::Valid(index),
            other => SlotState::Illegal(other),
        }
    }
}

/// The single source of truth for "does this slot hold a live record".
#[inline(always)]
pub(crate) const fn is_valid_state(state: u16, capacity: u16) -> bool {
    state != STATE_EMPTY && state != STATE_INVALID && state <= capacity
}

#[inline(always)]
pub(crate) fn write_aligned<T: Platform>(
    hal: &mut T,
    offset: u32,
    bytes: &[u8],
) -> Result<(), T::Error> {
    #[cfg(feature = "defmt")]
    trace!("write_aligned @{:#08x}: [{}]", offset, bytes.len());

    if bytes.len().is_multiple_of(T::WRITE_SIZE) {
        hal.write(offset, bytes)
    } else {
        let pivot = T::align_write_floor(bytes.len());
        let header = &bytes[..pivot];
        let trailer = &bytes[pivot..];
        if !header.is_empty() {
            hal.write(offset, header)?;
        }

        // padding with ones keeps the neighbouring bytes untouched, flash can only flip 1 to 0
        let mut buf = vec![0xFFu8; T::WRITE_SIZE];
        buf[..trailer.len()].copy_from_slice(trailer);
        hal.write(offset + (pivot as u32), &buf)
    }
}
