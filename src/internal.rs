use crate::error::Error;
use crate::platform::{AlignedOps, Platform};
use crate::raw::{
    BondRecord, RECORD_SIZE, STATE_EMPTY, STATE_INVALID, SlotState, is_valid_state, write_aligned,
};
use crate::BondList;
use alloc::vec::Vec;
use core::mem::size_of;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

impl<T> BondList<T>
where
    T: Platform,
{
    /// Flash address of a physical slot.
    pub(crate) fn slot_offset(&self, slot: u16) -> u32 {
        debug_assert!(slot < self.capacity);
        (self.base_address + slot as usize * RECORD_SIZE) as u32
    }

    fn sector_offset(&self, sector: u16) -> u32 {
        (self.base_address + sector as usize * T::ERASE_SIZE) as u32
    }

    /// Reads only the state word of a slot.
    pub(crate) fn load_state(&mut self, slot: u16) -> Result<u16, Error> {
        // READ_SIZE divides RECORD_SIZE, checked in BondList::new
        let mut buf = [0u8; RECORD_SIZE];
        let buf = &mut buf[..T::align_read(size_of::<u16>())];
        self.hal
            .read(self.slot_offset(slot), buf)
            .map_err(|_| Error::FlashError)?;

        // records are stored as their in-memory image
        Ok(u16::from_ne_bytes([buf[0], buf[1]]))
    }

    pub(crate) fn load_slot_state(&mut self, slot: u16) -> Result<SlotState, Error> {
        let state = self.load_state(slot)?;
        Ok(SlotState::from_raw(state, self.capacity))
    }

    pub(crate) fn load_record(&mut self, slot: u16) -> Result<BondRecord, Error> {
        #[cfg(feature = "defmt")]
        trace!("load_record: [{}]", slot);

        let mut buf = [0u8; RECORD_SIZE];
        self.hal
            .read(self.slot_offset(slot), &mut buf)
            .map_err(|_| Error::FlashError)?;

        Ok(BondRecord::from_bytes(buf))
    }

    pub(crate) fn count_valid(&mut self) -> Result<u16, Error> {
        #[cfg(feature = "defmt")]
        trace!("count_valid");

        let mut count = 0;
        for slot in 0..self.capacity {
            if is_valid_state(self.load_state(slot)?, self.capacity) {
                count += 1;
            }
        }

        Ok(count)
    }

    /// Returns the first valid record in storage order that matches `predicate`.
    pub(crate) fn find_first<F>(&mut self, predicate: F) -> Result<Option<BondRecord>, Error>
    where
        F: Fn(&BondRecord) -> bool,
    {
        for slot in 0..self.capacity {
            let record = self.load_record(slot)?;
            if is_valid_state(record.state, self.capacity) && predicate(&record) {
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    pub(crate) fn collect_valid<R, F>(&mut self, map: F) -> Result<Vec<R>, Error>
    where
        F: Fn(&BondRecord) -> R,
    {
        let mut result = Vec::new();
        for slot in 0..self.capacity {
            let record = self.load_record(slot)?;
            if is_valid_state(record.state, self.capacity) {
                result.push(map(&record));
            }
        }

        Ok(result)
    }

    pub(crate) fn add_record(&mut self, record: &BondRecord) -> Result<u16, Error> {
        #[cfg(feature = "defmt")]
        trace!("add_record");

        #[cfg(feature = "debug-logs")]
        println!("internal: add_record");

        if self.count_valid()? >= self.capacity {
            return Err(Error::StoreFull);
        }

        // Only defragment once the tail is used up, it rewrites the whole region
        let last_slot = self.capacity - 1;
        if self.load_state(last_slot)? != STATE_EMPTY {
            self.compact()?;

            if self.load_state(last_slot)? != STATE_EMPTY {
                return Err(Error::StoreFull);
            }
        }

        for slot in 0..self.capacity {
            if self.load_state(slot)? == STATE_EMPTY {
                return self.write_record(slot, record);
            }
        }

        Err(Error::StoreFull)
    }

    fn write_record(&mut self, slot: u16, record: &BondRecord) -> Result<u16, Error> {
        let index = slot + 1;

        #[cfg(feature = "defmt")]
        trace!("write_record: [{}] index: {}", slot, index);

        #[cfg(feature = "debug-logs")]
        println!(
            "  internal: write_record: slot: {slot}, target_addr: 0x{:0>8x}",
            self.slot_offset(slot)
        );

        let mut record = *record;
        record.state = index;

        let offset = self.slot_offset(slot);
        write_aligned(&mut self.hal, offset, &record.to_bytes()).map_err(|_| Error::FlashError)?;

        Ok(index)
    }

    pub(crate) fn remove_record(&mut self, index: u16) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("remove_record: {}", index);

        #[cfg(feature = "debug-logs")]
        println!("internal: remove_record: {index}");

        if !is_valid_state(index, self.capacity) {
            return Err(Error::NotFound);
        }

        // indices are always handed out as physical slot + 1, see write_record and compact
        let slot = index - 1;
        if self.load_state(slot)? != index {
            return Err(Error::NotFound);
        }

        // Clearing the state word is a legal 1 -> 0 transition, no erase needed
        let offset = self.slot_offset(slot);
        write_aligned(&mut self.hal, offset, &STATE_INVALID.to_ne_bytes())
            .map_err(|_| Error::FlashError)
    }

    pub(crate) fn erase_region(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("erase_region");

        #[cfg(feature = "debug-logs")]
        println!("internal: erase_region");

        for sector in 0..self.sectors {
            let offset = self.sector_offset(sector);

            // skip blank sectors to save erase cycles
            if self
                .hal
                .blank_check(offset, T::ERASE_SIZE)
                .map_err(|_| Error::FlashError)?
            {
                continue;
            }

            #[cfg(feature = "debug-logs")]
            println!("  internal: erase_region: erase sector {sector} @0x{offset:0>8x}");

            self.hal
                .erase(offset, offset + T::ERASE_SIZE as u32)
                .map_err(|_| Error::FlashError)?;
        }

        Ok(())
    }

    /// Squeezes all valid records to the start of the region.
    pub(crate) fn compact(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("compact");

        #[cfg(feature = "debug-logs")]
        println!("internal: compact");

        let count = self.count_valid()? as usize;

        // Nothing has been written yet, so running out of memory leaves the flash as it was
        let mut staged: Vec<u8> = Vec::new();
        staged
            .try_reserve_exact(count * RECORD_SIZE)
            .map_err(|_| Error::OutOfMemory)?;

        let mut copied: u16 = 0;
        for slot in 0..self.capacity {
            let mut record = self.load_record(slot)?;
            match SlotState::from_raw(record.state, self.capacity) {
                SlotState::Valid(_) => {
                    copied += 1;
                    record.state = copied;
                    staged.extend_from_slice(&record.to_bytes());
                }
                #[cfg(feature = "debug-logs")]
                SlotState::Illegal(state) => {
                    println!("  internal: compact: dropping slot {slot} with state 0x{state:0>4x}");
                }
                _ => {}
            }
        }

        #[cfg(feature = "debug-logs")]
        println!("  internal: compact: staged {copied} records");

        self.erase_region()?;

        if staged.is_empty() {
            return Ok(());
        }

        let base_address = self.base_address as u32;
        write_aligned(&mut self.hal, base_address, &staged).map_err(|_| {
            #[cfg(feature = "defmt")]
            warn!("compact: write back failed, up to {} bonds lost", copied);

            #[cfg(feature = "debug-logs")]
            println!("  internal: compact: write back failed, up to {copied} bonds lost");

            Error::FlashError
        })
    }
}
