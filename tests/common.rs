#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use bond_store::platform::BlankCheck;
use bond_store::{Address, BondRecord, Key};
use embedded_storage::nor_flash::{
    ErrorType, MultiwriteNorFlash, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

// two records per sector
pub const FLASH_SECTOR_SIZE: usize = 144;
pub const WORD_SIZE: usize = 4;
pub const RECORD_SIZE: usize = 72;

#[derive(Default)]
pub struct Flash {
    pub buf: Vec<u8>,
    pub fail_after_operation: usize,
    pub operations: Vec<Operation>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
    Erase { offset: u32, len: usize },
    BlankCheck { offset: u32, len: usize },
}

impl Flash {
    pub fn new(sectors: usize) -> Self {
        Self {
            buf: vec![0xffu8; FLASH_SECTOR_SIZE * sectors],
            fail_after_operation: usize::MAX,
            ..Default::default()
        }
    }

    pub fn new_with_fault(sectors: usize, fail_after_operation: usize) -> Self {
        Self {
            buf: vec![0xffu8; FLASH_SECTOR_SIZE * sectors],
            fail_after_operation,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    pub fn erases(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Erase { .. }))
            .count()
    }

    pub fn writes(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Write { .. }))
            .count()
    }

    /// Raw state word of a physical slot.
    pub fn state(&self, slot: usize) -> u16 {
        let offset = slot * RECORD_SIZE;
        u16::from_ne_bytes([self.buf[offset], self.buf[offset + 1]])
    }

    pub fn states(&self) -> Vec<u16> {
        (0..self.len() / RECORD_SIZE).map(|slot| self.state(slot)).collect()
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }

    fn check_fault(&self) -> Result<(), FlashError> {
        if self.operations.len() >= self.fail_after_operation {
            println!("    flash: FAULT");
            return Err(FlashError);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct FlashError;

impl NorFlashError for FlashError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl ErrorType for Flash {
    type Error = FlashError;
}

impl ReadNorFlash for Flash {
    const READ_SIZE: usize = WORD_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::READ_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::READ_SIZE));

        println!(
            "    flash: read:  0x{offset:04X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );
        self.check_fault()?;
        self.operations.push(Operation::Read {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl NorFlash for Flash {
    const WRITE_SIZE: usize = WORD_SIZE;

    const ERASE_SIZE: usize = FLASH_SECTOR_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        assert!(from.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to.is_multiple_of(Self::ERASE_SIZE as _));

        println!(
            "    flash: erase: {from:04X} - {to:04X} #{:>2}",
            self.operations.len()
        );
        self.check_fault()?;

        self.operations.push(Operation::Erase {
            offset: from,
            len: (to - from) as usize,
        });

        for addr in from..to {
            self.buf[addr as usize] = 0xff;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE));
        assert!(!bytes.is_empty());

        println!(
            "    flash: write: 0x{offset:04X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );
        self.check_fault()?;

        self.operations.push(Operation::Write {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        for (i, &val) in bytes.iter().enumerate() {
            // NOR flash can only flip bits from 1 to 0
            self.buf[offset + i] &= val;
        }
        Ok(())
    }
}

impl MultiwriteNorFlash for Flash {}

impl BlankCheck for Flash {
    fn blank_check(&mut self, offset: u32, len: usize) -> Result<bool, Self::Error> {
        println!(
            "    flash: blank: 0x{offset:04X}[0x{len:04X}] #{:>2}",
            self.operations.len()
        );
        self.check_fault()?;
        self.operations.push(Operation::BlankCheck { offset, len });

        let offset = offset as usize;
        Ok(self.buf[offset..offset + len].iter().all(|&b| b == 0xff))
    }
}

/// A flash that only implements the provided `BlankCheck`, to exercise the read based check.
pub struct ReadBackFlash(pub Flash);

impl ErrorType for ReadBackFlash {
    type Error = FlashError;
}

impl ReadNorFlash for ReadBackFlash {
    const READ_SIZE: usize = WORD_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.0.read(offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.0.capacity()
    }
}

impl NorFlash for ReadBackFlash {
    const WRITE_SIZE: usize = WORD_SIZE;

    const ERASE_SIZE: usize = FLASH_SECTOR_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.0.erase(from, to)
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.0.write(offset, bytes)
    }
}

impl MultiwriteNorFlash for ReadBackFlash {}

impl BlankCheck for ReadBackFlash {}

/// A distinct bond for peer `n`.
pub fn bond(n: u8) -> BondRecord {
    BondRecord {
        pairing_level: 1,
        csrk_exchanged: 1,
        ltk: Key::from_array(&[0x10 | n; 16]),
        ediv: 0x1000 + n as u16,
        addr: Address::from_array(&[n, 0x22, 0x33, 0x44, 0x55, 0xC0]),
        addr_type: 1,
        irk_exchanged: 1,
        csrk: Key::from_array(&[0x20 | n; 16]),
        irk: Key::from_array(&[0x30 | n; 16]),
        rand: [n; 8],
        ..Default::default()
    }
}

/// `record` as it is expected to come back from flash.
pub fn stored(record: BondRecord, index: u16) -> BondRecord {
    BondRecord {
        state: index,
        ..record
    }
}
