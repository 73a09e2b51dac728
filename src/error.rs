use thiserror::Error;

/// Errors that can occur during bond list operations. Marked as non-exhaustive to allow for future
/// additions without breaking the API. A caller would usually only need to handle `StoreFull` and
/// `NotFound` as the other errors are static or point to broken hardware.
#[derive(Error, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The region offset has to be aligned to the size of a flash sector
    #[error("invalid partition offset")]
    InvalidPartitionOffset,

    /// The region size has to be a non-zero multiple of the flash sector size and must not hold
    /// more than `0xFFFE` records
    #[error("invalid partition size")]
    InvalidPartitionSize,

    /// The record size has to divide the flash sector size and be a multiple of the read and
    /// write granularity of the flash
    #[error("invalid sector size")]
    InvalidSectorSize,

    /// The internal error value is returned from the provided `&mut impl NorFlash`.
    ///
    /// If this is returned by [`crate::BondList::add`] or [`crate::BondList::defragment`] the
    /// region might have been erased without all records being written back. Check
    /// [`crate::BondList::size`] to find out how many bonds survived.
    #[error("internal flash error")]
    FlashError,

    /// Every slot holds a valid record. Defragmentation can't help, the caller has to remove a
    /// bond first.
    #[error("store full")]
    StoreFull,

    /// No valid record with the given index exists.
    #[error("not found")]
    NotFound,

    /// The staging buffer for defragmentation could not be allocated. Flash was not touched.
    #[error("out of memory")]
    OutOfMemory,
}
