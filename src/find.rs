//! The `Find<Q>` trait and its implementations in this module provide a single generic,
//! overloaded lookup `find<Q>()` for all supported query types.

use crate::error::Error;
use crate::platform::Platform;
use crate::raw::is_valid_state;
use crate::{BondList, BondRecord, Key, PeerAddress};

pub trait Find<Q> {
    fn find(&mut self, query: Q) -> Result<Option<BondRecord>, Error>;
}

impl<Q, F: Find<Q>> Find<Q> for &mut F {
    fn find(&mut self, query: Q) -> Result<Option<BondRecord>, Error> {
        (*self).find(query)
    }
}

/// Match on the identity resolving key.
impl<T: Platform> Find<&Key> for BondList<T> {
    fn find(&mut self, irk: &Key) -> Result<Option<BondRecord>, Error> {
        self.find_first(|record| record.irk == *irk)
    }
}

/// Match on address type and address.
impl<T: Platform> Find<&PeerAddress> for BondList<T> {
    fn find(&mut self, peer: &PeerAddress) -> Result<Option<BondRecord>, Error> {
        self.find_first(|record| record.addr_type == peer.addr_type && record.addr == peer.addr)
    }
}

/// Match on the logical index handed out by `add`.
impl<T: Platform> Find<u16> for BondList<T> {
    fn find(&mut self, index: u16) -> Result<Option<BondRecord>, Error> {
        if !is_valid_state(index, self.capacity) {
            return Ok(None);
        }

        let record = self.load_record(index - 1)?;
        if record.state != index {
            return Ok(None);
        }

        Ok(Some(record))
    }
}
