/*!
 * Heap Storage Operations
 * Read/write access to the simulated bytes behind each allocation
 */

use super::TieredHeap;
use crate::core::errors::{HeapError, HeapResult};
use crate::core::types::{Address, Size};
use crate::memory::traits::InternalTier;
use crate::memory::types::Tier;
use tracing::trace;

impl<I: InternalTier> TieredHeap<I> {
    fn payload(&self, address: Address) -> Option<&[u8]> {
        match self.region_of(address)? {
            Tier::External(id) => self.regions[id].payload(address),
            Tier::Internal => self.internal.payload(address),
        }
    }

    fn payload_mut(&mut self, address: Address) -> Option<&mut [u8]> {
        match self.region_of(address)? {
            Tier::External(id) => self.regions[id].payload_mut(address),
            Tier::Internal => self.internal.payload_mut(address),
        }
    }

    /// Read `size` bytes starting anywhere inside a live allocation
    pub fn read_bytes(&self, address: Address, size: Size) -> HeapResult<Vec<u8>> {
        let payload = self
            .payload(address)
            .filter(|payload| payload.len() >= size)
            .ok_or(HeapError::InvalidAddress(address))?;
        trace!(address = format_args!("0x{:x}", address), size, "Read bytes");
        Ok(payload[..size].to_vec())
    }

    /// Write `data` starting anywhere inside a live allocation
    ///
    /// The write must end inside the same allocation.
    pub fn write_bytes(&mut self, address: Address, data: &[u8]) -> HeapResult<()> {
        let payload = self
            .payload_mut(address)
            .filter(|payload| payload.len() >= data.len())
            .ok_or(HeapError::InvalidAddress(address))?;
        payload[..data.len()].copy_from_slice(data);
        trace!(
            address = format_args!("0x{:x}", address),
            size = data.len(),
            "Wrote bytes"
        );
        Ok(())
    }
}
