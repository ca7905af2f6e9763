//! Tracks every open telephony stream so none outlives the run
//!
//! The registry exists for one guarantee: a stream opened through the
//! adapter is closed exactly once, even when the run unwinds early. When
//! a registry is dropped it sweeps whatever is still registered, which
//! finalizes any WAV writer that was never closed explicitly.
use tracing::{debug, warn};

use crate::telephony::TelephonyStream;

/// Fixed number of streams the registry can track at once
pub const MAX_OPEN_STREAMS: usize = 32;

/// Opaque identifier for a registered stream.
///
/// Carries a serial in addition to the slot index, so a handle kept
/// around after its stream was closed can never reach a stream that
/// later reused the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHandle
{
    slot: usize,
    serial: u64,
}

/// Returned by [`HandleRegistry::register`] when every slot is taken.
/// The stream is handed back untouched; the caller still owns it.
pub struct RegistryFull(pub TelephonyStream);

struct Slot
{
    serial: u64,
    stream: TelephonyStream,
}

/// Fixed-capacity table of open telephony streams
pub struct HandleRegistry
{
    slots: Vec<Option<Slot>>,
    next_serial: u64,
}

impl HandleRegistry
{
    pub fn new() -> Self
    {
        let mut slots = Vec::with_capacity(MAX_OPEN_STREAMS);
        slots.resize_with(MAX_OPEN_STREAMS, || None);

        HandleRegistry
        {
            slots,
            next_serial: 0,
        }
    }

    pub fn capacity(&self) -> usize
    {
        self.slots.len()
    }

    /// Number of streams currently registered
    pub fn len(&self) -> usize
    {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool
    {
        self.slots.iter().all(|slot| slot.is_none())
    }

    /// Record `stream` in the first empty slot.
    ///
    /// When the registry is full the stream is returned inside
    /// [`RegistryFull`] without closing anything; existing slots are
    /// never disturbed.
    pub fn register(&mut self, stream: TelephonyStream)
        -> std::result::Result<StreamHandle, RegistryFull>
    {
        let slot = match self.slots.iter().position(|slot| slot.is_none())
        {
            Some(index) => index,
            None => return Err(RegistryFull(stream)),
        };

        let serial = self.next_serial;
        self.next_serial += 1;

        self.slots[slot] = Some(Slot { serial, stream });
        debug!(slot, serial, "registered telephony stream");

        Ok(StreamHandle { slot, serial })
    }

    /// Clear the slot matching `handle` and hand its stream back.
    /// Returns `None` (a no-op, not an error) when the handle is not
    /// registered, leaving every other slot untouched.
    pub fn deregister(&mut self, handle: StreamHandle) -> Option<TelephonyStream>
    {
        let occupied = self.slots.get_mut(handle.slot)?;
        let found = occupied.as_ref().is_some_and(|slot| slot.serial == handle.serial);
        if !found
        {
            return None;
        }

        let slot = occupied.take()?;
        debug!(slot = handle.slot, serial = handle.serial, "deregistered telephony stream");
        Some(slot.stream)
    }

    /// Borrow the stream behind `handle`, if it is still registered
    pub fn stream_mut(&mut self, handle: StreamHandle) -> Option<&mut TelephonyStream>
    {
        match self.slots.get_mut(handle.slot)?
        {
            Some(slot) if slot.serial == handle.serial => Some(&mut slot.stream),
            _ => None,
        }
    }

    /// Force-close every stream still registered, in slot order, and
    /// return how many were closed. Safe to call with zero, some, or all
    /// slots occupied; calling it again right away closes nothing.
    pub fn sweep(&mut self) -> usize
    {
        let mut closed = 0;

        for (index, occupied) in self.slots.iter_mut().enumerate()
        {
            if let Some(slot) = occupied.take()
            {
                warn!(slot = index, serial = slot.serial, "stream was still open at sweep time");
                if let Err(err) = slot.stream.force_close()
                {
                    warn!(slot = index, %err, "force-close failed during sweep");
                }
                closed += 1;
            }
        }

        closed
    }
}

impl Default for HandleRegistry
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl Drop for HandleRegistry
{
    fn drop(&mut self)
    {
        // Runs exactly once per registry; an earlier explicit sweep
        // leaves nothing for it to close.
        self.sweep();
    }
}
