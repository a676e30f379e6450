// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Socket handle pool (C4) and reliable send/recv primitive (C5).
//!
//! The `Transport` trait is grounded on `hdds-micro`'s
//! `transport::Transport` trait (`send`/`try_recv`/`mtu`), trimmed to the
//! host-side UDP shape this crate needs (no `local_locator`/`last_rssi`,
//! which are embedded-radio concerns that do not apply here). The
//! fixed-capacity handle table and the partial-write retry loop are
//! grounded on `init_socket`/`send_socket`/`receive_socket` in
//! `examples/original_source/mex/wl_mex_udp_transport.c` lines 391-797.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result, TransportError};

/// Maximum number of concurrently open socket handles, matching the
/// original's fixed `MAX_SOCKETS` table.
pub const MAX_SOCKETS: usize = 65;

/// Opaque index into a [`SocketPool`], returned by [`SocketPool::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketHandle(usize);

/// Send/receive primitive a concrete UDP (or simulated) socket must
/// implement. The Read/Write engines and dispatcher are generic over
/// `T: Transport` so tests can swap in a deterministic simulator.
pub trait Transport {
    /// Send `data` to `dest`. Returns the number of bytes actually sent;
    /// callers must retry on a short write (see [`reliable_send`]).
    fn send_to(&mut self, data: &[u8], dest: SocketAddr) -> Result<usize>;

    /// Non-blocking receive. Returns `Ok(None)` if no packet is currently
    /// available rather than blocking.
    fn try_recv_from(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>>;

    /// Maximum transmission unit for this transport.
    fn mtu(&self) -> usize;
}

/// A live transport plus the backoff state the pool tracks for it.
struct Slot<T> {
    transport: T,
}

/// Fixed-capacity table of open transports, mirroring the original's
/// static `MAX_SOCKETS`-entry socket array instead of growing a `Vec`
/// without bound.
pub struct SocketPool<T> {
    slots: Vec<Option<Slot<T>>>,
}

impl<T> SocketPool<T> {
    /// Create an empty pool with room for [`MAX_SOCKETS`] handles.
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_SOCKETS);
        slots.resize_with(MAX_SOCKETS, || None);
        Self { slots }
    }

    /// Register a transport, returning its handle.
    pub fn open(&mut self, transport: T) -> Result<SocketHandle> {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(Slot { transport });
                return Ok(SocketHandle(idx));
            }
        }
        Err(Error::Transport(TransportError::PoolExhausted))
    }

    /// Release a handle, dropping its transport.
    pub fn close(&mut self, handle: SocketHandle) -> Result<()> {
        let slot = self
            .slots
            .get_mut(handle.0)
            .ok_or(Error::Transport(TransportError::InvalidHandle))?;
        if slot.is_none() {
            return Err(Error::Transport(TransportError::InvalidHandle));
        }
        *slot = None;
        Ok(())
    }

    /// Borrow the transport behind a handle.
    pub fn get_mut(&mut self, handle: SocketHandle) -> Result<&mut T> {
        self.slots
            .get_mut(handle.0)
            .and_then(|s| s.as_mut())
            .map(|s| &mut s.transport)
            .ok_or(Error::Transport(TransportError::InvalidHandle))
    }
}

impl<T> Default for SocketPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Microseconds to sleep between partial-write retries, matching the
/// original's `SLEEP_TIME` busy-retry constant.
const SLEEP_TIME: Duration = Duration::from_micros(100);

/// Maximum number of short-write retries before giving up as a fatal
/// transport error.
const MAX_SEND_RETRIES: u32 = 50;

/// Send `data` to `dest` over `transport`, retrying on a short write
/// until the whole packet goes out or the retry budget is exhausted.
///
/// Grounded on `send_socket`'s partial-write retry loop
/// (`original_source` lines 666-720): a UDP `sendto` that returns fewer
/// bytes than requested is retried after a short sleep rather than
/// treated as an error, since UDP itself has no partial-datagram
/// semantics but the underlying OS call can still be interrupted.
pub fn reliable_send<T: Transport>(
    transport: &mut T,
    data: &[u8],
    dest: SocketAddr,
    sleep: impl Fn(Duration),
) -> Result<()> {
    let mut retries = 0;
    loop {
        let sent = transport.send_to(data, dest)?;
        if sent == data.len() {
            return Ok(());
        }
        retries += 1;
        if retries >= MAX_SEND_RETRIES {
            return Err(Error::PacketLengthMismatch { expected: data.len(), actual: sent });
        }
        sleep(SLEEP_TIME);
    }
}

/// Poll `transport` for one packet without blocking, matching
/// `receive_socket`'s non-blocking behavior (`original_source` lines
/// 760-797): returns `Ok(None)` on would-block rather than erroring.
pub fn try_recv<T: Transport>(
    transport: &mut T,
    buf: &mut [u8],
) -> Result<Option<(usize, SocketAddr)>> {
    transport.try_recv_from(buf)
}
