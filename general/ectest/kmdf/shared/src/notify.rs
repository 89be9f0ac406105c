// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! ACPI notification bookkeeping.
//!
//! The driver receives `Notify(device, code)` events at `DISPATCH_LEVEL`.
//! Codes that arrive while no wait request is pending are held in a
//! [`NotificationRing`]; when it is full the oldest code is discarded.
//! [`NotificationState`] ties the ring to the counters and is only touched
//! with the device spin lock held.

/// Number of notify codes the driver keeps while nobody is waiting.
pub const NOTIFICATION_RING_CAPACITY: usize = 16;

/// Size of the `IOCTL_ECTEST_WAIT_NOTIFICATION` output.
pub const NOTIFY_CODE_LEN: usize = core::mem::size_of::<u32>();

/// Fixed capacity FIFO of notify codes. Never allocates, so it can live in a
/// non-paged device context.
#[derive(Clone, Debug)]
pub struct NotificationRing<const N: usize> {
    codes: [u32; N],
    head: usize,
    len: usize,
}

impl<const N: usize> Default for NotificationRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> NotificationRing<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            codes: [0; N],
            head: 0,
            len: 0,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends `code`, returning the code that had to be dropped to make room.
    pub fn push(&mut self, code: u32) -> Option<u32> {
        if N == 0 {
            return Some(code);
        }

        if self.len == N {
            let dropped = self.codes[self.head];
            self.codes[self.head] = code;
            self.head = (self.head + 1) % N;
            return Some(dropped);
        }

        self.codes[(self.head + self.len) % N] = code;
        self.len += 1;
        None
    }

    pub fn pop(&mut self) -> Option<u32> {
        if self.len == 0 {
            return None;
        }

        let code = self.codes[self.head];
        self.head = (self.head + 1) % N;
        self.len -= 1;
        Some(code)
    }
}

/// Counters returned by `IOCTL_ECTEST_QUERY_STATS`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct NotificationStats {
    /// Notify codes raised by firmware.
    pub received: u32,
    /// Codes handed to a wait request.
    pub delivered: u32,
    /// Codes discarded because the ring was full.
    pub dropped: u32,
    /// Codes currently held in the ring.
    pub queued: u32,
}

impl NotificationStats {
    pub const LEN: usize = core::mem::size_of::<Self>();

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        for (chunk, value) in out
            .chunks_exact_mut(4)
            .zip([self.received, self.delivered, self.dropped, self.queued])
        {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        out
    }

    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.get(..Self::LEN)?;
        let field = |i: usize| {
            u32::from_le_bytes([bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]])
        };
        Some(Self {
            received: field(0),
            delivered: field(1),
            dropped: field(2),
            queued: field(3),
        })
    }
}

/// What became of a notify code handed to [`NotificationState::on_notify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyDisposition {
    /// A parked wait request takes the code.
    Delivered,
    /// Buffered until the next wait request.
    Queued,
    /// Buffered, pushing the contained older code out of the full ring.
    QueuedDropping(u32),
}

/// What a new wait request should do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitDisposition {
    /// Complete at once with this buffered code.
    Deliver(u32),
    /// Nothing buffered; park until the next notify.
    Park,
    /// No notifications are registered, so parking would never end.
    Unsupported,
}

/// Buffered codes, counters and the registration flag of one device.
///
/// Every code received is accounted for exactly once:
/// `received == delivered + dropped + queued` holds after each call.
#[derive(Clone, Debug, Default)]
pub struct NotificationState<const N: usize> {
    ring: NotificationRing<N>,
    stats: NotificationStats,
    registered: bool,
}

impl<const N: usize> NotificationState<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: NotificationRing::new(),
            stats: NotificationStats {
                received: 0,
                delivered: 0,
                dropped: 0,
                queued: 0,
            },
            registered: false,
        }
    }

    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.registered
    }

    /// Updates the registration flag and returns its previous value.
    pub fn set_registered(&mut self, registered: bool) -> bool {
        core::mem::replace(&mut self.registered, registered)
    }

    #[must_use]
    pub const fn stats(&self) -> NotificationStats {
        self.stats
    }

    /// Accounts for a notify code. `waiter_present` tells whether a parked
    /// wait request was retrieved to take it.
    pub fn on_notify(&mut self, code: u32, waiter_present: bool) -> NotifyDisposition {
        self.stats.received = self.stats.received.wrapping_add(1);

        let disposition = if waiter_present {
            self.stats.delivered = self.stats.delivered.wrapping_add(1);
            NotifyDisposition::Delivered
        } else if let Some(dropped) = self.ring.push(code) {
            self.stats.dropped = self.stats.dropped.wrapping_add(1);
            NotifyDisposition::QueuedDropping(dropped)
        } else {
            NotifyDisposition::Queued
        };

        self.sync_queued();
        disposition
    }

    /// Decides the fate of a new wait request, handing out the oldest
    /// buffered code first.
    pub fn on_wait(&mut self) -> WaitDisposition {
        if let Some(code) = self.ring.pop() {
            self.stats.delivered = self.stats.delivered.wrapping_add(1);
            self.sync_queued();
            WaitDisposition::Deliver(code)
        } else if self.registered {
            WaitDisposition::Park
        } else {
            WaitDisposition::Unsupported
        }
    }

    fn sync_queued(&mut self) {
        self.stats.queued = u32::try_from(self.ring.len()).unwrap_or(u32::MAX);
    }
}

/// Notify codes defined by the ACPI specification for every device; anything
/// from 0x80 up is device specific.
#[must_use]
pub const fn describe_notify_code(code: u32) -> &'static str {
    match code {
        0x00 => "bus check",
        0x01 => "device check",
        0x02 => "device wake",
        0x03 => "eject request",
        0x04 => "device check light",
        0x05 => "frequency mismatch",
        0x06 => "bus mode mismatch",
        0x07 => "power fault",
        0x08 => "capabilities check",
        0x09 => "device PLD check",
        0x0B => "system locality update",
        0x0C => "shutdown request",
        0x0D => "system resource affinity update",
        0x0E => "heterogeneous memory attributes update",
        0x0F => "error disconnect recover",
        0x80..=0xFF => "device specific",
        _ => "reserved",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_is_fifo() {
        let mut ring = NotificationRing::<4>::new();
        assert!(ring.is_empty());
        for code in [0x80, 0x81, 0x82] {
            assert_eq!(ring.push(code), None);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.pop(), Some(0x80));
        assert_eq!(ring.push(0x83), None);
        assert_eq!(ring.push(0x84), None);
        assert_eq!(ring.pop(), Some(0x81));
        assert_eq!(ring.pop(), Some(0x82));
        assert_eq!(ring.pop(), Some(0x83));
        assert_eq!(ring.pop(), Some(0x84));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn full_ring_drops_oldest() {
        let mut ring = NotificationRing::<2>::new();
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.push(3), Some(1));
        assert_eq!(ring.push(4), Some(2));
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.pop(), Some(3));
        assert_eq!(ring.pop(), Some(4));
    }

    #[test]
    fn stats_layout() {
        let stats = NotificationStats {
            received: 5,
            delivered: 3,
            dropped: 1,
            queued: 1,
        };
        let bytes = stats.to_bytes();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..4], &[5, 0, 0, 0]);
        assert_eq!(NotificationStats::from_bytes(&bytes), Some(stats));
        assert_eq!(NotificationStats::from_bytes(&bytes[..15]), None);
    }

    fn balanced(stats: NotificationStats) -> bool {
        stats.received == stats.delivered + stats.dropped + stats.queued
    }

    #[test]
    fn waits_park_only_while_registered() {
        let mut state = NotificationState::<4>::new();
        assert_eq!(state.on_wait(), WaitDisposition::Unsupported);

        assert!(!state.set_registered(true));
        assert!(state.is_registered());
        assert_eq!(state.on_wait(), WaitDisposition::Park);

        assert!(state.set_registered(false));
        assert_eq!(state.on_wait(), WaitDisposition::Unsupported);
    }

    #[test]
    fn codes_go_to_waiters_or_the_ring() {
        let mut state = NotificationState::<4>::new();
        state.set_registered(true);

        assert_eq!(state.on_notify(0x80, true), NotifyDisposition::Delivered);
        assert_eq!(state.on_notify(0x81, false), NotifyDisposition::Queued);
        assert_eq!(state.on_notify(0x82, false), NotifyDisposition::Queued);
        assert_eq!(
            state.stats(),
            NotificationStats {
                received: 3,
                delivered: 1,
                dropped: 0,
                queued: 2,
            }
        );

        assert_eq!(state.on_wait(), WaitDisposition::Deliver(0x81));
        assert_eq!(state.on_wait(), WaitDisposition::Deliver(0x82));
        assert_eq!(state.on_wait(), WaitDisposition::Park);
        assert_eq!(state.stats().delivered, 3);
        assert_eq!(state.stats().queued, 0);
        assert!(balanced(state.stats()));
    }

    #[test]
    fn full_state_counts_dropped_codes() {
        let mut state = NotificationState::<2>::new();
        assert_eq!(state.on_notify(1, false), NotifyDisposition::Queued);
        assert_eq!(state.on_notify(2, false), NotifyDisposition::Queued);
        assert_eq!(state.on_notify(3, false), NotifyDisposition::QueuedDropping(1));
        assert_eq!(state.on_notify(4, false), NotifyDisposition::QueuedDropping(2));

        let stats = state.stats();
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.queued, 2);
        assert!(balanced(stats));

        // Buffered codes are still handed out after unregistering.
        assert_eq!(state.on_wait(), WaitDisposition::Deliver(3));
        assert_eq!(state.on_wait(), WaitDisposition::Deliver(4));
        assert_eq!(state.on_wait(), WaitDisposition::Unsupported);
        assert!(balanced(state.stats()));
    }

    #[test]
    fn counters_stay_balanced_over_a_mixed_sequence() {
        let mut state = NotificationState::<NOTIFICATION_RING_CAPACITY>::new();
        state.set_registered(true);
        for code in 0..100u32 {
            state.on_notify(0x80 + code % 8, code % 7 == 0);
            if code % 3 == 0 {
                state.on_wait();
            }
            assert!(balanced(state.stats()), "after code {code}");
        }
        assert!(state.stats().dropped > 0);
        assert!(state.stats().queued as usize <= NOTIFICATION_RING_CAPACITY);
    }

    #[test]
    fn notify_code_names() {
        assert_eq!(describe_notify_code(0x80), "device specific");
        assert_eq!(describe_notify_code(0x02), "device wake");
        assert_eq!(describe_notify_code(0x40), "reserved");
    }
}
