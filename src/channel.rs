use bitflags::bitflags;
use heapless::Deque;

use crate::buffer::Buffer;
use crate::error::{ChannelError, ResetError};
use crate::peripheral::{EndpointId, Peripheral};

/// Number of notifications a channel can hold before the dispatcher drains them.
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// How produced buffers reach the consumer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelMode {
    /// Every finished buffer is forwarded to the consumer without software involvement.
    Auto,

    /// Every finished buffer raises [`ChannelEvent::Produced`] and stays with the producer side
    /// until it is committed.
    Manual,

    /// Software is the producer. Each packet written is committed straight away.
    ManualOut,
}

bitflags! {
    /// Notifications a channel queues for its listener.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct Notifications: u8 {
        const PRODUCED = 0b0000_0001;
        const CONSUMED = 0b0000_0010;
    }
}

/// Channel parameters, fixed for the lifetime of the channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelConfig {
    pub mode: ChannelMode,
    pub buffer_size: usize,
    pub buffer_count: usize,
    pub producer: EndpointId,
    pub consumer: EndpointId,
    pub notifications: Notifications,
}

impl ChannelConfig {
    /// Bytes of peripheral memory the channel reserves.
    pub fn reserved_bytes(&self) -> usize {
        self.buffer_size * self.buffer_count
    }
}

/// Notification delivered to a channel listener.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelEvent {
    /// The producer finished a buffer of `count` bytes. `wrap_up` is set when the buffer was
    /// forced out by [`Channel::force_flush`] instead of filling up.
    Produced { count: usize, wrap_up: bool },

    /// The consumer drained a buffer of `count` bytes.
    Consumed { count: usize },

    /// The transfer engine faulted. Raised by the hardware, never by the channel itself.
    Error,

    /// The producer side paused the transfer.
    ProducerSuspended,

    /// The consumer side paused the transfer.
    ConsumerSuspended,

    /// The transfer was aborted.
    Aborted,
}

/// Amount of data a transfer moves before the channel stops by itself.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferSize {
    /// Run until the channel is reset or destroyed.
    Unbounded,

    /// Stop once this many bytes have been consumed.
    Bytes(usize),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum TransferState {
    Stopped,
    Running { remaining: Option<usize> },
    Faulted,
}

/// A fixed-depth ring of fixed-size buffers moving bytes from a producer to a consumer.
///
/// `N` is the capacity of one buffer and `D` the maximum number of buffers; the sizes actually
/// used are taken from the [`ChannelConfig`] at creation. A buffer is always in exactly one of
/// four places: free, being filled by the producer, produced and waiting for a commit (manual
/// mode only), or committed and waiting for the consumer.
pub struct Channel<const N: usize, const D: usize> {
    config: ChannelConfig,
    slots: [Buffer<N>; D],
    free: Deque<usize, D>,
    filling: Option<usize>,
    produced: Deque<usize, D>,
    committed: Deque<usize, D>,
    events: Deque<ChannelEvent, EVENT_QUEUE_DEPTH>,
    state: TransferState,
}

impl<const N: usize, const D: usize> Channel<N, D> {
    /// Creates a channel and reserves its buffer memory on `hw`.
    pub fn create<P: Peripheral>(config: ChannelConfig, hw: &mut P) -> Result<Self, ChannelError> {
        if config.buffer_size == 0
            || config.buffer_size > N
            || config.buffer_count == 0
            || config.buffer_count > D
            || config.buffer_count > EVENT_QUEUE_DEPTH
        {
            return Err(ChannelError::InvalidConfig);
        }

        if config.mode == ChannelMode::Manual
            && !config.notifications.contains(Notifications::PRODUCED)
        {
            // Nobody would ever commit the produced buffers.
            return Err(ChannelError::InvalidConfig);
        }

        if !hw.is_configured(config.producer) || !hw.is_configured(config.consumer) {
            return Err(ChannelError::NotConfigured);
        }

        hw.reserve(config.reserved_bytes())
            .map_err(|_| ChannelError::NoResources)?;

        let mut channel = Channel {
            config,
            slots: core::array::from_fn(|_| Buffer::new()),
            free: Deque::new(),
            filling: None,
            produced: Deque::new(),
            committed: Deque::new(),
            events: Deque::new(),
            state: TransferState::Stopped,
        };
        channel.recycle_all();

        debug!(
            "channel created: {} x {} bytes",
            config.buffer_count,
            config.buffer_size
        );

        Ok(channel)
    }

    /// Releases the channel's buffer memory.
    pub fn destroy<P: Peripheral>(self, hw: &mut P) {
        hw.release(self.config.reserved_bytes());
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn mode(&self) -> ChannelMode {
        self.config.mode
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TransferState::Running { .. })
    }

    /// Whether a failed reset left the channel unusable.
    pub fn is_faulted(&self) -> bool {
        self.state == TransferState::Faulted
    }

    /// Number of buffers not owned by either side.
    pub fn free_buffers(&self) -> usize {
        self.free.len()
    }

    /// Number of produced buffers waiting for a commit.
    pub fn produced_buffers(&self) -> usize {
        self.produced.len()
    }

    /// Number of buffers waiting for the consumer.
    pub fn committed_buffers(&self) -> usize {
        self.committed.len()
    }

    /// Bytes sitting in the producer's partially filled buffer.
    pub fn partial_bytes(&self) -> usize {
        self.filling.map_or(0, |idx| self.slots[idx].len())
    }

    /// Starts moving buffers. Only one transfer can be outstanding at a time.
    pub fn start_transfer(&mut self, size: TransferSize) -> Result<(), ChannelError> {
        match self.state {
            TransferState::Faulted => Err(ChannelError::Faulted),
            TransferState::Running { .. } => Err(ChannelError::Busy),
            TransferState::Stopped => {
                let remaining = match size {
                    TransferSize::Unbounded => None,
                    TransferSize::Bytes(0) => return Err(ChannelError::BadCount),
                    TransferSize::Bytes(n) => Some(n),
                };
                self.state = TransferState::Running { remaining };
                Ok(())
            }
        }
    }

    /// Producer side for byte streams: fills buffers in order and finishes each one as it
    /// becomes full. Returns the number of bytes accepted, which is less than `data.len()` when
    /// the ring runs out of free buffers.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, ChannelError> {
        if self.config.mode == ChannelMode::ManualOut {
            return Err(ChannelError::InvalidMode);
        }
        self.ensure_running()?;

        let mut written = 0;
        while written < data.len() {
            let idx = match self.filling.or_else(|| self.free.pop_front()) {
                Some(idx) => idx,
                None => break,
            };
            self.filling = Some(idx);

            written += self.slots[idx].write(&data[written..]);

            if self.slots[idx].is_full() {
                self.finish_filling(false);
            }
        }

        Ok(written)
    }

    /// Producer side for packets: the packet ends the current buffer whether it is full or not.
    /// Bytes beyond the buffer's free space are dropped. In [`ChannelMode::ManualOut`] this is the
    /// software commit.
    pub fn write_packet(&mut self, data: &[u8]) -> Result<usize, ChannelError> {
        self.ensure_running()?;

        // Zero-length packets carry nothing for the consumer.
        if data.is_empty() && self.config.mode == ChannelMode::Auto {
            return Ok(0);
        }

        let idx = match self.filling.or_else(|| self.free.pop_front()) {
            Some(idx) => idx,
            None => return Err(ChannelError::WouldBlock),
        };
        self.filling = Some(idx);

        let count = self.slots[idx].write(data);
        self.finish_filling(false);

        Ok(count)
    }

    /// Forwards the producer's partially filled buffer without waiting for it to fill up.
    ///
    /// Returns `Ok(false)` when there was nothing to flush. Manual channels only.
    pub fn force_flush(&mut self) -> Result<bool, ChannelError> {
        if self.config.mode != ChannelMode::Manual {
            return Err(ChannelError::InvalidMode);
        }
        self.ensure_running()?;

        match self.filling {
            Some(idx) if !self.slots[idx].is_empty() => {
                self.finish_filling(true);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Forwards the oldest produced buffer to the consumer, keeping its first `count` bytes.
    /// Manual channels only.
    pub fn commit(&mut self, count: usize) -> Result<(), ChannelError> {
        if self.config.mode != ChannelMode::Manual {
            return Err(ChannelError::InvalidMode);
        }

        let idx = *self.produced.front().ok_or(ChannelError::NothingProduced)?;
        if count > self.slots[idx].len() {
            return Err(ChannelError::BadCount);
        }

        self.produced.pop_front();
        self.slots[idx].truncate(count);
        self.committed
            .push_back(idx)
            .map_err(|_| ChannelError::InvalidConfig)
    }

    /// Consumer side: passes up to `max_count` bytes of the oldest committed buffer to `f`, which
    /// returns how many it took. The buffer goes back to the free pool once it has been fully
    /// read. Returns `Ok(0)` when nothing is committed.
    pub fn read<E>(
        &mut self,
        max_count: usize,
        f: impl FnOnce(&[u8]) -> Result<usize, E>,
    ) -> Result<usize, E> {
        let idx = match self.committed.front() {
            Some(&idx) => idx,
            None => return Ok(0),
        };

        let count = self.slots[idx].read(max_count, f)?;

        if self.slots[idx].available_read() == 0 {
            self.complete_front();
        }

        Ok(count)
    }

    /// Consumer side for packets: copies the next committed buffer into `out`. If `out` is
    /// smaller than the buffer the remainder is returned by the following call.
    pub fn read_packet(&mut self, out: &mut [u8]) -> Result<usize, ChannelError> {
        if self.committed.is_empty() {
            return Err(ChannelError::WouldBlock);
        }

        self.read(out.len(), |data| {
            out[..data.len()].copy_from_slice(data);
            Ok(data.len())
        })
    }

    /// Takes the next queued notification.
    pub fn poll_event(&mut self) -> Option<ChannelEvent> {
        self.events.pop_front()
    }

    /// Aborts the transfer on both endpoints and returns every buffer to the free pool. Data in
    /// flight is lost.
    ///
    /// The software state is always cleared. If the hardware abort fails the channel is marked
    /// faulted and refuses new transfers until it is recreated.
    pub fn reset<P: Peripheral>(&mut self, hw: &mut P) -> Result<(), ResetError> {
        let result = hw
            .abort(self.config.producer)
            .and(hw.abort(self.config.consumer));

        self.recycle_all();
        self.state = match result {
            Ok(()) => TransferState::Stopped,
            Err(_) => TransferState::Faulted,
        };

        result
    }

    fn ensure_running(&self) -> Result<(), ChannelError> {
        match self.state {
            TransferState::Running { .. } => Ok(()),
            TransferState::Faulted => Err(ChannelError::Faulted),
            TransferState::Stopped => Err(ChannelError::NotRunning),
        }
    }

    fn finish_filling(&mut self, wrap_up: bool) {
        let idx = match self.filling.take() {
            Some(idx) => idx,
            None => return,
        };
        let count = self.slots[idx].len();

        match self.config.mode {
            ChannelMode::Auto | ChannelMode::ManualOut => {
                // Indices never outnumber the ring, so the queue cannot overflow.
                let _ = self.committed.push_back(idx);
            }
            ChannelMode::Manual => {
                let _ = self.produced.push_back(idx);
                self.raise(ChannelEvent::Produced { count, wrap_up });
            }
        }
    }

    fn complete_front(&mut self) {
        let idx = match self.committed.pop_front() {
            Some(idx) => idx,
            None => return,
        };
        let count = self.slots[idx].len();

        self.slots[idx].clear();
        let _ = self.free.push_back(idx);

        if let TransferState::Running {
            remaining: Some(remaining),
        } = self.state
        {
            let remaining = remaining.saturating_sub(count);
            self.state = if remaining == 0 {
                trace!("transfer complete");
                TransferState::Stopped
            } else {
                TransferState::Running {
                    remaining: Some(remaining),
                }
            };
        }

        if self.config.notifications.contains(Notifications::CONSUMED) {
            self.raise(ChannelEvent::Consumed { count });
        }
    }

    fn raise(&mut self, event: ChannelEvent) {
        if self.events.push_back(event).is_err() {
            warn!("channel event queue full, dropping {}", event);
        }
    }

    fn recycle_all(&mut self) {
        self.free.clear();
        self.produced.clear();
        self.committed.clear();
        self.events.clear();
        self.filling = None;

        for idx in 0..self.config.buffer_count {
            self.slots[idx].set_limit(self.config.buffer_size);
            let _ = self.free.push_back(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::peripheral::mock::MockPeripheral;
    use std::vec::Vec;

    const USB_OUT: EndpointId = EndpointId(0x01);
    const USB_IN: EndpointId = EndpointId(0x81);

    type TestChannel = Channel<8, 4>;

    fn hw() -> MockPeripheral {
        MockPeripheral::with_endpoints(&[USB_OUT, USB_IN])
    }

    fn manual(size: usize, count: usize) -> ChannelConfig {
        ChannelConfig {
            mode: ChannelMode::Manual,
            buffer_size: size,
            buffer_count: count,
            producer: EndpointId::UART_RX,
            consumer: USB_IN,
            notifications: Notifications::PRODUCED,
        }
    }

    fn auto(size: usize, count: usize) -> ChannelConfig {
        ChannelConfig {
            mode: ChannelMode::Auto,
            buffer_size: size,
            buffer_count: count,
            producer: USB_OUT,
            consumer: EndpointId::UART_TX,
            notifications: Notifications::empty(),
        }
    }

    fn running(config: ChannelConfig, hw: &mut MockPeripheral) -> TestChannel {
        let mut ch = TestChannel::create(config, hw).unwrap();
        ch.start_transfer(TransferSize::Unbounded).unwrap();
        ch
    }

    fn drain(ch: &mut TestChannel) -> Vec<u8> {
        let mut out = Vec::new();
        let mut packet = [0u8; 8];
        while let Ok(n) = ch.read_packet(&mut packet) {
            out.extend_from_slice(&packet[..n]);
        }
        out
    }

    #[test]
    fn create_checks_endpoints() {
        let mut hw = MockPeripheral::new();

        assert_eq!(
            TestChannel::create(auto(8, 4), &mut hw).err(),
            Some(ChannelError::NotConfigured)
        );
        assert_eq!(hw.reserved, 0);
    }

    #[test]
    fn create_checks_sizes() {
        let mut hw = hw();

        assert_eq!(
            TestChannel::create(auto(9, 4), &mut hw).err(),
            Some(ChannelError::InvalidConfig)
        );
        assert_eq!(
            TestChannel::create(auto(8, 5), &mut hw).err(),
            Some(ChannelError::InvalidConfig)
        );
        assert_eq!(
            TestChannel::create(auto(0, 1), &mut hw).err(),
            Some(ChannelError::InvalidConfig)
        );
    }

    #[test]
    fn manual_channel_needs_produced_notifications() {
        let mut hw = hw();
        let mut config = manual(8, 4);
        config.notifications = Notifications::CONSUMED;

        assert_eq!(
            TestChannel::create(config, &mut hw).err(),
            Some(ChannelError::InvalidConfig)
        );
    }

    #[test]
    fn create_fails_without_memory() {
        let mut hw = hw();
        hw.memory = 16;

        assert_eq!(
            TestChannel::create(auto(8, 4), &mut hw).err(),
            Some(ChannelError::NoResources)
        );
    }

    #[test]
    fn destroy_releases_memory() {
        let mut hw = hw();
        let ch = TestChannel::create(auto(8, 4), &mut hw).unwrap();
        assert_eq!(hw.reserved, 32);

        ch.destroy(&mut hw);
        assert_eq!(hw.reserved, 0);
    }

    #[test]
    fn producer_needs_running_transfer() {
        let mut hw = hw();
        let mut ch = TestChannel::create(auto(8, 4), &mut hw).unwrap();

        assert_eq!(ch.write(b"abc"), Err(ChannelError::NotRunning));
        assert_eq!(ch.write_packet(b"abc"), Err(ChannelError::NotRunning));
    }

    #[test]
    fn second_transfer_is_busy() {
        let mut hw = hw();
        let mut ch = running(auto(8, 4), &mut hw);

        assert_eq!(
            ch.start_transfer(TransferSize::Unbounded),
            Err(ChannelError::Busy)
        );
    }

    #[test]
    fn auto_forwards_packets_without_events() {
        let mut hw = hw();
        let mut ch = running(auto(8, 4), &mut hw);

        assert_eq!(ch.write_packet(b"hello"), Ok(5));
        assert_eq!(ch.write_packet(b"world"), Ok(5));

        assert_eq!(ch.poll_event(), None);
        assert_eq!(ch.committed_buffers(), 2);
        assert_eq!(drain(&mut ch), b"helloworld");
        assert_eq!(ch.free_buffers(), 4);
    }

    #[test]
    fn auto_skips_zero_length_packets() {
        let mut hw = hw();
        let mut ch = running(auto(8, 4), &mut hw);

        assert_eq!(ch.write_packet(b""), Ok(0));
        assert_eq!(ch.committed_buffers(), 0);
        assert_eq!(ch.free_buffers(), 4);
    }

    #[test]
    fn auto_packets_longer_than_a_buffer_are_cut() {
        let mut hw = hw();
        let mut ch = running(auto(4, 2), &mut hw);

        assert_eq!(ch.write_packet(b"abcdef"), Ok(4));
        assert_eq!(drain(&mut ch), b"abcd");
    }

    #[test]
    fn manual_raises_produced_and_waits_for_commit() {
        let mut hw = hw();
        let mut ch = running(manual(4, 4), &mut hw);

        assert_eq!(ch.write(b"abcdef"), Ok(6));

        assert_eq!(
            ch.poll_event(),
            Some(ChannelEvent::Produced {
                count: 4,
                wrap_up: false
            })
        );
        assert_eq!(ch.poll_event(), None);
        assert_eq!(ch.committed_buffers(), 0);
        assert_eq!(ch.partial_bytes(), 2);

        ch.commit(4).unwrap();
        assert_eq!(drain(&mut ch), b"abcd");
    }

    #[test]
    fn commit_without_produced_buffer() {
        let mut hw = hw();
        let mut ch = running(manual(4, 4), &mut hw);

        assert_eq!(ch.commit(1), Err(ChannelError::NothingProduced));
    }

    #[test]
    fn commit_count_is_bounded_by_buffer() {
        let mut hw = hw();
        let mut ch = running(manual(4, 4), &mut hw);
        ch.write(b"abcd").unwrap();

        assert_eq!(ch.commit(5), Err(ChannelError::BadCount));
        ch.commit(2).unwrap();
        assert_eq!(drain(&mut ch), b"ab");
    }

    #[test]
    fn commit_on_auto_channel() {
        let mut hw = hw();
        let mut ch = running(auto(4, 4), &mut hw);

        assert_eq!(ch.commit(0), Err(ChannelError::InvalidMode));
    }

    #[test]
    fn force_flush_forwards_partial_buffer() {
        let mut hw = hw();
        let mut ch = running(manual(8, 4), &mut hw);

        ch.write(b"xyz").unwrap();
        assert_eq!(ch.poll_event(), None);

        assert_eq!(ch.force_flush(), Ok(true));
        assert_eq!(
            ch.poll_event(),
            Some(ChannelEvent::Produced {
                count: 3,
                wrap_up: true
            })
        );

        ch.commit(3).unwrap();
        assert_eq!(drain(&mut ch), b"xyz");
    }

    #[test]
    fn force_flush_without_data_is_a_no_op() {
        let mut hw = hw();
        let mut ch = running(manual(8, 4), &mut hw);

        assert_eq!(ch.force_flush(), Ok(false));
        assert_eq!(ch.poll_event(), None);
    }

    #[test]
    fn force_flush_is_manual_only() {
        let mut hw = hw();
        let mut ch = running(auto(8, 4), &mut hw);

        assert_eq!(ch.force_flush(), Err(ChannelError::InvalidMode));
    }

    #[test]
    fn producer_stalls_when_ring_is_full() {
        let mut hw = hw();
        let mut ch = running(auto(2, 2), &mut hw);

        assert_eq!(ch.write(b"abcdef"), Ok(4));
        assert_eq!(ch.write(b"ef"), Ok(0));
        assert_eq!(ch.write_packet(b"ef"), Err(ChannelError::WouldBlock));

        assert_eq!(drain(&mut ch), b"abcd");
        assert_eq!(ch.write(b"ef"), Ok(2));
        assert_eq!(drain(&mut ch), b"ef");
    }

    #[test]
    fn partial_reads_keep_buffer_until_drained() {
        let mut hw = hw();
        let mut ch = running(auto(8, 2), &mut hw);
        ch.write_packet(b"abcdef").unwrap();

        let mut out = [0u8; 4];
        assert_eq!(ch.read_packet(&mut out), Ok(4));
        assert_eq!(&out, b"abcd");
        assert_eq!(ch.committed_buffers(), 1);

        assert_eq!(ch.read_packet(&mut out), Ok(2));
        assert_eq!(&out[..2], b"ef");
        assert_eq!(ch.committed_buffers(), 0);
    }

    #[test]
    fn consumed_notification() {
        let mut hw = hw();
        let mut config = manual(4, 2);
        config.notifications |= Notifications::CONSUMED;
        let mut ch = running(config, &mut hw);

        ch.write(b"abcd").unwrap();
        ch.poll_event();
        ch.commit(4).unwrap();
        drain(&mut ch);

        assert_eq!(ch.poll_event(), Some(ChannelEvent::Consumed { count: 4 }));
    }

    #[test]
    fn finite_transfer_stops_after_size() {
        let mut hw = hw();
        let mut ch = TestChannel::create(auto(4, 4), &mut hw).unwrap();
        ch.start_transfer(TransferSize::Bytes(6)).unwrap();

        ch.write_packet(b"abcd").unwrap();
        ch.write_packet(b"ef").unwrap();
        assert_eq!(drain(&mut ch), b"abcdef");

        assert!(!ch.is_running());
        ch.start_transfer(TransferSize::Unbounded).unwrap();
    }

    #[test]
    fn reset_drops_in_flight_data() {
        let mut hw = hw();
        let mut ch = running(manual(4, 4), &mut hw);
        ch.write(b"abcdef").unwrap();

        assert_eq!(ch.reset(&mut hw), Ok(()));

        assert!(!ch.is_running());
        assert_eq!(ch.free_buffers(), 4);
        assert_eq!(ch.partial_bytes(), 0);
        assert_eq!(ch.poll_event(), None);
        assert_eq!(hw.aborted, [EndpointId::UART_RX, USB_IN]);

        ch.start_transfer(TransferSize::Unbounded).unwrap();
        ch.write(b"ghij").unwrap();
        ch.poll_event();
        ch.commit(4).unwrap();
        assert_eq!(drain(&mut ch), b"ghij");
    }

    #[test]
    fn failed_reset_faults_channel() {
        let mut hw = hw();
        let mut ch = running(manual(4, 4), &mut hw);
        hw.abort_results.push(Err(ResetError::SyncFailure));

        assert_eq!(ch.reset(&mut hw), Err(ResetError::SyncFailure));

        assert!(ch.is_faulted());
        assert_eq!(
            ch.start_transfer(TransferSize::Unbounded),
            Err(ChannelError::Faulted)
        );
        assert_eq!(ch.write(b"a"), Err(ChannelError::Faulted));
    }

    #[test]
    fn manual_out_commits_each_packet() {
        let mut hw = hw();
        let config = ChannelConfig {
            mode: ChannelMode::ManualOut,
            buffer_size: 8,
            buffer_count: 2,
            producer: EndpointId::CPU,
            consumer: USB_IN,
            notifications: Notifications::empty(),
        };
        let mut ch = running(config, &mut hw);

        assert_eq!(ch.write(b"no"), Err(ChannelError::InvalidMode));
        assert_eq!(ch.write_packet(b"line\r\n"), Ok(6));
        assert_eq!(ch.poll_event(), None);
        assert_eq!(drain(&mut ch), b"line\r\n");
    }
}
