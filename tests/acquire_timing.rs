//! Consumer acquire: present-time scheduling, frame caps, acquire limits and the import cache.

mod common;

use std::sync::Arc;

use buffer_queue::clock::{NSECS_PER_SEC, Nsecs};
use buffer_queue::import::{ImageImportSink, SlotImageCache};
use buffer_queue::{BufferId, Fence, GraphicBuffer, QueueBufferInput, QueueError};
use common::{Harness, config, connected};

const SEC: Nsecs = NSECS_PER_SEC;

/// Queues one frame per timestamp and returns the harness with up to four slots to play with.
fn with_timed_frames(timestamps: &[Nsecs]) -> Harness {
    let h = connected(config().with_max_dequeued_buffer_count(3));
    for &timestamp in timestamps {
        let slot = h.dequeue().slot;
        h.queue_with(slot, QueueBufferInput::new(Fence::signaled()).with_timestamp(timestamp));
    }
    h
}

#[test]
fn empty_queue_has_nothing_to_acquire() {
    let h = connected(config());
    assert_eq!(h.consumer.acquire_buffer(0, 0).err(), Some(QueueError::NoBufferAvailable));
}

#[test]
fn future_head_is_presented_later() {
    let h = with_timed_frames(&[10 * SEC]);
    let early = h.consumer.acquire_buffer(10 * SEC - SEC / 2, 0);
    assert_eq!(early.err(), Some(QueueError::PresentLater));
    assert_eq!(h.consumer.snapshot().pending.len(), 1);

    let item = h.consumer.acquire_buffer(10 * SEC, 0).unwrap();
    assert_eq!(item.timestamp, 10 * SEC);
    h.assert_consistent();
}

#[test]
fn implausibly_distant_timestamp_is_presented_now() {
    let h = with_timed_frames(&[100 * SEC]);
    let item = h.consumer.acquire_buffer(10 * SEC, 0).unwrap();
    assert_eq!(item.frame_number, 1);
}

#[test]
fn frames_behind_the_next_due_one_are_dropped() {
    let h = with_timed_frames(&[SEC, 2 * SEC, 3 * SEC]);
    let item = h.consumer.acquire_buffer(3 * SEC, 0).unwrap();
    assert_eq!(item.frame_number, 3);
    assert_eq!(h.producer_listener.released(), 2);

    let snapshot = h.consumer.snapshot();
    assert!(snapshot.pending.is_empty());
    assert_eq!(snapshot.free_buffers.len(), 2);
    h.assert_consistent();
}

#[test]
fn auto_timestamped_head_is_never_dropped() {
    let h = connected(config().with_max_dequeued_buffer_count(3));
    h.produce();
    h.produce();
    let item = h.consumer.acquire_buffer(i64::MAX / 2, 0).unwrap();
    assert_eq!(item.frame_number, 1);
    assert!(item.is_auto_timestamp);
    assert_eq!(h.producer_listener.released(), 0);
}

#[test]
fn max_frame_number_caps_dropping_and_acquiring() {
    let h = with_timed_frames(&[SEC, 2 * SEC, 3 * SEC]);
    let item = h.consumer.acquire_buffer(3 * SEC, 2).unwrap();
    assert_eq!(item.frame_number, 2);
    assert_eq!(h.producer_listener.released(), 1);

    assert_eq!(h.consumer.acquire_buffer(0, 2).err(), Some(QueueError::PresentLater));
    assert_eq!(h.consumer.acquire_buffer(0, 3).unwrap().frame_number, 3);
    h.assert_consistent();
}

#[test]
fn acquire_limit_is_max_acquired_plus_one() {
    let h = connected(config().with_max_dequeued_buffer_count(3));
    for _ in 0..3 {
        h.produce();
    }
    let first = h.acquire();
    h.acquire();
    assert_eq!(h.consumer.acquire_buffer(0, 0).err(), Some(QueueError::InvalidOperation));

    h.release(&first);
    assert_eq!(h.acquire().frame_number, 3);
    h.assert_consistent();
}

#[test]
fn buffer_handle_is_sent_once_per_slot() {
    let h = connected(config());
    let (slot, _) = h.produce();
    let first = h.acquire();
    assert!(first.graphic_buffer.is_some());
    assert!(!first.acquire_called);
    h.release(&first);

    let (again, _) = h.produce();
    assert_eq!(again, slot);
    let second = h.acquire();
    assert!(second.graphic_buffer.is_none());
    assert!(second.acquire_called);
}

#[test]
fn stale_release_leaves_slot_untouched() {
    let h = connected(config());
    let (slot, frame) = h.produce();
    h.acquire();
    assert_eq!(
        h.consumer.release_buffer(slot, frame + 7, Fence::NO_FENCE),
        Err(QueueError::StaleBufferSlot)
    );
    assert_eq!(
        h.consumer.release_buffer(64, frame, Fence::NO_FENCE),
        Err(QueueError::BadValue)
    );
    h.consumer.release_buffer(slot, frame, Fence::NO_FENCE).unwrap();
    assert_eq!(
        h.consumer.release_buffer(slot, frame, Fence::NO_FENCE),
        Err(QueueError::BadValue)
    );
}

#[derive(Default)]
struct CountingSink {
    imports: usize,
    released: Vec<usize>,
}

impl ImageImportSink for CountingSink {
    type Image = BufferId;

    fn import(&mut self, _slot: usize, buffer: &Arc<GraphicBuffer>) -> buffer_queue::Result<BufferId> {
        self.imports += 1;
        Ok(buffer.id())
    }

    fn release(&mut self, slot: usize, _image: BufferId) {
        self.released.push(slot);
    }
}

#[test]
fn import_cache_follows_released_buffers() {
    let h = connected(config());
    let mut cache = SlotImageCache::new(CountingSink::default());

    let (slot, _) = h.produce();
    let item = h.acquire();
    let id = *cache.on_acquired(&item).unwrap();
    assert_eq!(id, item.graphic_buffer.as_ref().unwrap().id());
    h.release(&item);

    h.produce();
    let item = h.acquire();
    assert!(item.graphic_buffer.is_none());
    assert_eq!(*cache.on_acquired(&item).unwrap(), id);
    assert_eq!(cache.sink().imports, 1);
    h.release(&item);

    let mask = h.consumer.get_released_buffers().unwrap();
    assert_eq!(mask & (1 << slot), 0);
    cache.free_released(mask);
    assert!(cache.image(slot).is_some());

    h.consumer.discard_free_buffers().unwrap();
    let mask = h.consumer.get_released_buffers().unwrap();
    cache.free_released(mask);
    assert!(cache.image(slot).is_none());
    assert_eq!(cache.sink().released, vec![slot]);
}
