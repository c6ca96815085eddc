//! Shared-buffer mode: latching, refused operations and leaving the mode.

mod common;

use buffer_queue::queue::{ProducerApi, SlotState};
use buffer_queue::{BufferUsage, Fence, PixelFormat, QueueBufferInput, QueueError};
use common::{config, connected};

#[test]
fn queue_latches_slot_when_enabled_after_dequeue() {
    let h = connected(config());
    let slot = h.dequeue().slot;
    h.producer.set_shared_buffer_mode(true).unwrap();
    assert_eq!(h.consumer.snapshot().shared_slot, None);

    h.queue(slot);
    assert_eq!(h.consumer.snapshot().shared_slot, Some(slot));
    assert!(h.consumer.dump("").contains(&format!("shared_slot=Some({slot})")));

    let item = h.acquire();
    assert!(item.droppable);
    h.release(&item);
    assert!(h.consumer.snapshot().active_buffers.contains(&slot));
    h.assert_consistent();
}

#[test]
fn latched_slot_refuses_reshaping_operations() {
    let h = connected(config().with_max_dequeued_buffer_count(2));
    h.producer.set_shared_buffer_mode(true).unwrap();
    let slot = h.dequeue().slot;

    assert_eq!(h.producer.cancel_buffer(slot, Fence::NO_FENCE), Err(QueueError::BadValue));
    assert_eq!(h.producer.set_max_dequeued_buffer_count(1), Err(QueueError::BadValue));
    assert_eq!(h.producer.detach_buffer(slot), Err(QueueError::BadValue));

    let mismatched = h
        .producer
        .dequeue_buffer(64, 64, PixelFormat::UNKNOWN, BufferUsage::empty());
    assert_eq!(mismatched.err(), Some(QueueError::BadValue));

    h.queue(slot);
    let item = h.acquire();
    assert_eq!(h.consumer.detach_buffer(slot), Err(QueueError::BadValue));
    let buffer = item.graphic_buffer.clone().unwrap();
    assert_eq!(h.consumer.attach_buffer(buffer).err(), Some(QueueError::BadValue));
    h.assert_consistent();
}

#[test]
fn without_auto_refresh_empty_queue_has_nothing_to_acquire() {
    let h = connected(config());
    h.producer.set_shared_buffer_mode(true).unwrap();
    let (slot, frame) = h.produce();
    let item = h.acquire();
    assert_eq!(item.frame_number, frame);
    h.consumer.release_buffer(slot, frame, Fence::NO_FENCE).unwrap();

    assert_eq!(h.consumer.acquire_buffer(0, 0).err(), Some(QueueError::NoBufferAvailable));
}

#[test]
fn shared_slot_is_reused_while_consumer_holds_it() {
    let h = connected(config());
    h.producer.set_shared_buffer_mode(true).unwrap();
    let (slot, _) = h.produce();
    let item = h.acquire();

    // producer keeps drawing into the buffer the consumer is sampling
    let again = h.dequeue();
    assert_eq!(again.slot, slot);
    assert_eq!(h.consumer.snapshot().slot_states[slot], SlotState::Acquired);
    let frame = h.queue_with(slot, QueueBufferInput::new(Fence::signaled()));

    h.release(&item);
    let next = h.acquire();
    assert_eq!((next.slot, next.frame_number), (Some(slot), frame));
    assert!(next.graphic_buffer.is_none());
    h.assert_consistent();
}

#[test]
fn leaving_shared_mode_returns_slot_once_free() {
    let h = connected(config());
    h.producer.set_shared_buffer_mode(true).unwrap();
    let slot = h.dequeue().slot;

    h.producer.set_shared_buffer_mode(false).unwrap();
    let snapshot = h.consumer.snapshot();
    assert_eq!(snapshot.shared_slot, None);
    assert_eq!(snapshot.slot_states[slot], SlotState::Dequeued);

    // re-enabling picks the still-flagged slot back up
    h.producer.set_shared_buffer_mode(true).unwrap();
    assert_eq!(h.consumer.snapshot().shared_slot, Some(slot));

    h.producer.set_shared_buffer_mode(false).unwrap();
    h.queue(slot);
    let item = h.acquire();
    h.release(&item);
    let snapshot = h.consumer.snapshot();
    assert_eq!(snapshot.free_buffers, vec![slot]);
    assert!(snapshot.active_buffers.is_empty());
    h.assert_consistent();
}

#[test]
fn disconnect_clears_the_latch() {
    let h = connected(config());
    h.producer.set_shared_buffer_mode(true).unwrap();
    h.produce();
    h.producer.disconnect(ProducerApi::Cpu).unwrap();
    assert_eq!(h.consumer.snapshot().shared_slot, None);

    h.producer.connect(None, ProducerApi::Cpu, false).unwrap();
    let slot = h.dequeue().slot;
    assert_eq!(h.consumer.snapshot().shared_slot, Some(slot));
    h.assert_consistent();
}
