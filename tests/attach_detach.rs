//! Buffer ownership moving in and out of the queue: detach, attach, cancel and preallocation.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use buffer_queue::queue::SlotState;
use buffer_queue::{
    BufferUsage, DequeueFlags, Fence, GraphicBuffer, GraphicBufferAlloc, PixelFormat, QueueError,
    SoftwareFence,
};
use common::{HEIGHT, Harness, WIDTH, config, connected};

fn foreign_buffer(h: &Harness) -> Arc<GraphicBuffer> {
    h.allocator
        .create_graphic_buffer(
            dpi::PhysicalSize::new(WIDTH, HEIGHT),
            PixelFormat::RGBA_8888,
            BufferUsage::empty(),
            "foreign",
        )
        .unwrap()
}

#[test]
fn producer_detach_then_attach_keeps_buffer_identity() {
    let h = connected(config());
    let slot = h.dequeue().slot;
    let buffer = h.producer.request_buffer(slot).unwrap();
    buffer.lock_pixels()[0] = 0xAB;

    h.producer.detach_buffer(slot).unwrap();
    assert_eq!(h.consumer.snapshot().slot_states[slot], SlotState::Free);

    let attached = h.producer.attach_buffer(buffer.clone()).unwrap();
    assert!(attached.flags.contains(DequeueFlags::BUFFER_NEEDS_REALLOCATION));
    assert_eq!(attached.buffer_age, 0);
    assert!(!attached.fence.is_valid());

    let held = h.producer.request_buffer(attached.slot).unwrap();
    assert!(Arc::ptr_eq(&held, &buffer));
    assert_eq!(held.lock_pixels()[0], 0xAB);
    h.assert_consistent();
}

#[test]
fn producer_detach_requires_requested_buffer() {
    let h = connected(config());
    let slot = h
        .producer
        .dequeue_buffer(0, 0, PixelFormat::UNKNOWN, BufferUsage::empty())
        .unwrap()
        .slot;
    assert_eq!(h.producer.detach_buffer(slot), Err(QueueError::BadValue));
    assert_eq!(h.producer.detach_buffer(63), Err(QueueError::BadValue));
    h.producer.request_buffer(slot).unwrap();
    h.producer.detach_buffer(slot).unwrap();
}

#[test]
fn consumer_attach_bumps_generation() {
    let h = connected(config());
    let (slot, _) = h.produce();
    let item = h.acquire();
    let buffer = item.graphic_buffer.clone().unwrap();

    h.consumer.detach_buffer(slot).unwrap();
    assert_eq!(h.consumer.generation_number(), 0);

    let attached = h.consumer.attach_buffer(buffer.clone()).unwrap();
    assert_eq!(h.consumer.generation_number(), 1);
    assert_eq!(buffer.generation_number(), 1);
    assert_eq!(h.consumer.snapshot().slot_states[attached], SlotState::Acquired);

    // a buffer stamped before the attach no longer belongs here
    let stale = foreign_buffer(&h);
    assert_eq!(h.producer.attach_buffer(stale.clone()).err(), Some(QueueError::BadValue));
    assert_eq!(h.consumer.attach_buffer(stale).err(), Some(QueueError::BadValue));

    h.consumer.release_buffer(attached, 0, Fence::NO_FENCE).unwrap();
    let dequeued = h
        .producer
        .dequeue_buffer(0, 0, PixelFormat::UNKNOWN, BufferUsage::empty())
        .unwrap();
    assert_eq!(dequeued.slot, attached);
    assert!(dequeued.flags.contains(DequeueFlags::BUFFER_NEEDS_REALLOCATION));
    assert_eq!(dequeued.buffer_age, 0);
    assert!(Arc::ptr_eq(&h.producer.request_buffer(attached).unwrap(), &buffer));
    h.assert_consistent();
}

#[test]
fn consumer_detach_needs_acquired_slot() {
    let h = connected(config());
    let slot = h.dequeue().slot;
    assert_eq!(h.consumer.detach_buffer(slot), Err(QueueError::BadValue));
    h.queue(slot);
    assert_eq!(h.consumer.detach_buffer(slot), Err(QueueError::BadValue));
    h.acquire();
    h.consumer.detach_buffer(slot).unwrap();
    assert!(h.consumer.snapshot().free_slots.contains(&slot));
}

#[test]
fn detach_next_buffer_takes_oldest_free_buffer() {
    let h = connected(config());
    assert_eq!(h.producer.detach_next_buffer().err(), Some(QueueError::NoMemory));

    let (slot, _) = h.produce();
    let item = h.acquire();
    let release = SoftwareFence::new("release");
    h.consumer
        .release_buffer(slot, item.frame_number, release.fence())
        .unwrap();

    let (buffer, fence) = h.producer.detach_next_buffer().unwrap();
    assert!(Arc::ptr_eq(&buffer, item.graphic_buffer.as_ref().unwrap()));
    assert!(fence.same_as(&release.fence()));
    assert!(h.consumer.snapshot().free_buffers.is_empty());

    h.producer.set_shared_buffer_mode(true).unwrap();
    assert_eq!(h.producer.detach_next_buffer().err(), Some(QueueError::BadValue));
    h.assert_consistent();
}

#[test]
fn cancel_returns_slot_with_its_fence() {
    let h = connected(config());
    let first = h.dequeue();
    let cancel = SoftwareFence::new("cancel");
    h.producer.cancel_buffer(first.slot, cancel.fence()).unwrap();

    let snapshot = h.consumer.snapshot();
    assert_eq!(snapshot.free_buffers, vec![first.slot]);
    assert!(snapshot.active_buffers.is_empty());

    let again = h.dequeue();
    assert_eq!(again.slot, first.slot);
    assert!(again.fence.same_as(&cancel.fence()));
    assert!(!again.flags.contains(DequeueFlags::BUFFER_NEEDS_REALLOCATION));
    assert_eq!(
        h.producer.cancel_buffer(again.slot + 1, Fence::NO_FENCE),
        Err(QueueError::BadValue)
    );
}

#[test]
fn allocate_buffers_fills_empty_slots() {
    let h = connected(config());
    h.producer
        .allocate_buffers(0, 0, PixelFormat::UNKNOWN, BufferUsage::empty());
    assert_eq!(h.allocator.allocation_count(), 2);

    let snapshot = h.consumer.snapshot();
    assert!(snapshot.free_slots.is_empty());
    assert_eq!(snapshot.free_buffers.len(), 2);

    let dequeued = h.dequeue();
    assert!(dequeued.flags.contains(DequeueFlags::BUFFER_NEEDS_REALLOCATION));
    assert_eq!(h.allocator.allocation_count(), 2);

    // mismatching size with allocation disabled: the unusable buffer is dropped, nothing allocated
    h.producer.cancel_buffer(dequeued.slot, Fence::NO_FENCE).unwrap();
    h.producer.allow_allocation(false);
    h.producer.set_dequeue_timeout(Some(Duration::from_millis(5))).unwrap();
    let result = h
        .producer
        .dequeue_buffer(WIDTH * 2, HEIGHT * 2, PixelFormat::UNKNOWN, BufferUsage::empty());
    assert_eq!(result.err(), Some(QueueError::TimedOut));
    assert_eq!(h.allocator.allocation_count(), 2);
    assert_eq!(h.consumer.snapshot().free_slots.len(), 2);
    h.assert_consistent();
}

#[test]
fn allocation_failure_recycles_slot() {
    common::init_logging();
    let allocator = Arc::new(buffer_queue::HeapBufferAllocator::with_max_bytes(16));
    let (producer, consumer) =
        buffer_queue::BufferQueue::create_buffer_queue(allocator, config()).unwrap();
    consumer
        .consumer_connect(Arc::new(common::RecordingConsumer::default()), false)
        .unwrap();
    producer
        .connect(None, buffer_queue::queue::ProducerApi::Cpu, false)
        .unwrap();

    let result = producer.dequeue_buffer(0, 0, PixelFormat::UNKNOWN, BufferUsage::empty());
    assert_eq!(result.err(), Some(QueueError::NoMemory));
    let snapshot = consumer.snapshot();
    assert_eq!(snapshot.free_slots, vec![0, 1]);
    assert!(snapshot.active_buffers.is_empty());
    assert!(snapshot.violations.is_empty());
}

#[test]
fn dropping_unusable_buffers_does_not_extend_the_timeout() {
    let h = connected(config().with_max_dequeued_buffer_count(3));
    for _ in 0..3 {
        h.produce();
    }
    let first = h.acquire();
    let second = h.acquire();
    h.producer.allow_allocation(false);
    h.producer.set_dequeue_timeout(Some(Duration::from_millis(250))).unwrap();

    // each release wakes the dequeue with a buffer of the wrong size
    let consumer = h.consumer.clone();
    let releaser = thread::spawn(move || {
        for item in [first, second] {
            thread::sleep(Duration::from_millis(150));
            consumer
                .release_buffer(item.slot.unwrap(), item.frame_number, Fence::NO_FENCE)
                .unwrap();
        }
    });

    let started = Instant::now();
    let result = h
        .producer
        .dequeue_buffer(WIDTH * 2, HEIGHT * 2, PixelFormat::UNKNOWN, BufferUsage::empty());
    let waited = started.elapsed();
    assert_eq!(result.err(), Some(QueueError::TimedOut));
    assert!(waited < Duration::from_millis(380), "dequeue waited {waited:?}");

    releaser.join().unwrap();
    h.assert_consistent();
}
