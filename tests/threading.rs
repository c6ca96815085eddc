//! Producer and consumer running on separate threads.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use buffer_queue::listener::{ChannelConsumerListener, ConsumerEvent};
use buffer_queue::queue::{BufferQueue, ProducerApi};
use buffer_queue::{
    BufferItem, BufferQueueProducer, BufferUsage, ConsumerListener, DequeueFlags, Fence,
    HeapBufferAllocator, PixelFormat, QueueBufferInput, QueueError,
};
use common::{config, connected};
use crossbeam_channel as channel;

const PRODUCERS: usize = 4;
const FRAMES_PER_PRODUCER: usize = 25;

#[test]
fn blocked_dequeue_wakes_on_release() {
    let h = connected(config());
    h.produce();
    h.produce();

    let consumer = h.consumer.clone();
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        let item = consumer.acquire_buffer(0, 0).unwrap();
        consumer
            .release_buffer(item.slot.unwrap(), item.frame_number, Fence::NO_FENCE)
            .unwrap();
        item.slot.unwrap()
    });

    let dequeued = h.dequeue();
    let released = releaser.join().unwrap();
    assert_eq!(dequeued.slot, released);
    h.assert_consistent();
}

#[test]
fn abandon_wakes_a_blocked_dequeue() {
    let h = connected(config());
    h.produce();
    h.produce();

    let producer = h.producer.clone();
    let blocked = thread::spawn(move || {
        producer.dequeue_buffer(0, 0, PixelFormat::UNKNOWN, BufferUsage::empty())
    });
    thread::sleep(Duration::from_millis(20));
    h.consumer.abandon();
    assert_eq!(blocked.join().unwrap().err(), Some(QueueError::NoInit));
}

#[test]
fn callbacks_follow_queue_order_across_producer_threads() {
    let h = connected(config().with_max_dequeued_buffer_count(PRODUCERS));
    let total = PRODUCERS * FRAMES_PER_PRODUCER;

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let producer = h.producer.clone();
            thread::spawn(move || {
                for _ in 0..FRAMES_PER_PRODUCER {
                    let dequeued = producer
                        .dequeue_buffer(0, 0, PixelFormat::UNKNOWN, BufferUsage::empty())
                        .unwrap();
                    if dequeued.flags.contains(DequeueFlags::BUFFER_NEEDS_REALLOCATION) {
                        producer.request_buffer(dequeued.slot).unwrap();
                    }
                    producer
                        .queue_buffer(dequeued.slot, QueueBufferInput::new(Fence::signaled()))
                        .unwrap();
                }
            })
        })
        .collect();

    let consumer = h.consumer.clone();
    let drain = thread::spawn(move || {
        let mut acquired = Vec::with_capacity(total);
        while acquired.len() < total {
            match consumer.acquire_buffer(0, 0) {
                Ok(item) => {
                    consumer
                        .release_buffer(item.slot.unwrap(), item.frame_number, Fence::NO_FENCE)
                        .unwrap();
                    acquired.push(item.frame_number);
                }
                Err(QueueError::NoBufferAvailable) => thread::yield_now(),
                Err(err) => panic!("acquire failed: {err}"),
            }
        }
        acquired
    });

    for producer in producers {
        producer.join().unwrap();
    }
    let acquired = drain.join().unwrap();
    let expected: Vec<u64> = (1..=total as u64).collect();
    assert_eq!(acquired, expected);
    assert_eq!(h.consumer_listener.frame_numbers(), expected);
    assert_eq!(h.producer_listener.released(), total);
    h.assert_consistent();
}

#[test]
fn channel_listener_drives_a_consumer_thread() {
    common::init_logging();
    let (producer, consumer) =
        BufferQueue::create_buffer_queue(Arc::new(HeapBufferAllocator::new()), config()).unwrap();
    let (listener, events) = ChannelConsumerListener::new();
    consumer.consumer_connect(listener, false).unwrap();
    producer.connect(None, ProducerApi::Cpu, false).unwrap();
    let observer = consumer.clone();

    let worker = thread::spawn(move || {
        let mut frames = Vec::new();
        for event in events.iter() {
            match event {
                ConsumerEvent::FrameAvailable(item) => {
                    assert!(item.graphic_buffer.is_none());
                    assert_eq!(item.slot, None);
                    let acquired = consumer.acquire_buffer(0, 0).unwrap();
                    assert_eq!(acquired.frame_number, item.frame_number);
                    consumer
                        .release_buffer(acquired.slot.unwrap(), acquired.frame_number, Fence::NO_FENCE)
                        .unwrap();
                    frames.push(item.frame_number);
                }
                ConsumerEvent::Disconnected => break,
                _ => {}
            }
        }
        frames
    });

    for _ in 0..5 {
        let dequeued = producer
            .dequeue_buffer(0, 0, PixelFormat::UNKNOWN, BufferUsage::empty())
            .unwrap();
        if dequeued.flags.contains(DequeueFlags::BUFFER_NEEDS_REALLOCATION) {
            producer.request_buffer(dequeued.slot).unwrap();
        }
        producer
            .queue_buffer(dequeued.slot, QueueBufferInput::new(Fence::signaled()))
            .unwrap();
    }
    // let the worker catch up before tearing the buffers down
    loop {
        let snapshot = observer.snapshot();
        if snapshot.pending.is_empty() && snapshot.active_buffers.is_empty() {
            break;
        }
        thread::yield_now();
    }
    producer.disconnect(ProducerApi::Cpu).unwrap();

    assert_eq!(worker.join().unwrap(), vec![1, 2, 3, 4, 5]);
}

/// Listener whose first frame callback panics.
struct FailsOnFirstFrame;

impl ConsumerListener for FailsOnFirstFrame {
    fn on_frame_available(&self, item: &BufferItem) {
        if item.frame_number == 1 {
            panic!("listener failed on frame {}", item.frame_number);
        }
    }

    fn on_buffers_released(&self) {}

    fn on_sideband_stream_changed(&self) {}
}

fn produce_on(producer: &BufferQueueProducer) -> buffer_queue::Result<u64> {
    let dequeued = producer.dequeue_buffer(0, 0, PixelFormat::UNKNOWN, BufferUsage::empty())?;
    producer.request_buffer(dequeued.slot)?;
    let output = producer.queue_buffer(dequeued.slot, QueueBufferInput::new(Fence::signaled()))?;
    Ok(output.next_frame_number)
}

#[test]
fn panicking_listener_does_not_stall_later_queues() {
    common::init_logging();
    let (producer, consumer) = BufferQueue::create_buffer_queue(
        Arc::new(HeapBufferAllocator::new()),
        config().with_max_dequeued_buffer_count(2),
    )
    .unwrap();
    consumer.consumer_connect(Arc::new(FailsOnFirstFrame), false).unwrap();
    producer.connect(None, ProducerApi::Cpu, false).unwrap();

    let first = {
        let producer = producer.clone();
        thread::spawn(move || produce_on(&producer))
    };
    assert!(first.join().is_err());

    let (done, outcome) = channel::bounded(1);
    thread::spawn(move || {
        let _ = done.send(produce_on(&producer));
    });
    let second = outcome.recv_timeout(Duration::from_secs(2));
    assert!(matches!(second, Ok(Ok(_))), "second queue_buffer: {second:?}");
    assert_eq!(consumer.snapshot().pending.len(), 2);
}
