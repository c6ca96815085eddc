//! Shared fixtures for the buffer queue integration tests.
//!
//! Every test builds its own queue over a fresh heap allocator, with recording listeners on both
//! sides so callbacks can be asserted on.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use buffer_queue::queue::{BufferQueue, DeathNotice, DequeuedBuffer, ProducerApi};
use buffer_queue::{
    BufferItem, BufferQueueConfig, BufferQueueConsumer, BufferQueueProducer, BufferUsage,
    ConsumerListener, DequeueFlags, Fence, HeapBufferAllocator, PixelFormat, ProducerListener,
    QueueBufferInput,
};

pub const WIDTH: u32 = 16;
pub const HEIGHT: u32 = 8;

static LOGGER: Once = Once::new();

/// Installs `env_logger` once; `RUST_LOG=trace` shows every queue transition.
pub fn init_logging() {
    LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Consumer-side callback as observed by [`RecordingConsumer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Available(u64),
    Replaced(u64),
    BuffersReleased,
    SidebandChanged,
    Disconnected,
}

#[derive(Default)]
pub struct RecordingConsumer {
    events: Mutex<Vec<Callback>>,
    items: Mutex<Vec<BufferItem>>,
}

impl RecordingConsumer {
    pub fn events(&self) -> Vec<Callback> {
        self.events.lock().unwrap().clone()
    }

    pub fn items(&self) -> Vec<BufferItem> {
        self.items.lock().unwrap().clone()
    }

    pub fn frame_numbers(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Callback::Available(frame) | Callback::Replaced(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Callback) -> usize {
        self.events().iter().filter(|event| *event == wanted).count()
    }

    fn push(&self, event: Callback) {
        self.events.lock().unwrap().push(event);
    }
}

impl ConsumerListener for RecordingConsumer {
    fn on_frame_available(&self, item: &BufferItem) {
        self.items.lock().unwrap().push(item.clone());
        self.push(Callback::Available(item.frame_number));
    }

    fn on_frame_replaced(&self, item: &BufferItem) {
        self.items.lock().unwrap().push(item.clone());
        self.push(Callback::Replaced(item.frame_number));
    }

    fn on_buffers_released(&self) {
        self.push(Callback::BuffersReleased);
    }

    fn on_sideband_stream_changed(&self) {
        self.push(Callback::SidebandChanged);
    }

    fn on_disconnect(&self) {
        self.push(Callback::Disconnected);
    }
}

#[derive(Default)]
pub struct RecordingProducer {
    released: Mutex<usize>,
    notice: Mutex<Option<DeathNotice>>,
}

impl RecordingProducer {
    pub fn with_death_notice(notice: DeathNotice) -> Self {
        Self {
            released: Mutex::new(0),
            notice: Mutex::new(Some(notice)),
        }
    }

    pub fn released(&self) -> usize {
        *self.released.lock().unwrap()
    }
}

impl ProducerListener for RecordingProducer {
    fn on_buffer_released(&self) {
        *self.released.lock().unwrap() += 1;
    }

    fn death_notice(&self) -> Option<DeathNotice> {
        self.notice.lock().unwrap().clone()
    }
}

pub struct Harness {
    pub producer: BufferQueueProducer,
    pub consumer: BufferQueueConsumer,
    pub consumer_listener: Arc<RecordingConsumer>,
    pub producer_listener: Arc<RecordingProducer>,
    pub allocator: Arc<HeapBufferAllocator>,
}

pub fn config() -> BufferQueueConfig {
    BufferQueueConfig::default()
        .with_consumer_name("test-queue")
        .with_default_size(WIDTH, HEIGHT)
        .with_validate_consistency(true)
}

/// Queue with a connected consumer but no producer.
pub fn consumer_only(config: BufferQueueConfig) -> Harness {
    init_logging();
    let allocator = Arc::new(HeapBufferAllocator::new());
    let (producer, consumer) = BufferQueue::create_buffer_queue(allocator.clone(), config).unwrap();
    let consumer_listener = Arc::new(RecordingConsumer::default());
    consumer.consumer_connect(consumer_listener.clone(), false).unwrap();
    Harness {
        producer,
        consumer,
        consumer_listener,
        producer_listener: Arc::new(RecordingProducer::default()),
        allocator,
    }
}

/// Queue with both ends connected; the producer uses the CPU api so queue never throttles.
pub fn connected(config: BufferQueueConfig) -> Harness {
    let harness = consumer_only(config);
    harness
        .producer
        .connect(Some(harness.producer_listener.clone()), ProducerApi::Cpu, false)
        .unwrap();
    harness
}

impl Harness {
    /// Dequeues with the default geometry and requests the buffer when asked to.
    pub fn dequeue(&self) -> DequeuedBuffer {
        let dequeued = self
            .producer
            .dequeue_buffer(0, 0, PixelFormat::UNKNOWN, BufferUsage::empty())
            .unwrap();
        if dequeued.flags.contains(DequeueFlags::BUFFER_NEEDS_REALLOCATION) {
            self.producer.request_buffer(dequeued.slot).unwrap();
        }
        dequeued
    }

    pub fn queue(&self, slot: usize) -> u64 {
        self.queue_with(slot, QueueBufferInput::new(Fence::signaled()))
    }

    pub fn queue_with(&self, slot: usize, input: QueueBufferInput) -> u64 {
        self.producer.queue_buffer(slot, input).unwrap().next_frame_number - 1
    }

    /// Dequeues and queues one frame; returns `(slot, frame_number)`.
    pub fn produce(&self) -> (usize, u64) {
        let slot = self.dequeue().slot;
        (slot, self.queue(slot))
    }

    pub fn acquire(&self) -> BufferItem {
        self.consumer.acquire_buffer(0, 0).unwrap()
    }

    pub fn release(&self, item: &BufferItem) {
        let slot = item.slot.unwrap();
        self.consumer
            .release_buffer(slot, item.frame_number, Fence::NO_FENCE)
            .unwrap();
    }

    pub fn assert_consistent(&self) {
        let snapshot = self.consumer.snapshot();
        assert!(snapshot.violations.is_empty(), "{:?}", snapshot.violations);
    }
}
