//! Connection lifecycle: connect / disconnect, abandonment, producer death and consumer-side
//! observability (sideband stream, frame timeline, occupancy history, dump).

mod common;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use buffer_queue::frame::{FrameHistory, FrameTimestamps, LayerFenceData};
use buffer_queue::queue::{BufferQueue, NativeHandle, ProducerApi, SidebandStream, death_link};
use buffer_queue::{
    BufferItem, BufferUsage, ConsumerListener, Fence, HeapBufferAllocator, PixelFormat, QueueError,
};
use common::{Callback, RecordingProducer, config, connected, consumer_only};

#[test]
fn connect_needs_a_consumer_and_happens_once() {
    common::init_logging();
    let (producer, consumer) =
        BufferQueue::create_buffer_queue(Arc::new(HeapBufferAllocator::new()), config()).unwrap();
    assert_eq!(
        producer.connect(None, ProducerApi::Cpu, false).err(),
        Some(QueueError::NoInit)
    );
    assert_eq!(consumer.consumer_disconnect(), Err(QueueError::BadValue));

    let h = connected(config());
    let again = h.producer.connect(None, ProducerApi::Gpu, false);
    assert_eq!(again.err(), Some(QueueError::InvalidOperation));
}

#[test]
fn connect_reports_queue_geometry() {
    let h = consumer_only(config());
    let output = h.producer.connect(None, ProducerApi::Media, false).unwrap();
    assert_eq!((output.width, output.height), (common::WIDTH, common::HEIGHT));
    assert_eq!(output.num_pending_buffers, 0);
    assert_eq!(output.next_frame_number, 1);
}

#[test]
fn disconnect_checks_the_api_and_frees_everything() {
    let h = connected(config());
    let (slot, _) = h.produce();

    assert_eq!(h.producer.disconnect(ProducerApi::Gpu), Err(QueueError::BadValue));
    h.producer.disconnect(ProducerApi::Cpu).unwrap();
    assert_eq!(h.producer.disconnect(ProducerApi::Cpu), Err(QueueError::NoInit));

    let snapshot = h.consumer.snapshot();
    assert!(snapshot.free_slots.contains(&slot));
    assert_eq!(snapshot.pending, vec![None]);
    let events = h.consumer_listener.events();
    assert_eq!(
        &events[events.len() - 2..],
        &[Callback::BuffersReleased, Callback::Disconnected]
    );

    // a stale pending item still reaches the consumer, with its buffer handle
    let item = h.acquire();
    assert!(item.is_stale);
    assert!(item.graphic_buffer.is_some());
    assert_eq!(
        h.producer
            .dequeue_buffer(0, 0, PixelFormat::UNKNOWN, BufferUsage::empty())
            .err(),
        Some(QueueError::NoInit)
    );
    h.assert_consistent();
}

#[test]
fn abandoned_queue_refuses_everything() {
    let h = connected(config().with_max_dequeued_buffer_count(2));
    let (held_slot, held_frame) = h.produce();
    h.acquire();
    let slot = h.dequeue().slot;
    h.consumer.consumer_disconnect().unwrap();
    assert!(h.consumer.is_abandoned());

    // a buffer acquired before the abandon cannot be handed back either
    assert_eq!(
        h.consumer.release_buffer(held_slot, held_frame, Fence::NO_FENCE),
        Err(QueueError::NoInit)
    );

    assert_eq!(
        h.producer
            .dequeue_buffer(0, 0, PixelFormat::UNKNOWN, BufferUsage::empty())
            .err(),
        Some(QueueError::NoInit)
    );
    assert_eq!(
        h.producer.queue_buffer(slot, buffer_queue::QueueBufferInput::new(Fence::signaled())).err(),
        Some(QueueError::NoInit)
    );
    assert_eq!(h.producer.request_buffer(slot).err(), Some(QueueError::NoInit));
    assert_eq!(h.consumer.acquire_buffer(0, 0).err(), Some(QueueError::NoInit));
    assert_eq!(h.producer.set_async_mode(true), Err(QueueError::NoInit));
    assert_eq!(h.consumer.get_released_buffers().err(), Some(QueueError::NoInit));
    assert_eq!(
        h.producer.connect(None, ProducerApi::Cpu, false).err(),
        Some(QueueError::NoInit)
    );

    // tearing down after the consumer is a no-op
    h.producer.disconnect(ProducerApi::Cpu).unwrap();
    h.consumer.abandon();
    assert_eq!(h.consumer.consumer_disconnect(), Err(QueueError::NoInit));
    assert!(h.consumer.snapshot().active_buffers.is_empty());
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[test]
fn producer_death_disconnects_it() {
    let h = consumer_only(config());
    let (token, notice) = death_link();
    let listener = Arc::new(RecordingProducer::with_death_notice(notice));
    h.producer.connect(Some(listener), ProducerApi::Cpu, false).unwrap();
    h.produce();

    drop(token);
    assert!(wait_for(|| h.consumer_listener.count(&Callback::Disconnected) == 1));
    h.producer.connect(None, ProducerApi::Cpu, false).unwrap();
    h.assert_consistent();
}

#[test]
fn death_of_a_replaced_connection_is_ignored() {
    let h = consumer_only(config());
    let (token, notice) = death_link();
    let listener = Arc::new(RecordingProducer::with_death_notice(notice));
    h.producer.connect(Some(listener), ProducerApi::Cpu, false).unwrap();
    h.producer.disconnect(ProducerApi::Cpu).unwrap();
    h.producer.connect(None, ProducerApi::Gpu, false).unwrap();

    drop(token);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(h.consumer_listener.count(&Callback::Disconnected), 1);
    h.producer.disconnect(ProducerApi::Gpu).unwrap();
}

#[test]
fn sideband_stream_is_forwarded_and_cleared() {
    let h = connected(config());
    let stream = SidebandStream::new(NativeHandle {
        fds: vec![3],
        ints: vec![42],
    });
    h.producer.set_sideband_stream(Some(stream.clone())).unwrap();
    assert_eq!(h.consumer_listener.count(&Callback::SidebandChanged), 1);
    let current = h.consumer.get_sideband_stream().unwrap();
    assert!(current.same_as(&stream));
    assert_eq!(current.handle().ints, vec![42]);

    h.producer.disconnect(ProducerApi::Cpu).unwrap();
    assert!(h.consumer.get_sideband_stream().is_none());
}

const LAYER: i32 = 3;

/// Consumer that keeps a composition timeline and answers timestamp queries from it.
#[derive(Default)]
struct TimelineConsumer {
    history: Mutex<FrameHistory>,
}

impl ConsumerListener for TimelineConsumer {
    fn on_frame_available(&self, _item: &BufferItem) {}

    fn on_buffers_released(&self) {}

    fn on_sideband_stream_changed(&self) {}

    fn frame_timestamps(&self, frame_number: u64) -> Option<FrameTimestamps> {
        self.history
            .lock()
            .unwrap()
            .get_frame_timestamps(LAYER, frame_number)
    }
}

#[test]
fn frame_timestamps_come_from_the_consumer() {
    common::init_logging();
    let (producer, consumer) =
        BufferQueue::create_buffer_queue(Arc::new(HeapBufferAllocator::new()), config()).unwrap();
    let timeline = Arc::new(TimelineConsumer::default());
    consumer.consumer_connect(timeline.clone(), false).unwrap();
    producer.connect(None, ProducerApi::Cpu, false).unwrap();
    assert!(producer.frame_timestamps(1).is_none());

    let slot = producer
        .dequeue_buffer(0, 0, PixelFormat::UNKNOWN, BufferUsage::empty())
        .unwrap()
        .slot;
    producer.request_buffer(slot).unwrap();
    let input = buffer_queue::QueueBufferInput::new(Fence::signaled_at(40)).with_timestamp(90);
    producer.queue_buffer(slot, input).unwrap();
    let item = consumer.acquire_buffer(0, 0).unwrap();

    timeline.history.lock().unwrap().add_frame(
        100,
        Fence::NO_FENCE,
        &[LayerFenceData {
            layer_id: LAYER,
            name: "surface".to_string(),
            frame_number: item.frame_number,
            gpu_composition: false,
            posted_time: 50,
            requested_present_time: item.timestamp,
            acquire_fence: item.fence.clone(),
            previous_release_fence: Fence::NO_FENCE,
        }],
        Fence::NO_FENCE,
    );

    let timestamps = producer.frame_timestamps(item.frame_number).unwrap();
    assert_eq!(timestamps.requested_present_time, 90);
    assert_eq!(timestamps.acquire_time, Some(40));
    assert_eq!(timestamps.refresh_start_time, 100);
    assert_eq!(timestamps.release_time, None);
    assert!(producer.frame_timestamps(item.frame_number + 1).is_none());
}

#[test]
fn busy_stream_records_an_occupancy_segment() {
    let h = connected(config());
    for _ in 0..6 {
        let (_, _) = h.produce();
        let item = h.acquire();
        h.release(&item);
    }
    let history = h.consumer.get_occupancy_history(true);
    assert_eq!(history.len(), 1);
    let segment = history[0];
    assert_eq!(segment.num_frames, 6);
    assert!(segment.occupancy_average <= 1.0);
    assert!(!segment.used_third_buffer);
    assert!(h.consumer.get_occupancy_history(false).is_empty());
}

#[test]
fn dump_lists_settings_queue_and_slots() {
    let h = connected(config());
    let (slot, frame) = h.produce();
    let dump = h.consumer.dump("> ");
    assert!(dump.lines().all(|line| line.starts_with("> ")));
    assert!(dump.contains("[test-queue]"));
    assert!(dump.contains("pending queue (1):"));
    assert!(dump.contains(&format!("slot=Some({slot}) frame={frame}")));
    assert!(dump.contains("state=QUEUED"));
}
