//! ### English
//! Consumer-side per-slot import cache.
//!
//! The queue only hands out slot indices and buffer references. Turning a buffer into something a
//! consumer can sample (a texture, a mapped image...) is the job of an [`ImageImportSink`], and the
//! resulting resources live in a [`SlotImageCache`] owned by the consumer thread, never under the
//! core lock.
//!
//! ### 中文
//! 消费者侧的按槽位导入缓存。
//!
//! 队列只提供槽位索引与缓冲区引用。把缓冲区变成消费者可采样的资源（纹理、映射图像等）由
//! [`ImageImportSink`] 负责，产生的资源存放在由消费者线程持有的 [`SlotImageCache`] 中，从不位于核心锁之下。

use std::sync::Arc;

use crate::buffer::{BufferId, GraphicBuffer};
use crate::error::{QueueError, Result};
use crate::queue::{BufferItem, NUM_BUFFER_SLOTS};

/// ### English
/// Maps a graphic buffer into a consumer resource.
///
/// ### 中文
/// 将图形缓冲区映射为消费者资源。
pub trait ImageImportSink {
    type Image;

    fn import(&mut self, slot: usize, buffer: &Arc<GraphicBuffer>) -> Result<Self::Image>;

    /// ### English
    /// Called when the cache forgets an image. Dropping it is the default.
    ///
    /// ### 中文
    /// 缓存遗忘某个图像时调用。默认直接丢弃。
    fn release(&mut self, _slot: usize, _image: Self::Image) {}
}

struct CachedImage<I> {
    buffer_id: BufferId,
    image: I,
}

/// ### English
/// One imported resource per slot.
///
/// Feed every acquired item through [`SlotImageCache::on_acquired`]; after `on_buffers_released`
/// pass the mask from `get_released_buffers` to [`SlotImageCache::free_released`].
///
/// ### 中文
/// 每个槽位一个已导入资源。
///
/// 将每个 acquire 得到的 item 交给 [`SlotImageCache::on_acquired`]；收到 `on_buffers_released` 后，
/// 把 `get_released_buffers` 返回的掩码传给 [`SlotImageCache::free_released`]。
pub struct SlotImageCache<S: ImageImportSink> {
    sink: S,
    images: Vec<Option<CachedImage<S::Image>>>,
}

impl<S: ImageImportSink> SlotImageCache<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            images: (0..NUM_BUFFER_SLOTS).map(|_| None).collect(),
        }
    }

    /// ### English
    /// Returns the image for an acquired item, importing it when the item carries a buffer.
    ///
    /// An item without a buffer refers to the image cached for its slot; a missing cache entry is
    /// `BadValue`.
    ///
    /// ### 中文
    /// 返回 acquire 所得 item 对应的图像；若 item 携带缓冲区则重新导入。
    ///
    /// 不带缓冲区的 item 指向该槽位已缓存的图像；缓存缺失时返回 `BadValue`。
    pub fn on_acquired(&mut self, item: &BufferItem) -> Result<&S::Image> {
        let slot = item
            .slot
            .filter(|&slot| slot < NUM_BUFFER_SLOTS)
            .ok_or(QueueError::BadValue)?;

        if let Some(buffer) = &item.graphic_buffer {
            let reusable = self.images[slot]
                .as_ref()
                .is_some_and(|cached| cached.buffer_id == buffer.id());
            if !reusable {
                self.forget(slot);
                let image = self.sink.import(slot, buffer)?;
                self.images[slot] = Some(CachedImage {
                    buffer_id: buffer.id(),
                    image,
                });
            }
        }

        self.images[slot]
            .as_ref()
            .map(|cached| &cached.image)
            .ok_or_else(|| {
                log::error!("on_acquired: slot {slot} has no imported image");
                QueueError::BadValue
            })
    }

    /// ### English
    /// Forgets every slot whose bit is set in `mask`.
    ///
    /// ### 中文
    /// 遗忘 `mask` 中置位的所有槽位。
    pub fn free_released(&mut self, mask: u64) {
        for slot in 0..NUM_BUFFER_SLOTS {
            if mask & (1u64 << slot) != 0 {
                self.forget(slot);
            }
        }
    }

    pub fn free_all(&mut self) {
        self.free_released(u64::MAX);
    }

    pub fn image(&self, slot: usize) -> Option<&S::Image> {
        self.images.get(slot)?.as_ref().map(|cached| &cached.image)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn forget(&mut self, slot: usize) {
        if let Some(cached) = self.images[slot].take() {
            self.sink.release(slot, cached.image);
        }
    }
}
