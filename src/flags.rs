//! ### English
//! Bitflag vocabularies shared by producer and consumer: pixel transform, dequeue result flags and
//! buffer usage bits.
//!
//! ### 中文
//! 生产者与消费者共用的位标志：像素变换、dequeue 结果标志以及缓冲区 usage 位。

use bitflags::bitflags;

bitflags! {
    /// ### English
    /// Pixel transform applied when presenting a buffer.
    ///
    /// `ROT_180` is `FLIP_H | FLIP_V`; `ROT_270` is `ROT_180 | ROT_90`. `INVERSE_DISPLAY` is stripped
    /// on queue and surfaced as `BufferItem::transform_to_display_inverse`.
    ///
    /// ### 中文
    /// 呈现缓冲区时应用的像素变换。
    ///
    /// `ROT_180` 即 `FLIP_H | FLIP_V`；`ROT_270` 即 `ROT_180 | ROT_90`。`INVERSE_DISPLAY` 在 queue 时被剥离，
    /// 并以 `BufferItem::transform_to_display_inverse` 单独暴露。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Transform: u32 {
        const FLIP_H = 0x01;
        const FLIP_V = 0x02;
        const ROT_90 = 0x04;
        const ROT_180 = Self::FLIP_H.bits() | Self::FLIP_V.bits();
        const ROT_270 = Self::ROT_180.bits() | Self::ROT_90.bits();
        const INVERSE_DISPLAY = 0x08;
    }
}

bitflags! {
    /// ### English
    /// Flags returned alongside a dequeued slot.
    ///
    /// ### 中文
    /// 与 dequeue 得到的槽位一同返回的标志。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DequeueFlags: u32 {
        /// ### English
        /// The slot's buffer changed; the producer must call `request_buffer` to re-import it.
        ///
        /// ### 中文
        /// 槽位的缓冲区已更换；生产者必须调用 `request_buffer` 重新导入。
        const BUFFER_NEEDS_REALLOCATION = 0x1;
        /// ### English
        /// The queue dropped buffers behind the producer's back; drop every cached reference.
        ///
        /// ### 中文
        /// 队列在生产者不知情时释放了缓冲区；应丢弃所有缓存引用。
        const RELEASE_ALL_BUFFERS = 0x2;
    }
}

bitflags! {
    /// ### English
    /// Usage bits requested from the allocator. Bits outside the named set are preserved.
    ///
    /// ### 中文
    /// 向分配器请求的 usage 位。命名集合之外的位会被原样保留。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        const SW_READ_RARELY = 0x0000_0002;
        const SW_READ_OFTEN = 0x0000_0003;
        const SW_WRITE_RARELY = 0x0000_0020;
        const SW_WRITE_OFTEN = 0x0000_0030;
        const HW_TEXTURE = 0x0000_0100;
        const HW_RENDER = 0x0000_0200;
        const HW_2D = 0x0000_0400;
        const HW_COMPOSER = 0x0000_0800;
        const HW_FB = 0x0000_1000;
        const PROTECTED = 0x0000_4000;
        const HW_VIDEO_ENCODER = 0x0001_0000;

        const _ = !0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotations_compose_from_flips() {
        assert_eq!(Transform::ROT_180, Transform::FLIP_H | Transform::FLIP_V);
        assert_eq!(Transform::ROT_270.bits(), 0x07);
    }

    #[test]
    fn unknown_usage_bits_are_retained() {
        let usage = BufferUsage::from_bits_retain(0x8000_0000) | BufferUsage::HW_TEXTURE;
        assert_eq!(usage.bits(), 0x8000_0100);
    }
}
