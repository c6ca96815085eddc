/// ### English
/// Pixel format tag. `UNKNOWN` (0) in a dequeue request means "use the queue default".
///
/// ### 中文
/// 像素格式标记。dequeue 请求中的 `UNKNOWN`（0）表示“使用队列默认值”。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelFormat(pub u32);

impl PixelFormat {
    pub const UNKNOWN: PixelFormat = PixelFormat(0);
    pub const RGBA_8888: PixelFormat = PixelFormat(1);
    pub const RGBX_8888: PixelFormat = PixelFormat(2);
    pub const RGB_888: PixelFormat = PixelFormat(3);
    pub const RGB_565: PixelFormat = PixelFormat(4);
    pub const BGRA_8888: PixelFormat = PixelFormat(5);
    pub const RGBA_FP16: PixelFormat = PixelFormat(0x16);
    pub const RGBA_1010102: PixelFormat = PixelFormat(0x2B);

    /// ### English
    /// Bytes per pixel for CPU-addressable formats, `None` for unknown / opaque ones.
    ///
    /// ### 中文
    /// CPU 可寻址格式的每像素字节数；未知或不透明格式返回 `None`。
    pub const fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            PixelFormat::RGBA_8888
            | PixelFormat::RGBX_8888
            | PixelFormat::BGRA_8888
            | PixelFormat::RGBA_1010102 => Some(4),
            PixelFormat::RGB_888 => Some(3),
            PixelFormat::RGB_565 => Some(2),
            PixelFormat::RGBA_FP16 => Some(8),
            _ => None,
        }
    }
}
