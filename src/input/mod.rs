/// 视频输入系统 (Video Input System)
///
/// 每个通道一个读取器, 按拉取方式逐帧读取
/// - StreamReader: 通道读取器 (结束状态保持, 幂等关闭)
/// - MemorySource: 内存帧序列 (测试/嵌入)
/// - ImageSequenceSource: 图片序列目录
/// - FfmpegSource: FFmpeg视频文件解码 (需要 `ffmpeg` 功能)
pub mod image_seq;
pub mod memory;
pub mod reader;

#[cfg(feature = "ffmpeg")]
pub mod decode_filter;
#[cfg(feature = "ffmpeg")]
pub mod decoder;

use std::fmt;
use std::path::PathBuf;

use image::RgbImage;

use crate::types::StreamInfo;

pub use image_seq::ImageSequenceSource;
pub use memory::{MemorySource, MemoryStream};
pub use reader::{ReadOutcome, StreamReader};

#[cfg(feature = "ffmpeg")]
pub use decoder::FfmpegSource;

/// 帧源后端
///
/// 属性在打开时确定, `next_frame` 返回 `Ok(None)` 表示流结束
pub trait FrameSource: Send {
    fn info(&self) -> StreamInfo;

    fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>>;

    /// 释放解码资源 (由 StreamReader 保证只调用一次)
    fn close(&mut self) {}
}

/// 视频源句柄 (运行期间由读取器独占)
pub enum StreamHandle {
    /// 视频文件或URL (FFmpeg解码)
    Video(PathBuf),
    /// 图片序列目录 (按文件名排序)
    ImageSequence { dir: PathBuf, fps: f64 },
    /// 内存帧序列
    Memory(MemoryStream),
    /// 调用方自定义后端
    Custom(Box<dyn FrameSource>),
}

impl StreamHandle {
    pub fn describe(&self) -> String {
        match self {
            StreamHandle::Video(path) => format!("video:{}", path.display()),
            StreamHandle::ImageSequence { dir, fps } => {
                format!("images:{} @{:.2}fps", dir.display(), fps)
            }
            StreamHandle::Memory(stream) => format!("memory:{}帧", stream.len()),
            StreamHandle::Custom(_) => "custom".to_string(),
        }
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
