/// 视频输出系统 (Output Muxer)
///
/// 合成帧按顺序追加到输出目标, 结束时统一收尾
/// - OutputMuxer: 尺寸校验 + 帧计数 + 幂等收尾
/// - MemoryRecording: 内存录制 (测试/嵌入)
/// - ImageSequenceSink: PNG序列 + manifest.json
/// - FfmpegSink: FFmpeg编码视频文件 (需要 `ffmpeg` 功能)
pub mod image_seq;
pub mod memory;
pub mod muxer;

#[cfg(feature = "ffmpeg")]
pub mod encoder;

use std::fmt;
use std::path::{Path, PathBuf};

use image::RgbImage;

pub use image_seq::ImageSequenceSink;
pub use memory::MemoryRecording;
pub use muxer::{OutputHandle, OutputMuxer};

#[cfg(feature = "ffmpeg")]
pub use encoder::FfmpegSink;

/// 默认视频编码器
pub const DEFAULT_CODEC: &str = "mpeg4";

/// 帧写入后端
pub trait FrameSink: Send {
    fn write_frame(&mut self, image: &RgbImage) -> anyhow::Result<()>;

    /// 写入尾部信息并释放资源 (由 OutputMuxer 保证只调用一次)
    fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// 输出目标
pub enum OutputTarget {
    /// 视频文件 (FFmpeg编码)
    Video { path: PathBuf, codec: String },
    /// PNG图片序列目录
    ImageSequence(PathBuf),
    /// 内存录制
    Memory(MemoryRecording),
    /// 调用方自定义后端
    Custom(Box<dyn FrameSink>),
}

impl OutputTarget {
    pub fn video(path: impl Into<PathBuf>) -> Self {
        OutputTarget::Video {
            path: path.into(),
            codec: DEFAULT_CODEC.to_string(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            OutputTarget::Video { path, codec } => format!("video:{} ({})", path.display(), codec),
            OutputTarget::ImageSequence(dir) => format!("images:{}", dir.display()),
            OutputTarget::Memory(_) => "memory".to_string(),
            OutputTarget::Custom(_) => "custom".to_string(),
        }
    }

    /// 输出文件/目录路径 (内存和自定义目标没有路径)
    pub fn path(&self) -> Option<&Path> {
        match self {
            OutputTarget::Video { path, .. } => Some(path),
            OutputTarget::ImageSequence(dir) => Some(dir),
            OutputTarget::Memory(_) | OutputTarget::Custom(_) => None,
        }
    }
}

impl fmt::Debug for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// 带时间戳的默认输出文件名: `<dir>/rgbt_<时间>.mp4`
pub fn default_output_path(dir: &Path) -> PathBuf {
    dir.join(format!("rgbt_{}.mp4", crate::gen_time_string("")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        let path = default_output_path(Path::new("/tmp/out"));
        assert_eq!(path.parent(), Some(Path::new("/tmp/out")));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("rgbt_"));
        assert!(name.ends_with(".mp4"));
    }

    #[test]
    fn test_video_target_uses_default_codec() {
        let target = OutputTarget::video("/tmp/a.mp4");
        assert!(matches!(&target, OutputTarget::Video { codec, .. } if codec == DEFAULT_CODEC));
        assert_eq!(target.path(), Some(Path::new("/tmp/a.mp4")));
    }
}
