/// 通道读取器
/// Stream reader: owns one frame source for the run
use crate::error::{PipelineError, PipelineResult};
use crate::types::{Channel, Frame, StreamInfo};

use super::image_seq::ImageSequenceSource;
use super::memory::MemorySource;
use super::{FrameSource, StreamHandle};

/// 读取结果
#[derive(Debug)]
pub enum ReadOutcome {
    Frame(Frame),
    EndOfStream,
}

/// 单通道读取器
///
/// - 属性在打开时查询一次
/// - 观察到流结束后, `read` 始终返回 `EndOfStream`
/// - `close` 幂等, Drop 时自动关闭
pub struct StreamReader {
    channel: Channel,
    info: StreamInfo,
    source: Option<Box<dyn FrameSource>>,
    exhausted: bool,
    frames_read: u64,
}

impl StreamReader {
    pub fn open(channel: Channel, handle: StreamHandle) -> PipelineResult<Self> {
        let description = handle.describe();
        let source = open_source(channel, handle)?;
        let info = source.info();

        if info.width == 0 || info.height == 0 {
            return Err(PipelineError::SourceUnreadable {
                channel,
                reason: format!("{} 尺寸非法 {}x{}", description, info.width, info.height),
            });
        }

        tracing::info!(
            "📹 {}通道已打开: {} ({}x{} @ {:.2}fps)",
            channel.label(),
            description,
            info.width,
            info.height,
            info.fps
        );

        Ok(Self::from_source(channel, source))
    }

    /// 直接包装已打开的后端
    pub fn from_source(channel: Channel, source: Box<dyn FrameSource>) -> Self {
        let info = source.info();
        Self {
            channel,
            info,
            source: Some(source),
            exhausted: false,
            frames_read: 0,
        }
    }

    pub fn read(&mut self) -> PipelineResult<ReadOutcome> {
        if self.exhausted {
            return Ok(ReadOutcome::EndOfStream);
        }
        let Some(source) = self.source.as_mut() else {
            return Ok(ReadOutcome::EndOfStream);
        };

        match source.next_frame() {
            Ok(Some(image)) => {
                self.frames_read += 1;
                Ok(ReadOutcome::Frame(Frame::new(
                    self.channel,
                    self.frames_read,
                    image,
                )))
            }
            Ok(None) => {
                self.exhausted = true;
                tracing::debug!(
                    "🏁 {}通道结束, 共读取 {} 帧",
                    self.channel.label(),
                    self.frames_read
                );
                Ok(ReadOutcome::EndOfStream)
            }
            Err(e) => Err(PipelineError::SourceUnreadable {
                channel: self.channel,
                reason: format!("第{}帧读取失败: {:#}", self.frames_read + 1, e),
            }),
        }
    }

    pub fn close(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
            tracing::debug!("✅ {}通道已释放", self.channel.label());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn info(&self) -> StreamInfo {
        self.info
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_source(channel: Channel, handle: StreamHandle) -> PipelineResult<Box<dyn FrameSource>> {
    let unreadable = |reason: String| PipelineError::SourceUnreadable { channel, reason };

    match handle {
        StreamHandle::Memory(stream) => Ok(Box::new(MemorySource::new(stream))),
        StreamHandle::Custom(source) => Ok(source),
        StreamHandle::ImageSequence { dir, fps } => ImageSequenceSource::open(&dir, fps)
            .map(|s| Box::new(s) as Box<dyn FrameSource>)
            .map_err(|e| unreadable(format!("{:#}", e))),
        #[cfg(feature = "ffmpeg")]
        StreamHandle::Video(path) => super::decoder::FfmpegSource::open(&path)
            .map(|s| Box::new(s) as Box<dyn FrameSource>)
            .map_err(|e| unreadable(format!("{:#}", e))),
        #[cfg(not(feature = "ffmpeg"))]
        StreamHandle::Video(path) => Err(unreadable(format!(
            "{}: 未启用 ffmpeg 功能, 无法解码视频文件",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::MemoryStream;
    use image::RgbImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        remaining: usize,
        closes: Arc<AtomicUsize>,
    }

    impl FrameSource for CountingSource {
        fn info(&self) -> StreamInfo {
            StreamInfo {
                width: 2,
                height: 2,
                fps: 10.0,
            }
        }

        fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(RgbImage::new(2, 2)))
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_end_of_stream_is_sticky() {
        let stream = MemoryStream::synthetic(4, 4, 2, 30.0);
        let mut reader = StreamReader::open(Channel::Visible, StreamHandle::Memory(stream)).unwrap();

        for expected in 1..=2 {
            match reader.read().unwrap() {
                ReadOutcome::Frame(frame) => {
                    assert_eq!(frame.index, expected);
                    assert_eq!(frame.channel, Channel::Visible);
                }
                ReadOutcome::EndOfStream => panic!("stream ended early"),
            }
        }
        for _ in 0..3 {
            assert!(matches!(reader.read().unwrap(), ReadOutcome::EndOfStream));
        }
        assert_eq!(reader.frames_read(), 2);
    }

    #[test]
    fn test_close_is_idempotent() {
        let closes = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            remaining: 5,
            closes: closes.clone(),
        };
        let mut reader = StreamReader::open(Channel::Thermal, StreamHandle::Custom(Box::new(source)))
            .unwrap();
        assert!(matches!(reader.read().unwrap(), ReadOutcome::Frame(_)));

        reader.close();
        reader.close();
        assert!(reader.is_closed());
        assert!(matches!(reader.read().unwrap(), ReadOutcome::EndOfStream));
        drop(reader);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases_source() {
        let closes = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            remaining: 1,
            closes: closes.clone(),
        };
        let reader =
            StreamReader::open(Channel::Visible, StreamHandle::Custom(Box::new(source))).unwrap();
        drop(reader);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_image_directory_is_unreadable() {
        let handle = StreamHandle::ImageSequence {
            dir: "/nonexistent/rgbt/frames".into(),
            fps: 30.0,
        };
        let err = StreamReader::open(Channel::Thermal, handle).err().unwrap();
        assert!(matches!(
            err,
            PipelineError::SourceUnreadable {
                channel: Channel::Thermal,
                ..
            }
        ));
    }
}
