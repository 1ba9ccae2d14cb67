/// 内存帧序列
/// In-memory frame source
use std::collections::VecDeque;

use image::{Rgb, RgbImage};

use super::FrameSource;
use crate::types::StreamInfo;

/// 内存视频流: 固定尺寸 + 帧率 + 帧列表
#[derive(Clone, Debug)]
pub struct MemoryStream {
    info: StreamInfo,
    frames: Vec<RgbImage>,
}

impl MemoryStream {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            info: StreamInfo { width, height, fps },
            frames: Vec::new(),
        }
    }

    pub fn push(&mut self, frame: RgbImage) {
        self.frames.push(frame);
    }

    pub fn with_frames(mut self, frames: impl IntoIterator<Item = RgbImage>) -> Self {
        self.frames.extend(frames);
        self
    }

    /// 生成测试用序列: 第i帧 (从0开始) 的像素值由序号决定, 便于逐帧区分
    pub fn synthetic(width: u32, height: u32, count: usize, fps: f64) -> Self {
        let frames = (0..count).map(|i| {
            let v = (i % 256) as u8;
            RgbImage::from_pixel(width, height, Rgb([v, v / 2, 255 - v]))
        });
        Self::new(width, height, fps).with_frames(frames)
    }

    pub fn info(&self) -> StreamInfo {
        self.info
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// 内存帧源
pub struct MemorySource {
    info: StreamInfo,
    frames: VecDeque<RgbImage>,
}

impl MemorySource {
    pub fn new(stream: MemoryStream) -> Self {
        Self {
            info: stream.info,
            frames: stream.frames.into(),
        }
    }
}

impl FrameSource for MemorySource {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }

    fn close(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_frames_are_distinct() {
        let stream = MemoryStream::synthetic(4, 3, 3, 25.0);
        assert_eq!(stream.len(), 3);
        let mut source = MemorySource::new(stream);
        let a = source.next_frame().unwrap().unwrap();
        let b = source.next_frame().unwrap().unwrap();
        assert_eq!(a.dimensions(), (4, 3));
        assert_ne!(a, b);
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }
}
