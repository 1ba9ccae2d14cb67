/// 内存录制输出
/// In-memory recording sink, shared between the muxer and the caller
use std::sync::{Arc, Mutex, MutexGuard};

use image::RgbImage;

use super::FrameSink;

#[derive(Debug, Default)]
struct RecordingState {
    frames: Vec<RgbImage>,
    finish_calls: usize,
}

/// 克隆共享同一份录制内容
#[derive(Clone, Debug, Default)]
pub struct MemoryRecording {
    state: Arc<Mutex<RecordingState>>,
}

impl MemoryRecording {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn frames(&self) -> Vec<RgbImage> {
        self.state().frames.clone()
    }

    pub fn frame(&self, position: usize) -> Option<RgbImage> {
        self.state().frames.get(position).cloned()
    }

    pub fn len(&self) -> usize {
        self.state().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_finalized(&self) -> bool {
        self.state().finish_calls > 0
    }

    /// 收尾次数 (正确使用时为 0 或 1)
    pub fn finish_count(&self) -> usize {
        self.state().finish_calls
    }

    pub(crate) fn sink(&self) -> MemorySink {
        MemorySink {
            recording: self.clone(),
        }
    }
}

pub(crate) struct MemorySink {
    recording: MemoryRecording,
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, image: &RgbImage) -> anyhow::Result<()> {
        let mut state = self.recording.state();
        if state.finish_calls > 0 {
            anyhow::bail!("录制已结束");
        }
        state.frames.push(image.clone());
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        self.recording.state().finish_calls += 1;
        Ok(())
    }
}
