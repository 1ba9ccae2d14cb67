/// FFmpeg解码过滤器模块
/// FFmpeg decode filter module: decoded RGB24 frames → bounded channel
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;

/// 解码消息 (解码线程 → 读取器)
pub type DecodeMessage = Result<RgbImage, String>;

/// FFmpeg解码过滤器: 视频文件 → RGB帧 (有界队列反压, 读取器按需拉取)
#[derive(Clone)]
pub struct DecodeFilter {
    tx: Sender<DecodeMessage>,
    stop: Arc<AtomicBool>,
    pub count: usize,
    pub dropped_frames: usize,
    pub last: Instant,
}

impl DecodeFilter {
    pub fn new(tx: Sender<DecodeMessage>, stop: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            stop,
            count: 0,
            dropped_frames: 0,
            last: Instant::now(),
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        tracing::debug!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        // 读取器已关闭则停止解码
        if self.stop.load(Ordering::Relaxed) {
            return Err("Reader closed".to_string());
        }

        unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                tracing::warn!("⚠️ 丢弃帧 #{}: 空帧/损坏帧", self.count + 1);
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            let plane = (*frame.as_ptr()).data[0];
            let stride = (*frame.as_ptr()).linesize[0] as usize;
            let row_bytes = w as usize * 3;

            if w == 0 || h == 0 || plane.is_null() || stride < row_bytes {
                self.dropped_frames += 1;
                tracing::warn!(
                    "⚠️ 丢弃帧 #{}: 非法帧 {}x{} stride={}",
                    self.count + 1,
                    w,
                    h,
                    stride
                );
                return Ok(None);
            }

            // RGB24 按行拷贝 (去掉行对齐填充)
            let mut buffer = Vec::with_capacity(row_bytes * h as usize);
            for row in 0..h as usize {
                let src = std::slice::from_raw_parts(plane.add(row * stride), row_bytes);
                buffer.extend_from_slice(src);
            }

            let Some(image) = RgbImage::from_raw(w, h, buffer) else {
                return Err("RGB图像转换失败".to_string());
            };

            self.count += 1;
            if self.last.elapsed().as_secs_f64() >= 1.0 {
                tracing::debug!(
                    "📺 解码统计: 已解码{}帧 | 丢弃{}",
                    self.count,
                    self.dropped_frames
                );
                self.last = Instant::now();
            }

            // 阻塞发送: 读取器不拉取时解码暂停
            if self.tx.send(Ok(image)).is_err() {
                return Err("Reader closed".to_string());
            }
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        tracing::debug!("✅ 解码线程退出 (共{}帧)", self.count);
    }
}
