/// FFmpeg视频文件解码器
/// Video file decoder: push-based FFmpeg pipeline bridged into pull-based reads
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{Receiver, RecvError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::stream_info::{find_video_stream_info, StreamInfo as FfmpegStreamInfo};
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use image::RgbImage;

use super::decode_filter::{DecodeFilter, DecodeMessage};
use super::FrameSource;
use crate::types::StreamInfo;

/// 解码队列深度
const QUEUE_DEPTH: usize = 8;

pub struct FfmpegSource {
    info: StreamInfo,
    rx: Option<Receiver<DecodeMessage>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self> {
        let url = path.to_string_lossy().to_string();
        let info = probe(&url)?;

        let (tx, rx) = crossbeam_channel::bounded::<DecodeMessage>(QUEUE_DEPTH);
        let stop = Arc::new(AtomicBool::new(false));
        let filter = DecodeFilter::new(tx.clone(), stop.clone());

        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let pipe = pipe.filter("decode", Box::new(filter));
        let out = create_null_output().add_frame_pipeline(pipe);

        // 构建FFmpeg上下文 (统一输出 rgb24)
        let ctx = FfmpegContext::builder()
            .input(Input::new(url.as_str()))
            .filter_desc("format=rgb24")
            .output(out)
            .build()
            .map_err(|e| anyhow!("构建失败: {}", e))?;

        let sch = ctx.start().map_err(|e| anyhow!("启动失败: {}", e))?;

        let worker = std::thread::Builder::new()
            .name(format!("decode-{}", path.display()))
            .spawn(move || {
                if let Err(e) = sch.wait() {
                    let _ = tx.send(Err(format!("解码中断: {}", e)));
                }
                // tx 在此释放, 读取端收到断开即流结束
            })
            .context("无法启动解码线程")?;

        Ok(Self {
            info,
            rx: Some(rx),
            stop,
            worker: Some(worker),
        })
    }
}

/// 查询视频流尺寸和帧率
fn probe(url: &str) -> Result<StreamInfo> {
    let stream = find_video_stream_info(url)
        .map_err(|e| anyhow!("无法探测视频流 {}: {}", url, e))?
        .ok_or_else(|| anyhow!("{} 中没有视频流", url))?;

    match stream {
        FfmpegStreamInfo::Video {
            width, height, fps, ..
        } => Ok(StreamInfo {
            width: width as u32,
            height: height as u32,
            fps,
        }),
        _ => Err(anyhow!("{} 不是视频流", url)),
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(rx) = self.rx.as_ref() else {
            return Ok(None);
        };
        match rx.recv() {
            Ok(Ok(image)) => Ok(Some(image)),
            Ok(Err(e)) => Err(anyhow!(e)),
            Err(RecvError) => Ok(None),
        }
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // 先释放接收端, 解除解码线程的阻塞发送
        self.rx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("❌ 解码线程异常退出");
            }
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.close();
    }
}
