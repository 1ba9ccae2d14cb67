/// FFmpeg视频编码输出
/// Raw RGB24 frames → FFmpeg read callback → encoded video file
use std::fs;
use std::path::Path;
use std::thread::JoinHandle;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use ez_ffmpeg::{FfmpegContext, Input, Output};
use image::RgbImage;

use super::FrameSink;

/// 编码队列深度
const QUEUE_DEPTH: usize = 8;

/// AVERROR_EOF
const AVERROR_EOF: i32 = -541478725;

/// 编码参数 (第一帧到达时才启动FFmpeg)
struct EncodeSettings {
    url: String,
    codec: String,
    width: u32,
    height: u32,
    fps: f64,
}

pub struct FfmpegSink {
    settings: EncodeSettings,
    tx: Option<Sender<Vec<u8>>>,
    worker: Option<JoinHandle<Result<(), String>>>,
    frames: u64,
}

impl FfmpegSink {
    pub fn open(path: &Path, codec: &str, width: u32, height: u32, fps: f64) -> Result<Self> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::env::current_dir()?,
        };
        let meta = fs::metadata(&parent)
            .with_context(|| format!("输出目录不存在 {}", parent.display()))?;
        if !meta.is_dir() || meta.permissions().readonly() {
            bail!("输出目录不可写 {}", parent.display());
        }

        Ok(Self {
            settings: EncodeSettings {
                url: path.to_string_lossy().to_string(),
                codec: codec.to_string(),
                width,
                height,
                fps,
            },
            tx: None,
            worker: None,
            frames: 0,
        })
    }

    /// 启动编码线程
    ///
    /// 构建会阻塞到读取第一帧, 所以放在编码线程中进行
    fn start(&mut self) -> Result<()> {
        let (tx, rx) = crossbeam_channel::bounded::<Vec<u8>>(QUEUE_DEPTH);
        let settings = &self.settings;
        let (url, codec) = (settings.url.clone(), settings.codec.clone());
        let (width, height, fps) = (settings.width, settings.height, settings.fps);

        let worker = std::thread::Builder::new()
            .name(format!("encode-{}", url))
            .spawn(move || encode(rx, url, codec, width, height, fps))
            .context("无法启动编码线程")?;

        self.tx = Some(tx);
        self.worker = Some(worker);
        Ok(())
    }

    fn join(&mut self) -> Result<()> {
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| anyhow!("编码线程异常退出"))?
                .map_err(|e| anyhow!(e)),
            None => Ok(()),
        }
    }
}

fn encode(
    rx: Receiver<Vec<u8>>,
    url: String,
    codec: String,
    width: u32,
    height: u32,
    fps: f64,
) -> Result<(), String> {
    let mut pending: Vec<u8> = Vec::new();
    let mut offset = 0usize;

    let input = Input::new_by_read_callback(move |buf: &mut [u8]| -> i32 {
        while offset >= pending.len() {
            match rx.recv() {
                Ok(data) => {
                    pending = data;
                    offset = 0;
                }
                Err(_) => return AVERROR_EOF,
            }
        }
        let n = buf.len().min(pending.len() - offset);
        buf[..n].copy_from_slice(&pending[offset..offset + n]);
        offset += n;
        n as i32
    })
    .set_format("rawvideo")
    .set_input_opt("pixel_format", "rgb24")
    .set_input_opt("video_size", format!("{}x{}", width, height))
    .set_input_opt("framerate", format!("{}", fps));

    let output = Output::from(url.as_str()).set_video_codec(codec.as_str());

    FfmpegContext::builder()
        .input(input)
        .output(output)
        .build()
        .map_err(|e| format!("构建失败: {}", e))?
        .start()
        .map_err(|e| format!("启动失败: {}", e))?
        .wait()
        .map_err(|e| format!("编码失败: {}", e))
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        if self.frames == 0 && self.worker.is_none() {
            self.start()?;
        }
        let Some(tx) = self.tx.as_ref() else {
            bail!("编码器已关闭");
        };
        if tx.send(image.as_raw().clone()).is_err() {
            // 编码线程已退出, 取回其错误
            self.tx.take();
            self.join()?;
            bail!("编码线程已退出");
        }
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.frames == 0 && self.worker.is_none() {
            // rawvideo 输入没有任何数据时FFmpeg无法建立输出流
            tracing::warn!("⚠️ 没有写入任何帧, 未生成视频文件 {}", self.settings.url);
            return Ok(());
        }
        // 关闭发送端 → 读回调返回 EOF → 编码器写入尾部
        self.tx.take();
        self.join()
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        self.tx.take();
        if let Err(e) = self.join() {
            tracing::error!("❌ {:#}", e);
        }
    }
}
