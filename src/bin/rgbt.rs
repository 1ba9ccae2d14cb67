/// 双光检测合成 (RGB-T Sentinel)
///
/// 可见光 / 热成像视频 → 逐帧检测叠加 → 合成输出视频
///
/// 检测模型不在本程序中加载: 通过 `--*-detections` 回放预先计算的检测结果,
/// 或用 `--demo` 注入固定演示框
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rgbt_sentinel::{
    gen_time_string, run_pipeline, Channel, DetectionAdapter, Detector, FixedDetector, Mode,
    OutputTarget, PipelineConfig, ReplayDetector, RunRequest, StreamHandle, Termination,
};

/// 双光检测合成参数
#[derive(Parser, Debug)]
#[command(author, version, about = "双光检测合成 - RGB-T detection overlay", long_about = None)]
struct Args {
    /// 运行模式: visible / thermal / combined (也接受 "RGB Only" 等名称)
    #[arg(short, long, default_value = "combined")]
    mode: Mode,

    /// 可见光输入 (视频文件或图片目录)
    #[arg(long)]
    visible: Option<PathBuf>,

    /// 热成像输入 (视频文件或图片目录)
    #[arg(long)]
    thermal: Option<PathBuf>,

    /// 图片目录输入的帧率
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// 输出路径 (默认: <output-dir>/rgbt_<时间>.mp4)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 以PNG序列目录输出
    #[arg(long, default_value_t = false)]
    image_sequence: bool,

    /// 默认输出目录 (覆盖配置文件)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// 视频编码器 (覆盖配置文件)
    #[arg(long)]
    codec: Option<String>,

    /// 配置文件
    #[arg(short, long, default_value = "rgbt_config.json")]
    config: PathBuf,

    /// 可见光检测结果 (JSON回放)
    #[arg(long)]
    visible_detections: Option<PathBuf>,

    /// 热成像检测结果 (JSON回放)
    #[arg(long)]
    thermal_detections: Option<PathBuf>,

    /// 双光融合检测结果 (JSON回放, 仅 combined 模式)
    #[arg(long)]
    fused_detections: Option<PathBuf>,

    /// 未提供检测结果的通道使用固定演示框
    #[arg(long, default_value_t = false)]
    demo: bool,

    /// 最低显示置信度
    #[arg(long)]
    min_conf: Option<f32>,

    /// 标签字体 (TrueType)
    #[arg(long)]
    font: Option<String>,

    /// 同一帧内各通道并行检测
    #[arg(long, default_value_t = false)]
    parallel: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // ========== 配置 ==========
    let mut config = PipelineConfig::load(&args.config);
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(codec) = &args.codec {
        config.codec = codec.clone();
    }
    if let Some(min_conf) = args.min_conf {
        config.overlay.min_confidence = min_conf;
    }
    if let Some(font) = &args.font {
        config.overlay.font_path = Some(font.clone());
    }
    if args.parallel {
        config.parallel_detection = true;
    }
    config.print_summary();

    tracing::info!("🚀 双光检测合成启动: {}", args.mode);

    // ========== 输入 / 检测 / 输出 ==========
    let adapter = build_adapter(&args)?;
    let mut request = RunRequest::new(args.mode, build_target(&args, &config));
    if let Some(path) = &args.visible {
        request = request.with_visible(stream_handle(path, args.fps));
    }
    if let Some(path) = &args.thermal {
        request = request.with_thermal(stream_handle(path, args.fps));
    }

    // ========== 运行 ==========
    match run_pipeline(request, &adapter, &config) {
        Ok(report) => {
            let ended = match report.termination {
                Termination::Exhausted { channel, index } => {
                    format!("{}通道在第{}帧结束", channel.label(), index)
                }
                Termination::Abandoned { index } => format!("在第{}帧前停止", index),
            };
            tracing::info!(
                "✅ 输出完成: {} ({}x{} @ {:.2}fps, {} 帧, {})",
                report.output.description,
                report.output.width,
                report.output.height,
                report.output.fps,
                report.frames_written,
                ended
            );
            Ok(())
        }
        Err(failure) => {
            if let Some(output) = &failure.output {
                tracing::warn!(
                    "⚠️ 已写出的 {} 帧保存在 {}",
                    output.frames,
                    output.description
                );
            }
            if let Some(e) = &failure.finalize_error {
                tracing::error!("❌ 收尾失败: {}", e);
            }
            match failure.sequence_index {
                Some(index) => bail!("第{}帧处理失败: {}", index, failure.error),
                None => bail!("启动失败: {}", failure.error),
            }
        }
    }
}

fn stream_handle(path: &Path, fps: f64) -> StreamHandle {
    if path.is_dir() {
        StreamHandle::ImageSequence {
            dir: path.to_path_buf(),
            fps,
        }
    } else {
        StreamHandle::Video(path.to_path_buf())
    }
}

fn build_adapter(args: &Args) -> Result<DetectionAdapter> {
    if let Some(path) = &args.fused_detections {
        if args.mode != Mode::Combined {
            bail!("融合检测结果只能用于 combined 模式");
        }
        let fused = ReplayDetector::load(path)?;
        return Ok(DetectionAdapter::unified(Arc::new(fused)));
    }

    let mut adapter = DetectionAdapter::per_channel();
    for &channel in args.mode.channels() {
        let replay = match channel {
            Channel::Visible => &args.visible_detections,
            Channel::Thermal => &args.thermal_detections,
        };
        let detector: Arc<dyn Detector> = match replay {
            Some(path) => Arc::new(
                ReplayDetector::load(path)
                    .with_context(|| format!("{}检测结果加载失败", channel.label()))?,
            ),
            None if args.demo => {
                tracing::info!("🎯 {}通道使用演示检测框", channel.label());
                Arc::new(FixedDetector::demo())
            }
            None => continue,
        };
        adapter = adapter.with_detector(channel, detector);
    }
    Ok(adapter)
}

fn build_target(args: &Args, config: &PipelineConfig) -> OutputTarget {
    match (&args.output, args.image_sequence) {
        (Some(path), true) => OutputTarget::ImageSequence(path.clone()),
        (Some(path), false) => OutputTarget::Video {
            path: path.clone(),
            codec: config.codec.clone(),
        },
        (None, true) => {
            OutputTarget::ImageSequence(config.output_dir.join(format!("rgbt_{}", gen_time_string(""))))
        }
        (None, false) if cfg!(feature = "ffmpeg") => config.default_target(),
        (None, false) => {
            let dir = config.output_dir.join(format!("rgbt_{}", gen_time_string("")));
            tracing::warn!(
                "⚠️ 未启用 ffmpeg 功能, 改为输出PNG序列: {}",
                dir.display()
            );
            OutputTarget::ImageSequence(dir)
        }
    }
}
