//! 流水线配置 - 通过JSON文件调整参数

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::output::{default_output_path, OutputTarget, DEFAULT_CODEC};
use crate::renderer::OverlayStyle;

/// 流水线参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // === 叠加样式 ===
    pub overlay: OverlayStyle,

    // === 输出参数 ===
    pub output_dir: PathBuf, // 未指定输出路径时的目录
    pub codec: String,       // 视频编码器

    // === 运行参数 ===
    pub parallel_detection: bool, // 同一tick内各通道并行检测
    pub log_every: u64,           // 每N个tick打印一次进度 (0 = 关闭)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            overlay: OverlayStyle::default(),

            output_dir: std::env::temp_dir(),
            codec: DEFAULT_CODEC.to_string(),

            parallel_detection: false,
            log_every: 30,
        }
    }
}

impl PipelineConfig {
    /// 从JSON文件加载配置
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    tracing::info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    tracing::error!("❌ 保存配置失败: {}", e);
                } else {
                    tracing::info!("💾 配置已保存到 {}", path.display());
                }
            }
            Err(e) => tracing::error!("❌ 序列化配置失败: {}", e),
        }
    }

    /// 未指定输出路径时的视频目标: `<output_dir>/rgbt_<时间>.mp4`
    pub fn default_target(&self) -> OutputTarget {
        OutputTarget::Video {
            path: default_output_path(&self.output_dir),
            codec: self.codec.clone(),
        }
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        let style = &self.overlay;
        tracing::info!("🎛️  当前流水线配置:");
        tracing::info!(
            "  检测框: RGB{:?} 线宽 {}px",
            style.box_color,
            style.thickness
        );
        tracing::info!(
            "  标签字体: {}",
            style.font_path.as_deref().unwrap_or("内置点阵")
        );
        tracing::info!("  最低显示置信度: {:.2}", style.min_confidence);
        tracing::info!("  输出目录: {}", self.output_dir.display());
        tracing::info!("  编码器: {}", self.codec);
        tracing::info!("  并行检测: {}", self.parallel_detection);
        tracing::info!("  进度日志间隔: {} tick", self.log_every);
    }
}
