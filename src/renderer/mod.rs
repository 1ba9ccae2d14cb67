/// 渲染模块: 检测框叠加 + 多通道合成
/// Renderer: overlay drawing and side-by-side layout
pub mod glyph;
pub mod layout;
pub mod overlay;

use serde::{Deserialize, Serialize};

pub use layout::{compose, output_dimensions};
pub use overlay::{LabelFont, OverlayRenderer};

/// 叠加样式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// 检测框颜色 (RGB)
    pub box_color: [u8; 3],
    /// 标签文字颜色 (RGB)
    pub text_color: [u8; 3],
    /// 线宽 (像素)
    pub thickness: u32,
    /// TrueType 字号 (像素)
    pub font_size: f32,
    /// 点阵字体放大倍数
    pub bitmap_scale: u32,
    /// 标签与检测框上沿的间距
    pub label_gap: u32,
    /// 低于该置信度的检测不绘制
    pub min_confidence: f32,
    /// 可选 TrueType 字体路径, 为空时使用内置点阵字体
    pub font_path: Option<String>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            box_color: [0, 255, 0],
            text_color: [0, 255, 0],
            thickness: 3,
            font_size: 22.0,
            bitmap_scale: 2,
            label_gap: 6,
            min_confidence: 0.0,
            font_path: None,
        }
    }
}
