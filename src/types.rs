/// 双光流水线数据结构定义
/// Core data model of the dual-spectrum pipeline
use std::fmt;
use std::str::FromStr;

use image::RgbImage;
use serde::{Deserialize, Serialize};

// ========== 枚举类型 ==========

/// 运行模式 (整个运行期间固定)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    VisibleOnly,
    ThermalOnly,
    Combined,
}

impl Mode {
    /// 该模式需要的通道 (固定顺序: 可见光在前)
    pub fn channels(&self) -> &'static [Channel] {
        match self {
            Mode::VisibleOnly => &[Channel::Visible],
            Mode::ThermalOnly => &[Channel::Thermal],
            Mode::Combined => &[Channel::Visible, Channel::Thermal],
        }
    }

    pub fn requires(&self, channel: Channel) -> bool {
        self.channels().contains(&channel)
    }

    pub fn name(&self) -> &str {
        match self {
            Mode::VisibleOnly => "RGB Only",
            Mode::ThermalOnly => "Thermal Only",
            Mode::Combined => "Combined RGB-T",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "visible" | "visible only" | "visibleonly" | "rgb" | "rgb only" => {
                Ok(Mode::VisibleOnly)
            }
            "thermal" | "thermal only" | "thermalonly" | "ir" | "ir only" => Ok(Mode::ThermalOnly),
            "combined" | "rgbt" | "rgb t" | "combined rgb t" | "dual" => Ok(Mode::Combined),
            _ => Err(format!(
                "未知模式 '{}' (可选: visible / thermal / combined)",
                s
            )),
        }
    }
}

/// 传感通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Visible,
    Thermal,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Visible, Channel::Thermal];

    pub fn label(&self) -> &str {
        match self {
            Channel::Visible => "可见光",
            Channel::Thermal => "热成像",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Visible => f.write_str("visible"),
            Channel::Thermal => f.write_str("thermal"),
        }
    }
}

// ========== 数据结构 ==========

/// 按通道索引的小型映射 (最多两个通道)
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMap<T> {
    visible: Option<T>,
    thermal: Option<T>,
}

impl<T> Default for ChannelMap<T> {
    fn default() -> Self {
        Self {
            visible: None,
            thermal: None,
        }
    }
}

impl<T> ChannelMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入并返回被替换的旧值
    pub fn insert(&mut self, channel: Channel, value: T) -> Option<T> {
        self.slot_mut(channel).replace(value)
    }

    pub fn get(&self, channel: Channel) -> Option<&T> {
        match channel {
            Channel::Visible => self.visible.as_ref(),
            Channel::Thermal => self.thermal.as_ref(),
        }
    }

    pub fn get_mut(&mut self, channel: Channel) -> Option<&mut T> {
        self.slot_mut(channel).as_mut()
    }

    pub fn remove(&mut self, channel: Channel) -> Option<T> {
        self.slot_mut(channel).take()
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.get(channel).is_some()
    }

    /// 已填充的通道 (固定顺序)
    pub fn channels(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| self.contains(*c))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.channels().len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_none() && self.thermal.is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &T)> {
        Channel::ALL
            .into_iter()
            .filter_map(move |c| self.get(c).map(|v| (c, v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Channel, &mut T)> {
        let visible = self.visible.as_mut().map(|v| (Channel::Visible, v));
        let thermal = self.thermal.as_mut().map(|v| (Channel::Thermal, v));
        visible.into_iter().chain(thermal)
    }

    fn slot_mut(&mut self, channel: Channel) -> &mut Option<T> {
        match channel {
            Channel::Visible => &mut self.visible,
            Channel::Thermal => &mut self.thermal,
        }
    }
}

impl<T> IntoIterator for ChannelMap<T> {
    type Item = (Channel, T);
    type IntoIter = std::vec::IntoIter<(Channel, T)>;

    fn into_iter(self) -> Self::IntoIter {
        let visible = self.visible.map(|v| (Channel::Visible, v));
        let thermal = self.thermal.map(|v| (Channel::Thermal, v));
        visible.into_iter().chain(thermal).collect::<Vec<_>>().into_iter()
    }
}

impl<T> FromIterator<(Channel, T)> for ChannelMap<T> {
    fn from_iter<I: IntoIterator<Item = (Channel, T)>>(iter: I) -> Self {
        let mut map = ChannelMap::new();
        for (channel, value) in iter {
            map.insert(channel, value);
        }
        map
    }
}

/// 视频帧 (RGB8), 带通道标签和同步序号
///
/// 同一tick内各通道帧共享序号, 配对纯粹按位置进行
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub channel: Channel,
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(channel: Channel, index: u64, image: RgbImage) -> Self {
        Self {
            channel,
            index,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// 叠加检测结果后的帧
pub type AnnotatedFrame = Frame;

/// 合成输出帧 (单通道模式下尺寸不变, 双光模式下宽度翻倍)
#[derive(Clone, Debug, PartialEq)]
pub struct ComposedFrame {
    pub index: u64,
    pub image: RgbImage,
}

impl ComposedFrame {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// 视频流属性 (打开时查询一次, 之后不可变)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}
