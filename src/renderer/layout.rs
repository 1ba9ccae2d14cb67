//! 布局合成器 (Layout Compositor)
//! 单通道模式: 原样输出; 双光模式: 可见光在左, 热成像在右, 水平拼接

use image::{imageops, RgbImage};

use crate::error::{PipelineError, PipelineResult};
use crate::types::{AnnotatedFrame, Channel, ChannelMap, ComposedFrame, Mode, StreamInfo};

/// 合成一个tick的输出帧
pub fn compose(mode: Mode, frames: ChannelMap<AnnotatedFrame>) -> PipelineResult<ComposedFrame> {
    check_channels(mode, frames.channels())?;

    match mode {
        Mode::VisibleOnly | Mode::ThermalOnly => {
            let channel = mode.channels()[0];
            let (_, frame) = frames
                .into_iter()
                .find(|(c, _)| *c == channel)
                .ok_or_else(|| invalid(mode, Vec::new()))?;
            Ok(ComposedFrame {
                index: frame.index,
                image: frame.image,
            })
        }
        Mode::Combined => {
            let (Some(visible), Some(thermal)) =
                (frames.get(Channel::Visible), frames.get(Channel::Thermal))
            else {
                return Err(invalid(mode, frames.channels()));
            };
            if visible.height() != thermal.height() {
                return Err(PipelineError::DimensionMismatch {
                    expected: (thermal.width(), visible.height()),
                    actual: thermal.dimensions(),
                });
            }

            let mut canvas = RgbImage::new(visible.width() + thermal.width(), visible.height());
            imageops::replace(&mut canvas, &visible.image, 0, 0);
            imageops::replace(&mut canvas, &thermal.image, visible.width() as i64, 0);
            Ok(ComposedFrame {
                index: visible.index,
                image: canvas,
            })
        }
    }
}

/// 按各通道属性计算输出尺寸 (没有帧可合成时用于打开输出)
pub fn output_dimensions(mode: Mode, infos: &ChannelMap<StreamInfo>) -> PipelineResult<(u32, u32)> {
    check_channels(mode, infos.channels())?;

    let mut width = 0;
    let mut height = None;
    for &channel in mode.channels() {
        let Some(info) = infos.get(channel) else {
            return Err(invalid(mode, infos.channels()));
        };
        match height {
            Some(h) if h != info.height => {
                return Err(PipelineError::DimensionMismatch {
                    expected: (info.width, h),
                    actual: (info.width, info.height),
                });
            }
            _ => height = Some(info.height),
        }
        width += info.width;
    }
    Ok((width, height.unwrap_or(0)))
}

fn check_channels(mode: Mode, actual: Vec<Channel>) -> PipelineResult<()> {
    if actual.as_slice() != mode.channels() {
        return Err(invalid(mode, actual));
    }
    Ok(())
}

fn invalid(mode: Mode, actual: Vec<Channel>) -> PipelineError {
    PipelineError::InvalidChannelSet {
        mode,
        expected: mode.channels().to_vec(),
        actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::Frame;
    use image::{GenericImageView, Rgb};

    fn frame(channel: Channel, width: u32, height: u32, value: u8) -> Frame {
        Frame::new(
            channel,
            3,
            RgbImage::from_pixel(width, height, Rgb([value, value, value])),
        )
    }

    #[test]
    fn test_single_channel_is_identity() {
        let thermal = frame(Channel::Thermal, 32, 24, 90);
        let frames: ChannelMap<_> = [(Channel::Thermal, thermal.clone())].into_iter().collect();
        let composed = compose(Mode::ThermalOnly, frames).unwrap();
        assert_eq!(composed.index, 3);
        assert_eq!(composed.image, thermal.image);
    }

    #[test]
    fn test_combined_halves_match_inputs() {
        let visible = frame(Channel::Visible, 32, 24, 10);
        let thermal = frame(Channel::Thermal, 32, 24, 200);
        let frames: ChannelMap<_> = [
            (Channel::Visible, visible.clone()),
            (Channel::Thermal, thermal.clone()),
        ]
        .into_iter()
        .collect();

        let composed = compose(Mode::Combined, frames).unwrap();
        assert_eq!(composed.dimensions(), (64, 24));
        let left = composed.image.view(0, 0, 32, 24).to_image();
        let right = composed.image.view(32, 0, 32, 24).to_image();
        assert_eq!(left, visible.image);
        assert_eq!(right, thermal.image);
    }

    #[test]
    fn test_combined_height_mismatch() {
        let frames: ChannelMap<_> = [
            (Channel::Visible, frame(Channel::Visible, 32, 24, 0)),
            (Channel::Thermal, frame(Channel::Thermal, 32, 20, 0)),
        ]
        .into_iter()
        .collect();
        let err = compose(Mode::Combined, frames).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
    }

    #[test]
    fn test_channel_set_must_match_mode() {
        let frames: ChannelMap<_> = [(Channel::Visible, frame(Channel::Visible, 8, 8, 0))]
            .into_iter()
            .collect();
        let err = compose(Mode::Combined, frames.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidChannelSet);
        let err = compose(Mode::ThermalOnly, frames).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidChannelSet);
    }

    #[test]
    fn test_output_dimensions() {
        let info = |width, height| StreamInfo {
            width,
            height,
            fps: 30.0,
        };
        let infos: ChannelMap<_> = [
            (Channel::Visible, info(320, 240)),
            (Channel::Thermal, info(160, 240)),
        ]
        .into_iter()
        .collect();
        assert_eq!(output_dimensions(Mode::Combined, &infos).unwrap(), (480, 240));

        let single: ChannelMap<_> = [(Channel::Visible, info(640, 480))].into_iter().collect();
        assert_eq!(
            output_dimensions(Mode::VisibleOnly, &single).unwrap(),
            (640, 480)
        );
    }
}
