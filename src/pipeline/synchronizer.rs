//! 帧同步器 (Stream Synchronizer)
//! 严格步调一致: 每个tick从每个读取器各取一帧, 任一通道结束即整个tick失败

use crate::error::{PipelineError, PipelineResult};
use crate::input::{ReadOutcome, StreamReader};
use crate::types::{Channel, ChannelMap, Frame, StreamInfo};

/// 一个tick的对齐帧集合
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSet {
    pub index: u64,
    pub frames: ChannelMap<Frame>,
}

pub struct Synchronizer {
    readers: ChannelMap<StreamReader>,
    next_index: u64,
}

impl Synchronizer {
    pub fn new(readers: ChannelMap<StreamReader>) -> Self {
        Self {
            readers,
            next_index: 1,
        }
    }

    /// 拉取下一组对齐帧
    ///
    /// 所有读取器都会被读取一次; 任一通道结束时返回 `StreamExhausted`
    /// (按通道顺序报告第一个结束的通道), 较长流多读出的帧被丢弃
    pub fn tick(&mut self) -> PipelineResult<FrameSet> {
        let index = self.next_index;
        let mut frames = ChannelMap::new();
        let mut exhausted = None;

        for (channel, reader) in self.readers.iter_mut() {
            match reader.read()? {
                ReadOutcome::Frame(mut frame) => {
                    frame.index = index;
                    frames.insert(channel, frame);
                }
                ReadOutcome::EndOfStream => {
                    exhausted.get_or_insert(channel);
                }
            }
        }

        if let Some(channel) = exhausted {
            return Err(PipelineError::StreamExhausted { channel });
        }

        self.next_index += 1;
        Ok(FrameSet { index, frames })
    }

    /// 下一个tick的序号 (tick失败时即为失败的序号)
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.readers.channels()
    }

    pub fn infos(&self) -> ChannelMap<StreamInfo> {
        self.readers
            .iter()
            .map(|(channel, reader)| (channel, reader.info()))
            .collect()
    }

    /// 关闭全部读取器 (幂等)
    pub fn close(&mut self) {
        for (_, reader) in self.readers.iter_mut() {
            reader.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.readers.iter().all(|(_, reader)| reader.is_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{MemoryStream, StreamHandle};

    fn reader(channel: Channel, frames: usize) -> StreamReader {
        let stream = MemoryStream::synthetic(8, 6, frames, 30.0);
        StreamReader::open(channel, StreamHandle::Memory(stream)).unwrap()
    }

    #[test]
    fn test_lockstep_stops_at_shorter_stream() {
        let readers: ChannelMap<_> = [
            (Channel::Visible, reader(Channel::Visible, 5)),
            (Channel::Thermal, reader(Channel::Thermal, 3)),
        ]
        .into_iter()
        .collect();
        let mut sync = Synchronizer::new(readers);

        for expected in 1..=3 {
            let set = sync.tick().unwrap();
            assert_eq!(set.index, expected);
            assert_eq!(set.frames.channels(), vec![Channel::Visible, Channel::Thermal]);
            for (_, frame) in set.frames.iter() {
                assert_eq!(frame.index, expected);
            }
        }

        let err = sync.tick().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::StreamExhausted {
                channel: Channel::Thermal
            }
        ));
        assert_eq!(sync.next_index(), 4);

        // 结束状态保持, 不会产生第4帧
        assert!(sync.tick().is_err());
        assert_eq!(sync.next_index(), 4);
    }

    #[test]
    fn test_single_channel() {
        let readers: ChannelMap<_> = [(Channel::Thermal, reader(Channel::Thermal, 2))]
            .into_iter()
            .collect();
        let mut sync = Synchronizer::new(readers);
        assert_eq!(sync.tick().unwrap().index, 1);
        assert_eq!(sync.tick().unwrap().index, 2);
        assert!(sync.tick().unwrap_err().is_graceful());
    }

    #[test]
    fn test_first_exhausted_channel_reported() {
        let readers: ChannelMap<_> = [
            (Channel::Visible, reader(Channel::Visible, 1)),
            (Channel::Thermal, reader(Channel::Thermal, 1)),
        ]
        .into_iter()
        .collect();
        let mut sync = Synchronizer::new(readers);
        sync.tick().unwrap();
        assert!(matches!(
            sync.tick().unwrap_err(),
            PipelineError::StreamExhausted {
                channel: Channel::Visible
            }
        ));
        sync.close();
        sync.close();
        assert!(sync.is_closed());
    }
}
