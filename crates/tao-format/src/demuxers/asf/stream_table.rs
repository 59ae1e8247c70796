//! 流表.
//!
//! 以固定上限的槽位数组保存每条声明流的运行时状态: 编解码器、
//! 分片重组状态、重组缓冲区和输出队列. 外部通过校验过的 [`StreamSlot`] 访问.

use tao_codec::{CodecId, Packet};
use tao_core::{MediaType, TaoError, TaoResult};

use super::interleave::InterleaveParams;
use super::reassembly::{DefragBuffer, FragmentState};
use super::sink::StreamSink;
use crate::stream::Stream;

/// 流表容量上限
pub const MAX_STREAMS: usize = 23;

/// 流表槽位索引
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSlot(usize);

impl StreamSlot {
    pub fn index(self) -> usize {
        self.0
    }
}

/// 单条流的运行时描述
#[derive(Debug)]
pub struct StreamDescriptor {
    /// 容器内流号
    pub stream_id: u8,
    /// 对外的流索引
    pub stream_index: usize,
    pub media_type: MediaType,
    pub codec_id: CodecId,
    /// 分片重组状态
    pub state: FragmentState,
    /// 重组缓冲区, 只有需要还原交织的流才有
    pub defrag: Option<DefragBuffer>,
    /// 输出队列
    pub sink: StreamSink,
}

impl StreamDescriptor {
    pub fn new(stream: &Stream, interleave: Option<InterleaveParams>, sink: StreamSink) -> Self {
        Self {
            stream_id: stream.stream_id,
            stream_index: stream.index,
            media_type: stream.media_type,
            codec_id: stream.codec_id,
            state: FragmentState::Idle,
            defrag: interleave.map(DefragBuffer::new),
            sink,
        }
    }

    /// 清空重组状态和输出队列
    pub fn reset(&mut self) {
        self.state = FragmentState::Idle;
        if let Some(buffer) = self.defrag.as_mut() {
            buffer.clear();
        }
        self.sink.clear();
    }
}

/// 流表
#[derive(Debug, Default)]
pub struct StreamTable {
    slots: Vec<StreamDescriptor>,
}

impl StreamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条流, 超过容量上限时报错
    pub fn push(&mut self, descriptor: StreamDescriptor) -> TaoResult<StreamSlot> {
        if self.slots.len() >= MAX_STREAMS {
            return Err(TaoError::InvalidData(format!(
                "流数量超过上限 {MAX_STREAMS}"
            )));
        }
        self.slots.push(descriptor);
        Ok(StreamSlot(self.slots.len() - 1))
    }

    /// 按流号查找
    pub fn find(&self, stream_id: u8) -> Option<StreamSlot> {
        self.slots
            .iter()
            .position(|d| d.stream_id == stream_id)
            .map(StreamSlot)
    }

    pub fn get(&self, slot: StreamSlot) -> &StreamDescriptor {
        &self.slots[slot.0]
    }

    pub fn get_mut(&mut self, slot: StreamSlot) -> &mut StreamDescriptor {
        &mut self.slots[slot.0]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut StreamDescriptor> {
        self.slots.iter_mut()
    }

    /// 按流表顺序取出第一个待交付的数据块
    pub fn pop_ready(&mut self) -> Option<Packet> {
        self.slots.iter_mut().find_map(|d| d.sink.pop())
    }

    /// 是否还有未交付的数据块
    pub fn has_pending(&self) -> bool {
        self.slots.iter().any(|d| !d.sink.is_empty())
    }

    /// 复位所有流的重组状态 (seek 时)
    pub fn reset_all(&mut self) {
        for descriptor in &mut self.slots {
            descriptor.reset();
        }
    }
}
