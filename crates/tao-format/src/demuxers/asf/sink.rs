//! 每条流的输出队列.
//!
//! 重组器把数据块推入队列, 会话在拉取时按顺序取出. 最大块大小是
//! 硬性约束: 超过上限的数据块会被拒绝 (流头部除外).

use std::collections::VecDeque;

use tao_codec::Packet;
use tao_core::{TaoError, TaoResult};

/// 流输出队列
#[derive(Debug)]
pub struct StreamSink {
    queue: VecDeque<Packet>,
    max_chunk_size: usize,
}

impl StreamSink {
    pub fn new(max_chunk_size: usize, capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            max_chunk_size: max_chunk_size.max(1),
        }
    }

    /// 单个数据块的最大字节数
    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// 推入一个数据块
    pub fn put(&mut self, packet: Packet) -> TaoResult<()> {
        if !packet.is_header() && packet.size() > self.max_chunk_size {
            return Err(TaoError::InvalidArgument(format!(
                "数据块大小 {} 超过上限 {}",
                packet.size(),
                self.max_chunk_size
            )));
        }
        self.queue.push_back(packet);
        Ok(())
    }

    /// 取出最早的数据块
    pub fn pop(&mut self) -> Option<Packet> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// 丢弃所有未取走的数据块
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tao_codec::PacketFlags;

    #[test]
    fn test_先进先出() {
        let mut sink = StreamSink::new(8, 4);
        sink.put(Packet::from_data(vec![1u8])).unwrap();
        sink.put(Packet::from_data(vec![2u8, 2])).unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.pop().unwrap().size(), 1);
        assert_eq!(sink.pop().unwrap().size(), 2);
        assert!(sink.pop().is_none());
    }

    #[test]
    fn test_超大数据块被拒绝() {
        let mut sink = StreamSink::new(4, 4);
        assert!(sink.put(Packet::from_data(vec![0u8; 5])).is_err());
        assert!(sink.is_empty());

        let mut header = Packet::from_data(vec![0u8; 40]);
        header.flags |= PacketFlags::HEADER;
        sink.put(header).unwrap();
        assert_eq!(sink.len(), 1);
    }
}
