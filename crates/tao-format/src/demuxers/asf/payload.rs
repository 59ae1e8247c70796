//! 负载 (segment) 解析与关键帧门控.
//!
//! 一个负载以路由字节开头 (最高位为关键帧标记, 低 7 位为流号), 之后是
//! 由段类型字节中三个宽度码决定宽度的序号、分片偏移和复制数据长度.
//! 复制数据长度决定负载的编码方式:
//! - `1`: 组合负载, 若干 (1 字节长度, 数据) 小单元共享一个时间戳
//! - `>= 8`: 单个负载, 携带帧总长和时间戳
//! - 其他: 不支持的编码, 跳过复制数据后按单个负载处理

use log::trace;

use super::framer::{FieldWidth, PacketCursor, ParseError, ResyncReason};
use crate::io::IoContext;

/// 负载头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    /// 流号 (低 7 位)
    pub stream_id: u8,
    /// 关键帧标记
    pub key_frame: bool,
    /// 媒体对象序号
    pub sequence: u32,
    /// 分片在帧内的偏移 (组合负载中为时间戳)
    pub frag_offset: u32,
}

/// 负载主体描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadBody {
    /// 组合负载, 后面跟 `data_len` 字节的 (长度, 数据) 小单元
    Grouped { timestamp: u32, data_len: usize },
    /// 单个负载 (一帧的一个分片)
    Single {
        timestamp: u32,
        total_size: u32,
        frag_len: usize,
    },
}

/// 读取负载头部 (路由字节, 序号, 分片偏移)
pub fn read_payload_header(
    io: &mut IoContext,
    cursor: &mut PacketCursor,
) -> Result<PayloadHeader, ParseError> {
    let raw_id = io.read_u8()?;
    cursor.take(1)?;

    let seq_width = FieldWidth::from_code(cursor.segment_type >> 4);
    let sequence = seq_width.read(io)?;
    cursor.take(seq_width.byte_len())?;

    let offset_width = FieldWidth::from_code(cursor.segment_type >> 2);
    let frag_offset = offset_width.read(io)?;
    cursor.take(offset_width.byte_len())?;

    Ok(PayloadHeader {
        stream_id: raw_id & 0x7F,
        key_frame: raw_id & 0x80 != 0,
        sequence,
        frag_offset,
    })
}

/// 读取负载主体描述, 不读取负载数据本身
pub fn read_payload_body(
    io: &mut IoContext,
    cursor: &mut PacketCursor,
    header: &PayloadHeader,
) -> Result<PayloadBody, ParseError> {
    let rlen_width = FieldWidth::from_code(cursor.segment_type);
    let rlen = rlen_width.read(io)?;
    cursor.take(rlen_width.byte_len())?;
    if rlen as usize > cursor.residual() {
        return Err(ResyncReason::ReplicatedLengthOverrun(rlen).into());
    }

    if rlen == 1 {
        // 时间戳增量, 不使用
        io.skip(1)?;
        cursor.take(1)?;
        let data_len = read_length(io, cursor)?;
        if data_len > cursor.residual() {
            return Err(ResyncReason::GroupedLengthOverrun(data_len as u32).into());
        }
        return Ok(PayloadBody::Grouped {
            timestamp: header.frag_offset,
            data_len,
        });
    }

    let (total_size, timestamp) = if rlen >= 8 {
        let total_size = io.read_u32_le()?;
        let timestamp = io.read_u32_le()?;
        io.skip(rlen as usize - 8)?;
        (total_size, timestamp)
    } else {
        trace!("ASF: 不支持的复制数据长度 {rlen}, 跳过");
        io.skip(rlen as usize)?;
        (0, 0)
    };
    cursor.take(rlen as usize)?;

    let frag_len = read_length(io, cursor)?;
    if frag_len > cursor.residual() {
        return Err(ResyncReason::FragmentLengthOverrun(frag_len as u32).into());
    }

    Ok(PayloadBody::Single {
        timestamp,
        total_size: if total_size == 0 {
            frag_len as u32
        } else {
            total_size
        },
        frag_len,
    })
}

/// 多负载包读取显式长度, 单负载包取剩余字节数
fn read_length(io: &mut IoContext, cursor: &mut PacketCursor) -> Result<usize, ParseError> {
    match cursor.length_width() {
        Some(width) => {
            let len = width.read(io)?;
            cursor.take(width.byte_len())?;
            Ok(len as usize)
        }
        None => Ok(cursor.residual()),
    }
}

/// 关键帧门控
///
/// 存在视频流时, 第一个从帧起点开始的关键帧负载出现之前,
/// 只有带关键帧标记的负载会被路由. 门一旦打开, 直到 seek 前都不会关闭.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyframeGate {
    open: bool,
}

impl KeyframeGate {
    /// 没有视频流时门预先打开
    pub fn new(has_video: bool) -> Self {
        Self { open: !has_video }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// 负载是否允许进入路由
    pub fn admits(&self, key_frame: bool) -> bool {
        key_frame || self.open
    }

    /// 观察一个负载, 返回门是否因此打开
    pub fn observe(&mut self, key_frame: bool, routed: bool, frag_offset: u32) -> bool {
        if !self.open && key_frame && routed && frag_offset == 0 {
            self.open = true;
            return true;
        }
        false
    }

    /// seek 后复位
    pub fn reset(&mut self, has_video: bool) {
        self.open = !has_video;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demuxers::asf::framer::read_packet;

    /// 构造一个 segtype=0x5D 的单负载数据包 (1 字节序号, 4 字节偏移, 1 字节复制长度)
    fn packet_with(payload: &[u8], packet_size: usize, multi: Option<u8>) -> Vec<u8> {
        let flags = if multi.is_some() { 0x01 } else { 0x00 };
        let mut data = vec![0x82, 0, 0, flags, 0x5D];
        data.extend_from_slice(&[0u8; 6]);
        if let Some(sub) = multi {
            data.push(sub);
        }
        data.extend_from_slice(payload);
        data.resize(packet_size, 0);
        data
    }

    #[test]
    fn test_单个负载() {
        let mut payload = vec![0x81, 7];
        payload.extend_from_slice(&0u32.to_le_bytes()); // 分片偏移
        payload.push(8); // 复制数据长度
        payload.extend_from_slice(&21u32.to_le_bytes()); // 帧总长
        payload.extend_from_slice(&500u32.to_le_bytes()); // 时间戳
        let mut io = IoContext::from_memory(packet_with(&payload, 64, None));
        let mut cursor = read_packet(&mut io, 64).unwrap();

        let header = read_payload_header(&mut io, &mut cursor).unwrap();
        assert_eq!(header.stream_id, 1);
        assert!(header.key_frame);
        assert_eq!(header.sequence, 7);
        assert_eq!(header.frag_offset, 0);

        let body = read_payload_body(&mut io, &mut cursor, &header).unwrap();
        // 64 - 11 - 15
        assert_eq!(
            body,
            PayloadBody::Single {
                timestamp: 500,
                total_size: 21,
                frag_len: 38
            }
        );
        assert_eq!(cursor.residual(), 38);
    }

    #[test]
    fn test_帧总长为零时取分片长度() {
        let mut payload = vec![0x02, 0];
        payload.extend_from_slice(&0u32.to_le_bytes());
        payload.push(8);
        payload.extend_from_slice(&0u32.to_le_bytes());
        payload.extend_from_slice(&40u32.to_le_bytes());
        let mut io = IoContext::from_memory(packet_with(&payload, 64, None));
        let mut cursor = read_packet(&mut io, 64).unwrap();
        let header = read_payload_header(&mut io, &mut cursor).unwrap();
        assert!(!header.key_frame);
        let body = read_payload_body(&mut io, &mut cursor, &header).unwrap();
        assert!(matches!(
            body,
            PayloadBody::Single {
                total_size: 38,
                frag_len: 38,
                ..
            }
        ));
    }

    #[test]
    fn test_组合负载() {
        let mut payload = vec![0x81, 0];
        payload.extend_from_slice(&1234u32.to_le_bytes()); // 共享时间戳
        payload.push(1);
        payload.push(0); // 时间戳增量
        let mut io = IoContext::from_memory(packet_with(&payload, 40, None));
        let mut cursor = read_packet(&mut io, 40).unwrap();
        let header = read_payload_header(&mut io, &mut cursor).unwrap();
        let body = read_payload_body(&mut io, &mut cursor, &header).unwrap();
        // 40 - 11 - 8
        assert_eq!(
            body,
            PayloadBody::Grouped {
                timestamp: 1234,
                data_len: 21
            }
        );
    }

    #[test]
    fn test_多负载长度超出剩余字节() {
        let mut payload = vec![0x81, 0];
        payload.extend_from_slice(&0u32.to_le_bytes());
        payload.push(8);
        payload.extend_from_slice(&[0u8; 8]);
        payload.extend_from_slice(&500u16.to_le_bytes()); // 分片长度
        let mut io = IoContext::from_memory(packet_with(&payload, 64, Some(0x81)));
        let mut cursor = read_packet(&mut io, 64).unwrap();
        let header = read_payload_header(&mut io, &mut cursor).unwrap();
        let err = read_payload_body(&mut io, &mut cursor, &header).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Resync(ResyncReason::FragmentLengthOverrun(500))
        ));
    }

    #[test]
    fn test_多负载包中的组合负载长度() {
        let mut payload = vec![0x81, 0];
        payload.extend_from_slice(&300u32.to_le_bytes());
        payload.push(1);
        payload.push(0);
        payload.extend_from_slice(&6u16.to_le_bytes());
        let mut io = IoContext::from_memory(packet_with(&payload, 64, Some(0x81)));
        let mut cursor = read_packet(&mut io, 64).unwrap();
        let header = read_payload_header(&mut io, &mut cursor).unwrap();
        let body = read_payload_body(&mut io, &mut cursor, &header).unwrap();
        assert_eq!(
            body,
            PayloadBody::Grouped {
                timestamp: 300,
                data_len: 6
            }
        );
    }

    #[test]
    fn test_组合负载长度超出剩余字节() {
        let mut payload = vec![0x81, 0];
        payload.extend_from_slice(&300u32.to_le_bytes());
        payload.push(1);
        payload.push(0);
        payload.extend_from_slice(&500u16.to_le_bytes());
        let mut io = IoContext::from_memory(packet_with(&payload, 64, Some(0x81)));
        let mut cursor = read_packet(&mut io, 64).unwrap();
        let header = read_payload_header(&mut io, &mut cursor).unwrap();
        let err = read_payload_body(&mut io, &mut cursor, &header).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Resync(ResyncReason::GroupedLengthOverrun(500))
        ));
    }

    #[test]
    fn test_复制数据长度超出剩余字节() {
        let mut payload = vec![0x81, 0];
        payload.extend_from_slice(&0u32.to_le_bytes());
        payload.push(200);
        let mut io = IoContext::from_memory(packet_with(&payload, 32, None));
        let mut cursor = read_packet(&mut io, 32).unwrap();
        let header = read_payload_header(&mut io, &mut cursor).unwrap();
        let err = read_payload_body(&mut io, &mut cursor, &header).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Resync(ResyncReason::ReplicatedLengthOverrun(200))
        ));
    }

    #[test]
    fn test_异常复制数据长度被跳过() {
        let mut payload = vec![0x81, 0];
        payload.extend_from_slice(&0u32.to_le_bytes());
        payload.push(3);
        payload.extend_from_slice(&[0xEE; 3]);
        let mut io = IoContext::from_memory(packet_with(&payload, 40, None));
        let mut cursor = read_packet(&mut io, 40).unwrap();
        let header = read_payload_header(&mut io, &mut cursor).unwrap();
        let body = read_payload_body(&mut io, &mut cursor, &header).unwrap();
        // 40 - 11 - 7 - 3
        assert_eq!(
            body,
            PayloadBody::Single {
                timestamp: 0,
                total_size: 19,
                frag_len: 19
            }
        );
    }

    #[test]
    fn test_关键帧门控() {
        let mut gate = KeyframeGate::new(true);
        assert!(!gate.is_open());
        assert!(!gate.admits(false));
        assert!(gate.admits(true));
        // 关键帧但不是帧起点
        assert!(!gate.observe(true, true, 100));
        // 未路由的关键帧
        assert!(!gate.observe(true, false, 0));
        assert!(gate.observe(true, true, 0));
        assert!(gate.admits(false));
        // 打开后不再关闭
        assert!(!gate.observe(false, true, 5));
        assert!(gate.is_open());

        gate.reset(true);
        assert!(!gate.is_open());
        assert!(KeyframeGate::new(false).is_open());
    }
}
