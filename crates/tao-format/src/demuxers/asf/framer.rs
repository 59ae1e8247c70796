//! 物理数据包帧头解析.
//!
//! 每个物理数据包以纠错标志开头, 之后是数据包标志和段类型字节.
//! 数据包标志中的三个 2 位宽度码决定了包大小、序号、填充长度三个字段
//! 各占多少字节. 解析结果是一个 [`PacketCursor`], 记录本包剩余的负载字节数.

use log::{trace, warn};
use tao_core::{TaoError, TaoResult};

use crate::io::IoContext;

/// 宽度码对应的字段宽度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    /// 字段不存在, 值为 0
    Width0,
    Width1,
    Width2,
    Width4,
}

impl FieldWidth {
    /// 从 2 位宽度码解析 (只取低 2 位)
    pub const fn from_code(code: u8) -> Self {
        match code & 0x03 {
            0 => Self::Width0,
            1 => Self::Width1,
            2 => Self::Width2,
            _ => Self::Width4,
        }
    }

    /// 字段占用的字节数
    pub const fn byte_len(self) -> usize {
        match self {
            Self::Width0 => 0,
            Self::Width1 => 1,
            Self::Width2 => 2,
            Self::Width4 => 4,
        }
    }

    /// 按宽度读取一个小端无符号整数
    pub fn read(self, io: &mut IoContext) -> TaoResult<u32> {
        Ok(match self {
            Self::Width0 => 0,
            Self::Width1 => u32::from(io.read_u8()?),
            Self::Width2 => u32::from(io.read_u16_le()?),
            Self::Width4 => io.read_u32_le()?,
        })
    }
}

/// 放弃当前数据包剩余部分的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResyncReason {
    #[error("填充长度 {padding} 超过数据包大小 {packet_size}")]
    PaddingTooLarge { padding: u32, packet_size: u32 },
    #[error("数据长度 {data_size} 超过数据包大小 {packet_size}")]
    DataSizeTooLarge { data_size: u32, packet_size: u32 },
    #[error("数据长度 {data_size} 小于包头长度 {header_len}")]
    DataSizeUnderflow { data_size: u32, header_len: usize },
    #[error("数据包未声明任何负载")]
    NoPayloads,
    #[error("负载头部超出数据包剩余字节")]
    PayloadHeaderOverrun,
    #[error("复制数据长度 {0} 超出数据包剩余字节")]
    ReplicatedLengthOverrun(u32),
    #[error("分片长度 {0} 超出数据包剩余字节")]
    FragmentLengthOverrun(u32),
    #[error("组合负载长度 {0} 超出数据包剩余字节")]
    GroupedLengthOverrun(u32),
    #[error("重组缓冲区溢出")]
    DefragOverflow,
}

/// 数据包级解析错误
///
/// `Resync` 只影响当前数据包, 会话在下一个包边界继续;
/// `Fatal` 终止会话 (通常是短读).
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Fatal(#[from] TaoError),
    #[error("需要重新同步: {0}")]
    Resync(#[from] ResyncReason),
}

/// 当前物理数据包的解析状态
///
/// 跨越多次负载解析调用保存, seek 或重新同步时清零.
#[derive(Debug, Clone, Default)]
pub struct PacketCursor {
    /// 数据包标志
    pub packet_flags: u8,
    /// 段类型 (负载字段宽度码)
    pub segment_type: u8,
    /// 发送时间 (毫秒)
    pub send_time: u32,
    /// 寻找有效数据包时跳过的无效包数
    pub skipped_invalid: u32,
    residual: usize,
    payloads_left: usize,
    length_width: Option<FieldWidth>,
}

impl PacketCursor {
    /// 本包剩余的负载字节数
    pub fn residual(&self) -> usize {
        self.residual
    }

    /// 本包尚未解析的负载数
    pub fn payloads_left(&self) -> usize {
        self.payloads_left
    }

    /// 多负载包中负载长度字段的宽度, 单负载包为 None
    pub fn length_width(&self) -> Option<FieldWidth> {
        self.length_width
    }

    /// 是否需要读取新的数据包
    pub fn is_exhausted(&self) -> bool {
        self.payloads_left == 0
    }

    /// 开始解析下一个负载
    pub fn next_payload(&mut self) {
        self.payloads_left = self.payloads_left.saturating_sub(1);
    }

    /// 从剩余字节中扣除 `count` 字节, 不足时要求重新同步
    pub fn take(&mut self, count: usize) -> Result<(), ResyncReason> {
        self.residual = self
            .residual
            .checked_sub(count)
            .ok_or(ResyncReason::PayloadHeaderOverrun)?;
        Ok(())
    }

    /// 放弃本包剩余部分, 下一次解析从新的数据包开始
    pub fn abandon(&mut self) {
        self.residual = 0;
        self.payloads_left = 0;
    }
}

/// 跳到下一个物理数据包边界
///
/// 返回跳过的字节数.
pub fn align_to_packet(io: &mut IoContext, first_packet_pos: u64, packet_size: u32) -> TaoResult<usize> {
    let pos = io.position()?;
    let offset = pos.saturating_sub(first_packet_pos);
    let rem = (offset % u64::from(packet_size)) as usize;
    if rem == 0 {
        return Ok(0);
    }
    let gap = packet_size as usize - rem;
    io.skip(gap)?;
    Ok(gap)
}

/// 解析一个物理数据包的帧头
///
/// 带无效标记的数据包被整体跳过, 直到遇到有效包或输入结束.
pub fn read_packet(io: &mut IoContext, packet_size: u32) -> Result<PacketCursor, ParseError> {
    let mut skipped_invalid = 0u32;
    let mut consumed;
    loop {
        let ecc_flags = io.read_u8()?;
        consumed = 1usize;
        if ecc_flags & 0x80 != 0 {
            let ecc_len = usize::from(ecc_flags & 0x0F);
            io.skip(ecc_len)?;
            consumed += ecc_len;
        }
        if ecc_flags & 0x70 == 0 {
            break;
        }
        warn!("ASF: 跳过无效数据包, ecc_flags=0x{ecc_flags:02X}");
        io.skip((packet_size as usize).saturating_sub(consumed))?;
        skipped_invalid += 1;
    }

    let packet_flags = io.read_u8()?;
    let segment_type = io.read_u8()?;
    consumed += 2;

    let size_width = FieldWidth::from_code(packet_flags >> 5);
    let seq_width = FieldWidth::from_code(packet_flags >> 1);
    let pad_width = FieldWidth::from_code(packet_flags >> 3);

    let mut data_size = size_width.read(io)?;
    seq_width.read(io)?;
    let mut padding = pad_width.read(io)?;
    consumed += size_width.byte_len() + seq_width.byte_len() + pad_width.byte_len();

    let send_time = io.read_u32_le()?;
    let _duration = io.read_u16_le()?;
    consumed += 6;

    if size_width != FieldWidth::Width0 {
        // 绝对长度模式
        padding = packet_size.checked_sub(data_size).ok_or(ResyncReason::DataSizeTooLarge {
            data_size,
            packet_size,
        })?;
    } else {
        // 相对长度模式
        if padding > packet_size {
            return Err(ResyncReason::PaddingTooLarge {
                padding,
                packet_size,
            }
            .into());
        }
        data_size = packet_size - padding;
    }

    let residual = (data_size as usize).checked_sub(consumed).ok_or(
        ResyncReason::DataSizeUnderflow {
            data_size,
            header_len: consumed,
        },
    )?;

    let mut cursor = PacketCursor {
        packet_flags,
        segment_type,
        send_time,
        skipped_invalid,
        residual,
        payloads_left: 1,
        length_width: None,
    };

    if packet_flags & 0x01 != 0 {
        let sub_header = io.read_u8()?;
        cursor.take(1)?;
        let count = usize::from(sub_header & 0x3F);
        if count == 0 {
            return Err(ResyncReason::NoPayloads.into());
        }
        cursor.payloads_left = count;
        // 宽度码 0 按 2 字节处理
        cursor.length_width = Some(match FieldWidth::from_code(sub_header >> 6) {
            FieldWidth::Width0 => FieldWidth::Width2,
            width => width,
        });
    }

    trace!(
        "ASF: 新数据包, data_size={data_size}, padding={padding}, residual={}, payloads={}, flags=0x{packet_flags:02X}",
        cursor.residual, cursor.payloads_left
    );
    Ok(cursor)
}
