//! 压缩数据块 (Packet).
//!
//! 解封装器交给下游的最小单位. 一帧较大的压缩数据会被拆成若干个
//! 不超过接收端最大块大小的 Packet, 最后一块带 `FRAME_END` 标志.

use bitflags::bitflags;
use bytes::Bytes;
use tao_core::timestamp::NOPTS_VALUE;

use crate::codec_id::CodecId;

bitflags! {
    /// 数据块标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PacketFlags: u32 {
        /// 一帧的最后一块
        const FRAME_END = 0x0001;
        /// 预览数据 (关键帧尚未出现前送出的数据)
        const PREVIEW = 0x0002;
        /// 携带帧率提示, 值在 `frame_duration` 中
        const FRAMERATE = 0x0004;
        /// 流头部 (格式记录), 非压缩数据
        const HEADER = 0x0008;
        /// 本块触发了一次时间戳不连续通知
        const DISCONTINUITY = 0x0010;
    }
}

/// 压缩数据块
#[derive(Debug, Clone)]
pub struct Packet {
    /// 压缩数据
    pub data: Bytes,
    /// 显示时间戳 (90kHz, `NOPTS_VALUE` 表示无)
    pub pts: i64,
    /// 目标编解码器
    pub codec_id: CodecId,
    /// 所属流的索引
    pub stream_index: usize,
    /// 负载是否带关键帧标记
    pub is_keyframe: bool,
    /// 标志位
    pub flags: PacketFlags,
    /// 平滑后的帧时长 (90kHz), 仅在 `FRAMERATE` 置位时有效
    pub frame_duration: i64,
    /// 读完本块数据后输入源的字节位置 (-1 表示未知)
    pub pos: i64,
    /// 根据平均码率推算的输入时间 (毫秒)
    pub input_time_ms: i64,
}

impl Packet {
    /// 创建空数据块
    pub fn empty() -> Self {
        Self {
            data: Bytes::new(),
            pts: NOPTS_VALUE,
            codec_id: CodecId::None,
            stream_index: 0,
            is_keyframe: false,
            flags: PacketFlags::empty(),
            frame_duration: 0,
            pos: -1,
            input_time_ms: 0,
        }
    }

    /// 从数据创建数据块
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::empty()
        }
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否带有显示时间戳
    pub fn has_pts(&self) -> bool {
        self.pts != NOPTS_VALUE
    }

    /// 是否为一帧的最后一块
    pub fn is_frame_end(&self) -> bool {
        self.flags.contains(PacketFlags::FRAME_END)
    }

    /// 是否为预览数据
    pub fn is_preview(&self) -> bool {
        self.flags.contains(PacketFlags::PREVIEW)
    }

    /// 是否为流头部
    pub fn is_header(&self) -> bool {
        self.flags.contains(PacketFlags::HEADER)
    }
}
