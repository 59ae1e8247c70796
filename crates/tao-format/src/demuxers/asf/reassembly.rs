//! 分片重组.
//!
//! 每条流用 [`FragmentState`] 记录正在拼接的帧 (序号, 已收字节数).
//! 新分片按以下规则进入:
//! - 空闲: 开始新帧
//! - 序号和偏移都与记录一致: 续接
//! - 其他: 放弃当前帧; 新分片偏移为 0 时开始新帧, 否则丢弃并等待下一个帧起点
//!
//! 两种交付方式:
//! - 直通: 分片数据按块大小直接从字节源读出交付, 第一块带时间戳
//! - 缓冲: 整帧收进重组缓冲区, 帧结束时还原交织后再按块交付

use log::{debug, warn};
use tao_codec::{Packet, PacketFlags};
use tao_core::timestamp::{NOPTS_VALUE, PTS_PER_MS};
use tao_core::TaoResult;

use super::continuity::{ContinuityTracker, PtsClass};
use super::interleave::InterleaveParams;
use super::stream_table::StreamDescriptor;
use crate::demuxer::ControlEvent;
use crate::io::IoContext;

/// 重组缓冲区容量 (字节)
pub const DEFRAG_CAPACITY: usize = 65536;

/// 一个待重组的分片
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub frag_offset: u32,
    pub sequence: u32,
    /// 时间戳 (毫秒, 0 表示无)
    pub timestamp: u32,
    pub frag_len: usize,
    /// 整帧字节数
    pub total_size: u32,
    pub key_frame: bool,
}

/// 流的分片重组状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FragmentState {
    #[default]
    Idle,
    Accumulating { sequence: u32, offset: u32 },
}

/// 分片进入规则的判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 开始新帧
    Start,
    /// 续接当前帧
    Continue,
    /// 当前帧无法续接; `restart` 表示新分片能否开始新帧
    Abandon { restart: bool },
}

impl FragmentState {
    /// 当前帧已收字节数
    pub fn offset(&self) -> u32 {
        match *self {
            Self::Idle => 0,
            Self::Accumulating { offset, .. } => offset,
        }
    }

    pub fn admit(&self, fragment: &Fragment) -> Admission {
        match *self {
            Self::Idle => Admission::Start,
            Self::Accumulating { sequence, offset }
                if sequence == fragment.sequence && offset == fragment.frag_offset =>
            {
                Admission::Continue
            }
            Self::Accumulating { .. } => Admission::Abandon {
                restart: fragment.frag_offset == 0,
            },
        }
    }

    fn settle(sequence: u32, offset: u32) -> Self {
        if offset == 0 {
            Self::Idle
        } else {
            Self::Accumulating { sequence, offset }
        }
    }
}

/// 缓冲区追加结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// 追加后会超过容量, 分片被拒绝, 缓冲区内容不变
    Overflow,
}

/// 分片处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentOutcome {
    /// 数据已交付或已进入重组缓冲区
    Accepted,
    /// 分片无法归入任何帧, 数据已跳过
    Discarded,
    /// 重组缓冲区溢出, 数据未读取
    Overflow,
}

/// 重组缓冲区 (缓冲交付方式)
#[derive(Debug)]
pub struct DefragBuffer {
    data: Vec<u8>,
    params: InterleaveParams,
    frame_timestamp: u32,
    ts_per_kbyte: i64,
    key_frame: bool,
}

impl DefragBuffer {
    pub fn new(params: InterleaveParams) -> Self {
        Self {
            data: Vec::with_capacity(DEFRAG_CAPACITY),
            params,
            frame_timestamp: 0,
            ts_per_kbyte: 0,
            key_frame: false,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn params(&self) -> InterleaveParams {
        self.params
    }

    /// 每 1024 字节对应的时间戳增量 (90kHz)
    pub fn ts_per_kbyte(&self) -> i64 {
        self.ts_per_kbyte
    }

    /// 从字节源追加 `len` 字节
    pub fn append(&mut self, io: &mut IoContext, len: usize) -> TaoResult<AppendOutcome> {
        if self.data.len() + len > DEFRAG_CAPACITY {
            return Ok(AppendOutcome::Overflow);
        }
        let start = self.data.len();
        self.data.resize(start + len, 0);
        if let Err(e) = io.read_exact(&mut self.data[start..]) {
            self.data.truncate(start);
            return Err(e);
        }
        Ok(AppendOutcome::Appended)
    }

    /// 记录分片的时间信息
    fn note_timing(&mut self, fragment: &Fragment) {
        if fragment.frag_offset != 0 {
            if fragment.timestamp != 0 {
                let elapsed = i64::from(fragment.timestamp) - i64::from(self.frame_timestamp);
                self.ts_per_kbyte =
                    elapsed * 1024 * PTS_PER_MS / i64::from(fragment.frag_offset);
            }
        } else {
            self.ts_per_kbyte = 0;
            self.frame_timestamp = fragment.timestamp;
            self.key_frame = fragment.key_frame;
        }
    }

    /// 取出整帧并还原交织
    fn take_frame(&mut self) -> Vec<u8> {
        let mut frame = std::mem::take(&mut self.data);
        self.params.deinterleave(&mut frame);
        frame
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.frame_timestamp = 0;
        self.ts_per_kbyte = 0;
        self.key_frame = false;
    }
}

/// 交付上下文
///
/// 借用会话中交付数据块所需的共享状态.
pub struct Delivery<'a> {
    pub io: &'a mut IoContext,
    pub continuity: &'a mut ContinuityTracker,
    pub events: &'a mut Vec<ControlEvent>,
    /// 关键帧门尚未打开, 交付的数据块标记为预览
    pub preview: bool,
    /// 平均字节率, 用于推算输入时间
    pub byte_rate: u64,
}

impl Delivery<'_> {
    /// 打包一个数据块并推入流的输出队列
    ///
    /// `pts` 为 90kHz 时间戳, 0 表示无.
    fn emit(
        &mut self,
        descriptor: &mut StreamDescriptor,
        data: Vec<u8>,
        pts: i64,
        frame_end: bool,
        key_frame: bool,
    ) -> TaoResult<()> {
        let class = if descriptor.media_type.is_video() {
            PtsClass::Video
        } else {
            PtsClass::Audio
        };

        let mut packet = Packet::from_data(data);
        if let Some(discontinuity) = self.continuity.observe(pts, class, frame_end) {
            self.events.push(ControlEvent::NewPts {
                pts: discontinuity.pts,
                seek: discontinuity.seek,
            });
            packet.flags |= PacketFlags::DISCONTINUITY;
        }
        if frame_end {
            packet.flags |= PacketFlags::FRAME_END;
            if class == PtsClass::Video {
                packet.flags |= PacketFlags::FRAMERATE;
                packet.frame_duration = self.continuity.frame_duration();
            }
        }
        if self.preview {
            packet.flags |= PacketFlags::PREVIEW;
        }

        let pos = self.io.position()?;
        packet.pts = if pts == 0 { NOPTS_VALUE } else { pts };
        packet.codec_id = descriptor.codec_id;
        packet.stream_index = descriptor.stream_index;
        packet.is_keyframe = key_frame;
        packet.pos = pos as i64;
        packet.input_time_ms = if self.byte_rate > 0 {
            (pos * 1000 / self.byte_rate) as i64
        } else {
            0
        };
        descriptor.sink.put(packet)
    }
}

/// 把一个分片交给流的重组器
pub fn deliver_fragment(
    ctx: &mut Delivery<'_>,
    descriptor: &mut StreamDescriptor,
    fragment: &Fragment,
) -> TaoResult<FragmentOutcome> {
    if descriptor.defrag.is_some() {
        deliver_buffered(ctx, descriptor, fragment)
    } else {
        deliver_direct(ctx, descriptor, fragment)
    }
}

/// 直通交付
fn deliver_direct(
    ctx: &mut Delivery<'_>,
    descriptor: &mut StreamDescriptor,
    fragment: &Fragment,
) -> TaoResult<FragmentOutcome> {
    let mut offset = match descriptor.state.admit(fragment) {
        Admission::Start => 0,
        Admission::Continue => descriptor.state.offset(),
        Admission::Abandon { restart: true } => {
            debug!(
                "ASF: 流 {} 放弃未完成的帧, 已收 {} 字节",
                descriptor.stream_id,
                descriptor.state.offset()
            );
            0
        }
        Admission::Abandon { restart: false } => {
            descriptor.state = FragmentState::Idle;
            ctx.io.skip(fragment.frag_len)?;
            return Ok(FragmentOutcome::Discarded);
        }
    };

    let max_chunk = descriptor.sink.max_chunk_size();
    let mut pts = i64::from(fragment.timestamp) * PTS_PER_MS;
    let mut remaining = fragment.frag_len;
    while remaining > 0 {
        let len = remaining.min(max_chunk);
        let data = ctx.io.read_bytes(len)?;
        remaining -= len;
        offset = offset.wrapping_add(len as u32);
        let frame_end = offset == fragment.total_size;
        ctx.emit(descriptor, data, pts, frame_end, fragment.key_frame)?;
        pts = 0;
        if frame_end {
            offset = 0;
        }
    }

    descriptor.state = FragmentState::settle(fragment.sequence, offset);
    Ok(FragmentOutcome::Accepted)
}

/// 缓冲交付
fn deliver_buffered(
    ctx: &mut Delivery<'_>,
    descriptor: &mut StreamDescriptor,
    fragment: &Fragment,
) -> TaoResult<FragmentOutcome> {
    if let Admission::Abandon { restart } = descriptor.state.admit(fragment) {
        flush(ctx, descriptor)?;
        if !restart {
            ctx.io.skip(fragment.frag_len)?;
            return Ok(FragmentOutcome::Discarded);
        }
    }

    let Some(buffer) = descriptor.defrag.as_mut() else {
        return deliver_direct(ctx, descriptor, fragment);
    };
    buffer.note_timing(fragment);
    match buffer.append(ctx.io, fragment.frag_len)? {
        AppendOutcome::Appended => {
            descriptor.state = FragmentState::settle(fragment.sequence, buffer.len() as u32);
            Ok(FragmentOutcome::Accepted)
        }
        AppendOutcome::Overflow => {
            warn!(
                "ASF: 流 {} 重组缓冲区溢出, 已有 {} 字节, 拒绝 {} 字节的分片",
                descriptor.stream_id,
                buffer.len(),
                fragment.frag_len
            );
            Ok(FragmentOutcome::Overflow)
        }
    }
}

/// 交付重组缓冲区中的整帧, 之后流回到空闲状态
///
/// 直通方式的流没有缓冲数据, 只复位状态.
pub fn flush(ctx: &mut Delivery<'_>, descriptor: &mut StreamDescriptor) -> TaoResult<()> {
    descriptor.state = FragmentState::Idle;
    let Some(buffer) = descriptor.defrag.as_mut() else {
        return Ok(());
    };
    if buffer.is_empty() {
        return Ok(());
    }

    let base = i64::from(buffer.frame_timestamp) * PTS_PER_MS;
    let rate = buffer.ts_per_kbyte;
    let key_frame = buffer.key_frame;
    let frame = buffer.take_frame();

    let max_chunk = descriptor.sink.max_chunk_size();
    let mut start = 0usize;
    for chunk in frame.chunks(max_chunk) {
        let pts = base + (i128::from(rate) * start as i128 / 1024) as i64;
        start += chunk.len();
        ctx.emit(descriptor, chunk.to_vec(), pts, start == frame.len(), key_frame)?;
    }
    Ok(())
}
