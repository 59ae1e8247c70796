//! ASF (Advanced Systems Format) 解封装器.
//!
//! 支持 WMA / WMV / ASF 文件和流. 打开时解析头部对象建立流表,
//! 之后每次拉取时按需读取物理数据包, 把其中的负载分片重组为
//! 各流的完整帧, 切成不超过块大小上限的数据块交付.
//!
//! 损坏的数据包不会终止会话: 解析失败时放弃当前包剩余部分,
//! 从下一个数据包边界重新同步. 只有字节源短读 (输入结束) 和
//! 头部错误是致命的.
//!
//! 模块划分:
//! - [`header`]: 头部对象解析与默认流选择
//! - [`framer`]: 物理数据包帧头
//! - [`payload`]: 负载头部与关键帧门控
//! - [`reassembly`]: 分片重组 (直通 / 缓冲两种方式)
//! - [`interleave`]: 音频交织还原
//! - [`continuity`]: 时间戳连续性跟踪

pub mod continuity;
pub mod framer;
pub mod guid;
pub mod header;
pub mod interleave;
pub mod payload;
pub mod reassembly;
pub mod sink;
pub mod stream_table;

#[cfg(test)]
mod testutil;

use std::io::SeekFrom;

use log::{debug, warn};
use tao_codec::{Packet, PacketFlags};
use tao_core::{TaoError, TaoResult};

pub use framer::ResyncReason;
use continuity::ContinuityTracker;
use framer::{PacketCursor, ParseError, align_to_packet};
use guid::{Guid, GuidKind};
use payload::{KeyframeGate, PayloadBody, read_payload_body, read_payload_header};
use reassembly::{Delivery, Fragment, FragmentOutcome, deliver_fragment, flush};
use sink::StreamSink;
use stream_table::{StreamDescriptor, StreamTable};

use crate::demuxer::{ControlEvent, Demuxer, SeekTarget};
use crate::io::IoContext;
use crate::probe::{FormatProbe, ProbeScore, SCORE_EXTENSION, SCORE_MAX};
use crate::stream::Stream;

/// 解封装选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsfDemuxerOptions {
    /// 单个数据块的最大字节数
    pub max_chunk_size: usize,
    /// 每条流输出队列的预分配容量 (数据块数)
    pub queue_capacity: usize,
    /// 打开后是否先交付各默认流的格式记录
    pub emit_headers: bool,
}

impl Default for AsfDemuxerOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: 4096,
            queue_capacity: 64,
            emit_headers: true,
        }
    }
}

/// 解封装统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxStats {
    /// 成功解析帧头的数据包数
    pub packets: u64,
    /// 解析过的负载数
    pub payloads: u64,
    /// 未路由或无法归入帧而跳过的负载数
    pub skipped: u64,
    /// 重新同步次数
    pub resyncs: u64,
    /// 带无效标记而跳过的数据包数
    pub invalid_packets: u64,
}

/// 单个负载的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadOutcome {
    /// 数据已交给重组器
    Delivered,
    /// 负载被跳过
    Skipped,
    /// 当前数据包损坏, 剩余部分已放弃
    Resync(ResyncReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStatus {
    Closed,
    Open,
    Finished,
}

/// ASF 解封装器
pub struct AsfDemuxer {
    options: AsfDemuxerOptions,
    status: SessionStatus,
    streams: Vec<Stream>,
    metadata: Vec<(String, String)>,
    table: StreamTable,
    packet_size: u32,
    first_packet_pos: u64,
    byte_rate: u64,
    duration_ms: u64,
    selected_audio: Option<u8>,
    selected_video: Option<u8>,
    has_video: bool,
    cursor: PacketCursor,
    gate: KeyframeGate,
    continuity: ContinuityTracker,
    events: Vec<ControlEvent>,
    stats: DemuxStats,
}

impl AsfDemuxer {
    pub fn new() -> Self {
        Self::with_options(AsfDemuxerOptions::default())
    }

    pub fn with_options(options: AsfDemuxerOptions) -> Self {
        Self {
            options,
            status: SessionStatus::Closed,
            streams: Vec::new(),
            metadata: Vec::new(),
            table: StreamTable::new(),
            packet_size: 0,
            first_packet_pos: 0,
            byte_rate: 0,
            duration_ms: 0,
            selected_audio: None,
            selected_video: None,
            has_video: false,
            cursor: PacketCursor::default(),
            gate: KeyframeGate::new(false),
            continuity: ContinuityTracker::new(),
            events: Vec::new(),
            stats: DemuxStats::default(),
        }
    }

    /// 创建默认选项的 ASF 解封装器 (工厂函数)
    pub fn create() -> TaoResult<Box<dyn Demuxer>> {
        Ok(Box::new(Self::new()))
    }

    /// 平均字节率 (字节/秒), 时长未知时为 0
    pub fn average_byte_rate(&self) -> u64 {
        self.byte_rate
    }

    pub fn packet_size(&self) -> u32 {
        self.packet_size
    }

    /// 第一个数据包的字节偏移
    pub fn first_packet_pos(&self) -> u64 {
        self.first_packet_pos
    }

    pub fn stats(&self) -> DemuxStats {
        self.stats
    }

    /// 默认音频流的流号
    pub fn selected_audio(&self) -> Option<u8> {
        self.selected_audio
    }

    /// 默认视频流的流号
    pub fn selected_video(&self) -> Option<u8> {
        self.selected_video
    }

    /// 输入是否已读完
    pub fn is_finished(&self) -> bool {
        self.status == SessionStatus::Finished
    }

    fn is_selected(&self, stream_id: u8) -> bool {
        self.selected_audio == Some(stream_id) || self.selected_video == Some(stream_id)
    }

    /// 解析并处理下一个负载
    ///
    /// 当前数据包的负载用完时先读取下一个数据包的帧头.
    /// 数据包损坏时返回 `Resync`, 下一次调用从新的数据包开始.
    pub fn read_payload(&mut self, io: &mut IoContext) -> TaoResult<PayloadOutcome> {
        match self.parse_payload(io) {
            Ok(outcome) => Ok(outcome),
            Err(ParseError::Resync(reason)) => {
                warn!(
                    "ASF: 数据包损坏 ({reason}), 放弃剩余 {} 字节并重新同步",
                    self.cursor.residual()
                );
                self.cursor.abandon();
                self.stats.resyncs += 1;
                Ok(PayloadOutcome::Resync(reason))
            }
            Err(ParseError::Fatal(err)) => Err(err),
        }
    }

    fn parse_payload(&mut self, io: &mut IoContext) -> Result<PayloadOutcome, ParseError> {
        if self.cursor.is_exhausted() {
            align_to_packet(io, self.first_packet_pos, self.packet_size)?;
            self.cursor = framer::read_packet(io, self.packet_size)?;
            self.stats.packets += 1;
            self.stats.invalid_packets += u64::from(self.cursor.skipped_invalid);
        }
        self.cursor.next_payload();
        self.stats.payloads += 1;

        let header = read_payload_header(io, &mut self.cursor)?;
        let slot = self
            .table
            .find(header.stream_id)
            .filter(|_| self.is_selected(header.stream_id));
        let routed = slot.is_some() && self.gate.admits(header.key_frame);
        if self
            .gate
            .observe(header.key_frame, routed, header.frag_offset)
        {
            debug!("ASF: 流 {} 遇到关键帧, 开始正常输出", header.stream_id);
        }

        let body = read_payload_body(io, &mut self.cursor, &header)?;
        let slot = match slot {
            Some(slot) if routed => slot,
            _ => {
                let len = match body {
                    PayloadBody::Grouped { data_len, .. } => data_len,
                    PayloadBody::Single { frag_len, .. } => frag_len,
                };
                io.skip(len)?;
                self.cursor.take(len)?;
                self.stats.skipped += 1;
                return Ok(PayloadOutcome::Skipped);
            }
        };

        let mut ctx = Delivery {
            io,
            continuity: &mut self.continuity,
            events: &mut self.events,
            preview: !self.gate.is_open(),
            byte_rate: self.byte_rate,
        };
        let descriptor = self.table.get_mut(slot);

        match body {
            PayloadBody::Grouped {
                timestamp,
                data_len,
            } => {
                let mut left = data_len;
                let mut sequence = header.sequence;
                while left > 0 {
                    let unit = usize::from(ctx.io.read_u8()?);
                    self.cursor.take(1)?;
                    left -= 1;
                    if unit > left {
                        return Err(ResyncReason::GroupedLengthOverrun(unit as u32).into());
                    }
                    let fragment = Fragment {
                        frag_offset: 0,
                        sequence,
                        timestamp,
                        frag_len: unit,
                        total_size: unit as u32,
                        key_frame: header.key_frame,
                    };
                    if deliver_fragment(&mut ctx, descriptor, &fragment)?
                        == FragmentOutcome::Overflow
                    {
                        return Err(ResyncReason::DefragOverflow.into());
                    }
                    self.cursor.take(unit)?;
                    left -= unit;
                    sequence = sequence.wrapping_add(1);
                }
                Ok(PayloadOutcome::Delivered)
            }
            PayloadBody::Single {
                timestamp,
                total_size,
                frag_len,
            } => {
                let fragment = Fragment {
                    frag_offset: header.frag_offset,
                    sequence: header.sequence,
                    timestamp,
                    frag_len,
                    total_size,
                    key_frame: header.key_frame,
                };
                let outcome = deliver_fragment(&mut ctx, descriptor, &fragment)?;
                if outcome == FragmentOutcome::Overflow {
                    return Err(ResyncReason::DefragOverflow.into());
                }
                self.cursor.take(frag_len)?;
                if outcome == FragmentOutcome::Discarded {
                    self.stats.skipped += 1;
                    return Ok(PayloadOutcome::Skipped);
                }
                Ok(PayloadOutcome::Delivered)
            }
        }
    }

    /// 输入结束: 交付所有重组缓冲区中的残余帧
    fn finish(&mut self, io: &mut IoContext) -> TaoResult<()> {
        let mut ctx = Delivery {
            io,
            continuity: &mut self.continuity,
            events: &mut self.events,
            preview: !self.gate.is_open(),
            byte_rate: self.byte_rate,
        };
        for descriptor in self.table.iter_mut() {
            flush(&mut ctx, descriptor)?;
        }
        self.status = SessionStatus::Finished;
        debug!(
            "ASF: 输入结束, 数据包={}, 负载={}, 跳过={}, 重新同步={}",
            self.stats.packets, self.stats.payloads, self.stats.skipped, self.stats.resyncs
        );
        Ok(())
    }

    /// 为默认流生成携带格式记录的头部数据块
    fn queue_stream_headers(&mut self) -> TaoResult<()> {
        for stream in self.streams.iter().filter(|s| s.selected) {
            let Some(slot) = self.table.find(stream.stream_id) else {
                continue;
            };
            let mut packet = Packet::from_data(stream.extra_data.clone());
            packet.flags = PacketFlags::HEADER;
            packet.codec_id = stream.codec_id;
            packet.stream_index = stream.index;
            packet.pos = self.first_packet_pos as i64;
            self.table.get_mut(slot).sink.put(packet)?;
        }
        Ok(())
    }
}

impl Default for AsfDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Demuxer for AsfDemuxer {
    fn name(&self) -> &str {
        "asf"
    }

    fn open(&mut self, io: &mut IoContext) -> TaoResult<()> {
        if self.options.max_chunk_size == 0 {
            return Err(TaoError::InvalidArgument("max_chunk_size 不能为 0".into()));
        }
        if io.is_seekable() {
            io.seek(SeekFrom::Start(0))?;
        }

        let header = header::read_header(io)?;

        let mut table = StreamTable::new();
        for record in &header.streams {
            let sink = StreamSink::new(self.options.max_chunk_size, self.options.queue_capacity);
            table.push(StreamDescriptor::new(&record.stream, record.interleave, sink))?;
        }

        let stream_id_of = |index: Option<usize>| index.map(|i| header.streams[i].stream.stream_id);
        self.selected_audio = stream_id_of(header.default_audio);
        self.selected_video = stream_id_of(header.default_video);
        self.has_video = header.video_stream_count > 0;

        self.table = table;
        self.packet_size = header.packet_size;
        self.first_packet_pos = header.first_packet_pos;
        self.byte_rate = header.average_byte_rate;
        self.duration_ms = header.play_duration_ms;
        self.metadata = header.content.to_metadata();
        self.streams = header.streams.into_iter().map(|r| r.stream).collect();

        self.cursor = PacketCursor::default();
        self.gate = KeyframeGate::new(self.has_video);
        self.continuity = ContinuityTracker::new();
        self.stats = DemuxStats::default();
        self.events.clear();
        self.events.push(ControlEvent::Start);
        self.status = SessionStatus::Open;

        if self.options.emit_headers {
            self.queue_stream_headers()?;
        }
        debug!(
            "ASF: 打开完成, 音频流={:?}, 视频流={:?}",
            self.selected_audio, self.selected_video
        );
        Ok(())
    }

    fn streams(&self) -> &[Stream] {
        &self.streams
    }

    fn read_packet(&mut self, io: &mut IoContext) -> TaoResult<Packet> {
        loop {
            if let Some(packet) = self.table.pop_ready() {
                return Ok(packet);
            }
            match self.status {
                SessionStatus::Closed => return Err(TaoError::NotOpened),
                SessionStatus::Finished => return Err(TaoError::Eof),
                SessionStatus::Open => {}
            }
            match self.read_payload(io) {
                Ok(_) => {}
                Err(TaoError::Eof) => self.finish(io)?,
                Err(err) => return Err(err),
            }
        }
    }

    fn seek(&mut self, io: &mut IoContext, target: SeekTarget) -> TaoResult<()> {
        if self.status == SessionStatus::Closed {
            return Err(TaoError::NotOpened);
        }

        self.events.push(ControlEvent::Flush);
        self.continuity.mark_pending(true);
        self.cursor = PacketCursor::default();
        self.gate.reset(self.has_video);
        self.table.reset_all();
        self.status = SessionStatus::Open;

        if !io.is_seekable() {
            debug!("ASF: 字节源不可 seek, 只复位内部状态");
            return Ok(());
        }
        let offset = match target {
            SeekTarget::Time(ms) => ms.saturating_mul(self.byte_rate) / 1000,
            SeekTarget::Byte(offset) => offset,
        }
        .max(self.first_packet_pos);
        debug!("ASF: seek {target:?} -> 字节偏移 {offset}");
        io.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn duration(&self) -> Option<f64> {
        (self.duration_ms > 0).then(|| self.duration_ms as f64 / 1000.0)
    }

    fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    fn take_events(&mut self) -> Vec<ControlEvent> {
        std::mem::take(&mut self.events)
    }
}

/// ASF 格式探测器
pub struct AsfProbe;

impl FormatProbe for AsfProbe {
    fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeScore> {
        if let Some(prefix) = data.first_chunk::<16>() {
            if Guid::from_bytes(prefix).kind() == GuidKind::Header {
                return Some(SCORE_MAX);
            }
        }

        if let Some(name) = filename {
            let lower = name.to_ascii_lowercase();
            if lower.ends_with(".asf") || lower.ends_with(".wmv") || lower.ends_with(".wma") {
                return Some(SCORE_EXTENSION);
            }
        }

        None
    }
}
