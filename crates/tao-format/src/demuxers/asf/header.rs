//! ASF 头部对象解析.
//!
//! 打开时执行一次: 读取头部对象及其子对象, 建立流表, 取得包大小、
//! 播放时长、平均字节率和文本标签, 并按声明码率选出默认音视频流.
//! 遇到数据对象后停止, 记录第一个数据包的字节偏移.

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};
use tao_codec::CodecId;
use tao_core::timestamp::hns_to_ms;
use tao_core::{MediaType, TaoError, TaoResult};

use super::guid::{Guid, GuidKind};
use super::interleave::InterleaveParams;
use super::stream_table::MAX_STREAMS;
use crate::io::IoContext;
use crate::stream::{AudioStreamParams, Stream, StreamParams, VideoStreamParams};

/// 子对象头部长度 (GUID + 8 字节大小)
pub const OBJECT_HEADER_LEN: u64 = 24;

/// BITMAPINFOHEADER 长度上限 (不含)
const MAX_BIH_SIZE: u16 = 2048;

/// 一条声明的流
#[derive(Debug, Clone)]
pub struct StreamRecord {
    pub stream: Stream,
    /// 需要还原交织时的参数
    pub interleave: Option<InterleaveParams>,
}

/// 内容描述对象中的文本标签
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentDescription {
    pub title: String,
    pub author: String,
    pub copyright: String,
    pub comment: String,
    pub rating: String,
}

impl ContentDescription {
    /// 转换为元数据键值对, 跳过空值
    pub fn to_metadata(&self) -> Vec<(String, String)> {
        [
            ("title", &self.title),
            ("artist", &self.author),
            ("copyright", &self.copyright),
            ("comment", &self.comment),
            ("rating", &self.rating),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
    }
}

/// 头部解析结果
#[derive(Debug, Clone, Default)]
pub struct AsfHeader {
    /// 标称数据包大小
    pub packet_size: u32,
    /// 文件属性中声明的文件大小
    pub file_size: u64,
    /// 声明的数据包数
    pub packet_count: u64,
    /// 播放时长 (毫秒)
    pub play_duration_ms: u64,
    /// 预卷时长 (毫秒)
    pub preroll_ms: u64,
    /// 最大码率 (bps)
    pub max_bitrate: u32,
    /// 平均字节率 (字节/秒), 时长未知时为 0
    pub average_byte_rate: u64,
    pub streams: Vec<StreamRecord>,
    /// 视频流数量 (包括因格式记录异常而忽略的视频流)
    pub video_stream_count: usize,
    pub content: ContentDescription,
    /// 第一个数据包的字节偏移
    pub first_packet_pos: u64,
    /// 默认音频流 (流表索引)
    pub default_audio: Option<usize>,
    /// 默认视频流 (流表索引)
    pub default_video: Option<usize>,
}

/// 解析头部
///
/// 输入不完整按无效数据处理.
pub fn read_header(io: &mut IoContext) -> TaoResult<AsfHeader> {
    match parse_header(io) {
        Err(TaoError::Eof) => Err(TaoError::InvalidData("ASF 头部不完整".into())),
        other => other,
    }
}

fn parse_header(io: &mut IoContext) -> TaoResult<AsfHeader> {
    let guid = Guid::from_bytes(&io.read_guid_bytes()?);
    if guid.kind() != GuidKind::Header {
        return Err(TaoError::InvalidData(format!(
            "文件不以 ASF 头部对象开头: {guid}"
        )));
    }
    let header_size = io.read_u64_le()?;
    let object_count = io.read_u32_le()?;
    io.skip(2)?;
    debug!("ASF: 头部对象, size={header_size}, 子对象数={object_count}");

    let mut header = AsfHeader::default();
    let mut bitrates = [0u32; 128];

    loop {
        let obj_start = io.position()?;
        let guid = Guid::from_bytes(&io.read_guid_bytes()?);
        let size = io.read_u64_le()?;
        if size < OBJECT_HEADER_LEN {
            return Err(TaoError::InvalidData(format!(
                "对象 {guid} 的大小 {size} 小于 {OBJECT_HEADER_LEN}"
            )));
        }
        let obj_end = obj_start
            .checked_add(size)
            .ok_or_else(|| TaoError::InvalidData(format!("对象 {guid} 的大小 {size} 溢出")))?;

        let kind = guid.kind();
        debug!("ASF: 对象 {kind:?}, offset={obj_start}, size={size}");
        match kind {
            GuidKind::FileProperties => read_file_properties(io, &mut header)?,
            GuidKind::StreamProperties => read_stream_properties(io, &mut header, obj_end)?,
            GuidKind::ContentDescription => {
                header.content = read_content_description(io)?;
            }
            GuidKind::StreamBitrateProperties => read_bitrate_properties(io, &mut bitrates)?,
            GuidKind::Data => {
                // 文件 ID (16) + 数据包总数 (8) + 保留 (2)
                io.skip(16 + 10)?;
                header.first_packet_pos = io.position()?;
                break;
            }
            _ => {}
        }
        skip_to(io, obj_end, &guid)?;
    }

    if header.packet_size == 0 {
        return Err(TaoError::InvalidData("数据包大小为 0".into()));
    }

    let total_bytes = io.size().unwrap_or(header.file_size);
    header.average_byte_rate = if header.play_duration_ms > 0 {
        total_bytes
            .checked_mul(1000)
            .map_or(0, |b| b / header.play_duration_ms)
    } else {
        0
    };

    for record in &mut header.streams {
        record.stream.bit_rate = bitrates[usize::from(record.stream.stream_id)];
    }
    select_default_streams(&mut header);

    debug!(
        "ASF: 头部解析完成, {} 个流, packet_size={}, 时长={}ms, 平均字节率={}, 首包位置={}",
        header.streams.len(),
        header.packet_size,
        header.play_duration_ms,
        header.average_byte_rate,
        header.first_packet_pos
    );
    Ok(header)
}

/// 跳到对象末尾, 已读过界视为数据损坏
fn skip_to(io: &mut IoContext, end: u64, guid: &Guid) -> TaoResult<()> {
    let pos = io.position()?;
    if pos > end {
        return Err(TaoError::InvalidData(format!(
            "对象 {guid} 内容超出声明大小 ({pos} > {end})"
        )));
    }
    io.skip((end - pos) as usize)
}

fn read_file_properties(io: &mut IoContext, header: &mut AsfHeader) -> TaoResult<()> {
    let _file_id = io.read_guid_bytes()?;
    header.file_size = io.read_u64_le()?;
    let _creation_date = io.read_u64_le()?;
    header.packet_count = io.read_u64_le()?;
    header.play_duration_ms = hns_to_ms(io.read_u64_le()?);
    let _send_duration = io.read_u64_le()?;
    header.preroll_ms = io.read_u64_le()?;
    let _flags = io.read_u32_le()?;
    let min_packet_size = io.read_u32_le()?;
    let max_packet_size = io.read_u32_le()?;
    header.max_bitrate = io.read_u32_le()?;

    if min_packet_size != max_packet_size {
        warn!("ASF: 最小包大小 {min_packet_size} 与最大包大小 {max_packet_size} 不一致, 使用最小值");
    }
    header.packet_size = min_packet_size;
    Ok(())
}

fn le_u16(buf: &[u8], offset: usize) -> u16 {
    buf.get(offset..offset + 2).map_or(0, LittleEndian::read_u16)
}

fn le_u32(buf: &[u8], offset: usize) -> u32 {
    buf.get(offset..offset + 4).map_or(0, LittleEndian::read_u32)
}

fn read_stream_properties(
    io: &mut IoContext,
    header: &mut AsfHeader,
    obj_end: u64,
) -> TaoResult<()> {
    let type_guid = Guid::from_bytes(&io.read_guid_bytes()?);
    let media_type = match type_guid.kind() {
        GuidKind::AudioMedia => MediaType::Audio,
        GuidKind::VideoMedia => MediaType::Video,
        GuidKind::CommandMedia => MediaType::Control,
        _ => {
            return Err(TaoError::InvalidData(format!(
                "未知的流媒体类型 {type_guid}"
            )));
        }
    };
    let ecc_kind = Guid::from_bytes(&io.read_guid_bytes()?).kind();
    let _time_offset = io.read_u64_le()?;
    let type_specific_len = io.read_u32_le()? as usize;
    let _ecc_len = io.read_u32_le()?;
    let flags = io.read_u16_le()?;
    let _reserved = io.read_u32_le()?;
    let stream_id = (flags & 0x7F) as u8;
    let body_pos = io.position()?;
    if body_pos.saturating_add(type_specific_len as u64) > obj_end {
        return Err(TaoError::InvalidData(format!(
            "流 {stream_id} 的类型数据长度 {type_specific_len} 超出对象末尾"
        )));
    }

    let mut interleave = None;
    let (codec_id, extra_data, params) = match media_type {
        MediaType::Audio => {
            let wfx = io.read_bytes(type_specific_len)?;
            if ecc_kind == GuidKind::AudioSpread {
                let spread = io.read_bytes(5)?;
                interleave = InterleaveParams::from_audio_spread(
                    spread[0],
                    le_u16(&spread, 1),
                    le_u16(&spread, 3),
                );
                if let Some(p) = interleave {
                    debug!(
                        "ASF: 流 {stream_id} 检测到音频交织 ({} x {} x {})",
                        p.rows, p.columns, p.block
                    );
                }
            }
            let audio = AudioStreamParams {
                format_tag: le_u16(&wfx, 0),
                channels: le_u16(&wfx, 2),
                sample_rate: le_u32(&wfx, 4),
                avg_bytes_per_sec: le_u32(&wfx, 8),
                block_align: le_u16(&wfx, 12),
                bits_per_sample: le_u16(&wfx, 14),
            };
            let codec_id = CodecId::from_wave_format_tag(audio.format_tag, audio.bits_per_sample);
            if codec_id == CodecId::UnknownAudio {
                warn!("ASF: 未知的音频格式码 0x{:04X}", audio.format_tag);
            }
            (codec_id, wfx, StreamParams::Audio(audio))
        }
        MediaType::Video => {
            header.video_stream_count += 1;
            let width = io.read_u32_le()?;
            let height = io.read_u32_le()?;
            let _reserved = io.read_u8()?;
            let bih_size = io.read_u16_le()?;
            if bih_size == 0 || bih_size >= MAX_BIH_SIZE {
                warn!("ASF: 视频流 {stream_id} 的格式记录大小 {bih_size} 无效, 忽略该流");
                return Ok(());
            }
            let bih = io.read_bytes(usize::from(bih_size))?;
            let mut fourcc = [0u8; 4];
            if let Some(raw) = bih.get(16..20) {
                fourcc.copy_from_slice(raw);
            }
            let codec_id = CodecId::from_fourcc(fourcc);
            if codec_id == CodecId::UnknownVideo {
                warn!(
                    "ASF: 未知的视频格式 {}",
                    String::from_utf8_lossy(&fourcc)
                );
            }
            (
                codec_id,
                bih,
                StreamParams::Video(VideoStreamParams {
                    width,
                    height,
                    fourcc,
                }),
            )
        }
        MediaType::Control => (CodecId::None, Vec::new(), StreamParams::Control),
    };

    if header.streams.len() >= MAX_STREAMS {
        return Err(TaoError::InvalidData(format!(
            "流数量超过上限 {MAX_STREAMS}"
        )));
    }
    debug!("ASF: 发现{media_type}流, id={stream_id}, codec={codec_id}");
    header.streams.push(StreamRecord {
        stream: Stream {
            index: header.streams.len(),
            stream_id,
            media_type,
            codec_id,
            bit_rate: 0,
            extra_data,
            params,
            selected: false,
        },
        interleave,
    });
    Ok(())
}

fn read_utf16_field(io: &mut IoContext, len: u16) -> TaoResult<String> {
    let raw = io.read_bytes(usize::from(len))?;
    let (text, _) = encoding_rs::UTF_16LE.decode_without_bom_handling(&raw);
    Ok(text.trim_end_matches('\0').to_string())
}

fn read_content_description(io: &mut IoContext) -> TaoResult<ContentDescription> {
    let mut lens = [0u16; 5];
    for len in &mut lens {
        *len = io.read_u16_le()?;
    }
    Ok(ContentDescription {
        title: read_utf16_field(io, lens[0])?,
        author: read_utf16_field(io, lens[1])?,
        copyright: read_utf16_field(io, lens[2])?,
        comment: read_utf16_field(io, lens[3])?,
        rating: read_utf16_field(io, lens[4])?,
    })
}

fn read_bitrate_properties(io: &mut IoContext, bitrates: &mut [u32; 128]) -> TaoResult<()> {
    let count = io.read_u16_le()?;
    for _ in 0..count {
        let flags = io.read_u16_le()?;
        let bitrate = io.read_u32_le()?;
        bitrates[usize::from(flags & 0x7F)] = bitrate;
    }
    Ok(())
}

/// 每种媒体类型选出声明码率最高的流, 码率相同时取先出现的
fn select_default_streams(header: &mut AsfHeader) {
    let mut best_audio: Option<(usize, u32)> = None;
    let mut best_video: Option<(usize, u32)> = None;
    for record in &header.streams {
        let stream = &record.stream;
        let best = match stream.media_type {
            MediaType::Audio => &mut best_audio,
            MediaType::Video => &mut best_video,
            MediaType::Control => continue,
        };
        if best.is_none_or(|(_, rate)| stream.bit_rate > rate) {
            *best = Some((stream.index, stream.bit_rate));
        }
    }

    header.default_audio = best_audio.map(|(index, _)| index);
    header.default_video = best_video.map(|(index, _)| index);
    for index in header.default_audio.iter().chain(header.default_video.iter()) {
        header.streams[*index].stream.selected = true;
    }
    debug!(
        "ASF: 默认音频流={:?}, 默认视频流={:?}",
        header.default_audio, header.default_video
    );
}
