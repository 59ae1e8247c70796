//! tao-probe - ASF 文件信息探测工具
//!
//! 打开 WMA / WMV / ASF 文件, 输出格式与流信息, 可选地拉取全部数据块.

mod logging;

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use tao_codec::Packet;
use tao_core::TaoError;
use tao_core::timestamp::pts_to_seconds;
use tao_format::stream::{AudioStreamParams, StreamParams, VideoStreamParams};
use tao_format::{
    AsfDemuxer, AsfDemuxerOptions, AsfProbe, ControlEvent, Demuxer, FormatProbe, IoContext,
    SeekTarget,
};

/// Tao ASF 信息探测工具
#[derive(Parser, Debug)]
#[command(name = "tao-probe", version, about = "纯 Rust ASF 信息探测工具")]
struct Cli {
    /// 输入文件路径
    input: Option<String>,

    /// 显示每个数据块 (会读取全部数据)
    #[arg(long)]
    show_packets: bool,

    /// 输出 JSON 格式
    #[arg(long)]
    json: bool,

    /// 读取数据块前按时间 (毫秒) 定位
    #[arg(long, conflicts_with = "seek_byte")]
    seek_ms: Option<u64>,

    /// 读取数据块前按字节偏移定位
    #[arg(long)]
    seek_byte: Option<u64>,

    /// 单个数据块的最大字节数
    #[arg(long, default_value_t = AsfDemuxerOptions::default().max_chunk_size)]
    chunk_size: usize,

    /// 日志详细程度 (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ============================================================
// JSON 输出结构体
// ============================================================

/// 完整探测结果
#[derive(Serialize)]
struct ProbeOutput {
    format: FormatInfo,
    streams: Vec<StreamInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    packets: Option<PacketReport>,
}

/// 格式信息
#[derive(Serialize)]
struct FormatInfo {
    filename: String,
    format_name: String,
    probe_score: u32,
    nb_streams: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
    packet_size: u32,
    average_byte_rate: u64,
    first_packet_pos: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    tags: BTreeMap<String, String>,
}

/// 流信息
#[derive(Serialize)]
struct StreamInfo {
    index: usize,
    stream_id: u8,
    codec_type: String,
    codec_name: String,
    selected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    bit_rate: Option<u32>,
    // 视频字段
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fourcc: Option<String>,
    // 音频字段
    #[serde(skip_serializing_if = "Option::is_none")]
    format_tag: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bits_per_sample: Option<u16>,
    extra_data_size: usize,
}

/// 单个数据块
#[derive(Serialize)]
struct PacketInfo {
    stream_index: usize,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pts_time: Option<f64>,
    pos: i64,
    input_time_ms: i64,
    flags: String,
}

/// 数据块统计
#[derive(Serialize)]
struct PacketReport {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    list: Vec<PacketInfo>,
    events: Vec<String>,
    total_chunks: u64,
    total_bytes: u64,
    packets: u64,
    payloads: u64,
    skipped: u64,
    resyncs: u64,
    invalid_packets: u64,
}

// ============================================================
// 主逻辑
// ============================================================

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init("tao-probe", cli.verbose)?;

    let Some(input_path) = cli.input.as_deref() else {
        print_banner();
        return Ok(());
    };
    info!("输入文件: {input_path}");

    let mut io = IoContext::open_read(input_path)
        .with_context(|| format!("无法打开文件 '{input_path}'"))?;

    let head = io.read_bytes(16).unwrap_or_default();
    let Some(probe_score) = AsfProbe.probe(&head, Some(input_path)) else {
        bail!("'{input_path}' 不是 ASF 文件");
    };

    let mut demuxer = AsfDemuxer::with_options(AsfDemuxerOptions {
        max_chunk_size: cli.chunk_size,
        ..AsfDemuxerOptions::default()
    });
    demuxer.open(&mut io).context("无法解析文件头部")?;

    let format = FormatInfo {
        filename: input_path.to_string(),
        format_name: demuxer.name().to_string(),
        probe_score,
        nb_streams: demuxer.streams().len(),
        duration: demuxer.duration(),
        packet_size: demuxer.packet_size(),
        average_byte_rate: demuxer.average_byte_rate(),
        first_packet_pos: demuxer.first_packet_pos(),
        tags: demuxer.metadata().iter().cloned().collect(),
    };
    let streams: Vec<StreamInfo> = demuxer.streams().iter().map(build_stream_info).collect();

    let target = match (cli.seek_ms, cli.seek_byte) {
        (Some(ms), _) => Some(SeekTarget::Time(ms)),
        (None, Some(byte)) => Some(SeekTarget::Byte(byte)),
        (None, None) => None,
    };
    if let Some(target) = target {
        demuxer
            .seek(&mut io, target)
            .with_context(|| format!("seek 失败: {target:?}"))?;
    }

    let packets = cli
        .show_packets
        .then(|| read_all_packets(&mut demuxer, &mut io, !cli.json));

    if cli.json {
        let output = ProbeOutput {
            format,
            streams,
            packets,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_format_text(&format);
        print_streams_text(&streams);
        if let Some(report) = &packets {
            print_packets_text(report);
        }
    }
    Ok(())
}

/// 拉取全部数据块; 文本模式下逐块打印, JSON 模式下收集到列表
fn read_all_packets(demuxer: &mut AsfDemuxer, io: &mut IoContext, print: bool) -> PacketReport {
    let mut list = Vec::new();
    let mut events = Vec::new();
    let mut total_chunks = 0u64;
    let mut total_bytes = 0u64;

    loop {
        let result = demuxer.read_packet(io);
        events.extend(demuxer.take_events().iter().map(describe_event));
        match result {
            Ok(packet) => {
                total_chunks += 1;
                total_bytes += packet.size() as u64;
                let info = build_packet_info(&packet);
                if print {
                    print_packet_line(&info);
                } else {
                    list.push(info);
                }
            }
            Err(TaoError::Eof) => break,
            Err(err) => {
                warn!("读取数据块时出错: {err}");
                break;
            }
        }
    }

    let stats = demuxer.stats();
    PacketReport {
        list,
        events,
        total_chunks,
        total_bytes,
        packets: stats.packets,
        payloads: stats.payloads,
        skipped: stats.skipped,
        resyncs: stats.resyncs,
        invalid_packets: stats.invalid_packets,
    }
}

fn describe_event(event: &ControlEvent) -> String {
    match event {
        ControlEvent::Start => "start".to_string(),
        ControlEvent::NewPts { pts, seek } => {
            format!("new_pts({:.3}s, seek={seek})", pts_to_seconds(*pts))
        }
        ControlEvent::Flush => "flush".to_string(),
    }
}

fn build_packet_info(packet: &Packet) -> PacketInfo {
    let mut flags = String::new();
    for (set, ch) in [
        (packet.is_keyframe, 'K'),
        (packet.is_frame_end(), 'E'),
        (packet.is_preview(), 'P'),
        (packet.is_header(), 'H'),
        (
            packet
                .flags
                .contains(tao_codec::PacketFlags::DISCONTINUITY),
            'D',
        ),
    ] {
        flags.push(if set { ch } else { '_' });
    }
    PacketInfo {
        stream_index: packet.stream_index,
        size: packet.size(),
        pts_time: packet.has_pts().then(|| pts_to_seconds(packet.pts)),
        pos: packet.pos,
        input_time_ms: packet.input_time_ms,
        flags,
    }
}

/// 从 Stream 构建 StreamInfo
fn build_stream_info(stream: &tao_format::Stream) -> StreamInfo {
    let mut info = StreamInfo {
        index: stream.index,
        stream_id: stream.stream_id,
        codec_type: stream.media_type.to_string(),
        codec_name: stream.codec_id.to_string(),
        selected: stream.selected,
        bit_rate: (stream.bit_rate > 0).then_some(stream.bit_rate),
        width: None,
        height: None,
        fourcc: stream.fourcc_str(),
        format_tag: None,
        sample_rate: None,
        channels: None,
        bits_per_sample: None,
        extra_data_size: stream.extra_data.len(),
    };

    match &stream.params {
        StreamParams::Video(VideoStreamParams { width, height, .. }) => {
            info.width = Some(*width);
            info.height = Some(*height);
        }
        StreamParams::Audio(AudioStreamParams {
            format_tag,
            sample_rate,
            channels,
            bits_per_sample,
            ..
        }) => {
            info.format_tag = Some(*format_tag);
            info.sample_rate = Some(*sample_rate);
            info.channels = Some(*channels);
            info.bits_per_sample = Some(*bits_per_sample);
        }
        StreamParams::Control => {}
    }

    info
}

/// 文本输出: 格式信息
fn print_format_text(info: &FormatInfo) {
    println!("[FORMAT]");
    println!("  文件名       : {}", info.filename);
    println!("  格式名称     : {}", info.format_name);
    println!("  探测置信度   : {}", info.probe_score);
    println!("  流数量       : {}", info.nb_streams);
    if let Some(dur) = info.duration {
        println!("  时长         : {dur:.3} 秒");
    }
    println!("  包大小       : {} 字节", info.packet_size);
    println!("  平均字节率   : {} 字节/秒", info.average_byte_rate);
    println!("  首包位置     : {}", info.first_packet_pos);
    for (key, value) in &info.tags {
        println!("  TAG:{key:<9}: {value}");
    }
    println!("[/FORMAT]");
    println!();
}

/// 文本输出: 流信息
fn print_streams_text(streams: &[StreamInfo]) {
    for stream in streams {
        println!("[STREAM #{}]", stream.index);
        println!("  流号         : {}", stream.stream_id);
        println!("  类型         : {}", stream.codec_type);
        println!("  编解码器     : {}", stream.codec_name);
        println!("  默认输出     : {}", if stream.selected { "是" } else { "否" });

        if let (Some(w), Some(h)) = (stream.width, stream.height) {
            println!("  分辨率       : {w}x{h}");
        }
        if let Some(ref fourcc) = stream.fourcc {
            println!("  FourCC       : {fourcc}");
        }

        if let Some(tag) = stream.format_tag {
            println!("  格式码       : 0x{tag:04X}");
        }
        if let Some(sr) = stream.sample_rate {
            println!("  采样率       : {sr} Hz");
        }
        if let Some(ch) = stream.channels {
            println!("  声道数       : {ch}");
        }
        if let Some(bits) = stream.bits_per_sample {
            println!("  位深         : {bits}");
        }

        if let Some(br) = stream.bit_rate {
            println!("  码率         : {} kbps", br / 1000);
        }
        println!("  格式记录     : {} 字节", stream.extra_data_size);
        println!("[/STREAM]");
        println!();
    }
}

fn print_packet_line(info: &PacketInfo) {
    let pts = info
        .pts_time
        .map_or_else(|| "N/A".to_string(), |t| format!("{t:.3}"));
    println!(
        "chunk stream={} size={} pts={} pos={} time={}ms flags={}",
        info.stream_index, info.size, pts, info.pos, info.input_time_ms, info.flags
    );
}

/// 文本输出: 数据块统计
fn print_packets_text(report: &PacketReport) {
    println!();
    println!("[PACKETS]");
    println!("  数据块总数   : {}", report.total_chunks);
    println!(
        "  数据总量     : {} 字节 ({:.2} KB)",
        report.total_bytes,
        report.total_bytes as f64 / 1024.0
    );
    println!("  物理包       : {}", report.packets);
    println!("  负载         : {}", report.payloads);
    println!("  跳过负载     : {}", report.skipped);
    println!("  重新同步     : {}", report.resyncs);
    println!("  无效包       : {}", report.invalid_packets);
    for event in &report.events {
        println!("  事件         : {event}");
    }
    println!("[/PACKETS]");
    println!();
}

/// 打印版本横幅
fn print_banner() {
    println!(
        "tao-probe 版本 {} -- 纯 Rust ASF 探测工具",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("用法: tao-probe [选项] <输入文件>");
    println!();
    println!("选项:");
    println!("  --show-packets    显示每个数据块");
    println!("  --json            以 JSON 格式输出");
    println!("  --seek-ms <MS>    读取前按时间定位");
    println!("  --seek-byte <N>   读取前按字节偏移定位");
    println!("  --chunk-size <N>  单个数据块的最大字节数");
    println!("  -v, --verbose     提高日志详细程度");
    println!();
    println!("使用 --help 查看完整用法.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_命令行定义() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_解析参数() {
        let cli = Cli::parse_from(["tao-probe", "a.wma", "--show-packets", "--seek-ms", "1500", "-vv"]);
        assert_eq!(cli.input.as_deref(), Some("a.wma"));
        assert!(cli.show_packets);
        assert_eq!(cli.seek_ms, Some(1500));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.chunk_size, 4096);
    }

    #[test]
    fn test_数据块标志() {
        let mut packet = Packet::from_data(vec![0u8; 3]);
        packet.is_keyframe = true;
        packet.flags = tao_codec::PacketFlags::FRAME_END;
        let info = build_packet_info(&packet);
        assert_eq!(info.flags, "KE___");
        assert_eq!(info.pts_time, None);
    }
}
