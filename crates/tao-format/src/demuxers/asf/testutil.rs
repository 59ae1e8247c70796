//! 测试用 ASF 字节流构造器.

use byteorder::{LittleEndian, WriteBytesExt};

use super::guid::GuidKind;

pub fn guid_bytes(kind: GuidKind) -> [u8; 16] {
    kind.guid().unwrap().to_bytes()
}

/// 带 24 字节对象头的完整对象
pub fn object(kind: GuidKind, body: &[u8]) -> Vec<u8> {
    let mut out = guid_bytes(kind).to_vec();
    out.write_u64::<LittleEndian>(24 + body.len() as u64).unwrap();
    out.extend_from_slice(body);
    out
}

fn stream_properties(
    media: GuidKind,
    ecc: GuidKind,
    stream_id: u8,
    type_specific: &[u8],
    ecc_data: &[u8],
) -> Vec<u8> {
    let mut body = guid_bytes(media).to_vec();
    body.extend_from_slice(&guid_bytes(ecc));
    body.write_u64::<LittleEndian>(0).unwrap();
    body.write_u32::<LittleEndian>(type_specific.len() as u32)
        .unwrap();
    body.write_u32::<LittleEndian>(ecc_data.len() as u32).unwrap();
    body.write_u16::<LittleEndian>(u16::from(stream_id)).unwrap();
    body.write_u32::<LittleEndian>(0).unwrap();
    body.extend_from_slice(type_specific);
    body.extend_from_slice(ecc_data);
    object(GuidKind::StreamProperties, &body)
}

/// 音频流属性对象, `spread` 为 (行数, 虚拟包长, 块长)
pub fn audio_stream_object(stream_id: u8, format_tag: u16, spread: Option<(u8, u16, u16)>) -> Vec<u8> {
    let mut wfx = Vec::new();
    wfx.write_u16::<LittleEndian>(format_tag).unwrap();
    wfx.write_u16::<LittleEndian>(2).unwrap();
    wfx.write_u32::<LittleEndian>(44_100).unwrap();
    wfx.write_u32::<LittleEndian>(16_000).unwrap();
    wfx.write_u16::<LittleEndian>(0x0800).unwrap();
    wfx.write_u16::<LittleEndian>(16).unwrap();
    wfx.write_u16::<LittleEndian>(0).unwrap();

    match spread {
        Some((span, packet_len, chunk_len)) => {
            let mut ecc = vec![span];
            ecc.write_u16::<LittleEndian>(packet_len).unwrap();
            ecc.write_u16::<LittleEndian>(chunk_len).unwrap();
            ecc.write_u16::<LittleEndian>(1).unwrap();
            ecc.push(0);
            stream_properties(GuidKind::AudioMedia, GuidKind::AudioSpread, stream_id, &wfx, &ecc)
        }
        None => stream_properties(
            GuidKind::AudioMedia,
            GuidKind::NoErrorCorrection,
            stream_id,
            &wfx,
            &[],
        ),
    }
}

/// 视频流属性对象, `bih_size` 为 0 时不写格式记录
pub fn video_stream_object(stream_id: u8, fourcc: [u8; 4], bih_size: u16) -> Vec<u8> {
    let mut specific = Vec::new();
    specific.write_u32::<LittleEndian>(320).unwrap();
    specific.write_u32::<LittleEndian>(240).unwrap();
    specific.push(2);
    specific.write_u16::<LittleEndian>(bih_size).unwrap();
    if bih_size > 0 {
        let mut bih = vec![0u8; usize::from(bih_size)];
        bih[0..4].copy_from_slice(&u32::from(bih_size).to_le_bytes());
        bih[16..20].copy_from_slice(&fourcc);
        specific.extend_from_slice(&bih);
    }
    stream_properties(
        GuidKind::VideoMedia,
        GuidKind::NoErrorCorrection,
        stream_id,
        &specific,
        &[],
    )
}

pub fn command_stream_object(stream_id: u8) -> Vec<u8> {
    stream_properties(
        GuidKind::CommandMedia,
        GuidKind::NoErrorCorrection,
        stream_id,
        &[],
        &[],
    )
}

fn utf16(text: &str) -> Vec<u8> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut out: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
    out.extend_from_slice(&[0, 0]);
    out
}

/// 整个 ASF 文件的构造器
pub struct FileBuilder {
    packet_size: u32,
    duration_ms: u64,
    file_size: u64,
    children: Vec<Vec<u8>>,
}

impl FileBuilder {
    pub fn new(packet_size: u32) -> Self {
        Self {
            packet_size,
            duration_ms: 0,
            file_size: 0,
            children: Vec::new(),
        }
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }

    pub fn file_size(mut self, size: u64) -> Self {
        self.file_size = size;
        self
    }

    pub fn raw_child(mut self, child: Vec<u8>) -> Self {
        self.children.push(child);
        self
    }

    pub fn audio(self, stream_id: u8, format_tag: u16, spread: Option<(u8, u16, u16)>) -> Self {
        self.raw_child(audio_stream_object(stream_id, format_tag, spread))
    }

    pub fn video(self, stream_id: u8, fourcc: [u8; 4]) -> Self {
        self.raw_child(video_stream_object(stream_id, fourcc, 40))
    }

    pub fn command(self, stream_id: u8) -> Self {
        self.raw_child(command_stream_object(stream_id))
    }

    pub fn bitrates(self, rates: &[(u8, u32)]) -> Self {
        let mut body = Vec::new();
        body.write_u16::<LittleEndian>(rates.len() as u16).unwrap();
        for &(id, rate) in rates {
            body.write_u16::<LittleEndian>(u16::from(id)).unwrap();
            body.write_u32::<LittleEndian>(rate).unwrap();
        }
        self.raw_child(object(GuidKind::StreamBitrateProperties, &body))
    }

    pub fn content(self, title: &str, author: &str, copyright: &str, comment: &str, rating: &str) -> Self {
        let fields = [title, author, copyright, comment, rating].map(utf16);
        let mut body = Vec::new();
        for field in &fields {
            body.write_u16::<LittleEndian>(field.len() as u16).unwrap();
        }
        for field in &fields {
            body.extend_from_slice(field);
        }
        self.raw_child(object(GuidKind::ContentDescription, &body))
    }

    fn file_properties(&self) -> Vec<u8> {
        let mut body = vec![0u8; 16];
        body.write_u64::<LittleEndian>(self.file_size).unwrap();
        body.write_u64::<LittleEndian>(0).unwrap();
        body.write_u64::<LittleEndian>(0).unwrap();
        body.write_u64::<LittleEndian>(self.duration_ms * 10_000).unwrap();
        body.write_u64::<LittleEndian>(self.duration_ms * 10_000).unwrap();
        body.write_u64::<LittleEndian>(0).unwrap();
        body.write_u32::<LittleEndian>(2).unwrap();
        body.write_u32::<LittleEndian>(self.packet_size).unwrap();
        body.write_u32::<LittleEndian>(self.packet_size).unwrap();
        body.write_u32::<LittleEndian>(1_000_000).unwrap();
        object(GuidKind::FileProperties, &body)
    }

    /// 拼出头部对象、数据对象头和数据包
    pub fn build(self, packets: &[Vec<u8>]) -> Vec<u8> {
        let mut children = vec![self.file_properties()];
        children.extend(self.children);

        let children_len: usize = children.iter().map(Vec::len).sum();
        let mut out = guid_bytes(GuidKind::Header).to_vec();
        out.write_u64::<LittleEndian>(30 + children_len as u64).unwrap();
        out.write_u32::<LittleEndian>(children.len() as u32).unwrap();
        out.extend_from_slice(&[1, 2]);
        for child in &children {
            out.extend_from_slice(child);
        }

        let packets_len: usize = packets.iter().map(Vec::len).sum();
        out.extend_from_slice(&guid_bytes(GuidKind::Data));
        out.write_u64::<LittleEndian>(50 + packets_len as u64).unwrap();
        out.extend_from_slice(&[0u8; 16]);
        out.write_u64::<LittleEndian>(packets.len() as u64).unwrap();
        out.extend_from_slice(&[1, 1]);
        for packet in packets {
            out.extend_from_slice(packet);
        }
        out
    }
}

/// 单个负载的描述
#[derive(Debug, Clone)]
pub struct PayloadSpec {
    pub stream_id: u8,
    pub key_frame: bool,
    pub sequence: u8,
    pub frag_offset: u32,
    pub total_size: u32,
    pub timestamp: u32,
    pub data: Vec<u8>,
}

impl PayloadSpec {
    /// 完整一帧的单个分片
    pub fn frame(stream_id: u8, key_frame: bool, sequence: u8, timestamp: u32, data: &[u8]) -> Self {
        Self {
            stream_id,
            key_frame,
            sequence,
            frag_offset: 0,
            total_size: data.len() as u32,
            timestamp,
            data: data.to_vec(),
        }
    }

    fn route_byte(&self) -> u8 {
        self.stream_id | if self.key_frame { 0x80 } else { 0 }
    }
}

/// 包头: ECC (2 字节) + 标志 + 段类型 0x5D + 2 字节填充长度 + 发送时间 + 时长
fn packet_prefix(packet_flags: u8, padding: usize) -> Vec<u8> {
    let mut out = vec![0x82, 0, 0, packet_flags, 0x5D];
    out.write_u16::<LittleEndian>(padding as u16).unwrap();
    out.write_u32::<LittleEndian>(0).unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out
}

const PREFIX_LEN: usize = 13;

/// 只有一个负载的数据包 (相对长度模式)
pub fn single_payload_packet(packet_size: usize, payload: &PayloadSpec) -> Vec<u8> {
    let used = PREFIX_LEN + 15 + payload.data.len();
    let mut out = packet_prefix(0x10, packet_size - used);
    out.push(payload.route_byte());
    out.push(payload.sequence);
    out.write_u32::<LittleEndian>(payload.frag_offset).unwrap();
    out.push(8);
    out.write_u32::<LittleEndian>(payload.total_size).unwrap();
    out.write_u32::<LittleEndian>(payload.timestamp).unwrap();
    out.extend_from_slice(&payload.data);
    out.resize(packet_size, 0);
    out
}

/// 多负载数据包, 负载长度字段为 2 字节
pub fn multi_payload_packet(packet_size: usize, payloads: &[PayloadSpec]) -> Vec<u8> {
    let used = PREFIX_LEN
        + 1
        + payloads
            .iter()
            .map(|p| 17 + p.data.len())
            .sum::<usize>();
    let mut out = packet_prefix(0x11, packet_size - used);
    out.push(0x80 | payloads.len() as u8);
    for payload in payloads {
        out.push(payload.route_byte());
        out.push(payload.sequence);
        out.write_u32::<LittleEndian>(payload.frag_offset).unwrap();
        out.push(8);
        out.write_u32::<LittleEndian>(payload.total_size).unwrap();
        out.write_u32::<LittleEndian>(payload.timestamp).unwrap();
        out.write_u16::<LittleEndian>(payload.data.len() as u16)
            .unwrap();
        out.extend_from_slice(&payload.data);
    }
    out.resize(packet_size, 0);
    out
}

/// 单个组合负载的数据包, 各单元共享一个时间戳
pub fn grouped_packet(packet_size: usize, stream_id: u8, key_frame: bool, timestamp: u32, units: &[&[u8]]) -> Vec<u8> {
    let used = PREFIX_LEN + 8 + units.iter().map(|u| 1 + u.len()).sum::<usize>();
    let mut out = packet_prefix(0x10, packet_size - used);
    out.push(stream_id | if key_frame { 0x80 } else { 0 });
    out.push(0);
    out.write_u32::<LittleEndian>(timestamp).unwrap();
    out.push(1);
    out.push(0);
    for unit in units {
        out.push(unit.len() as u8);
        out.extend_from_slice(unit);
    }
    out.resize(packet_size, 0);
    out
}

/// 多负载数据包: 一个单个负载后跟一个组合负载, 长度字段均为 2 字节
pub fn multi_packet_with_group(
    packet_size: usize,
    payload: &PayloadSpec,
    group: (u8, bool, u32),
    units: &[&[u8]],
) -> Vec<u8> {
    let (stream_id, key_frame, timestamp) = group;
    let group_len: usize = units.iter().map(|u| 1 + u.len()).sum();
    let used = PREFIX_LEN + 1 + 17 + payload.data.len() + 10 + group_len;
    let mut out = packet_prefix(0x11, packet_size - used);
    out.push(0x80 | 2);

    out.push(payload.route_byte());
    out.push(payload.sequence);
    out.write_u32::<LittleEndian>(payload.frag_offset).unwrap();
    out.push(8);
    out.write_u32::<LittleEndian>(payload.total_size).unwrap();
    out.write_u32::<LittleEndian>(payload.timestamp).unwrap();
    out.write_u16::<LittleEndian>(payload.data.len() as u16)
        .unwrap();
    out.extend_from_slice(&payload.data);

    out.push(stream_id | if key_frame { 0x80 } else { 0 });
    out.push(0);
    out.write_u32::<LittleEndian>(timestamp).unwrap();
    out.push(1);
    out.push(0);
    out.write_u16::<LittleEndian>(group_len as u16).unwrap();
    for unit in units {
        out.push(unit.len() as u8);
        out.extend_from_slice(unit);
    }
    out.resize(packet_size, 0);
    out
}

/// 带无效标记的数据包
pub fn invalid_packet(packet_size: usize) -> Vec<u8> {
    let mut out = vec![0xF2, 0, 0];
    out.resize(packet_size, 0xEE);
    out
}
