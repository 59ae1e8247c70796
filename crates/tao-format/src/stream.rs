//! 流信息定义.
//!
//! 描述容器中声明的一条音频/视频/命令流.

use tao_codec::CodecId;
use tao_core::MediaType;

/// 流信息
#[derive(Debug, Clone)]
pub struct Stream {
    /// 流索引 (在流表中的位置, 从 0 开始)
    pub index: usize,
    /// 容器内的流号 (1~127)
    pub stream_id: u8,
    /// 媒体类型
    pub media_type: MediaType,
    /// 编解码器标识
    pub codec_id: CodecId,
    /// 声明的码率 (bps, 0 表示未知)
    pub bit_rate: u32,
    /// 原始格式记录 (音频为 WAVEFORMATEX, 视频为 BITMAPINFOHEADER)
    pub extra_data: Vec<u8>,
    /// 流特定参数
    pub params: StreamParams,
    /// 是否被选为默认输出流
    pub selected: bool,
}

/// 流特定参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamParams {
    /// 视频流参数
    Video(VideoStreamParams),
    /// 音频流参数
    Audio(AudioStreamParams),
    /// 命令流 (脚本命令等), 不输出数据
    Control,
}

/// 视频流参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoStreamParams {
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 压缩格式 FourCC
    pub fourcc: [u8; 4],
}

/// 音频流参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStreamParams {
    /// WAVEFORMATEX 格式码
    pub format_tag: u16,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 声道数
    pub channels: u16,
    /// 位深
    pub bits_per_sample: u16,
    /// 块对齐
    pub block_align: u16,
    /// 平均字节率
    pub avg_bytes_per_sec: u32,
}

impl Stream {
    /// FourCC 的可读形式, 非视频流返回 None
    pub fn fourcc_str(&self) -> Option<String> {
        match &self.params {
            StreamParams::Video(v) => Some(String::from_utf8_lossy(&v.fourcc).into_owned()),
            _ => None,
        }
    }
}
