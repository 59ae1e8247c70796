//! 编解码器标识符.
//!
//! 为每种编解码算法分配唯一标识, 并提供从容器格式记录
//! (WAVEFORMATEX 格式码, BITMAPINFOHEADER FourCC) 到标识符的映射.

use std::fmt;
use tao_core::MediaType;

/// 编解码器标识符
///
/// 唯一标识一种编解码算法, 与容器格式无关.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    /// 未知编解码器
    None,

    // ========================
    // 视频编解码器
    // ========================
    /// Windows Media Video 7
    Wmv1,
    /// Windows Media Video 8
    Wmv2,
    /// Windows Media Video 9
    Wmv3,
    /// VC-1 Advanced Profile (WVC1/WMVA)
    Vc1,
    /// Microsoft MPEG-4 v1
    MsMpeg4v1,
    /// Microsoft MPEG-4 v2
    MsMpeg4v2,
    /// Microsoft MPEG-4 v3 (DivX ;-) 3)
    MsMpeg4v3,
    /// MPEG-4 Part 2 (ASP)
    Mpeg4,
    /// H.264 / AVC
    H264,
    /// Motion JPEG
    Mjpeg,
    /// 未知视频 (保留原始 FourCC)
    UnknownVideo,

    // ========================
    // 音频编解码器
    // ========================
    /// Windows Media Audio 1
    WmaV1,
    /// Windows Media Audio 2
    WmaV2,
    /// Windows Media Audio 9 Professional
    WmaPro,
    /// Windows Media Audio 9 Lossless
    WmaLossless,
    /// Windows Media Audio Voice
    WmaVoice,
    /// MP3 (MPEG Audio Layer III)
    Mp3,
    /// MP2 (MPEG Audio Layer II)
    Mp2,
    /// AAC
    Aac,
    /// AC-3
    Ac3,
    /// ACELP.net (Sipro)
    Sipr,
    /// Microsoft ADPCM
    AdpcmMs,
    /// IMA ADPCM (WAV)
    AdpcmImaWav,
    /// PCM 无符号 8 位
    PcmU8,
    /// PCM 有符号 16 位小端
    PcmS16le,
    /// PCM 有符号 24 位小端
    PcmS24le,
    /// PCM 有符号 32 位小端
    PcmS32le,
    /// 未知音频 (保留原始格式码)
    UnknownAudio,
}

impl CodecId {
    /// 根据 WAVEFORMATEX 格式码和位深解析音频编解码器
    ///
    /// 无法识别的格式码返回 `UnknownAudio`, 不视为错误.
    pub fn from_wave_format_tag(format_tag: u16, bits_per_sample: u16) -> Self {
        match format_tag {
            0x0001 => match bits_per_sample {
                8 => Self::PcmU8,
                16 => Self::PcmS16le,
                24 => Self::PcmS24le,
                32 => Self::PcmS32le,
                _ => Self::UnknownAudio,
            },
            0x0002 => Self::AdpcmMs,
            0x0011 => Self::AdpcmImaWav,
            0x0050 => Self::Mp2,
            0x0055 => Self::Mp3,
            0x000A => Self::WmaVoice,
            0x0130 => Self::Sipr,
            0x0160 => Self::WmaV1,
            0x0161 => Self::WmaV2,
            0x0162 => Self::WmaPro,
            0x0163 => Self::WmaLossless,
            0x00FF | 0x1610 | 0x706D => Self::Aac,
            0x2000 => Self::Ac3,
            _ => Self::UnknownAudio,
        }
    }

    /// 根据 BITMAPINFOHEADER 的 biCompression (FourCC, 小端存储) 解析视频编解码器
    pub fn from_fourcc(fourcc: [u8; 4]) -> Self {
        let tag = fourcc.map(|b| b.to_ascii_uppercase());
        match &tag {
            b"WMV1" => Self::Wmv1,
            b"WMV2" => Self::Wmv2,
            b"WMV3" => Self::Wmv3,
            b"WVC1" | b"WMVA" => Self::Vc1,
            b"MPG4" => Self::MsMpeg4v1,
            b"MP42" => Self::MsMpeg4v2,
            b"MP43" | b"DIV3" => Self::MsMpeg4v3,
            b"MP4S" | b"M4S2" | b"XVID" | b"DIVX" | b"DX50" | b"FMP4" => Self::Mpeg4,
            b"H264" | b"X264" | b"AVC1" => Self::H264,
            b"MJPG" => Self::Mjpeg,
            _ => Self::UnknownVideo,
        }
    }

    /// 获取编解码器对应的媒体类型
    pub const fn media_type(&self) -> MediaType {
        match self {
            Self::None => MediaType::Control,

            Self::Wmv1
            | Self::Wmv2
            | Self::Wmv3
            | Self::Vc1
            | Self::MsMpeg4v1
            | Self::MsMpeg4v2
            | Self::MsMpeg4v3
            | Self::Mpeg4
            | Self::H264
            | Self::Mjpeg
            | Self::UnknownVideo => MediaType::Video,

            Self::WmaV1
            | Self::WmaV2
            | Self::WmaPro
            | Self::WmaLossless
            | Self::WmaVoice
            | Self::Mp3
            | Self::Mp2
            | Self::Aac
            | Self::Ac3
            | Self::Sipr
            | Self::AdpcmMs
            | Self::AdpcmImaWav
            | Self::PcmU8
            | Self::PcmS16le
            | Self::PcmS24le
            | Self::PcmS32le
            | Self::UnknownAudio => MediaType::Audio,
        }
    }

    /// 获取编解码器的人类可读名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Wmv1 => "wmv1",
            Self::Wmv2 => "wmv2",
            Self::Wmv3 => "wmv3",
            Self::Vc1 => "vc1",
            Self::MsMpeg4v1 => "msmpeg4v1",
            Self::MsMpeg4v2 => "msmpeg4v2",
            Self::MsMpeg4v3 => "msmpeg4v3",
            Self::Mpeg4 => "mpeg4",
            Self::H264 => "h264",
            Self::Mjpeg => "mjpeg",
            Self::UnknownVideo => "unknown_video",
            Self::WmaV1 => "wmav1",
            Self::WmaV2 => "wmav2",
            Self::WmaPro => "wmapro",
            Self::WmaLossless => "wmalossless",
            Self::WmaVoice => "wmavoice",
            Self::Mp3 => "mp3",
            Self::Mp2 => "mp2",
            Self::Aac => "aac",
            Self::Ac3 => "ac3",
            Self::Sipr => "sipr",
            Self::AdpcmMs => "adpcm_ms",
            Self::AdpcmImaWav => "adpcm_ima_wav",
            Self::PcmU8 => "pcm_u8",
            Self::PcmS16le => "pcm_s16le",
            Self::PcmS24le => "pcm_s24le",
            Self::PcmS32le => "pcm_s32le",
            Self::UnknownAudio => "unknown_audio",
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wma_格式码映射() {
        assert_eq!(CodecId::from_wave_format_tag(0x0161, 16), CodecId::WmaV2);
        assert_eq!(CodecId::from_wave_format_tag(0x0001, 16), CodecId::PcmS16le);
        assert_eq!(
            CodecId::from_wave_format_tag(0xBEEF, 16),
            CodecId::UnknownAudio
        );
    }

    #[test]
    fn test_fourcc_映射_忽略大小写() {
        assert_eq!(CodecId::from_fourcc(*b"WMV3"), CodecId::Wmv3);
        assert_eq!(CodecId::from_fourcc(*b"mp43"), CodecId::MsMpeg4v3);
        assert_eq!(CodecId::from_fourcc(*b"ZZZZ"), CodecId::UnknownVideo);
    }

    #[test]
    fn test_媒体类型() {
        assert_eq!(CodecId::Wmv2.media_type(), MediaType::Video);
        assert_eq!(CodecId::WmaV2.media_type(), MediaType::Audio);
    }
}
