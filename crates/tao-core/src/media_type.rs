//! 媒体类型定义.

use std::fmt;

/// 媒体流类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// 视频流
    Video,
    /// 音频流
    Audio,
    /// 控制/命令流 (如脚本命令)
    Control,
}

impl MediaType {
    /// 是否为视频流
    pub const fn is_video(&self) -> bool {
        matches!(self, Self::Video)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Video => "视频",
            Self::Audio => "音频",
            Self::Control => "控制",
        };
        write!(f, "{name}")
    }
}
