//! # Tao (道) ASF
//!
//! 纯 Rust 实现的 ASF (WMA / WMV) 解封装框架.
//!
//! 从可能只支持顺序读取的字节源中解析 ASF 头部, 拉取物理数据包,
//! 把负载分片重组为各流的完整帧并附上 90kHz 显示时间戳.
//! 损坏的数据包只影响自身, 会话会在下一个包边界重新同步.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use tao::format::{AsfDemuxerOptions, Demuxer};
//!
//! let (mut demuxer, mut io) = tao::open_file("song.wma", AsfDemuxerOptions::default())?;
//! while let Ok(packet) = demuxer.read_packet(&mut io) {
//!     println!("流 #{} {} 字节", packet.stream_index, packet.size());
//! }
//! # Ok::<(), tao::core::TaoError>(())
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `tao-core` | 错误类型, 媒体类型, 时间戳工具 |
//! | `tao-codec` | 编解码器标识与数据块 |
//! | `tao-format` | 字节源, 解封装框架与 ASF 解封装器 |

use log::debug;

/// 核心类型与工具
pub use tao_core as core;

/// 编解码器标识与数据块
pub use tao_codec as codec;

/// 字节源与解封装框架
pub use tao_format as format;

use tao_core::TaoResult;
use tao_format::{AsfDemuxer, AsfDemuxerOptions, Demuxer, IoContext};

/// 获取 Tao 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 打开 ASF 文件并解析头部
pub fn open_file(path: &str, options: AsfDemuxerOptions) -> TaoResult<(AsfDemuxer, IoContext)> {
    let mut io = IoContext::open_read(path)?;
    let demuxer = open_io(&mut io, options)?;
    debug!("已打开 {path}, {} 个流", demuxer.streams().len());
    Ok((demuxer, io))
}

/// 在已有字节源上创建解封装器并解析头部
pub fn open_io(io: &mut IoContext, options: AsfDemuxerOptions) -> TaoResult<AsfDemuxer> {
    let mut demuxer = AsfDemuxer::with_options(options);
    demuxer.open(io)?;
    Ok(demuxer)
}
