//! # tao-format
//!
//! Tao 多媒体框架容器格式库, 提供字节源抽象与解封装框架.
//!
//! 当前内置的容器格式为 ASF (WMA/WMV), 见 [`demuxers::asf`].

pub mod demuxer;
pub mod demuxers;
pub mod io;
pub mod probe;
pub mod stream;

// 重导出常用类型
pub use demuxer::{ControlEvent, Demuxer, SeekTarget};
pub use demuxers::asf::{AsfDemuxer, AsfDemuxerOptions, AsfProbe, DemuxStats, PayloadOutcome};
pub use io::IoContext;
pub use probe::{FormatProbe, ProbeScore};
pub use stream::Stream;
