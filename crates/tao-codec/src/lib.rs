//! # tao-codec
//!
//! Tao 多媒体框架编解码器层, 提供编解码器标识与压缩数据块抽象.
//!
//! 解封装器只负责把容器中的压缩数据切分为 [`Packet`] 并标明目标
//! [`CodecId`], 负载本身的解码不在本 crate 范围内.

pub mod codec_id;
pub mod packet;

// 重导出常用类型
pub use codec_id::CodecId;
pub use packet::{Packet, PacketFlags};
