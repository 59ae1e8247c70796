//! # tao-core
//!
//! Tao 多媒体框架核心库, 提供基础类型定义、错误处理和时间戳工具.

pub mod error;
pub mod media_type;
pub mod timestamp;

// 重导出常用类型
pub use error::{TaoError, TaoResult};
pub use media_type::MediaType;
