//! 统一错误类型定义.
//!
//! 所有 Tao crate 共用的错误类型, 支持跨模块传播.
//!
//! 解封装过程中可恢复的异常 (如单个数据包损坏) 不通过错误类型传播,
//! 而是由各解析步骤返回显式的结果枚举; 这里只包含会终止当前操作的错误.

use thiserror::Error;

/// Tao 框架统一错误类型
#[derive(Debug, Error)]
pub enum TaoError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 已到达流末尾 (短读)
    #[error("已到达流末尾")]
    Eof,

    /// 未找到指定的流
    #[error("未找到流: 索引 {0}")]
    StreamNotFound(usize),

    /// 无效数据 (损坏的容器头部等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 会话尚未打开
    #[error("会话尚未打开")]
    NotOpened,
}

/// Tao 框架统一 Result 类型
pub type TaoResult<T> = Result<T, TaoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_错误转换() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short");
        let err: TaoError = io_err.into();
        assert!(matches!(err, TaoError::Io(_)));
    }

    #[test]
    fn test_错误信息() {
        let err = TaoError::InvalidData("对象大小小于 24".into());
        assert_eq!(err.to_string(), "无效数据: 对象大小小于 24");
        assert_eq!(TaoError::Eof.to_string(), "已到达流末尾");
    }
}
