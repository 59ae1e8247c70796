//! 解封装器 (Demuxer) trait 定义.
//!
//! 定义了从容器格式中读取数据块的拉取式接口, 以及解封装过程中
//! 向下游发出的控制信号.

use tao_codec::Packet;
use tao_core::TaoResult;

use crate::io::IoContext;
use crate::stream::Stream;

/// 解封装器 trait
///
/// 从容器格式中读取压缩数据块. 所有格式的解封装器都实现此 trait.
///
/// 使用流程:
/// 1. 调用 `open()` 打开容器并解析头部
/// 2. 调用 `streams()` 获取流信息
/// 3. 循环调用 `read_packet()` 读取数据块, 期间用 `take_events()` 取走控制信号
/// 4. 可选: 调用 `seek()` 进行定位
pub trait Demuxer: Send {
    /// 获取格式名称
    fn name(&self) -> &str;

    /// 打开容器并解析头部信息
    ///
    /// 读取容器头部, 解析出所有流的信息.
    fn open(&mut self, io: &mut IoContext) -> TaoResult<()>;

    /// 获取所有流信息
    fn streams(&self) -> &[Stream];

    /// 读取下一个数据块
    ///
    /// # 返回
    /// - `Ok(packet)`: 成功读取一个数据块
    /// - `Err(TaoError::Eof)`: 已到达输入末尾, 会话结束
    fn read_packet(&mut self, io: &mut IoContext) -> TaoResult<Packet>;

    /// 定位到指定位置
    ///
    /// 无论字节源是否支持随机访问, 内部的重组与时间戳状态都会被复位.
    fn seek(&mut self, io: &mut IoContext, target: SeekTarget) -> TaoResult<()>;

    /// 获取容器时长 (秒), None 表示未知
    fn duration(&self) -> Option<f64>;

    /// 获取容器元数据
    fn metadata(&self) -> &[(String, String)] {
        &[]
    }

    /// 取走自上次调用以来产生的控制信号
    fn take_events(&mut self) -> Vec<ControlEvent> {
        Vec::new()
    }
}

/// Seek 目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekTarget {
    /// 按时间 (毫秒) 定位, 通过平均字节率换算为字节偏移
    Time(u64),
    /// 按字节偏移定位
    Byte(u64),
}

/// 控制信号
///
/// 与数据块分开传递, 用于通知下游会话开始、时间戳不连续和清空缓冲.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// 会话开始 (头部解析成功后)
    Start,
    /// 时间戳不连续, 下游应以 `pts` 为新的时间基准
    NewPts {
        /// 新的 90kHz 时间戳
        pts: i64,
        /// 是否由 seek 引起
        seek: bool,
    },
    /// 清空下游缓冲 (seek 开始时)
    Flush,
}
