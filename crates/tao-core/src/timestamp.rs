//! 时间戳工具.
//!
//! 解封装输出的显示时间戳 (PTS) 统一使用 90kHz 时钟,
//! 容器内部时间戳为毫秒, 文件时长为 100 纳秒单位.

/// 表示"未定义"的时间戳值
pub const NOPTS_VALUE: i64 = i64::MIN;

/// PTS 时钟频率 (Hz)
pub const PTS_CLOCK_HZ: i64 = 90_000;

/// 每毫秒对应的 PTS 刻度数
pub const PTS_PER_MS: i64 = PTS_CLOCK_HZ / 1000;

/// 毫秒转换为 90kHz PTS
pub const fn ms_to_pts(ms: i64) -> i64 {
    ms * PTS_PER_MS
}

/// 90kHz PTS 转换为秒
///
/// 未定义的时间戳返回 `f64::NAN`.
pub fn pts_to_seconds(pts: i64) -> f64 {
    if pts == NOPTS_VALUE {
        return f64::NAN;
    }
    pts as f64 / PTS_CLOCK_HZ as f64
}

/// 100 纳秒单位转换为毫秒
pub const fn hns_to_ms(hns: u64) -> u64 {
    hns / 10_000
}
