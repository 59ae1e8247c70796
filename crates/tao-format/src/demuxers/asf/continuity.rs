//! 时间戳连续性跟踪.
//!
//! 按媒体类别记录最近的时间戳, 发现跳变或 seek 后第一个时间戳时
//! 产生不连续通知, 同时用视频帧结束块的时间戳差平滑估计帧时长.

use log::debug;

/// 允许的最大时间戳跳变 (90kHz, 5 秒)
pub const WRAP_THRESHOLD: i64 = 450_000;

/// 帧时长初始估计 (90kHz, 对应 30fps)
pub const INITIAL_FRAME_DURATION: i64 = 3000;

/// 时间戳类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtsClass {
    Audio = 0,
    Video = 1,
}

impl PtsClass {
    fn other(self) -> Self {
        match self {
            Self::Audio => Self::Video,
            Self::Video => Self::Audio,
        }
    }
}

/// 不连续通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discontinuity {
    pub pts: i64,
    pub seek: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    None,
    Plain,
    Seek,
}

/// 连续性跟踪器
#[derive(Debug, Clone)]
pub struct ContinuityTracker {
    last_pts: [i64; 2],
    pending: Pending,
    frame_duration: i64,
    last_frame_pts: i64,
}

impl ContinuityTracker {
    pub fn new() -> Self {
        Self {
            last_pts: [0; 2],
            pending: Pending::None,
            frame_duration: INITIAL_FRAME_DURATION,
            last_frame_pts: 0,
        }
    }

    /// 标记下一个有效时间戳必须发出不连续通知
    pub fn mark_pending(&mut self, seek: bool) {
        self.pending = if seek { Pending::Seek } else { Pending::Plain };
    }

    /// 是否有待发出的不连续通知
    pub fn is_pending(&self) -> bool {
        self.pending != Pending::None
    }

    /// 处理一个数据块的时间戳 (0 表示无时间戳)
    pub fn observe(&mut self, pts: i64, class: PtsClass, frame_end: bool) -> Option<Discontinuity> {
        if pts == 0 {
            return None;
        }

        let slot = class as usize;
        let diff = pts - self.last_pts[slot];
        let mut event = None;
        if self.pending != Pending::None
            || (self.last_pts[slot] != 0 && diff.abs() > WRAP_THRESHOLD)
        {
            let seek = self.pending == Pending::Seek;
            debug!("ASF: 时间戳不连续, pts={pts}, class={class:?}, diff={diff}, seek={seek}");
            event = Some(Discontinuity { pts, seek });
            self.pending = Pending::None;
            self.last_pts[class.other() as usize] = 0;
        }
        self.last_pts[slot] = pts;

        if class == PtsClass::Video && frame_end {
            if self.last_frame_pts != 0 {
                let diff = pts - self.last_frame_pts;
                if diff > 0 && diff < WRAP_THRESHOLD {
                    self.frame_duration = (15 * self.frame_duration + diff) / 16;
                }
            }
            self.last_frame_pts = pts;
        }

        event
    }

    /// 最近一次的时间戳
    pub fn last_pts(&self, class: PtsClass) -> i64 {
        self.last_pts[class as usize]
    }

    /// 平滑后的帧时长
    pub fn frame_duration(&self) -> i64 {
        self.frame_duration
    }
}

impl Default for ContinuityTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_跳变触发不连续() {
        let mut tracker = ContinuityTracker::new();
        assert_eq!(tracker.observe(90_000, PtsClass::Audio, false), None);
        assert_eq!(tracker.observe(1_000_000, PtsClass::Video, false), None);
        let event = tracker.observe(2_000_000, PtsClass::Video, false);
        assert_eq!(
            event,
            Some(Discontinuity {
                pts: 2_000_000,
                seek: false
            })
        );
        assert_eq!(tracker.last_pts(PtsClass::Audio), 0);
        assert_eq!(tracker.last_pts(PtsClass::Video), 2_000_000);
    }

    #[test]
    fn test_小幅变化不触发() {
        let mut tracker = ContinuityTracker::new();
        tracker.observe(1_000_000, PtsClass::Video, false);
        assert_eq!(tracker.observe(1_400_000, PtsClass::Video, false), None);
        assert_eq!(tracker.observe(1_000_000, PtsClass::Video, false), None);
    }

    #[test]
    fn test_seek_标记只触发一次() {
        let mut tracker = ContinuityTracker::new();
        tracker.mark_pending(true);
        // 无时间戳的块不消耗待发标记
        assert_eq!(tracker.observe(0, PtsClass::Audio, false), None);
        assert!(tracker.is_pending());
        assert_eq!(
            tracker.observe(9000, PtsClass::Audio, false),
            Some(Discontinuity {
                pts: 9000,
                seek: true
            })
        );
        assert!(!tracker.is_pending());
        assert_eq!(tracker.observe(9090, PtsClass::Audio, false), None);
    }

    #[test]
    fn test_帧时长平滑() {
        let mut tracker = ContinuityTracker::new();
        tracker.observe(90_000, PtsClass::Video, true);
        assert_eq!(tracker.frame_duration(), INITIAL_FRAME_DURATION);
        tracker.observe(93_600, PtsClass::Video, true);
        // (15 * 3000 + 3600) / 16
        assert_eq!(tracker.frame_duration(), 3037);
        // 非帧结束块不参与估计
        tracker.observe(200_000, PtsClass::Video, false);
        assert_eq!(tracker.frame_duration(), 3037);
    }
}
