//! 音频交织还原.
//!
//! 编码端为抵抗突发错误, 把 h 行 w 列的 b 字节块按行写入、按列发送.
//! 这里按块做转置, 把数据恢复为原始顺序.

/// 交织参数 (行数, 列数, 块大小)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterleaveParams {
    pub rows: usize,
    pub columns: usize,
    pub block: usize,
}

impl InterleaveParams {
    /// 从 "audio spread" 纠错数据构造
    ///
    /// `span` 为行数, `packet_len / chunk_len` 为列数, `chunk_len` 为块大小.
    /// 行数或列数不大于 1 时不需要还原, 返回 None.
    pub fn from_audio_spread(span: u8, packet_len: u16, chunk_len: u16) -> Option<Self> {
        if chunk_len == 0 {
            return None;
        }
        let params = Self {
            rows: usize::from(span),
            columns: usize::from(packet_len / chunk_len),
            block: usize::from(chunk_len),
        };
        (params.rows > 1 && params.columns > 1).then_some(params)
    }

    /// 一个完整交织单元的字节数
    pub fn unit_len(&self) -> usize {
        self.rows * self.columns * self.block
    }

    /// 原地还原交织, 不足一个单元的尾部保持不变
    pub fn deinterleave(&self, buf: &mut [u8]) {
        let unit = self.unit_len();
        if unit == 0 || buf.len() < unit {
            return;
        }
        let mut scratch = vec![0u8; unit];
        for chunk in buf.chunks_exact_mut(unit) {
            let mut out = 0;
            for x in 0..self.columns {
                for y in 0..self.rows {
                    let src = (y * self.columns + x) * self.block;
                    scratch[out..out + self.block].copy_from_slice(&chunk[src..src + self.block]);
                    out += self.block;
                }
            }
            chunk.copy_from_slice(&scratch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_2x2_转置() {
        let params = InterleaveParams {
            rows: 2,
            columns: 2,
            block: 1,
        };
        let mut buf = *b"ABCD";
        params.deinterleave(&mut buf);
        assert_eq!(&buf, b"ACBD");
    }

    #[test]
    fn test_非方阵多字节块() {
        // 2 行 3 列, 块大小 2
        let params = InterleaveParams {
            rows: 2,
            columns: 3,
            block: 2,
        };
        let mut buf = *b"a0b0c0d0e0f0";
        params.deinterleave(&mut buf);
        assert_eq!(&buf, b"a0d0b0e0c0f0");
    }

    #[test]
    fn test_尾部不足一个单元保持不变() {
        let params = InterleaveParams {
            rows: 2,
            columns: 2,
            block: 1,
        };
        let mut buf = *b"ABCDxyz";
        params.deinterleave(&mut buf);
        assert_eq!(&buf, b"ACBDxyz");
    }

    #[test]
    fn test_大单元短缓冲区保持不变() {
        let params = InterleaveParams::from_audio_spread(255, 65535, 1).unwrap();
        assert_eq!(params.unit_len(), 255 * 65535);
        let mut buf = *b"short";
        params.deinterleave(&mut buf);
        assert_eq!(&buf, b"short");
    }

    #[test]
    fn test_audio_spread_参数() {
        let params = InterleaveParams::from_audio_spread(4, 1024, 256).unwrap();
        assert_eq!(params.rows, 4);
        assert_eq!(params.columns, 4);
        assert_eq!(params.block, 256);
        assert_eq!(params.unit_len(), 4096);

        assert!(InterleaveParams::from_audio_spread(1, 1024, 256).is_none());
        assert!(InterleaveParams::from_audio_spread(4, 256, 256).is_none());
        assert!(InterleaveParams::from_audio_spread(4, 1024, 0).is_none());
    }
}
