//! ASF 对象类型标识 (GUID) 注册表.
//!
//! 文件中的 GUID 以 Windows 混合字节序存储: 前三个字段为小端,
//! 最后 8 字节按原样存放. 未登记的 GUID 解析为 [`GuidKind::Unknown`].

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

/// 16 字节类型标识
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    /// 从文件中的 16 字节解析
    pub fn from_bytes(raw: &[u8; 16]) -> Self {
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&raw[8..16]);
        Self {
            data1: LittleEndian::read_u32(&raw[0..4]),
            data2: LittleEndian::read_u16(&raw[4..6]),
            data3: LittleEndian::read_u16(&raw[6..8]),
            data4,
        }
    }

    /// 转换为文件中的 16 字节表示
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut raw = [0u8; 16];
        LittleEndian::write_u32(&mut raw[0..4], self.data1);
        LittleEndian::write_u16(&mut raw[4..6], self.data2);
        LittleEndian::write_u16(&mut raw[6..8], self.data3);
        raw[8..16].copy_from_slice(&self.data4);
        raw
    }

    /// 查询对象类型
    pub fn kind(&self) -> GuidKind {
        GuidKind::lookup(self)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({self})")
    }
}

/// 已知的对象类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuidKind {
    // 顶层对象
    Header,
    Data,
    SimpleIndex,

    // 头部子对象
    FileProperties,
    StreamProperties,
    StreamBitrateProperties,
    ContentDescription,
    ExtendedContentEncryption,
    ScriptCommand,
    Marker,
    HeaderExtension,
    BitrateMutualExclusion,
    CodecList,
    ExtendedContentDescription,
    ErrorCorrection,
    Padding,

    // 流类型
    AudioMedia,
    VideoMedia,
    CommandMedia,

    // 纠错类型
    NoErrorCorrection,
    AudioSpread,

    // 互斥类型
    MutexBitrate,
    MutexUnknown,

    // 其他
    Reserved1,
    ReservedScriptCommand,
    ReservedMarker,
    AudioConcealNone,
    CodecCommentHeader,
    Asf2Header,

    /// 未登记的标识
    Unknown,
}

const ASF_MS: [u8; 8] = [0xa6, 0xd9, 0x00, 0xaa, 0x00, 0x62, 0xce, 0x6c];
const ASF_MEDIA: [u8; 8] = [0xa8, 0xfd, 0x00, 0x80, 0x5f, 0x5c, 0x44, 0x2b];
const ASF_HDR: [u8; 8] = [0x8e, 0xe6, 0x00, 0xc0, 0x0c, 0x20, 0x53, 0x65];
const ASF_MUTEX: [u8; 8] = [0x90, 0x34, 0x00, 0xa0, 0xc9, 0x03, 0x49, 0xbe];
const ASF_CMD: [u8; 8] = [0xa3, 0xac, 0x00, 0xa0, 0xc9, 0x03, 0x48, 0xf6];

/// 标识注册表
static GUID_TABLE: &[(GuidKind, Guid)] = &[
    (GuidKind::Header, Guid::new(0x75b2_2630, 0x668e, 0x11cf, ASF_MS)),
    (GuidKind::Data, Guid::new(0x75b2_2636, 0x668e, 0x11cf, ASF_MS)),
    (
        GuidKind::SimpleIndex,
        Guid::new(0x3300_0890, 0xe5b1, 0x11cf, [0x89, 0xf4, 0x00, 0xa0, 0xc9, 0x03, 0x49, 0xcb]),
    ),
    (
        GuidKind::FileProperties,
        Guid::new(0x8cab_dca1, 0xa947, 0x11cf, [0x8e, 0xe4, 0x00, 0xc0, 0x0c, 0x20, 0x53, 0x65]),
    ),
    (GuidKind::StreamProperties, Guid::new(0xb7dc_0791, 0xa9b7, 0x11cf, ASF_HDR)),
    (
        GuidKind::StreamBitrateProperties,
        Guid::new(0x7bf8_75ce, 0x468d, 0x11d1, [0x8d, 0x82, 0x00, 0x60, 0x97, 0xc9, 0xa2, 0xb2]),
    ),
    (GuidKind::ContentDescription, Guid::new(0x75b2_2633, 0x668e, 0x11cf, ASF_MS)),
    (
        GuidKind::ExtendedContentEncryption,
        Guid::new(0x298a_e614, 0x2622, 0x4c17, [0xb9, 0x35, 0xda, 0xe0, 0x7e, 0xe9, 0x28, 0x9c]),
    ),
    (
        GuidKind::ScriptCommand,
        Guid::new(0x1efb_1a30, 0x0b62, 0x11d0, [0xa3, 0x9b, 0x00, 0xa0, 0xc9, 0x03, 0x48, 0xf6]),
    ),
    (GuidKind::Marker, Guid::new(0xf487_cd01, 0xa951, 0x11cf, ASF_HDR)),
    (
        GuidKind::HeaderExtension,
        Guid::new(0x5fbf_03b5, 0xa92e, 0x11cf, [0x8e, 0xe3, 0x00, 0xc0, 0x0c, 0x20, 0x53, 0x65]),
    ),
    (GuidKind::BitrateMutualExclusion, Guid::new(0xd6e2_29dc, 0x35da, 0x11d1, ASF_MUTEX)),
    (
        GuidKind::CodecList,
        Guid::new(0x86d1_5240, 0x311d, 0x11d0, [0xa3, 0xa4, 0x00, 0xa0, 0xc9, 0x03, 0x48, 0xf6]),
    ),
    (
        GuidKind::ExtendedContentDescription,
        Guid::new(0xd2d0_a440, 0xe307, 0x11d2, [0x97, 0xf0, 0x00, 0xa0, 0xc9, 0x5e, 0xa8, 0x50]),
    ),
    (GuidKind::ErrorCorrection, Guid::new(0x75b2_2635, 0x668e, 0x11cf, ASF_MS)),
    (
        GuidKind::Padding,
        Guid::new(0x1806_d474, 0xcadf, 0x4509, [0xa4, 0xba, 0x9a, 0xab, 0xcb, 0x96, 0xaa, 0xe8]),
    ),
    (GuidKind::AudioMedia, Guid::new(0xf869_9e40, 0x5b4d, 0x11cf, ASF_MEDIA)),
    (GuidKind::VideoMedia, Guid::new(0xbc19_efc0, 0x5b4d, 0x11cf, ASF_MEDIA)),
    (GuidKind::CommandMedia, Guid::new(0x59da_cfc0, 0x59e6, 0x11d0, ASF_CMD)),
    (GuidKind::NoErrorCorrection, Guid::new(0x20fb_5700, 0x5b55, 0x11cf, ASF_MEDIA)),
    (
        GuidKind::AudioSpread,
        Guid::new(0xbfc3_cd50, 0x618f, 0x11cf, [0x8b, 0xb2, 0x00, 0xaa, 0x00, 0xb4, 0xe2, 0x20]),
    ),
    (GuidKind::MutexBitrate, Guid::new(0xd6e2_2a01, 0x35da, 0x11d1, ASF_MUTEX)),
    (GuidKind::MutexUnknown, Guid::new(0xd6e2_2a02, 0x35da, 0x11d1, ASF_MUTEX)),
    (GuidKind::Reserved1, Guid::new(0xabd3_d211, 0xa9ba, 0x11cf, ASF_HDR)),
    (
        GuidKind::ReservedScriptCommand,
        Guid::new(0x4b1a_cbe3, 0x100b, 0x11d0, [0xa3, 0x9b, 0x00, 0xa0, 0xc9, 0x03, 0x48, 0xf6]),
    ),
    (
        GuidKind::ReservedMarker,
        Guid::new(0x4cfe_db20, 0x75f6, 0x11cf, [0x9c, 0x0f, 0x00, 0xa0, 0xc9, 0x03, 0x49, 0xcb]),
    ),
    (GuidKind::AudioConcealNone, Guid::new(0x49f1_a440, 0x4ece, 0x11d0, ASF_CMD)),
    (
        GuidKind::CodecCommentHeader,
        Guid::new(0x86d1_5241, 0x311d, 0x11d0, [0xa3, 0xa4, 0x00, 0xa0, 0xc9, 0x03, 0x48, 0xf6]),
    ),
    (GuidKind::Asf2Header, Guid::new(0xd6e2_29d1, 0x35da, 0x11d1, ASF_MUTEX)),
];

impl GuidKind {
    /// 根据标识查找对象类型
    pub fn lookup(guid: &Guid) -> Self {
        GUID_TABLE
            .iter()
            .find(|(_, g)| g == guid)
            .map_or(Self::Unknown, |(kind, _)| *kind)
    }

    /// 获取对象类型对应的标识
    pub fn guid(self) -> Option<Guid> {
        GUID_TABLE
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, g)| *g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_头部标识字节序() {
        let raw = [
            0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62,
            0xCE, 0x6C,
        ];
        let guid = Guid::from_bytes(&raw);
        assert_eq!(guid.kind(), GuidKind::Header);
        assert_eq!(guid.to_bytes(), raw);
        assert_eq!(guid.to_string(), "75B22630-668E-11CF-A6D9-00AA0062CE6C");
    }

    #[test]
    fn test_未知标识不报错() {
        let guid = Guid::from_bytes(&[0x11; 16]);
        assert_eq!(guid.kind(), GuidKind::Unknown);
        assert_eq!(GuidKind::Unknown.guid(), None);
    }

    #[test]
    fn test_注册表双向查找一致() {
        for (kind, guid) in GUID_TABLE {
            assert_eq!(GuidKind::lookup(guid), *kind);
            assert_eq!(kind.guid(), Some(*guid));
        }
    }
}
