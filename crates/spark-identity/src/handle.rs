//! 全局句柄契约：跨 Locality 唯一标识一个受管对象的 128 位值类型。
//!
//! # 设计动机（Why）
//! - 分布式对象需要一个可自由复制、按值传递的身份标识，且必须能在网络上以固定格式往返；
//! - 将 128 位拆分为 `msb`/`lsb` 两个 `u64`，与线上两整数表示保持一一对应，避免平台相关的 `u128` 布局问题；
//! - `msb` 的高位同时承载 Locality 前缀与信用额度位，后者只允许通过 [`crate::credit`] 中的命名操作读写。
//!
//! # 契约说明（What）
//! - 全零值是唯一的“无效”哨兵，对应布尔假；其余任意值均为真；
//! - 相等性为两半的精确逐位比较，排序等价于 128 位无符号整数比较；
//! - 所有算术运算把两半视为一个 128 位无符号整数，按 2^128 回绕，且永不修改操作数。

use core::{
    fmt,
    ops::{Add, AddAssign, Sub},
};

use serde::{Deserialize, Serialize};

use crate::address::LocalityId;

/// Locality 前缀在 `msb` 中的起始位。
///
/// 前缀存储 `locality + 1`，因此值为 0 表示“未归属任何 Locality”。
pub const LOCALITY_SHIFT: u32 = 32;

/// `msb` 中 Locality 前缀占用的位。
pub const LOCALITY_MASK: u64 = !0u64 << LOCALITY_SHIFT;

/// 128 位分布式对象标识。
///
/// # 教案式说明
/// - **意图 (Why)**：在不触达网络的情况下复制、比较、排序对象身份；信用额度编码在高位，
///   使句柄副本本身携带引用计数权益，避免每次复制都发生远程往返。
/// - **契约 (What)**：
///   - `msb`/`lsb` 合起来组成 128 位值，线上顺序固定为 `(msb, lsb)`；
///   - 序列化时以二元组 `(msb, lsb)` 出现，保证逐位往返；
///   - [`Default`] 返回 [`GlobalHandle::INVALID`]。
/// - **风险 (Trade-offs)**：算术运算会把信用位当作普通数值位参与进位；调用方在做区间运算前
///   应先通过 [`crate::credit::strip_internal_bits`] 取得纯身份值。
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(u64, u64)", into = "(u64, u64)")]
pub struct GlobalHandle {
    msb: u64,
    lsb: u64,
}

impl GlobalHandle {
    /// 无效句柄哨兵 `(0, 0)`。
    pub const INVALID: GlobalHandle = GlobalHandle::new(0, 0);

    /// 由高低两半构造句柄。
    pub const fn new(msb: u64, lsb: u64) -> Self {
        Self { msb, lsb }
    }

    /// 仅以低 64 位构造句柄，高位清零。
    pub const fn from_lsb(lsb: u64) -> Self {
        Self { msb: 0, lsb }
    }

    /// 由 128 位整数构造句柄。
    pub const fn from_u128(value: u128) -> Self {
        Self {
            msb: (value >> 64) as u64,
            lsb: value as u64,
        }
    }

    /// 以 128 位整数视图读取句柄。
    pub const fn as_u128(self) -> u128 {
        ((self.msb as u128) << 64) | self.lsb as u128
    }

    /// 高 64 位。
    pub const fn msb(self) -> u64 {
        self.msb
    }

    /// 低 64 位。
    pub const fn lsb(self) -> u64 {
        self.lsb
    }

    /// 覆写高 64 位。
    pub fn set_msb(&mut self, msb: u64) {
        self.msb = msb;
    }

    /// 覆写低 64 位。
    pub fn set_lsb(&mut self, lsb: u64) {
        self.lsb = lsb;
    }

    /// 任一半非零即为有效句柄。
    pub const fn is_nonzero(self) -> bool {
        self.msb != 0 || self.lsb != 0
    }

    /// 返回加一后的新值，不修改 `self`。
    ///
    /// `lsb == u64::MAX` 时进位到 `msb`；`(u64::MAX, u64::MAX)` 回绕为 `(0, 0)`。
    #[must_use]
    pub const fn next(self) -> Self {
        let (lsb, carry) = self.lsb.overflowing_add(1);
        Self {
            msb: if carry { self.msb.wrapping_add(1) } else { self.msb },
            lsb,
        }
    }

    /// 前置自增：原地加一并返回**新**值。
    pub fn pre_increment(&mut self) -> Self {
        *self = self.next();
        *self
    }

    /// 后置自增：原地加一并返回**原**值。
    pub fn post_increment(&mut self) -> Self {
        let original = *self;
        *self = original.next();
        original
    }

    /// 线上表示：固定顺序的 `(msb, lsb)`。
    pub const fn to_wire(self) -> (u64, u64) {
        (self.msb, self.lsb)
    }

    /// 由线上表示还原句柄。
    pub const fn from_wire(wire: (u64, u64)) -> Self {
        Self::new(wire.0, wire.1)
    }

    /// 构造某个 Locality 的前缀句柄（身份位与信用位全部为零）。
    ///
    /// # 契约说明（What）
    /// - 前缀存储 `locality + 1`，保证 Locality 0 的前缀句柄依旧非零；
    /// - [`LocalityId::INVALID`]（`u32::MAX`）的前缀超出 32 位，返回 [`GlobalHandle::INVALID`]，
    ///   其 [`GlobalHandle::locality_id`] 为 `None`；
    /// - 返回值常作为身份分配器的起点，不直接代表任何对象。
    pub const fn for_locality(locality: LocalityId) -> Self {
        if !locality.is_valid() {
            return Self::INVALID;
        }
        Self {
            msb: ((locality.get() as u64) + 1) << LOCALITY_SHIFT,
            lsb: 0,
        }
    }

    /// 解析句柄所属 Locality；前缀为零时返回 `None`。
    pub const fn locality_id(self) -> Option<LocalityId> {
        let prefix = self.msb >> LOCALITY_SHIFT;
        if prefix == 0 {
            None
        } else {
            Some(LocalityId::new((prefix - 1) as u32))
        }
    }
}

impl From<u64> for GlobalHandle {
    fn from(lsb: u64) -> Self {
        Self::from_lsb(lsb)
    }
}

impl From<(u64, u64)> for GlobalHandle {
    fn from(wire: (u64, u64)) -> Self {
        Self::from_wire(wire)
    }
}

impl From<GlobalHandle> for (u64, u64) {
    fn from(handle: GlobalHandle) -> Self {
        handle.to_wire()
    }
}

impl From<GlobalHandle> for bool {
    fn from(handle: GlobalHandle) -> Self {
        handle.is_nonzero()
    }
}

impl Add for GlobalHandle {
    type Output = GlobalHandle;

    fn add(self, rhs: GlobalHandle) -> GlobalHandle {
        let (lsb, carry) = self.lsb.overflowing_add(rhs.lsb);
        let msb = self
            .msb
            .wrapping_add(rhs.msb)
            .wrapping_add(u64::from(carry));
        GlobalHandle { msb, lsb }
    }
}

impl Add<u64> for GlobalHandle {
    type Output = GlobalHandle;

    fn add(self, rhs: u64) -> GlobalHandle {
        self + GlobalHandle::from_lsb(rhs)
    }
}

impl AddAssign for GlobalHandle {
    fn add_assign(&mut self, rhs: GlobalHandle) {
        *self = *self + rhs;
    }
}

impl AddAssign<u64> for GlobalHandle {
    fn add_assign(&mut self, rhs: u64) {
        *self = *self + rhs;
    }
}

impl Sub for GlobalHandle {
    type Output = GlobalHandle;

    fn sub(self, rhs: GlobalHandle) -> GlobalHandle {
        let (lsb, borrow) = self.lsb.overflowing_sub(rhs.lsb);
        let msb = self
            .msb
            .wrapping_sub(rhs.msb)
            .wrapping_sub(u64::from(borrow));
        GlobalHandle { msb, lsb }
    }
}

impl fmt::Display for GlobalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.msb, self.lsb)
    }
}

impl fmt::LowerHex for GlobalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Debug for GlobalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GlobalHandle(msb: {:#x}, lsb: {:#x})", self.msb, self.lsb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locality_prefix_round_trips() {
        let locality = LocalityId::new(0);
        let prefix = GlobalHandle::for_locality(locality);
        assert!(prefix.is_nonzero(), "Locality 0 的前缀也必须非零");
        assert_eq!(prefix.locality_id(), Some(locality));
        assert_eq!((prefix + 42).locality_id(), Some(locality));
        assert_eq!(GlobalHandle::from_lsb(7).locality_id(), None);
    }

    #[test]
    fn highest_locality_prefix_is_representable() {
        let highest = LocalityId::new(u32::MAX - 1);
        let prefix = GlobalHandle::for_locality(highest);
        assert_eq!(prefix.msb(), LOCALITY_MASK, "最大有效 Locality 占满前缀位");
        assert_eq!(prefix.locality_id(), Some(highest));

        let invalid = GlobalHandle::for_locality(LocalityId::INVALID);
        assert_eq!(invalid, GlobalHandle::INVALID, "无效 Locality 不得回绕进其他前缀");
        assert_eq!(invalid.locality_id(), None);
    }

    #[test]
    fn subtraction_borrows_across_halves() {
        let a = GlobalHandle::new(1, 0);
        let b = GlobalHandle::from_lsb(1);
        assert_eq!(a - b, GlobalHandle::new(0, u64::MAX));
        assert_eq!(GlobalHandle::INVALID - b, GlobalHandle::new(u64::MAX, u64::MAX));
    }

    #[test]
    fn display_is_zero_padded_hex() {
        let gid = GlobalHandle::new(0xde, 0xad);
        assert_eq!(gid.to_string(), "00000000000000de00000000000000ad");
        assert_eq!(format!("{gid:x}"), gid.to_string());
    }

    #[test]
    fn u128_view_matches_halves() {
        let gid = GlobalHandle::from_u128(0x0123_4567_89ab_cdef_fedc_ba98_7654_3210);
        assert_eq!(gid.msb(), 0x0123_4567_89ab_cdef);
        assert_eq!(gid.lsb(), 0xfedc_ba98_7654_3210);
        assert_eq!(GlobalHandle::from_u128(gid.as_u128()), gid);
    }
}
