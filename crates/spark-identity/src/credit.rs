//! 信用额度（Credit）编码与操作。
//!
//! # 设计背景（Why）
//! - 分布式引用计数若在每次句柄复制时都通知归属 Locality，将产生大量网络往返；
//!   信用拆分协议把“引用权益”直接编码进句柄副本，本地复制/丢弃无需远程交互，
//!   只有额度耗尽时才需要远程补充或释放。
//! - 位布局属于实现细节：除本模块外，任何代码都不得直接读写这些位。
//!
//! # 位布局（What）
//! `msb` 自高到低：
//!
//! ```text
//! | 63..32: locality + 1 | 31: split | 30: has-credit | 29..24: log2(credit) | 23..0: identity |
//! ```
//!
//! - 额度以 2 的幂存储，`has-credit` 置位时额度为 `2^log2`，否则为 0；
//! - `split` 标记记录该身份的额度池至少被拆分过一次，防止另一副本补充额度时重复授予；
//! - `lsb` 全部用于身份。
//!
//! # 风险提示（Trade-offs）
//! - 24 位身份高位与 64 位 `lsb` 合计足以覆盖单 Locality 的分配空间；身份分配器必须保证进位
//!   不会越过第 24 位，否则将污染信用位。

use crate::handle::GlobalHandle;

/// `log2(credit)` 字段起始位。
pub const CREDIT_SHIFT: u32 = 24;

/// `log2(credit)` 字段位宽。
pub const CREDIT_WIDTH: u32 = 6;

/// `log2(credit)` 字段的未移位掩码。
pub const CREDIT_BASE_MASK: u64 = (1 << CREDIT_WIDTH) - 1;

/// `log2(credit)` 字段掩码。
pub const CREDIT_MASK: u64 = CREDIT_BASE_MASK << CREDIT_SHIFT;

/// 额度存在标记。
pub const HAS_CREDITS_MASK: u64 = 1 << 30;

/// 拆分标记。
pub const WAS_SPLIT_MASK: u64 = 1 << 31;

/// 构成“信用计数位”的全部位：存在标记与 `log2` 字段。
pub const CREDIT_BITS_MASK: u64 = CREDIT_MASK | HAS_CREDITS_MASK;

/// 所有非身份的内部位：信用计数位与拆分标记。
pub const INTERNAL_BITS_MASK: u64 = CREDIT_BITS_MASK | WAS_SPLIT_MASK;

/// `msb` 中身份位的掩码。
pub const IDENTITY_MSB_MASK: u64 = (1 << CREDIT_SHIFT) - 1;

/// 字段能表达的最大 `log2(credit)`。
pub const MAX_CREDIT_LOG2: u8 = CREDIT_BASE_MASK as u8;

/// 默认满额度：`2^31`。
pub const DEFAULT_CREDIT_LOG2: u8 = 31;

/// 句柄是否携带额度。
pub const fn has_credits(handle: GlobalHandle) -> bool {
    handle.msb() & CREDIT_BITS_MASK != 0
}

/// 读取 `log2(credit)`；无额度时返回 `None`。
pub const fn credit_log2(handle: GlobalHandle) -> Option<u8> {
    if handle.msb() & HAS_CREDITS_MASK == 0 {
        None
    } else {
        Some(((handle.msb() & CREDIT_MASK) >> CREDIT_SHIFT) as u8)
    }
}

/// 句柄副本携带的额度单位数。
pub const fn credit_count(handle: GlobalHandle) -> u64 {
    match credit_log2(handle) {
        Some(log2) => 1u64 << log2,
        None => 0,
    }
}

/// 清除信用计数位，身份位与拆分标记保持不变。
#[must_use]
pub const fn strip_credits(handle: GlobalHandle) -> GlobalHandle {
    GlobalHandle::new(handle.msb() & !CREDIT_BITS_MASK, handle.lsb())
}

/// 以默认满额度 [`DEFAULT_CREDIT_LOG2`] 补充额度。
#[must_use]
pub const fn replenish_credits(handle: GlobalHandle) -> GlobalHandle {
    replenish_credits_with(handle, DEFAULT_CREDIT_LOG2)
}

/// 以指定的 `log2(credit)` 补充额度，覆盖原有额度字段。
///
/// # 契约说明（What）
/// - `log2` 超过 [`MAX_CREDIT_LOG2`] 时按字段宽度截断；配置层在加载时已拒绝此类取值；
/// - 拆分标记原样保留。
#[must_use]
pub const fn replenish_credits_with(handle: GlobalHandle, log2: u8) -> GlobalHandle {
    let field = ((log2 as u64) & CREDIT_BASE_MASK) << CREDIT_SHIFT;
    let msb = (handle.msb() & !CREDIT_BITS_MASK) | field | HAS_CREDITS_MASK;
    GlobalHandle::new(msb, handle.lsb())
}

/// 设置拆分标记。
#[must_use]
pub const fn mark_split(handle: GlobalHandle) -> GlobalHandle {
    GlobalHandle::new(handle.msb() | WAS_SPLIT_MASK, handle.lsb())
}

/// 读取拆分标记。
pub const fn was_split(handle: GlobalHandle) -> bool {
    handle.msb() & WAS_SPLIT_MASK != 0
}

/// 去除全部内部位，只保留 Locality 前缀与身份位；目录查找以此形式作为键。
#[must_use]
pub const fn strip_internal_bits(handle: GlobalHandle) -> GlobalHandle {
    GlobalHandle::new(handle.msb() & !INTERNAL_BITS_MASK, handle.lsb())
}

/// 两个句柄是否指向同一身份（忽略额度与拆分标记）。
pub const fn same_identity(lhs: GlobalHandle, rhs: GlobalHandle) -> bool {
    let lhs = strip_internal_bits(lhs);
    let rhs = strip_internal_bits(rhs);
    lhs.msb() == rhs.msb() && lhs.lsb() == rhs.lsb()
}

/// 将句柄额度一分为二。
///
/// # 教案式说明
/// - **意图 (Why)**：把句柄交给另一方时，本地无需联系目录即可让双方各持一半权益；
/// - **契约 (What)**：返回 `(保留副本, 转出副本)`，二者 `log2` 均减一且都带拆分标记；
///   额度仅剩一个单位（`log2 == 0`）或不带额度时返回 `None`，调用方需远程补充；
/// - **执行 (How)**：两半额度之和恒等于原额度，因此目录侧的计数无需调整。
pub fn split_credits(handle: GlobalHandle) -> Option<(GlobalHandle, GlobalHandle)> {
    let log2 = credit_log2(handle)?;
    if log2 == 0 {
        return None;
    }
    let half = mark_split(replenish_credits_with(handle, log2 - 1));
    Some((half, half))
}
