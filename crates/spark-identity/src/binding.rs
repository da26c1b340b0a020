//! 目录（绑定）服务契约与进程内参考实现。
//!
//! # 模块定位（Why）
//! - 组件身份在首次被请求时注册到目录；目录把全局句柄映射到所属 Locality 内的 [`Address`]，
//!   并为每个身份维护引用权益计数，计数归零即意味着对象可被回收；
//! - 目录的内部存储与网络协议不属于本子系统，这里仅定义组件与对象池所消费的窄接口
//!   [`BindingService`]，以及供单进程部署和测试使用的 [`LocalDirectory`]。
//!
//! # 契约说明（What）
//! - 所有方法同步执行，可能阻塞调用线程直至完成；没有超时，也不可取消；
//! - `bind_*` 以 `Ok(false)` 表示重复登记，以 `Err` 表示目录自身故障（远端实现应使用
//!   [`IdentityError::BindingFailure`]），二者语义严格区分；
//! - 目录以 [`credit::strip_internal_bits`] 后的身份作为键，调用方传入带额度的句柄同样有效。

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::{
    address::{Address, LocalityId},
    credit,
    error::{IdentityError, Result},
    handle::GlobalHandle,
};

/// 目录服务契约。
pub trait BindingService: Send + Sync {
    /// 为当前 Locality 分配 `count` 个连续的新身份，返回区间下界。
    ///
    /// 返回值不携带额度；`count == 0` 时返回 `BadParameter`。
    fn next_id(&self, count: u64) -> Result<GlobalHandle>;

    /// 在当前 Locality 登记新分配的身份；身份已登记时返回 `Ok(false)`。
    fn bind_local(&self, handle: GlobalHandle, address: &Address) -> Result<bool>;

    /// 把外部提供的身份（导入或迁移而来）登记到目标 Locality 的地址；重复时返回 `Ok(false)`。
    fn bind_remote(
        &self,
        handle: GlobalHandle,
        address: &Address,
        locality: LocalityId,
    ) -> Result<bool>;

    /// 把 `[lower, lower + count)` 区间登记到连续存储：第 `i` 个身份解析为 `base.raw + i * stride`。
    fn bind_range_local(
        &self,
        lower: GlobalHandle,
        count: u64,
        base: &Address,
        stride: u64,
    ) -> Result<bool>;

    /// 归还 `credits` 个单位的引用权益；计数归零时目录可回收该对象。
    ///
    /// 析构路径中的调用为尽力而为，失败由调用方记录后忽略。
    fn unbind(&self, handle: GlobalHandle, credits: u64) -> Result<()>;

    /// 解析身份当前绑定的地址。
    fn resolve(&self, handle: GlobalHandle) -> Option<Address>;
}

impl<T: BindingService + ?Sized> BindingService for Arc<T> {
    fn next_id(&self, count: u64) -> Result<GlobalHandle> {
        (**self).next_id(count)
    }

    fn bind_local(&self, handle: GlobalHandle, address: &Address) -> Result<bool> {
        (**self).bind_local(handle, address)
    }

    fn bind_remote(
        &self,
        handle: GlobalHandle,
        address: &Address,
        locality: LocalityId,
    ) -> Result<bool> {
        (**self).bind_remote(handle, address, locality)
    }

    fn bind_range_local(
        &self,
        lower: GlobalHandle,
        count: u64,
        base: &Address,
        stride: u64,
    ) -> Result<bool> {
        (**self).bind_range_local(lower, count, base, stride)
    }

    fn unbind(&self, handle: GlobalHandle, credits: u64) -> Result<()> {
        (**self).unbind(handle, credits)
    }

    fn resolve(&self, handle: GlobalHandle) -> Option<Address> {
        (**self).resolve(handle)
    }
}

/// 单个身份的登记信息。
#[derive(Clone, Copy, Debug)]
struct Binding {
    address: Address,
    tally: u64,
}

/// 区间登记。
#[derive(Clone, Copy, Debug)]
struct RangeBinding {
    lower: GlobalHandle,
    count: u64,
    base: Address,
    stride: u64,
}

impl RangeBinding {
    fn offset_of(&self, key: GlobalHandle) -> Option<u64> {
        let offset = key.as_u128().checked_sub(self.lower.as_u128())?;
        (offset < u128::from(self.count)).then_some(offset as u64)
    }

    fn overlaps(&self, lower: GlobalHandle, count: u64) -> bool {
        let a0 = self.lower.as_u128();
        let a1 = a0.saturating_add(u128::from(self.count));
        let b0 = lower.as_u128();
        let b1 = b0.saturating_add(u128::from(count));
        a0 < b1 && b0 < a1
    }
}

/// 进程内目录实现。
///
/// # 教案式说明
/// - **意图 (Why)**：为单 Locality 部署与测试提供完整语义的目录：身份分配、单点与区间登记、
///   引用计数与解析；
/// - **契约 (What)**：
///   - 身份从 `GlobalHandle::for_locality(locality) + 1` 起单调分配，永不复用；
///   - 单点登记的计数初值为 1（对象自身持有的单位），`unbind` 递减，归零后删除条目；
///   - 区间登记不参与计数，`unbind` 区间内的身份为空操作；
/// - **执行 (How)**：单点登记存放于 `DashMap`，区间登记数量很少，使用 `RwLock<Vec<_>>` 线性查找；
/// - **风险 (Trade-offs)**：区间与单点之间的重叠检查需要遍历，只适合参考实现的规模。
#[derive(Debug)]
pub struct LocalDirectory {
    locality: LocalityId,
    cursor: Mutex<GlobalHandle>,
    entries: DashMap<GlobalHandle, Binding>,
    ranges: RwLock<Vec<RangeBinding>>,
}

impl LocalDirectory {
    /// 为指定 Locality 创建空目录。
    ///
    /// 传入 [`LocalityId::INVALID`] 时分配的身份不带 Locality 前缀。
    pub fn new(locality: LocalityId) -> Self {
        Self {
            locality,
            cursor: Mutex::new(GlobalHandle::for_locality(locality).next()),
            entries: DashMap::new(),
            ranges: RwLock::new(Vec::new()),
        }
    }

    /// 目录所属 Locality。
    pub fn locality(&self) -> LocalityId {
        self.locality
    }

    /// 单点登记的条目数。
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 区间登记数。
    pub fn range_count(&self) -> usize {
        self.ranges.read().len()
    }

    /// 读取身份当前的引用计数；未单点登记时返回 `None`。
    pub fn tally(&self, handle: GlobalHandle) -> Option<u64> {
        self.entries
            .get(&credit::strip_internal_bits(handle))
            .map(|entry| entry.tally)
    }

    fn find_range(&self, key: GlobalHandle) -> Option<(RangeBinding, u64)> {
        find_range(&self.ranges.read(), key)
    }

    fn insert(&self, handle: GlobalHandle, address: Address) -> bool {
        let key = credit::strip_internal_bits(handle);
        // 锁顺序固定为 ranges -> entries 分片
        let ranges = self.ranges.read();
        if find_range(&ranges, key).is_some() {
            debug!(handle = %key, "identity already covered by a range binding");
            return false;
        }
        match self.entries.entry(key) {
            Entry::Occupied(_) => {
                debug!(handle = %key, "identity already bound");
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Binding { address, tally: 1 });
                debug!(handle = %key, address = %address, "identity bound");
                true
            }
        }
    }
}

fn find_range(ranges: &[RangeBinding], key: GlobalHandle) -> Option<(RangeBinding, u64)> {
    ranges
        .iter()
        .find_map(|range| range.offset_of(key).map(|offset| (*range, offset)))
}

impl BindingService for LocalDirectory {
    fn next_id(&self, count: u64) -> Result<GlobalHandle> {
        if count == 0 {
            return Err(IdentityError::bad_parameter(
                "next_id",
                "at least one id must be requested",
            ));
        }
        let mut cursor = self.cursor.lock();
        let lower = *cursor;
        let upper = lower + count;
        if upper.msb() & !(crate::handle::LOCALITY_MASK | credit::IDENTITY_MSB_MASK) != 0 {
            return Err(IdentityError::IdRangeExhausted {
                requested: count,
                remaining: 0,
            });
        }
        *cursor = upper;
        Ok(lower)
    }

    fn bind_local(&self, handle: GlobalHandle, address: &Address) -> Result<bool> {
        Ok(self.insert(handle, *address))
    }

    fn bind_remote(
        &self,
        handle: GlobalHandle,
        address: &Address,
        locality: LocalityId,
    ) -> Result<bool> {
        Ok(self.insert(handle, Address { locality, ..*address }))
    }

    fn bind_range_local(
        &self,
        lower: GlobalHandle,
        count: u64,
        base: &Address,
        stride: u64,
    ) -> Result<bool> {
        if count == 0 {
            return Err(IdentityError::bad_parameter(
                "bind_range_local",
                "range must contain at least one id",
            ));
        }
        let lower = credit::strip_internal_bits(lower);
        let candidate = RangeBinding {
            lower,
            count,
            base: *base,
            stride,
        };
        let mut ranges = self.ranges.write();
        if ranges.iter().any(|range| range.overlaps(lower, count))
            || self
                .entries
                .iter()
                .any(|entry| candidate.offset_of(*entry.key()).is_some())
        {
            debug!(lower = %lower, count, "range overlaps an existing binding");
            return Ok(false);
        }
        ranges.push(candidate);
        debug!(lower = %lower, count, base = %base, "id range bound");
        Ok(true)
    }

    fn unbind(&self, handle: GlobalHandle, credits: u64) -> Result<()> {
        let key = credit::strip_internal_bits(handle);
        if let Entry::Occupied(mut occupied) = self.entries.entry(key) {
            let binding = occupied.get_mut();
            binding.tally = binding.tally.saturating_sub(credits);
            if binding.tally == 0 {
                let (_, binding) = occupied.remove_entry();
                debug!(handle = %key, address = %binding.address, "reference tally reached zero");
            }
            return Ok(());
        }
        match self.find_range(key) {
            Some(_) => Ok(()),
            None => Err(IdentityError::NotBound { handle: key }),
        }
    }

    fn resolve(&self, handle: GlobalHandle) -> Option<Address> {
        let key = credit::strip_internal_bits(handle);
        if let Some(entry) = self.entries.get(&key) {
            return Some(entry.address);
        }
        self.find_range(key).map(|(range, offset)| Address {
            raw: range.base.raw.wrapping_add(offset.wrapping_mul(range.stride)),
            ..range.base
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ComponentType;

    fn directory() -> LocalDirectory {
        LocalDirectory::new(LocalityId::new(2))
    }

    fn address(raw: u64) -> Address {
        Address::new(LocalityId::new(2), ComponentType::new(0), raw)
    }

    #[test]
    fn next_id_hands_out_disjoint_blocks() {
        let dir = directory();
        let first = dir.next_id(4).expect("分配身份");
        let second = dir.next_id(1).expect("分配身份");
        assert_eq!(second, first + 4);
        assert_eq!(first.locality_id(), Some(LocalityId::new(2)));
        assert!(!credit::has_credits(first));
        assert!(dir.next_id(0).is_err());
    }

    #[test]
    fn duplicate_bind_reports_false() {
        let dir = directory();
        let gid = dir.next_id(1).expect("分配身份");
        assert!(dir.bind_local(gid, &address(0x100)).expect("首次登记"));
        assert!(!dir.bind_local(gid, &address(0x200)).expect("重复登记"));
        let credited = credit::replenish_credits(gid);
        assert!(!dir.bind_local(credited, &address(0x300)).expect("带额度的同一身份"));
        assert_eq!(dir.resolve(gid), Some(address(0x100)));
    }

    #[test]
    fn bind_remote_records_target_locality() {
        let dir = directory();
        let gid = GlobalHandle::for_locality(LocalityId::new(9)) + 5;
        assert!(dir
            .bind_remote(gid, &address(0x40), LocalityId::new(9))
            .expect("导入登记"));
        assert_eq!(
            dir.resolve(gid).map(|addr| addr.locality),
            Some(LocalityId::new(9))
        );
    }

    #[test]
    fn unbind_removes_entry_at_zero() {
        let dir = directory();
        let gid = dir.next_id(1).expect("分配身份");
        dir.bind_local(gid, &address(0x10)).expect("登记");
        assert_eq!(dir.tally(gid), Some(1));
        dir.unbind(gid, 1).expect("解绑");
        assert!(dir.is_empty());
        assert_eq!(
            dir.unbind(gid, 1),
            Err(IdentityError::NotBound { handle: gid })
        );
    }

    #[test]
    fn range_resolution_uses_stride() {
        let dir = directory();
        let lower = dir.next_id(8).expect("分配区间");
        assert!(dir
            .bind_range_local(lower, 8, &address(0x1000), 16)
            .expect("登记区间"));
        assert_eq!(dir.resolve(lower + 3).map(|a| a.raw), Some(0x1000 + 48));
        assert_eq!(dir.resolve(lower + 8), None);
        assert!(!dir
            .bind_range_local(lower + 4, 8, &address(0x2000), 16)
            .expect("重叠区间"));
        assert!(!dir.bind_local(lower + 2, &address(0x3000)).expect("区间内单点"));
        dir.unbind(lower + 1, 1).expect("区间内解绑为空操作");
    }
}
