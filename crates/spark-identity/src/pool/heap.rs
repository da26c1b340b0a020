use std::mem;

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    address::{Address, ComponentType},
    error::{IdentityError, Result},
    handle::GlobalHandle,
    services::IdentityServices,
};

use super::UniqueIdRanges;

/// 固定容量的同类型对象池。
///
/// # 教案式说明
/// - **意图 (Why)**：槽位存储一次性分配且永不移动，槽位地址即对象在本 Locality 内的地址，
///   归属判断退化为一次区间比较；
/// - **契约 (What)**：
///   - 地址以 `u64` 表示，`owns(address)` 当且仅当地址落在存储区间内，O(1)；
///   - 第一次 [`ObjectPool::get_gid`] 从预留区间取出 `capacity` 个身份并整体登记，
///     此后槽位 `i` 的身份恒为 `base_gid + i`，与槽位是否被占用无关；
/// - **执行 (How)**：空闲槽位下标保存在栈中，分配总是取最低的空闲下标；
/// - **风险 (Trade-offs)**：区间登记只持有 `bind_gate`，同一池的并发解析会排队，
///   但分配与释放只需要 `state` 锁，不会等待目录调用。
pub struct ObjectPool<T> {
    slots: Box<[Mutex<Option<T>>]>,
    base_address: u64,
    stride: u64,
    state: Mutex<PoolState>,
    bind_gate: Mutex<()>,
}

struct PoolState {
    free: Vec<usize>,
    base_gid: GlobalHandle,
}

impl<T> ObjectPool<T> {
    /// 分配 `capacity` 个槽位（至少一个）。
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, None)
    }

    /// 分配槽位并把 `value` 放入槽位 0，返回池与该对象的地址。
    pub fn with_first(capacity: usize, value: T) -> (Self, u64) {
        let pool = Self::build(capacity, Some(value));
        let address = pool.address_of(0);
        (pool, address)
    }

    fn build(capacity: usize, mut first: Option<T>) -> Self {
        let capacity = capacity.max(1);
        let occupied = usize::from(first.is_some());
        let slots: Box<[Mutex<Option<T>>]> = (0..capacity)
            .map(|index| Mutex::new(if index == 0 { first.take() } else { None }))
            .collect();
        let base_address = slots.as_ptr().addr() as u64;
        Self {
            slots,
            base_address,
            stride: mem::size_of::<Mutex<Option<T>>>() as u64,
            state: Mutex::new(PoolState {
                free: (occupied..capacity).rev().collect(),
                base_gid: GlobalHandle::INVALID,
            }),
            bind_gate: Mutex::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 已占用槽位数。
    pub fn allocated(&self) -> usize {
        self.capacity() - self.free_count()
    }

    pub fn free_count(&self) -> usize {
        self.state.lock().free.len()
    }

    pub fn is_full(&self) -> bool {
        self.free_count() == 0
    }

    /// 区间登记后的首个身份；尚未登记时为无效句柄。
    pub fn base_gid(&self) -> GlobalHandle {
        self.state.lock().base_gid
    }

    /// 地址是否落在本池的存储区间内。
    pub fn owns(&self, address: u64) -> bool {
        address >= self.base_address
            && address - self.base_address < self.capacity() as u64 * self.stride
    }

    /// 地址对应的槽位下标；地址未对齐到槽位起点时返回 `None`。
    pub fn index_of(&self, address: u64) -> Option<usize> {
        if !self.owns(address) {
            return None;
        }
        let offset = address - self.base_address;
        (offset % self.stride == 0).then(|| (offset / self.stride) as usize)
    }

    /// 槽位 `index` 的地址。
    pub fn address_of(&self, index: usize) -> u64 {
        self.base_address + index as u64 * self.stride
    }

    /// 放入对象并返回其地址；池已满时原样交还对象。
    pub fn try_alloc(&self, value: T) -> Result<u64, T> {
        let Some(index) = self.state.lock().free.pop() else {
            return Err(value);
        };
        *self.slots[index].lock() = Some(value);
        Ok(self.address_of(index))
    }

    /// 取出地址处的对象并归还槽位。
    pub fn free(&self, address: u64) -> Option<T> {
        let index = self.index_of(address)?;
        let value = self.slots[index].lock().take()?;
        self.state.lock().free.push(index);
        Some(value)
    }

    /// 在槽位锁内访问对象。
    pub fn with<R>(&self, address: u64, f: impl FnOnce(&T) -> R) -> Option<R> {
        let index = self.index_of(address)?;
        self.slots[index].lock().as_ref().map(f)
    }

    /// 解析地址对应的身份，必要时先从 `ranges` 预留并登记整段区间。
    ///
    /// 地址不属于本池时返回无效句柄。目录调用期间不持有 `state` 锁，
    /// 并发的 [`ObjectPool::try_alloc`] / [`ObjectPool::free`] 不受影响。
    pub fn get_gid(
        &self,
        ranges: &UniqueIdRanges,
        address: u64,
        component_type: ComponentType,
        services: &IdentityServices,
    ) -> Result<GlobalHandle> {
        let Some(index) = self.index_of(address) else {
            return Ok(GlobalHandle::INVALID);
        };

        let base_gid = match self.base_gid() {
            gid if gid.is_nonzero() => gid,
            _ => self.bind_range(ranges, component_type, services)?,
        };
        Ok(base_gid + index as u64)
    }

    fn bind_range(
        &self,
        ranges: &UniqueIdRanges,
        component_type: ComponentType,
        services: &IdentityServices,
    ) -> Result<GlobalHandle> {
        let _gate = self.bind_gate.lock();
        let bound = self.base_gid();
        if bound.is_nonzero() {
            return Ok(bound);
        }

        let count = self.capacity() as u64;
        let lower = ranges.get_id(count)?;
        let locality = services.locality_id();
        let base = Address::new(locality, component_type, self.base_address);
        if !services
            .binding()
            .bind_range_local(lower, count, &base, self.stride)?
        {
            return Err(IdentityError::DuplicateAddress {
                handle: lower,
                locality,
            });
        }
        debug!(lower = %lower, count, base = %base, "object pool id range bound");
        self.state.lock().base_gid = lower;
        Ok(lower)
    }
}
