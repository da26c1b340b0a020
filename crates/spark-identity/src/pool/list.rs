use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    address::ComponentType,
    error::{IdentityError, Result},
    handle::GlobalHandle,
    services::IdentityServices,
};

use super::{ObjectPool, UniqueIdRanges};

/// 单个池的诊断快照。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStats {
    pub index: usize,
    pub capacity: usize,
    pub allocated: usize,
    pub base_gid: GlobalHandle,
}

/// 同一组件类型的对象池列表。
///
/// # 教案式说明
/// - **意图 (Why)**：单个池容量固定，列表在全部池占满时追加新池，并为所有池提供共享的预留身份区间；
/// - **契约 (What)**：
///   - 池按创建顺序排列，地址解析选择第一个拥有该地址的池；
///   - 需要新身份的解析之前必须先 [`ObjectPoolList::set_range`] 或 [`ObjectPoolList::reserve_range`]；
///   - 诊断查询越界返回 `BadParameter`；
/// - **执行 (How)**：列表锁内仅克隆目标池的 `Arc`，随即释放锁再委托池完成解析；
/// - **风险 (Trade-offs)**：池从不回收，峰值占用决定常驻内存。
pub struct ObjectPoolList<T> {
    services: IdentityServices,
    component_type: ComponentType,
    capacity: usize,
    pools: Mutex<Vec<Arc<ObjectPool<T>>>>,
    id_range: UniqueIdRanges,
}

impl<T> ObjectPoolList<T> {
    /// 创建空列表，池容量取自 `services` 的配置。
    pub fn new(services: IdentityServices, component_type: ComponentType) -> Self {
        let capacity = services.config().pool_capacity.max(1);
        Self {
            services,
            component_type,
            capacity,
            pools: Mutex::new(Vec::new()),
            id_range: UniqueIdRanges::new(),
        }
    }

    /// 放入对象，返回其地址；全部池已满时追加新池。
    pub fn alloc(&self, value: T) -> u64 {
        let mut pools = self.pools.lock();
        let mut value = value;
        for pool in pools.iter() {
            match pool.try_alloc(value) {
                Ok(address) => return address,
                Err(rejected) => value = rejected,
            }
        }

        let (pool, address) = ObjectPool::with_first(self.capacity, value);
        debug!(
            pool_index = pools.len(),
            capacity = self.capacity,
            component_type = %self.component_type,
            "object pool appended"
        );
        pools.push(Arc::new(pool));
        address
    }

    /// 取出地址处的对象。
    pub fn free(&self, address: u64) -> Option<T> {
        self.owning_pool(address)?.free(address)
    }

    /// 在槽位锁内访问地址处的对象。
    pub fn with<R>(&self, address: u64, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.owning_pool(address)?.with(address, f)
    }

    /// 地址是否由本列表中的某个池分配。
    pub fn did_alloc(&self, address: u64) -> bool {
        self.pools.lock().iter().any(|pool| pool.owns(address))
    }

    /// 解析地址对应的身份；没有池拥有该地址时返回无效句柄。
    pub fn get_gid(&self, address: u64) -> Result<GlobalHandle> {
        match self.owning_pool(address) {
            Some(pool) => pool.get_gid(
                &self.id_range,
                address,
                self.component_type,
                &self.services,
            ),
            None => Ok(GlobalHandle::INVALID),
        }
    }

    fn owning_pool(&self, address: u64) -> Option<Arc<ObjectPool<T>>> {
        self.pools
            .lock()
            .iter()
            .find(|pool| pool.owns(address))
            .cloned()
    }

    /// 安装池取用新身份的预留区间 `[lower, upper)`。
    pub fn set_range(&self, lower: GlobalHandle, upper: GlobalHandle) -> Result<()> {
        let _pools = self.pools.lock();
        self.id_range.set_range(lower, upper)
    }

    /// 向目录申请 `id_batch` 个身份并安装为预留区间。
    pub fn reserve_range(&self) -> Result<()> {
        let count = self.services.config().id_batch;
        let lower = self.services.binding().next_id(count)?;
        self.set_range(lower, lower + count)
    }

    /// 预留区间中剩余的身份数量。
    pub fn remaining_ids(&self) -> u64 {
        self.id_range.remaining()
    }

    pub fn pool_count(&self) -> usize {
        self.pools.lock().len()
    }

    /// 第 `index` 个池的诊断快照。
    pub fn pool_stats(&self, index: usize) -> Result<PoolStats> {
        let pool = self.pools.lock().get(index).cloned().ok_or_else(|| {
            IdentityError::bad_parameter("pool_stats", format!("pool index {index} out of range"))
        })?;
        Ok(PoolStats {
            index,
            capacity: pool.capacity(),
            allocated: pool.allocated(),
            base_gid: pool.base_gid(),
        })
    }

    /// 全部池中已占用的槽位数。
    pub fn len(&self) -> usize {
        self.pools.lock().iter().map(|pool| pool.allocated()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// 组件类型的可读名称。
    pub fn type_name(&self) -> Arc<str> {
        self.services.types().type_name(self.component_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{address::LocalityId, config::IdentityConfig};
    use tracing_test::traced_test;

    fn list(capacity: usize) -> ObjectPoolList<u32> {
        let services = IdentityServices::local(LocalityId::new(1)).with_config(IdentityConfig {
            pool_capacity: capacity,
            id_batch: 64,
            ..IdentityConfig::default()
        });
        let component_type = services.types().register("counter");
        ObjectPoolList::new(services, component_type)
    }

    #[test]
    #[traced_test]
    fn alloc_appends_pool_when_full() {
        let list = list(2);
        let addresses: Vec<_> = (0..5).map(|value| list.alloc(value)).collect();
        assert_eq!(list.pool_count(), 3);
        assert_eq!(list.len(), 5);
        assert_eq!(list.with(addresses[4], |value| *value), Some(4));
        assert_eq!(
            list.pool_stats(2).expect("新追加的池").allocated,
            1,
            "追加的池以首个槽位承载新对象"
        );
        assert!(logs_contain("object pool appended"));
    }

    #[test]
    fn pool_stats_rejects_unknown_index() {
        let list = list(4);
        list.alloc(7);
        let stats = list.pool_stats(0).expect("第一个池存在");
        assert_eq!(stats.allocated, 1);
        assert_eq!(stats.base_gid, GlobalHandle::INVALID);
        let err = list.pool_stats(1).unwrap_err();
        assert_eq!(err.code(), crate::error::codes::BAD_PARAMETER);
    }

    #[test]
    fn get_gid_requires_reserved_range() {
        let list = list(4);
        let address = list.alloc(1);
        assert!(matches!(
            list.get_gid(address),
            Err(IdentityError::IdRangeExhausted { .. })
        ));
        list.reserve_range().expect("申请区间");
        let gid = list.get_gid(address).expect("解析身份");
        assert!(gid.is_nonzero());
        assert_eq!(list.remaining_ids(), 60);
        assert_eq!(&*list.type_name(), "counter");
    }
}
