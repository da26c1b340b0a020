//! 组件基座：对象的全局身份、首次绑定与信用额度交接。
//!
//! # 模块定位（Why）
//! - 每个可被远程寻址的对象内嵌一个 [`ComponentBase`]，它在首次被请求身份时向目录登记，
//!   在对象销毁时归还自身持有的引用权益；
//! - 身份字段只能经由 [`ComponentBase::get_id`] / [`ComponentBase::get_unmanaged_id`]
//!   （以及 crate 内的 `get_base_gid`）读取，“只绑定一次、只剥离一次额度”的不变式无法被绕过。
//!
//! # 状态机（What）
//! ```text
//! Unbound ──首次 get_base_gid──▶ Bound(满额度) ──同一次调用内──▶ Bound(零额度, 已拆分)
//!    ▲                                                                │
//!    └──────────── bind 失败（DuplicateAddress）          Drop: unbind(gid, 1)
//! ```
//!
//! # 并发约束（How）
//! - `gid` 锁只覆盖读取与“剥离额度”的瞬时转换，从不跨越目录调用；
//! - `bind_gate` 串行化同一对象的并发首次绑定，保证同一对象只登记一次。

use std::ptr;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    address::{Address, ComponentType},
    credit,
    error::{IdentityError, Result},
    handle::GlobalHandle,
    migration::Migratable,
    services::IdentityServices,
};

/// 身份副本的管理方式。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Management {
    /// 携带独立的引用权益，持有方负责最终归还。
    Managed,
    /// 不携带独立权益，不得据此推断对象存活。
    Unmanaged,
}

/// 对外交付的身份副本。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IdType {
    gid: GlobalHandle,
    management: Management,
}

impl IdType {
    pub const fn managed(gid: GlobalHandle) -> Self {
        Self {
            gid,
            management: Management::Managed,
        }
    }

    pub const fn unmanaged(gid: GlobalHandle) -> Self {
        Self {
            gid,
            management: Management::Unmanaged,
        }
    }

    pub const fn gid(&self) -> GlobalHandle {
        self.gid
    }

    pub const fn management(&self) -> Management {
        self.management
    }

    pub const fn is_managed(&self) -> bool {
        matches!(self.management, Management::Managed)
    }

    /// 副本携带的额度单位数。
    pub const fn credit_count(&self) -> u64 {
        credit::credit_count(self.gid)
    }
}

/// 内嵌于组件对象中的身份状态。
///
/// # 教案式说明
/// - **意图 (Why)**：身份按需惰性生成，绝大多数只在本地使用的对象永远不会触达目录；
/// - **契约 (What)**：
///   - 复制（`Clone`）不复制身份，副本以 Unbound 状态开始，需要时自行申请；
///   - 转移（[`ComponentBase::take`]）把身份连同额度状态交给目标，源对象回到 Unbound；
///   - 销毁时若已绑定，尽力调用 `unbind(gid, 1)`，失败只记录日志；
/// - **风险 (Trade-offs)**：登记地址取自 `self` 的内存位置，组件必须在首次请求身份前
///   放置到稳定地址（例如 `Arc`），否则目录中的地址会在移动后失效。
pub struct ComponentBase {
    services: IdentityServices,
    component_type: ComponentType,
    gid: Mutex<GlobalHandle>,
    bind_gate: Mutex<()>,
}

impl ComponentBase {
    /// 构造未绑定的基座。
    pub fn new(services: IdentityServices, component_type: ComponentType) -> Self {
        Self {
            services,
            component_type,
            gid: Mutex::new(GlobalHandle::INVALID),
            bind_gate: Mutex::new(()),
        }
    }

    pub fn services(&self) -> &IdentityServices {
        &self.services
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// 是否已持有有效身份。
    pub fn is_bound(&self) -> bool {
        self.gid.lock().is_nonzero()
    }

    /// 当前对象在本 Locality 内的地址；纯函数，不修改状态。
    pub fn get_current_address(&self) -> Address {
        Address::new(
            self.services.locality_id(),
            self.component_type,
            ptr::from_ref(self).addr() as u64,
        )
    }

    /// 读取（必要时建立）对象的基础身份。
    ///
    /// # 契约说明（What）
    /// - 已绑定时原样返回存储值（幂等）；
    /// - `assign_gid` 无效时申请新身份并 `bind_local`，否则剥离其额度后 `bind_remote` 到当前 Locality；
    /// - 绑定冲突时存储值保持无效并返回 [`IdentityError::DuplicateAddress`]；
    /// - 绑定成功后的第一次返回携带满额度，同时存储值被剥离额度；返回值与存储值都打上拆分标记，
    ///   持有满额度副本的一方因此不会独自决定对象的生命周期；
    ///   此后每次调用都返回零额度的存储值。
    pub(crate) fn get_base_gid(&self, assign_gid: GlobalHandle) -> Result<GlobalHandle> {
        if !self.gid.lock().is_nonzero() {
            self.bind(assign_gid)?;
        }

        let mut gid = self.gid.lock();
        if !credit::has_credits(*gid) {
            return Ok(*gid);
        }
        let full = credit::mark_split(*gid);
        *gid = credit::strip_credits(full);
        Ok(full)
    }

    fn bind(&self, assign_gid: GlobalHandle) -> Result<()> {
        let _gate = self.bind_gate.lock();
        if self.gid.lock().is_nonzero() {
            return Ok(());
        }

        let binding = self.services.binding();
        let locality = self.services.locality_id();
        let address = self.get_current_address();
        let (stored, bound) = if assign_gid.is_nonzero() {
            let imported = credit::strip_credits(assign_gid);
            let bound = binding.bind_remote(imported, &address, locality)?;
            (imported, bound)
        } else {
            let fresh = binding.next_id(1)?;
            let bound = binding.bind_local(fresh, &address)?;
            (
                credit::replenish_credits_with(fresh, self.services.config().credit_log2),
                bound,
            )
        };

        if !bound {
            *self.gid.lock() = GlobalHandle::INVALID;
            let handle = credit::strip_internal_bits(stored);
            debug!(handle = %handle, locality = %locality, "component bind collided with an existing registration");
            return Err(IdentityError::DuplicateAddress { handle, locality });
        }

        *self.gid.lock() = stored;
        debug!(handle = %credit::strip_internal_bits(stored), address = %address, "component bound");
        Ok(())
    }

    /// 返回携带新补充额度的受管身份。
    pub fn get_id(&self) -> Result<IdType> {
        self.get_base_gid(GlobalHandle::INVALID)?;
        let stored = *self.gid.lock();
        debug_assert!(
            !credit::has_credits(stored),
            "stored gid must not carry credits once handed out"
        );
        Ok(IdType::managed(credit::replenish_credits_with(
            stored,
            self.services.config().credit_log2,
        )))
    }

    /// 返回不补充额度的身份副本。
    pub fn get_unmanaged_id(&self) -> Result<IdType> {
        self.get_base_gid(GlobalHandle::INVALID)
            .map(IdType::unmanaged)
    }

    /// 转移语义：身份与额度状态交给返回值，`self` 回到 Unbound。
    ///
    /// 目录中登记的地址不会随之更新，调用方需自行重新登记或迁移。
    pub fn take(&mut self) -> ComponentBase {
        let gid = std::mem::replace(self.gid.get_mut(), GlobalHandle::INVALID);
        ComponentBase {
            services: self.services.clone(),
            component_type: self.component_type,
            gid: Mutex::new(gid),
            bind_gate: Mutex::new(()),
        }
    }
}

impl Clone for ComponentBase {
    fn clone(&self) -> Self {
        ComponentBase::new(self.services.clone(), self.component_type)
    }
}

impl std::fmt::Debug for ComponentBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentBase")
            .field("component_type", &self.component_type)
            .field("gid", &*self.gid.lock())
            .finish_non_exhaustive()
    }
}

impl Drop for ComponentBase {
    fn drop(&mut self) {
        let gid = *self.gid.get_mut();
        if !gid.is_nonzero() {
            return;
        }
        if let Err(err) = self.services.binding().unbind(gid, 1) {
            warn!(handle = %gid, error = %err, code = err.code(), "failed to release component identity");
        }
    }
}

/// 受管对象类型实现的契约。
///
/// 除 [`Component::base`] 外均有缺省实现；支持迁移的类型额外实现
/// [`Migratable`] 并覆盖 [`Component::as_migratable`]。
pub trait Component: Send + Sync {
    /// 登记到类型注册表的名称。
    fn type_name() -> &'static str
    where
        Self: Sized;

    fn base(&self) -> &ComponentBase;

    fn get_id(&self) -> Result<IdType> {
        self.base().get_id()
    }

    fn get_unmanaged_id(&self) -> Result<IdType> {
        self.base().get_unmanaged_id()
    }

    fn get_current_address(&self) -> Address {
        self.base().get_current_address()
    }

    fn component_type(&self) -> ComponentType {
        self.base().component_type()
    }

    /// 销毁前的钩子。
    fn finalize(&self) {}

    /// 迁移期间防止对象被移走的钉住计数；不支持重定位的类型为空操作。
    fn pin(&self) {}

    /// 返回解除钉住后对象是否可以继续迁移。
    fn unpin(&self) -> bool {
        false
    }

    fn pin_count(&self) -> u32 {
        0
    }

    fn as_migratable(&self) -> Option<&dyn Migratable> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::LocalityId;
    use tracing_test::traced_test;

    fn base() -> ComponentBase {
        ComponentBase::new(IdentityServices::local(LocalityId::new(0)), ComponentType::new(1))
    }

    #[test]
    fn first_base_gid_carries_credits_then_stored_is_stripped() {
        let base = base();
        let first = base.get_base_gid(GlobalHandle::INVALID).expect("首次绑定");
        assert!(credit::has_credits(first));
        assert!(credit::was_split(first), "满额度副本同样带拆分标记");
        let second = base.get_base_gid(GlobalHandle::INVALID).expect("重复读取");
        assert!(!credit::has_credits(second));
        assert!(credit::was_split(second));
        assert!(credit::same_identity(first, second));
        assert_eq!(base.get_base_gid(GlobalHandle::INVALID).expect("再次读取"), second);
    }

    #[test]
    fn get_id_replenishes_fresh_copies() {
        let base = base();
        for _ in 0..3 {
            let id = base.get_id().expect("获取受管身份");
            assert!(id.is_managed());
            assert_eq!(id.credit_count(), 1 << credit::DEFAULT_CREDIT_LOG2);
            assert!(!credit::has_credits(*base.gid.lock()));
        }
    }

    #[test]
    fn clone_starts_unbound_and_take_moves_identity() {
        let mut base = base();
        let id = base.get_unmanaged_id().expect("绑定");
        assert!(!base.clone().is_bound(), "复制品不应继承身份");
        let moved = base.take();
        assert!(!base.is_bound());
        assert_eq!(*moved.gid.lock(), id.gid());
    }

    #[test]
    #[traced_test]
    fn drop_logs_unbind_failure() {
        let base = base();
        let id = base.get_unmanaged_id().expect("绑定");
        base.services()
            .binding()
            .unbind(id.gid(), 1)
            .expect("提前归还唯一的引用单位");
        drop(base);
        assert!(logs_contain("failed to release component identity"));
        assert!(logs_contain("identity.not_bound"));
    }
}
