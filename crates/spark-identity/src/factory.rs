//! 组件创建例程。
//!
//! # 设计背景（Why）
//! - 只有创建例程可以读取对象首次绑定时携带满额度的身份；该能力由 crate 内可见的
//!   `ComponentBase::get_base_gid` 提供，外部代码只能经由本模块获得；
//! - 对象先放入 `Arc` 再绑定，保证登记到目录的地址在对象生命周期内稳定。

use std::sync::Arc;

use tracing::debug;

use crate::{
    component::{Component, ComponentBase},
    error::Result,
    handle::GlobalHandle,
    services::IdentityServices,
};

fn base_for<C: Component>(services: &IdentityServices) -> ComponentBase {
    let component_type = services.types().register(C::type_name());
    ComponentBase::new(services.clone(), component_type)
}

/// 创建组件并申请新身份，返回对象与携带满额度的身份。
///
/// # 错误
/// - 目录分配或绑定失败时返回对应错误，对象随之销毁。
pub fn create<C, F>(services: &IdentityServices, build: F) -> Result<(Arc<C>, GlobalHandle)>
where
    C: Component,
    F: FnOnce(ComponentBase) -> C,
{
    create_migrated(services, GlobalHandle::INVALID, build)
}

/// 以外部提供的身份（迁移或导入）创建组件。
///
/// `gid` 为无效句柄时等价于 [`create`]。身份已被登记时返回
/// [`crate::error::IdentityError::DuplicateAddress`]。
pub fn create_migrated<C, F>(
    services: &IdentityServices,
    gid: GlobalHandle,
    build: F,
) -> Result<(Arc<C>, GlobalHandle)>
where
    C: Component,
    F: FnOnce(ComponentBase) -> C,
{
    let component = Arc::new(build(base_for::<C>(services)));
    let gid = component.base().get_base_gid(gid)?;
    Ok((component, gid))
}

/// 批量创建：一次向目录申请 `count` 个连续身份，第 `i` 个对象以 `lower + i` 登记。
///
/// 任一对象绑定失败即停止，已创建的对象随返回的错误一起销毁并归还身份。
pub fn bulk_create<C, F>(
    services: &IdentityServices,
    count: usize,
    mut build: F,
) -> Result<Vec<(Arc<C>, GlobalHandle)>>
where
    C: Component,
    F: FnMut(usize, ComponentBase) -> C,
{
    if count == 0 {
        return Ok(Vec::new());
    }
    let lower = services.binding().next_id(count as u64)?;
    let mut created = Vec::with_capacity(count);
    for index in 0..count {
        let component = Arc::new(build(index, base_for::<C>(services)));
        let gid = component.base().get_base_gid(lower + index as u64)?;
        created.push((component, gid));
    }
    debug!(lower = %lower, count, type_name = C::type_name(), "bulk created components");
    Ok(created)
}

/// 调用 [`Component::finalize`] 后销毁组件。
///
/// 仍存在其他强引用时原样交还 `Arc`，不做任何处理。
pub fn destroy<C: Component>(component: Arc<C>) -> Result<(), Arc<C>> {
    let component = Arc::try_unwrap(component)?;
    component.finalize();
    drop(component);
    Ok(())
}

