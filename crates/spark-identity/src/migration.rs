//! 迁移能力。
//!
//! # 设计背景（Why）
//! - 只有声明了迁移能力的组件类型才能被标记迁移或接收迁移完成通知；
//! - 能力以独立 trait [`Migratable`] 表达：未实现该 trait 的类型在静态类型层面无法被直接迁移。
//!   通过 `&dyn Component` 的动态入口 [`mark_as_migrated`] / [`on_migrated`] 作用于不支持迁移的对象
//!   属于编程错误，立即 panic，而不是返回可恢复的错误。

use crate::{component::Component, error::IdentityError};

/// 支持迁移的组件类型实现的能力接口。
///
/// 实现方通常同时覆盖 [`Component::pin`] / [`Component::unpin`] / [`Component::pin_count`]，
/// 并让 [`Component::as_migratable`] 返回 `Some(self)`。
pub trait Migratable: Component {
    /// 把对象标记为“已迁出”，此后本地副本不再接受新的访问。
    fn mark_as_migrated(&self);

    /// 迁入完成后的通知。
    fn on_migrated(&self);
}

/// 标记对象已迁出。
///
/// # Panics
/// 对象类型未声明迁移能力时 panic，信息为 [`IdentityError::MigrationUnsupported`] 的描述。
pub fn mark_as_migrated(component: &dyn Component) {
    match component.as_migratable() {
        Some(migratable) => migratable.mark_as_migrated(),
        None => unsupported(component),
    }
}

/// 通知对象迁入完成。
///
/// # Panics
/// 同 [`mark_as_migrated`]。
pub fn on_migrated(component: &dyn Component) {
    match component.as_migratable() {
        Some(migratable) => migratable.on_migrated(),
        None => unsupported(component),
    }
}

/// 是否支持迁移。
pub fn is_migratable(component: &dyn Component) -> bool {
    component.as_migratable().is_some()
}

fn unsupported(component: &dyn Component) -> ! {
    let type_name = component
        .base()
        .services()
        .types()
        .type_name(component.component_type());
    let err = IdentityError::MigrationUnsupported {
        type_name: type_name.to_string(),
    };
    panic!("{err} ({})", err.code())
}
