//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义身份子系统对外暴露的错误语义：重复绑定、参数越界、迁移能力缺失、目录缺项、
//!   身份区间耗尽与配置非法；
//! - 每个变体映射到稳定的 `<域>.<语义>` 错误码，便于日志聚合与告警规则精确匹配。
//!
//! ## 设计要求（What）
//! - 全部变体派生 [`thiserror::Error`]，可直接与 `?` 运算符及上层错误框架协作；
//! - `MigrationUnsupported` 只用于构造 panic 信息，从不作为可恢复结果返回；
//! - 析构阶段的解绑失败在调用点记录日志后吞掉，不经由本类型向外传播。

use thiserror::Error;

use crate::{address::LocalityId, handle::GlobalHandle};

/// 稳定错误码集合。
pub mod codes {
    /// 绑定请求与已有登记冲突。
    pub const DUPLICATE_ADDRESS: &str = "identity.duplicate_address";
    /// 下标或区间查询越界。
    pub const BAD_PARAMETER: &str = "identity.bad_parameter";
    /// 在未声明迁移能力的对象上触发迁移。
    pub const MIGRATION_UNSUPPORTED: &str = "identity.migration_unsupported";
    /// 目录中不存在该身份。
    pub const NOT_BOUND: &str = "identity.not_bound";
    /// 预留身份区间不足。
    pub const ID_RANGE_EXHAUSTED: &str = "identity.id_range_exhausted";
    /// 目录服务自身故障。
    pub const BINDING_FAILURE: &str = "identity.binding_failure";
    /// 配置非法。
    pub const INVALID_CONFIG: &str = "identity.config_invalid";
}

/// 身份子系统错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：把绑定、解析、分配路径上的失败收敛为少量可枚举的类别，
///   调用方据此决定是终止当前操作、补充区间还是修正参数；
/// - **契约 (What)**：
///   - 所有变体 `Send + Sync + 'static`，可跨线程传播；
///   - [`IdentityError::code`] 返回与变体一一对应的稳定错误码；
/// - **风险 (Trade-offs)**：上下文以 `String` 保存，换取可读性，错误路径并非热点。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// 绑定请求与已有登记冲突，发起操作的对象身份已被重置为无效。
    #[error("failed to bind id {handle} to locality {locality}")]
    DuplicateAddress {
        handle: GlobalHandle,
        locality: LocalityId,
    },

    /// 下标或区间超出有效范围。
    #[error("bad parameter in `{context}`: {detail}")]
    BadParameter {
        context: &'static str,
        detail: String,
    },

    /// 对未声明迁移能力的组件类型触发迁移钩子，属于编程错误。
    #[error("component type `{type_name}` has not been enabled to support migration")]
    MigrationUnsupported { type_name: String },

    /// 目录中不存在该身份。
    #[error("id {handle} is not bound")]
    NotBound { handle: GlobalHandle },

    /// 预留区间无法满足本次分配。
    #[error("id range exhausted: requested {requested}, remaining {remaining}")]
    IdRangeExhausted { requested: u64, remaining: u64 },

    /// 目录服务未能完成请求（例如远端不可达）。
    ///
    /// 由外部 [`crate::binding::BindingService`] 实现构造；本 crate 只负责原样向上传播，
    /// 进程内的 [`crate::binding::LocalDirectory`] 不会产生该错误。
    #[error("binding service failure: {detail}")]
    BindingFailure { detail: String },

    /// 配置加载或校验失败。
    #[error("invalid identity configuration: {detail}")]
    InvalidConfig { detail: String },
}

impl IdentityError {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            IdentityError::DuplicateAddress { .. } => codes::DUPLICATE_ADDRESS,
            IdentityError::BadParameter { .. } => codes::BAD_PARAMETER,
            IdentityError::MigrationUnsupported { .. } => codes::MIGRATION_UNSUPPORTED,
            IdentityError::NotBound { .. } => codes::NOT_BOUND,
            IdentityError::IdRangeExhausted { .. } => codes::ID_RANGE_EXHAUSTED,
            IdentityError::BindingFailure { .. } => codes::BINDING_FAILURE,
            IdentityError::InvalidConfig { .. } => codes::INVALID_CONFIG,
        }
    }

    /// 构造 `BadParameter` 的便捷方法。
    pub fn bad_parameter(context: &'static str, detail: impl Into<String>) -> Self {
        IdentityError::BadParameter {
            context,
            detail: detail.into(),
        }
    }
}

/// 身份子系统统一的返回值别名。
pub type Result<T, E = IdentityError> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_domain_prefix() {
        let errors = [
            IdentityError::DuplicateAddress {
                handle: GlobalHandle::from_lsb(1),
                locality: LocalityId::new(0),
            },
            IdentityError::bad_parameter("pool_stats", "index 3 out of range"),
            IdentityError::MigrationUnsupported {
                type_name: "counter".into(),
            },
            IdentityError::NotBound {
                handle: GlobalHandle::from_lsb(2),
            },
            IdentityError::IdRangeExhausted {
                requested: 4,
                remaining: 1,
            },
            IdentityError::BindingFailure {
                detail: "unreachable".into(),
            },
            IdentityError::InvalidConfig {
                detail: "pool_capacity".into(),
            },
        ];
        for err in errors {
            assert!(err.code().starts_with("identity."), "{}", err.code());
        }
    }

    #[test]
    fn duplicate_message_names_handle_and_locality() {
        let err = IdentityError::DuplicateAddress {
            handle: GlobalHandle::new(0x1, 0x2),
            locality: LocalityId::new(3),
        };
        assert_eq!(
            err.to_string(),
            "failed to bind id 00000000000000010000000000000002 to locality locality#3"
        );
    }
}
