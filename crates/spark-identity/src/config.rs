//! 身份子系统配置。
//!
//! # 设计背景（Why）
//! - 对象池容量、预留区间批量与默认满额度都是部署期可调参数，集中在一个结构中便于
//!   与宿主的 TOML 配置文件对接；
//! - 缺省值：对象池一次分配 `0xFFF` 个槽位，满额度为 `2^31`。
//!
//! # 契约说明（What）
//! - 所有字段都有缺省值，TOML 中缺失的键回退到 [`IdentityConfig::default`]；
//! - [`IdentityConfig::from_toml_str`] 在反序列化之后执行 [`IdentityConfig::validate`]，
//!   非法取值返回 [`IdentityError::InvalidConfig`]。

use serde::{Deserialize, Serialize};

use crate::{
    credit,
    error::{IdentityError, Result},
};

/// 对象池默认容量（槽位数）。
pub const DEFAULT_POOL_CAPACITY: usize = 0xFFF;

/// 身份子系统配置。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    /// 每个对象池的固定槽位数。
    pub pool_capacity: usize,
    /// [`crate::pool::ObjectPoolList::reserve_range`] 一次向目录申请的身份数量。
    pub id_batch: u64,
    /// 补充额度时写入的 `log2(credit)`。
    pub credit_log2: u8,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            id_batch: DEFAULT_POOL_CAPACITY as u64,
            credit_log2: credit::DEFAULT_CREDIT_LOG2,
        }
    }
}

impl IdentityConfig {
    /// 从 TOML 文本加载并校验配置。
    ///
    /// ```rust
    /// use spark_identity::IdentityConfig;
    ///
    /// let config = IdentityConfig::from_toml_str("pool_capacity = 64\nid_batch = 256").unwrap();
    /// assert_eq!(config.pool_capacity, 64);
    /// assert_eq!(config.credit_log2, spark_identity::credit::DEFAULT_CREDIT_LOG2);
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: IdentityConfig =
            toml::from_str(text).map_err(|err| IdentityError::InvalidConfig {
                detail: err.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// 校验字段取值。
    pub fn validate(&self) -> Result<()> {
        if self.pool_capacity == 0 {
            return Err(IdentityError::InvalidConfig {
                detail: "pool_capacity must be greater than zero".into(),
            });
        }
        if self.id_batch < self.pool_capacity as u64 {
            return Err(IdentityError::InvalidConfig {
                detail: format!(
                    "id_batch ({}) must cover at least one pool ({})",
                    self.id_batch, self.pool_capacity
                ),
            });
        }
        if self.credit_log2 > credit::MAX_CREDIT_LOG2 {
            return Err(IdentityError::InvalidConfig {
                detail: format!(
                    "credit_log2 ({}) exceeds the encodable maximum ({})",
                    self.credit_log2,
                    credit::MAX_CREDIT_LOG2
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = IdentityConfig::from_toml_str("").expect("空文档应回退到缺省值");
        assert_eq!(config, IdentityConfig::default());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = IdentityConfig::from_toml_str("pool_capacity = 0").unwrap_err();
        assert_eq!(err.code(), crate::error::codes::INVALID_CONFIG);
    }

    #[test]
    fn oversized_credit_is_rejected() {
        let err = IdentityConfig::from_toml_str("credit_log2 = 64").unwrap_err();
        assert!(err.to_string().contains("credit_log2"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = IdentityConfig::from_toml_str("heap_size = 12").unwrap_err();
        assert!(matches!(err, IdentityError::InvalidConfig { .. }));
    }

    #[test]
    fn batch_smaller_than_pool_is_rejected() {
        let err = IdentityConfig::from_toml_str("pool_capacity = 16\nid_batch = 8").unwrap_err();
        assert!(err.to_string().contains("id_batch"));
    }
}
