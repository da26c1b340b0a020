use parking_lot::Mutex;

use crate::{
    error::{IdentityError, Result},
    handle::GlobalHandle,
};

/// 预留身份区间 `[lower, upper)` 的分配游标。
///
/// # 契约说明（What）
/// - 未调用 [`UniqueIdRanges::set_range`] 之前任何分配都返回 `IdRangeExhausted`；
/// - `get_id(count)` 只在剩余数量足够时前移游标，失败不改变状态；
/// - 重新设置区间会丢弃旧区间中尚未分配的部分。
#[derive(Debug, Default)]
pub struct UniqueIdRanges {
    range: Mutex<Option<(GlobalHandle, GlobalHandle)>>,
}

impl UniqueIdRanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// 安装新的预留区间。`lower > upper` 时返回 `BadParameter`。
    pub fn set_range(&self, lower: GlobalHandle, upper: GlobalHandle) -> Result<()> {
        if lower > upper {
            return Err(IdentityError::bad_parameter(
                "set_range",
                format!("lower bound {lower} exceeds upper bound {upper}"),
            ));
        }
        *self.range.lock() = Some((lower, upper));
        Ok(())
    }

    /// 取出 `count` 个连续身份，返回其下界。
    pub fn get_id(&self, count: u64) -> Result<GlobalHandle> {
        let mut range = self.range.lock();
        let Some((lower, upper)) = range.as_mut() else {
            return Err(IdentityError::IdRangeExhausted {
                requested: count,
                remaining: 0,
            });
        };
        let remaining = span(*lower, *upper);
        if u128::from(count) > remaining {
            return Err(IdentityError::IdRangeExhausted {
                requested: count,
                remaining: clamp(remaining),
            });
        }
        let result = *lower;
        *lower += count;
        Ok(result)
    }

    /// 剩余可分配的身份数量（超过 `u64::MAX` 时饱和）。
    pub fn remaining(&self) -> u64 {
        self.range
            .lock()
            .map_or(0, |(lower, upper)| clamp(span(lower, upper)))
    }
}

fn span(lower: GlobalHandle, upper: GlobalHandle) -> u128 {
    upper.as_u128() - lower.as_u128()
}

fn clamp(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
