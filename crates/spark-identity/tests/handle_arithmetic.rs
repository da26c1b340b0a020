//! `handle_arithmetic` 集成测试：全局句柄的算术、比较、布尔语义与线上表示。
//!
//! # 测试目标（Why）
//! - 句柄两半之间的进位与回绕一旦出错，身份区间会悄然重叠，必须在公开 API 层面锁定行为；
//! - 额度位编码与句柄算术交织，性质测试覆盖任意取值下的“非破坏性”与“往返一致性”。

use proptest::prelude::*;
use spark_identity::{GlobalHandle, credit};

/// 低半部分溢出时进位到高半部分。
#[test]
fn increment_carries_into_msb() {
    let mut gid = GlobalHandle::new(0, u64::MAX);
    let returned = gid.pre_increment();
    assert_eq!(gid, GlobalHandle::new(1, 0));
    assert_eq!(returned, gid, "前置自增返回新值");

    let mut gid = GlobalHandle::new(0, u64::MAX);
    let returned = gid.post_increment();
    assert_eq!(returned, GlobalHandle::new(0, u64::MAX), "后置自增返回原值");
    assert_eq!(gid, GlobalHandle::new(1, 0));
}

#[test]
fn addition_example_carries_within_lsb() {
    let a = GlobalHandle::new(0xde, 0xad);
    let b = GlobalHandle::new(0, 0xab);
    assert_eq!(a + b, GlobalHandle::new(0xde, 0x158));
    assert_eq!(a, GlobalHandle::new(0xde, 0xad), "加法不得修改左操作数");
    assert_eq!(b, GlobalHandle::new(0, 0xab), "加法不得修改右操作数");
}

#[test]
fn addition_wraps_at_128_bits() {
    let max = GlobalHandle::new(u64::MAX, u64::MAX);
    assert_eq!(max + GlobalHandle::from_lsb(1), GlobalHandle::INVALID);
    assert_eq!(max + max, GlobalHandle::new(u64::MAX, u64::MAX - 1));
    assert_eq!(max.next(), GlobalHandle::INVALID);
}

#[test]
fn equality_compares_both_halves() {
    assert_eq!(GlobalHandle::new(0xbeef, 0xcede), GlobalHandle::new(0xbeef, 0xcede));
    assert_ne!(GlobalHandle::new(0xbeef, 0xcede), GlobalHandle::new(0, 0xcede));
    assert_ne!(GlobalHandle::new(0xbeef, 0xcede), GlobalHandle::new(0xbeef, 0));
    assert!(GlobalHandle::new(1, 0) > GlobalHandle::new(0, u64::MAX));
}

#[test]
fn boolean_conversion_tracks_validity() {
    assert!(!bool::from(GlobalHandle::INVALID));
    assert!(bool::from(GlobalHandle::new(1, 0)));
    assert!(bool::from(GlobalHandle::new(0, 1)));
    assert_eq!(GlobalHandle::default(), GlobalHandle::INVALID);
}

#[test]
fn serde_uses_msb_lsb_pair() {
    let gid = GlobalHandle::new(0x1234, 0x5678);
    let json = serde_json::to_string(&gid).expect("序列化句柄");
    assert_eq!(json, "[4660,22136]");
    let back: GlobalHandle = serde_json::from_str(&json).expect("反序列化句柄");
    assert_eq!(back, gid);
}

proptest! {
    #[test]
    fn addition_is_non_mutating_and_matches_u128(
        am in any::<u64>(), al in any::<u64>(), bm in any::<u64>(), bl in any::<u64>()
    ) {
        let a = GlobalHandle::new(am, al);
        let b = GlobalHandle::new(bm, bl);
        let sum = a + b;
        prop_assert_eq!(a, GlobalHandle::new(am, al));
        prop_assert_eq!(b, GlobalHandle::new(bm, bl));
        prop_assert_eq!(sum.as_u128(), a.as_u128().wrapping_add(b.as_u128()));
        prop_assert_eq!(sum - b, a);
    }

    #[test]
    fn wire_form_round_trips(msb in any::<u64>(), lsb in any::<u64>()) {
        let gid = GlobalHandle::new(msb, lsb);
        prop_assert_eq!(gid.to_wire(), (msb, lsb));
        prop_assert_eq!(GlobalHandle::from_wire(gid.to_wire()), gid);
    }

    #[test]
    fn credit_operations_preserve_identity(msb in any::<u64>(), lsb in any::<u64>(), log2 in 0u8..=credit::MAX_CREDIT_LOG2) {
        let identity = credit::strip_internal_bits(GlobalHandle::new(msb, lsb));
        let credited = credit::replenish_credits_with(identity, log2);
        prop_assert!(credit::has_credits(credited));
        prop_assert_eq!(credit::credit_log2(credited), Some(log2));
        prop_assert_eq!(credit::strip_credits(credited), identity);
        prop_assert!(credit::same_identity(credit::mark_split(credited), identity));
        prop_assert!(!credit::has_credits(credit::strip_credits(credit::mark_split(credited))));
    }
}
