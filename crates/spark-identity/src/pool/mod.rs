//! 同类型对象池与池内对象的身份解析。
//!
//! # 模块定位（Why）
//! - 大量同类型的小对象若逐个向目录登记，绑定开销会主导创建成本；对象池一次预留一段身份区间，
//!   以 `bind_range_local` 整体登记，池内第 `i` 个槽位的身份即为区间下界加 `i`；
//! - [`ObjectPoolList`] 管理同一类型的多个固定容量池，[`ObjectPool`] 负责单个池的存储与解析，
//!   [`UniqueIdRanges`] 是池共享的预留区间游标。
//!
//! # 并发约束（How）
//! - 列表锁只保护池成员与预留区间；解析某个地址时先在锁内定位所属池，释放锁后再委托该池完成
//!   可能较慢的区间登记，互不相关的池不会排队等待。

mod heap;
mod list;
mod ranges;

pub use heap::ObjectPool;
pub use list::{ObjectPoolList, PoolStats};
pub use ranges::UniqueIdRanges;
