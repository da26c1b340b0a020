#![deny(unsafe_code)]
#![doc = "spark-identity: 分布式对象标识、信用额度引用计数与对象池地址解析。"]
#![doc = ""]
#![doc = "== 组成 =="]
#![doc = "1. `handle` / `credit`: 128 位全局句柄的算术与额度位编码；"]
#![doc = "2. `binding` / `services`: 目录服务契约、进程内目录与协作者集合；"]
#![doc = "3. `component` / `factory` / `migration`: 组件基座的惰性绑定、创建例程与迁移能力；"]
#![doc = "4. `pool`: 同类型对象池与池内对象的身份解析。"]
#![doc = ""]
#![doc = "== 线程模型 =="]
#![doc = "所有操作同步执行；目录调用可能阻塞调用线程，但从不在持有对象内部锁时发起。"]

pub mod address;
pub mod binding;
pub mod component;
pub mod config;
pub mod credit;
pub mod error;
pub mod factory;
pub mod handle;
pub mod migration;
pub mod pool;
pub mod services;

pub use address::{
    Address, ComponentType, ComponentTypeRegistry, LocalityId, LocalityProvider, StaticLocality,
    TypeRegistry,
};
pub use binding::{BindingService, LocalDirectory};
pub use component::{Component, ComponentBase, IdType, Management};
pub use config::IdentityConfig;
pub use error::{IdentityError, Result, codes};
pub use handle::GlobalHandle;
pub use migration::Migratable;
pub use pool::{ObjectPool, ObjectPoolList, PoolStats, UniqueIdRanges};
pub use services::IdentityServices;
