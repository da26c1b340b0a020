//! 本地地址、Locality 与组件类型标签。
//!
//! # 模块定位（Why）
//! - 目录服务把全局句柄映射到 [`Address`]：`{locality, component_type, raw}`；
//! - Locality 提供者与组件类型注册表都是外部协作者，这里只定义本子系统消费的窄接口，
//!   并提供进程内的默认实现，便于单机部署与测试直接使用。

use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Locality（进程/节点）标识。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalityId(u32);

impl LocalityId {
    /// 无效 Locality 哨兵；句柄前缀无法表达该值。
    pub const INVALID: LocalityId = LocalityId(u32::MAX);

    /// 构造 Locality 标识。
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// 读取原始数值。
    pub const fn get(self) -> u32 {
        self.0
    }

    /// 是否为可嵌入句柄前缀的有效 Locality。
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Display for LocalityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "locality#{}", self.0)
    }
}

/// 组件类型标签，仅用于标注与诊断，不承载逻辑。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentType(u32);

impl ComponentType {
    /// 构造类型标签。
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// 读取原始数值。
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component_type#{}", self.0)
    }
}

/// 对象在某个 Locality 内的物理地址。
///
/// # 契约说明（What）
/// - `raw` 为进程内地址的整数形式，只在所属 Locality 内有意义；
/// - 该结构为纯值类型，构造与读取均不会失败。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub locality: LocalityId,
    pub component_type: ComponentType,
    pub raw: u64,
}

impl Address {
    /// 组装地址。
    pub const fn new(locality: LocalityId, component_type: ComponentType, raw: u64) -> Self {
        Self {
            locality,
            component_type,
            raw,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{:#x}",
            self.locality, self.component_type, self.raw
        )
    }
}

/// 当前 Locality 的提供者。
pub trait LocalityProvider: Send + Sync {
    /// 返回调用线程所在进程的 Locality。
    fn current_locality_id(&self) -> LocalityId;
}

/// 固定 Locality 的提供者，适用于单进程部署与测试。
#[derive(Clone, Copy, Debug)]
pub struct StaticLocality(LocalityId);

impl StaticLocality {
    pub const fn new(locality: LocalityId) -> Self {
        Self(locality)
    }
}

impl LocalityProvider for StaticLocality {
    fn current_locality_id(&self) -> LocalityId {
        self.0
    }
}

/// 组件类型注册表。
///
/// # 教案式说明
/// - **意图 (Why)**：日志与诊断需要可读的类型名，而地址与句柄只携带数值标签；
/// - **契约 (What)**：`register` 对同名类型幂等；`type_name` 对未登记的标签返回 `"unknown"`，
///   不会失败。
pub trait ComponentTypeRegistry: Send + Sync {
    /// 登记（或查找）类型名对应的标签。
    fn register(&self, name: &str) -> ComponentType;

    /// 查询标签对应的类型名。
    fn type_name(&self, component_type: ComponentType) -> Arc<str>;
}

/// 进程内的类型注册表，标签按登记顺序从 0 递增分配。
#[derive(Debug, Default)]
pub struct TypeRegistry {
    table: RwLock<TypeTable>,
}

#[derive(Debug, Default)]
struct TypeTable {
    by_name: HashMap<Arc<str>, ComponentType>,
    names: Vec<Arc<str>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已登记的类型数量。
    pub fn len(&self) -> usize {
        self.table.read().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ComponentTypeRegistry for TypeRegistry {
    fn register(&self, name: &str) -> ComponentType {
        if let Some(existing) = self.table.read().by_name.get(name) {
            return *existing;
        }
        let mut table = self.table.write();
        // 读锁释放后可能已有其他线程完成登记
        if let Some(existing) = table.by_name.get(name) {
            return *existing;
        }
        let component_type = ComponentType::new(table.names.len() as u32);
        let name: Arc<str> = Arc::from(name);
        table.names.push(name.clone());
        table.by_name.insert(name, component_type);
        component_type
    }

    fn type_name(&self, component_type: ComponentType) -> Arc<str> {
        self.table
            .read()
            .names
            .get(component_type.get() as usize)
            .cloned()
            .unwrap_or_else(|| Arc::from("unknown"))
    }
}
