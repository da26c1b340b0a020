//! 组件与对象池共享的外部协作者集合。

use std::{fmt, sync::Arc};

use crate::{
    address::{ComponentTypeRegistry, LocalityId, LocalityProvider, StaticLocality, TypeRegistry},
    binding::{BindingService, LocalDirectory},
    config::IdentityConfig,
};

/// 目录服务、Locality 提供者、类型注册表与配置的显式句柄。
///
/// # 教案式说明
/// - **意图 (Why)**：以构造参数传递协作者，取代进程级单例，使多个相互隔离的运行时可以
///   在同一进程（例如同一测试二进制）中并存；
/// - **契约 (What)**：克隆成本为若干次 `Arc` 计数递增；所有协作者都是 `Send + Sync`；
/// - **风险 (Trade-offs)**：动态分发带来一次间接调用，绑定路径本身远比它昂贵。
#[derive(Clone)]
pub struct IdentityServices {
    binding: Arc<dyn BindingService>,
    locality: Arc<dyn LocalityProvider>,
    types: Arc<dyn ComponentTypeRegistry>,
    config: IdentityConfig,
}

impl IdentityServices {
    /// 以外部提供的协作者组装，使用缺省配置。
    pub fn new(
        binding: Arc<dyn BindingService>,
        locality: Arc<dyn LocalityProvider>,
        types: Arc<dyn ComponentTypeRegistry>,
    ) -> Self {
        Self {
            binding,
            locality,
            types,
            config: IdentityConfig::default(),
        }
    }

    /// 单 Locality 部署：进程内目录、固定 Locality 与进程内类型注册表。
    pub fn local(locality: LocalityId) -> Self {
        Self::new(
            Arc::new(LocalDirectory::new(locality)),
            Arc::new(StaticLocality::new(locality)),
            Arc::new(TypeRegistry::new()),
        )
    }

    /// 替换配置。
    #[must_use]
    pub fn with_config(mut self, config: IdentityConfig) -> Self {
        self.config = config;
        self
    }

    pub fn binding(&self) -> &dyn BindingService {
        self.binding.as_ref()
    }

    /// 调用线程所在的 Locality。
    pub fn locality_id(&self) -> LocalityId {
        self.locality.current_locality_id()
    }

    pub fn types(&self) -> &dyn ComponentTypeRegistry {
        self.types.as_ref()
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }
}

impl fmt::Debug for IdentityServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityServices")
            .field("locality", &self.locality_id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
