//! 进程级选择器构建器
//!
//! 只在启动期配置，热路径不读取

use std::sync::Arc;

use parking_lot::RwLock;

use super::Builder;

static GLOBAL_SELECTOR: RwLock<Option<Arc<dyn Builder>>> = RwLock::new(None);

/// 读取全局选择器构建器
pub fn global_selector() -> Option<Arc<dyn Builder>> {
    GLOBAL_SELECTOR.read().clone()
}

/// 设置全局选择器构建器
pub fn set_global_selector(builder: Arc<dyn Builder>) {
    *GLOBAL_SELECTOR.write() = Some(builder);
}
