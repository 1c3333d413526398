//! 选择器统一错误类型
//!
//! 核心路径不 panic，所有失败以类型化错误跨越 API 边界

use thiserror::Error;
use tonic::Status;

/// 选择器结果类型
pub type Result<T> = std::result::Result<T, SelectorError>;

/// 选择器错误
#[derive(Error, Debug)]
pub enum SelectorError {
    /// 候选节点为空（未加载、被过滤器清空、或负载均衡器拒绝）
    #[error("no_available_node")]
    NoAvailable,

    /// 注册中心瞬时错误，由 watch 循环退避重试
    #[error("registry error: {0}")]
    Registry(String),

    /// 调用方取消，watch 循环静默退出
    #[error("watch canceled")]
    Canceled,

    /// 服务实例的 endpoint 无法解析
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl SelectorError {
    /// 创建注册中心错误
    pub fn registry(msg: impl Into<String>) -> Self {
        SelectorError::Registry(msg.into())
    }

    /// 创建 endpoint 解析错误
    pub fn invalid_endpoint(msg: impl Into<String>) -> Self {
        SelectorError::InvalidEndpoint(msg.into())
    }

    /// 是否为取消
    pub fn is_canceled(&self) -> bool {
        matches!(self, SelectorError::Canceled)
    }
}

/// 传输层将 NoAvailable 转为可重试的 gRPC 状态
impl From<SelectorError> for Status {
    fn from(err: SelectorError) -> Self {
        match err {
            SelectorError::NoAvailable => Status::unavailable("no_available_node"),
            SelectorError::Registry(msg) => Status::unavailable(msg),
            SelectorError::Canceled => Status::cancelled("watch canceled"),
            SelectorError::InvalidEndpoint(msg) => Status::invalid_argument(msg),
        }
    }
}
