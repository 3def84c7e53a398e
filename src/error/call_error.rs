//! 下游调用错误与节点故障判定

use super::code::ErrorCode;
use std::error::Error as StdError;
use thiserror::Error;

/// 传输层上报的调用错误
///
/// RPC 层在调用结束后把失败原因包装成 `CallError` 放进 `DoneInfo`，
/// 选择器只读取其中的错误代码用于评分，从不向上抛出
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("调用错误 [{code}] {reason}")]
pub struct CallError {
    pub code: ErrorCode,
    pub reason: String,
}

impl CallError {
    pub fn new(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// 调用超时（deadline exceeded）
    pub fn deadline_exceeded(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::OperationTimeout, reason)
    }

    /// 调用被取消
    pub fn canceled(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::OperationCanceled, reason)
    }

    /// 服务不可用
    pub fn service_unavailable(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, reason)
    }

    /// 网关超时
    pub fn gateway_timeout(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::GatewayTimeout, reason)
    }

    /// 业务错误，不影响节点评分
    pub fn application(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::OperationFailed, reason)
    }

    /// 根据 HTTP 响应状态码构造
    pub fn from_http_status(status: http::StatusCode) -> Self {
        let code = match status {
            http::StatusCode::SERVICE_UNAVAILABLE => ErrorCode::ServiceUnavailable,
            http::StatusCode::GATEWAY_TIMEOUT => ErrorCode::GatewayTimeout,
            http::StatusCode::REQUEST_TIMEOUT => ErrorCode::OperationTimeout,
            http::StatusCode::BAD_GATEWAY => ErrorCode::NetworkError,
            http::StatusCode::TOO_MANY_REQUESTS => ErrorCode::ResourceExhausted,
            s if s.is_client_error() => ErrorCode::InvalidParameter,
            s if s.is_server_error() => ErrorCode::InternalError,
            _ => ErrorCode::UnknownError,
        };
        Self::new(code, status.to_string())
    }

    /// 是否应当降低节点健康分
    pub fn is_node_failure(&self) -> bool {
        self.code.is_node_failure()
    }
}

impl From<tonic::Status> for CallError {
    fn from(status: tonic::Status) -> Self {
        Self::from(&status)
    }
}

impl From<&tonic::Status> for CallError {
    fn from(status: &tonic::Status) -> Self {
        // 根据 gRPC 状态码映射到错误代码
        let code = match status.code() {
            tonic::Code::DeadlineExceeded => ErrorCode::OperationTimeout,
            tonic::Code::Cancelled => ErrorCode::OperationCanceled,
            tonic::Code::Unavailable => ErrorCode::ServiceUnavailable,
            tonic::Code::ResourceExhausted => ErrorCode::ResourceExhausted,
            tonic::Code::InvalidArgument => ErrorCode::InvalidParameter,
            tonic::Code::Unimplemented => ErrorCode::OperationNotSupported,
            tonic::Code::Internal => ErrorCode::InternalError,
            tonic::Code::Unknown => ErrorCode::UnknownError,
            _ => ErrorCode::OperationFailed,
        };
        Self::new(code, status.message())
    }
}

/// 判断一次调用错误是否属于节点健康信号
///
/// 沿 `source()` 链逐层检查：
/// - `CallError`：错误代码为节点故障
/// - `tonic::Status`：`DeadlineExceeded` / `Cancelled` / `Unavailable`
/// - `std::io::Error`：任何 IO 错误都视为网络错误
/// - `tokio::time::error::Elapsed`：调用方超时
pub fn is_node_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(call) = e.downcast_ref::<CallError>() {
            if call.is_node_failure() {
                return true;
            }
        } else if let Some(status) = e.downcast_ref::<tonic::Status>() {
            if matches!(
                status.code(),
                tonic::Code::DeadlineExceeded | tonic::Code::Cancelled | tonic::Code::Unavailable
            ) {
                return true;
            }
        } else if e.is::<std::io::Error>() || e.is::<tokio::time::error::Elapsed>() {
            return true;
        }
        current = e.source();
    }
    false
}
