use reqwest::StatusCode;
use thiserror::Error;

/// 托管 API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("请求发送失败：{0}")]
    Http(#[from] reqwest::Error),

    #[error("API 返回错误状态 {status}：{body}")]
    Status { status: StatusCode, body: String },

    #[error("API 拒绝请求：{0}")]
    Rejected(String),

    #[error("解析响应失败：{source}，原始内容：{body}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    #[error("未配置 API key（设置 AGENTLINK_API_KEY 或 config.toml 中的 api.api_key）")]
    MissingApiKey,
}

impl ApiError {
    /// 资源已不存在，删除时视为成功
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    /// 传输错误、429 和 5xx 可以重试
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ApiError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

/// 本地工具分发错误
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("未找到工具对应的函数：{0}")]
    UnknownTool(String),

    #[error("工具 {tool} 参数无效：{reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("工具 {tool} 执行失败：{source}")]
    Failed {
        tool: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_rate_limits_retry() {
        let retry = |status| ApiError::Status {
            status,
            body: String::new(),
        };
        assert!(retry(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(retry(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(!retry(StatusCode::UNAUTHORIZED).is_retryable());
        assert!(!retry(StatusCode::NOT_FOUND).is_retryable());
    }

    #[test]
    fn not_found_is_recognised() {
        let missing = ApiError::Status {
            status: StatusCode::NOT_FOUND,
            body: String::new(),
        };
        assert!(missing.is_not_found());
        assert!(!ApiError::Rejected("gone".into()).is_not_found());
    }

    #[test]
    fn rejections_do_not_retry() {
        assert!(!ApiError::Rejected("bad".into()).is_retryable());
        assert!(!ApiError::MissingApiKey.is_retryable());
    }
}
