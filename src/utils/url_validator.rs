//! 重定向目标校验
//!
//! 重定向端点在 302 之前校验目标 URL，阻止危险协议被当作跳转目标。
//! 追踪改写只产生 http(s) 目标，这里是对外部传入 `url` 参数的防线。

use url::Url;

/// 目标 URL 校验错误
#[derive(Debug)]
pub enum TargetUrlError {
    Empty,
    DangerousScheme(String),
    UnsupportedScheme(String),
    Malformed(String),
}

impl std::fmt::Display for TargetUrlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "redirect target cannot be empty"),
            Self::DangerousScheme(scheme) => {
                write!(f, "dangerous scheme blocked: {}", scheme)
            }
            Self::UnsupportedScheme(scheme) => write!(
                f,
                "unsupported scheme: {}. Only http:// and https:// targets are allowed",
                scheme
            ),
            Self::Malformed(msg) => write!(f, "malformed redirect target: {}", msg),
        }
    }
}

impl std::error::Error for TargetUrlError {}

/// 危险协议列表
const DANGEROUS_SCHEMES: &[&str] = &[
    "javascript:",
    "data:",
    "file:",
    "vbscript:",
    "about:",
    "blob:",
];

/// 校验重定向目标
///
/// 1. 非空
/// 2. 不是危险协议
/// 3. http:// 或 https://
/// 4. 可被解析
pub fn validate_redirect_target(url: &str) -> Result<(), TargetUrlError> {
    let url = url.trim();

    if url.is_empty() {
        return Err(TargetUrlError::Empty);
    }

    let lower = url.to_lowercase();

    for scheme in DANGEROUS_SCHEMES {
        if lower.starts_with(scheme) {
            return Err(TargetUrlError::DangerousScheme(scheme.to_string()));
        }
    }

    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        let scheme = lower
            .split(':')
            .next()
            .map(|s| format!("{}:", s))
            .unwrap_or_default();
        return Err(TargetUrlError::UnsupportedScheme(scheme));
    }

    Url::parse(url).map_err(|e| TargetUrlError::Malformed(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_targets() {
        assert!(validate_redirect_target("http://example.com").is_ok());
        assert!(validate_redirect_target("https://example.com/a?x=1&y=2").is_ok());
        assert!(validate_redirect_target("HTTPS://example.com").is_ok());
    }

    #[test]
    fn blocks_dangerous_schemes() {
        assert!(matches!(
            validate_redirect_target("javascript:alert(1)"),
            Err(TargetUrlError::DangerousScheme(_))
        ));
        assert!(matches!(
            validate_redirect_target("DATA:text/html,x"),
            Err(TargetUrlError::DangerousScheme(_))
        ));
        assert!(matches!(
            validate_redirect_target("file:///etc/passwd"),
            Err(TargetUrlError::DangerousScheme(_))
        ));
    }

    #[test]
    fn rejects_other_schemes_and_empty() {
        assert!(matches!(
            validate_redirect_target("ftp://example.com"),
            Err(TargetUrlError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            validate_redirect_target("mailto:a@b.com"),
            Err(TargetUrlError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            validate_redirect_target("  "),
            Err(TargetUrlError::Empty)
        ));
    }
}
