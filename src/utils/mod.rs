//! 通用工具模块

pub mod ip;
pub mod url_validator;

/// 校验 tracking_id 的形态：1–64 位的字母数字 / `-` / `_`
///
/// 入口参数先过这一层，明显畸形的 id 不进入数据库查询。
pub fn is_valid_tracking_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
