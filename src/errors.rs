use std::fmt;

#[derive(Debug, Clone)]
pub enum MailbeaconError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    Validation(String),
    NotFound(String),
    Serialization(String),
    DateParse(String),
    Rewrite(String),
    TrackingPersistence(String),
}

impl MailbeaconError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            MailbeaconError::DatabaseConfig(_) => "E001",
            MailbeaconError::DatabaseConnection(_) => "E002",
            MailbeaconError::DatabaseOperation(_) => "E003",
            MailbeaconError::Validation(_) => "E004",
            MailbeaconError::NotFound(_) => "E005",
            MailbeaconError::Serialization(_) => "E006",
            MailbeaconError::DateParse(_) => "E007",
            MailbeaconError::Rewrite(_) => "E008",
            MailbeaconError::TrackingPersistence(_) => "E009",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            MailbeaconError::DatabaseConfig(_) => "Database Configuration Error",
            MailbeaconError::DatabaseConnection(_) => "Database Connection Error",
            MailbeaconError::DatabaseOperation(_) => "Database Operation Error",
            MailbeaconError::Validation(_) => "Validation Error",
            MailbeaconError::NotFound(_) => "Resource Not Found",
            MailbeaconError::Serialization(_) => "Serialization Error",
            MailbeaconError::DateParse(_) => "Date Parse Error",
            MailbeaconError::Rewrite(_) => "Rewrite Error",
            MailbeaconError::TrackingPersistence(_) => "Tracking Persistence Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            MailbeaconError::DatabaseConfig(msg)
            | MailbeaconError::DatabaseConnection(msg)
            | MailbeaconError::DatabaseOperation(msg)
            | MailbeaconError::Validation(msg)
            | MailbeaconError::NotFound(msg)
            | MailbeaconError::Serialization(msg)
            | MailbeaconError::DateParse(msg)
            | MailbeaconError::Rewrite(msg)
            | MailbeaconError::TrackingPersistence(msg) => msg,
        }
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for MailbeaconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for MailbeaconError {}

// 便捷的构造函数
impl MailbeaconError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        MailbeaconError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        MailbeaconError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        MailbeaconError::DatabaseOperation(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        MailbeaconError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        MailbeaconError::NotFound(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        MailbeaconError::Serialization(msg.into())
    }

    pub fn date_parse<T: Into<String>>(msg: T) -> Self {
        MailbeaconError::DateParse(msg.into())
    }

    pub fn rewrite<T: Into<String>>(msg: T) -> Self {
        MailbeaconError::Rewrite(msg.into())
    }

    pub fn tracking_persistence<T: Into<String>>(msg: T) -> Self {
        MailbeaconError::TrackingPersistence(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for MailbeaconError {
    fn from(err: sea_orm::DbErr) -> Self {
        MailbeaconError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for MailbeaconError {
    fn from(err: std::io::Error) -> Self {
        MailbeaconError::DatabaseOperation(err.to_string())
    }
}

impl From<serde_json::Error> for MailbeaconError {
    fn from(err: serde_json::Error) -> Self {
        MailbeaconError::Serialization(err.to_string())
    }
}

impl From<chrono::ParseError> for MailbeaconError {
    fn from(err: chrono::ParseError) -> Self {
        MailbeaconError::DateParse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MailbeaconError>;
