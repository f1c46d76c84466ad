use std::fmt;

#[derive(Debug, Clone)]
pub enum ShortstatError {
    ConfigLoad(String),
    Validation(String),
    FileOperation(String),
    NotFound(String),
}

impl ShortstatError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ShortstatError::ConfigLoad(_) => "E001",
            ShortstatError::Validation(_) => "E002",
            ShortstatError::FileOperation(_) => "E003",
            ShortstatError::NotFound(_) => "E004",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ShortstatError::ConfigLoad(_) => "Configuration Load Error",
            ShortstatError::Validation(_) => "Validation Error",
            ShortstatError::FileOperation(_) => "File Operation Error",
            ShortstatError::NotFound(_) => "Resource Not Found",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            ShortstatError::ConfigLoad(msg) => msg,
            ShortstatError::Validation(msg) => msg,
            ShortstatError::FileOperation(msg) => msg,
            ShortstatError::NotFound(msg) => msg,
        }
    }

    /// 格式化为彩色输出（用于启动失败时打印到终端）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for ShortstatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for ShortstatError {}

// 便捷的构造函数
impl ShortstatError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        ShortstatError::Validation(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        ShortstatError::FileOperation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        ShortstatError::NotFound(msg.into())
    }
}

impl From<config::ConfigError> for ShortstatError {
    fn from(err: config::ConfigError) -> Self {
        ShortstatError::ConfigLoad(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShortstatError>;
