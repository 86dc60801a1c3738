//! System-level modules
//!
//! 进程级基础设施：日志初始化等。

pub mod logging;
