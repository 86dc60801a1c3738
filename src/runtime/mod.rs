//! 运行时：启动、关闭、服务器模式

pub mod lifetime;
pub mod modes;
