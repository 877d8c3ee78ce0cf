//! # Lab Core
//!
//! 实验室系统的核心模块，提供基础数据结构、错误定义、结果值校验和通用工具。

pub mod error;
pub mod models;
pub mod utils;
pub mod validation;

pub use error::{LabError, Result};
pub use models::*;
pub use validation::ValueRules;
