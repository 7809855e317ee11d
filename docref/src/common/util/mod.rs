mod date_utils;
mod task_util;

pub use date_utils::*;
pub use task_util::*;
