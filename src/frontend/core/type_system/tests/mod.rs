//! 类型系统性质测试
