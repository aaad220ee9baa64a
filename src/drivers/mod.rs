// src/drivers/mod.rs
// 设备同步协议的各个组件
pub mod consolidator;
pub mod error;
pub mod exchange;
pub mod frame;
pub mod listing;
pub mod transport;
pub mod validator;
// 公开导出，方便外部调用
pub use consolidator::{consolidate, discover_local_files};
pub use error::SyncError;
pub use exchange::Session;
pub use frame::{extract_frame, Frame};
pub use listing::resolve_listing;
#[cfg(test)]
pub use transport::ManualTransport;
pub use transport::{SerialTransport, Transport};
pub use validator::{normalize, RowPredicate};
