pub mod models;

pub use models::events::{LedgerEvent, LedgerEventKind};
