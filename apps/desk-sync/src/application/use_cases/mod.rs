//! Application Use Cases
//!
//! Use cases orchestrate domain logic to fulfill application requirements.

mod manage_orders;
mod refresh_row;
mod sync_input;
mod write_account;

pub use manage_orders::{AmendmentReport, EntryReport, ManageOrdersUseCase};
pub use refresh_row::{RefreshRowUseCase, RowOutcome};
pub use sync_input::{SyncInputUseCase, generated_symbols};
pub use write_account::WriteAccountUseCase;
