//! Application Services
//!
//! Services that drive the use cases.
//!
//! - `refresh_queue`: HTTP-to-loop hand-off of row refresh requests
//! - `SyncLoop`: the polling loop that owns all workbook I/O and order calls

mod refresh_queue;
mod sync_loop;

pub use refresh_queue::{
    RefreshQueueError, RefreshReceiver, RefreshRequest, RefreshSender, refresh_queue,
};
pub use sync_loop::{SyncLoop, SyncLoopConfig};
