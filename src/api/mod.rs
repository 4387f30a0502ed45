//
// Presentation-facing entry points. Keep logic in the domain modules.
//

pub mod core;
pub mod sync_progress;

pub use self::core::SyncEngine;
