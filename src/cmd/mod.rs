//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled          |
//! |-----------|---------------------------|
//! | `status`  | `Status`, `Admit`         |
//! | `compact` | `Compact`, `NewSession`   |
//! | `watch`   | `Watch`                   |
//! | `analyze` | `Analyze`                 |

pub mod analyze;
pub mod compact;
pub mod status;
pub mod watch;

pub use analyze::cmd_analyze;
pub use compact::{cmd_compact, cmd_new_session};
pub use status::{cmd_admit, cmd_status};
pub use watch::cmd_watch;
