//! Database models, one module per table.
//! Everything is re-exported so callers can `use crate::db::models::*;`.

pub mod credit;
pub mod gcode_file;
pub mod notification_setting;
pub mod print;
pub mod print_shot_feedback;
pub mod printer;
pub mod printer_command;
pub mod task;
pub mod user;

pub use self::credit::*;
pub use self::gcode_file::*;
pub use self::notification_setting::*;
pub use self::print::*;
pub use self::print_shot_feedback::*;
pub use self::printer::*;
pub use self::printer_command::*;
pub use self::task::*;
pub use self::user::*;
