pub mod credit_ledger;
pub mod gcode_file;
pub mod notification_setting;
pub mod print;
pub mod print_shot_feedback;
pub mod printer;
pub mod printer_command;
pub mod task_queue;
pub mod user;

pub use credit_ledger::CreditLedgerRepository;
pub use gcode_file::GCodeFileRepository;
pub use notification_setting::NotificationSettingRepository;
pub use print::PrintRepository;
pub use print_shot_feedback::PrintShotFeedbackRepository;
pub use printer::PrinterRepository;
pub use printer_command::PrinterCommandRepository;
pub use task_queue::TaskQueueRepository;
pub use user::UserRepository;
