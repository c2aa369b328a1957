pub mod credits;
pub mod feedback;
pub mod init;
pub mod printers;
pub mod prints;
pub mod status;
pub mod tasks;
