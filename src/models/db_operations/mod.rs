pub mod users_db_operations;
pub mod ong_db_operations;
pub mod case_db_operations;
pub mod media_db_operations;
pub mod notification_db_operations;
