pub mod controls;
pub mod debug;
pub mod list_cursor;
pub mod results;
pub mod sql_editor;
pub mod text_input;
pub mod text_input_common;
