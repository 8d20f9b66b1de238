pub mod controls;
pub mod debug;
pub mod flow;
pub mod picker;
pub mod table;
pub mod text_input;
