pub mod balance_writer;
pub mod script_reader;
