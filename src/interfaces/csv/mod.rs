pub mod command_reader;
pub mod party_reader;
pub mod request_writer;
