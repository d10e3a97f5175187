pub mod crc16;
pub mod payload;
pub mod validator;
