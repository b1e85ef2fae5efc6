pub mod download;
pub mod file_tools;
pub mod image_tools;
pub mod log;
pub mod prediction;

#[cfg(test)]
pub mod test_data;
