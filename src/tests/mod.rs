mod checker_tests;
mod db_tests;
mod extract_tests;
pub mod utils;
