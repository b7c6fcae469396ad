use crate::*;

mod fixtures;

mod intern_tests;
mod printer_tests;
