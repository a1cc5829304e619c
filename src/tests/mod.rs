mod assembler_tests;
mod payload_tests;
