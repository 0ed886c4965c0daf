mod concurrency_tests;
mod helpers;
