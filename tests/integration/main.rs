//! End-to-end tests for the crawler and the inventory scanner

mod crawl_tests;
mod inventory_tests;
mod support;
