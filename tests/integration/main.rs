// Integration tests

mod app_store_client_test;
mod support;
