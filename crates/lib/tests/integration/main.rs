//! End-to-end tests driving package evaluation through `Driver`.

mod common;

mod callback_tests;
mod concurrency_tests;
mod deferral_tests;
mod registration_tests;
