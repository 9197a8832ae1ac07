//! Integration tests for cardpress-yoto
//!
//! Uses wiremock to simulate the Yoto authorization server and API and
//! verifies end-to-end behavior of the device-code flow, the upload
//! pipeline, and card content submission.

mod common;

mod test_content;
mod test_device_auth;
mod test_upload;
