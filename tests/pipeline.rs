#[path = "pipeline/config_file.rs"]
mod config_file;
#[path = "pipeline/edit_to_feedback.rs"]
mod edit_to_feedback;
#[path = "pipeline/responses.rs"]
mod responses;
#[path = "support/pipeline_harness.rs"]
mod pipeline_harness;
