//! Demo: running the image → video pipeline against MockJobClient.
//!
//! Run with: `cargo run --example mock_pipeline`

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use video_pipeline::{
    CredentialSource, Event, ExecCtx, FnEventHandler, MockJob, MockJobClient, PipelineOutcome,
    PollConfig, Stage, StagePipeline,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Image finishes after two pending checks, video after four
    let mock = Arc::new(MockJobClient::new(vec![
        MockJob::succeeds_after(2, json!(["https://example.com/cat.png"])),
        MockJob::succeeds_after(4, json!("https://example.com/cat.mp4")),
    ]));

    let ctx = ExecCtx::builder("http://unused")
        .backend(mock.clone())
        .credential(CredentialSource::fixed("demo-token"))
        .event_handler(Arc::new(FnEventHandler(|event: Event| match event {
            Event::StageStart { stage } => println!("[{}] submitting", stage),
            Event::JobSubmitted { stage, job_id } => println!("[{}] job {}", stage, job_id),
            Event::PollAttempt {
                stage,
                attempt,
                status,
            } => println!("[{}] attempt {} -> {}", stage, attempt, status),
            Event::StageEnd { stage, ok } => println!("[{}] done ok={}", stage, ok),
        })))
        .build();

    let poll = PollConfig::new(Duration::from_millis(50), 10);
    let pipeline = StagePipeline::new()
        .with_image_stage(Stage::image().with_poll(poll))
        .with_video_stage(Stage::video().with_poll(poll));

    match pipeline.run(&ctx, "a cat dancing in the rain").await {
        PipelineOutcome::Success {
            image_url,
            video_url,
        } => {
            println!("Image: {}", image_url);
            println!("Video: {}", video_url);
        }
        other => println!("Pipeline did not succeed: {:?}", other),
    }

    println!(
        "Submits: {}, status checks: {}",
        mock.submit_calls(),
        mock.poll_calls()
    );
    Ok(())
}
