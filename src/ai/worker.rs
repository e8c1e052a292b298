use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

use tracing::debug;

use crate::ai::codec;
use crate::ai::{AiError, AiService, ProblemInput};
use crate::audio::AudioBuffer;
use crate::event::AppEvent;
use crate::store::schema::SavedProblem;

pub enum AiJob {
    Verify(ProblemInput),
    Solve(String),
    Drills { problem: String, solution: String },
    Speech { text: String, sample_rate: u32 },
    Analysis(Vec<SavedProblem>),
}

impl AiJob {
    fn name(&self) -> &'static str {
        match self {
            AiJob::Verify(_) => "verify",
            AiJob::Solve(_) => "solve",
            AiJob::Drills { .. } => "drills",
            AiJob::Speech { .. } => "speech",
            AiJob::Analysis(_) => "analysis",
        }
    }
}

#[derive(Debug)]
pub enum AiReply {
    Verified(Result<String, AiError>),
    Solved(Result<String, AiError>),
    Drills(Result<String, AiError>),
    Speech(Result<AudioBuffer, AiError>),
    Analysis(Result<String, AiError>),
}

/// Run `job` to completion on the calling thread.
pub fn run_job(service: &dyn AiService, job: AiJob) -> AiReply {
    match job {
        AiJob::Verify(input) => AiReply::Verified(service.verify(&input)),
        AiJob::Solve(problem) => AiReply::Solved(service.solve(&problem)),
        AiJob::Drills { problem, solution } => {
            AiReply::Drills(service.generate_drills(&problem, &solution))
        }
        AiJob::Speech { text, sample_rate } => AiReply::Speech(
            service
                .synthesize_speech(&text)
                .and_then(|encoded| codec::decode_speech(&encoded, sample_rate)),
        ),
        AiJob::Analysis(problems) => AiReply::Analysis(service.analyze_library(&problems)),
    }
}

/// Run `job` on its own thread and post the reply to the event loop.
pub fn spawn_job(service: Arc<dyn AiService>, job: AiJob, tx: Sender<AppEvent>) {
    let name = job.name();
    debug!(job = name, "dispatching AI request");
    thread::spawn(move || {
        let reply = run_job(service.as_ref(), job);
        // The receiver is gone only when the app is shutting down.
        let _ = tx.send(AppEvent::Ai(reply));
    });
}
