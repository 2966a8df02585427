use super::{VoiceOutcome, VoicePipeline, VoicePipelineError, VoiceStage, VoiceUpdate};
use crate::control::CommandSender;
use crate::dispatch::{Delivery, DeliverySender};
use crate::{error_chain, log_debug};
use std::sync::Arc;
use std::thread;

/// Handle on one background voice run.
pub struct VoiceJob {
    handle: Option<thread::JoinHandle<Result<VoiceOutcome, VoicePipelineError>>>,
}

impl VoiceJob {
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |handle| handle.is_finished())
    }

    /// Block until the run ends and return its result.
    pub fn wait(mut self) -> Result<VoiceOutcome, VoicePipelineError> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or(Err(VoicePipelineError::WorkerPanicked)),
            None => Err(VoicePipelineError::WorkerPanicked),
        }
    }
}

/// Check the pipeline can run, then capture and classify on a new thread.
///
/// Preflight failures return immediately and no thread is started. Stage
/// changes and the final outcome are queued on `tx` as [`Delivery::Voice`].
pub fn start_voice_job(
    pipeline: Arc<VoicePipeline>,
    sender: CommandSender,
    tx: DeliverySender,
) -> Result<VoiceJob, VoicePipelineError> {
    pipeline.preflight()?;

    let handle = thread::spawn(move || {
        let progress_tx = tx.clone();
        let mut report = move |stage: VoiceStage| {
            let _ = progress_tx.send(Delivery::Voice(VoiceUpdate::Stage { stage }));
        };
        let result = pipeline.run(&sender, &mut report);
        let update = match &result {
            Ok(outcome) => VoiceUpdate::Completed {
                outcome: outcome.clone(),
            },
            Err(err) => {
                let reason = error_chain(err);
                log_debug(&format!("voice command failed: {reason}"));
                tracing::warn!(error = %reason, "voice command failed");
                VoiceUpdate::Failed { reason }
            }
        };
        let _ = tx.send(Delivery::Voice(update));
        result
    });

    Ok(VoiceJob {
        handle: Some(handle),
    })
}
