use crate::{
    metrics::hrv::{hrv_summary, HrvSummary},
    pipeline::{Pipeline, TickOutputs},
    signal::Sample,
    source::FrameSource,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// What a finished or cancelled session leaves behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub ticks_accepted: usize,
    pub ticks_rejected: usize,
    pub cancelled: bool,
    pub sampling_rate_hz: u32,
    pub last_outputs: Option<TickOutputs>,
    pub hrv: HrvSummary,
}

/// Feed `source` into `pipeline` one tick at a time until the stream ends or
/// `cancel` is raised. Rejected ticks are logged and skipped; source errors
/// end the session.
pub fn run_session<S, F>(
    source: &mut S,
    pipeline: &mut Pipeline,
    cancel: &AtomicBool,
    mut on_tick: F,
) -> Result<SessionSummary>
where
    S: FrameSource + ?Sized,
    F: FnMut(&Sample, &TickOutputs),
{
    let mut accepted = 0;
    let mut rejected = 0;
    let mut last_outputs = None;
    let mut cancelled = false;
    loop {
        if cancel.load(Ordering::Relaxed) {
            cancelled = true;
            break;
        }
        let Some(sample) = source.next_sample()? else {
            break;
        };
        match pipeline.push_sample(sample) {
            Ok(outputs) => {
                accepted += 1;
                on_tick(&sample, &outputs);
                last_outputs = Some(outputs);
            }
            Err(err) => {
                rejected += 1;
                log::warn!("dropping tick: {err}");
            }
        }
    }
    let intervals: Vec<f64> = pipeline.intervals().iter().map(|i| i.seconds).collect();
    log::info!("session finished: {accepted} ticks accepted, {rejected} rejected");
    Ok(SessionSummary {
        ticks_accepted: accepted,
        ticks_rejected: rejected,
        cancelled,
        sampling_rate_hz: pipeline.sampling_rate(),
        last_outputs,
        hrv: hrv_summary(&intervals),
    })
}
