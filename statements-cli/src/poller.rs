//! Fire-and-poll for server sessions.
//!
//! Progress is an async stream: one fetch per interval, ending after the
//! first terminal record or the first failed request. Dropping the stream
//! stops polling; the server job itself keeps running.

use anyhow::Result;
use futures_util::{Stream, StreamExt, stream};
use statements_core::{PollEvent, PollPhase, ProgressRecord};
use std::future::Future;
use std::time::Duration;

use crate::api::ClientResult;

struct PollState<F> {
    fetch: F,
    session_id: String,
    done: bool,
}

pub fn progress_stream<F, Fut>(
    session_id: String,
    interval: Duration,
    fetch: F,
) -> impl Stream<Item = ClientResult<ProgressRecord>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ClientResult<ProgressRecord>>,
{
    let init = PollState {
        fetch,
        session_id,
        done: false,
    };
    stream::unfold(init, move |mut st| async move {
        if st.done {
            return None;
        }
        tokio::time::sleep(interval).await;
        let item = (st.fetch)(st.session_id.clone()).await;
        st.done = match &item {
            Ok(record) => record.is_terminal(),
            Err(_) => true,
        };
        Some((item, st))
    })
}

/// Run one session from start to terminal phase. `on_progress` sees every
/// record as it arrives.
pub async fn drive<S, F, Fut>(
    start: S,
    interval: Duration,
    fetch: F,
    mut on_progress: impl FnMut(&ProgressRecord),
) -> Result<PollPhase>
where
    S: Future<Output = ClientResult<String>>,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ClientResult<ProgressRecord>>,
{
    let mut phase = PollPhase::Idle.next(PollEvent::Start)?;
    phase = match start.await {
        Ok(session_id) => phase.next(PollEvent::Started { session_id })?,
        Err(e) => phase.next(PollEvent::StartFailed(e.to_string()))?,
    };
    let Some(session_id) = phase.session_id().map(str::to_string) else {
        return Ok(phase);
    };
    tracing::debug!(%session_id, "polling");

    let progress = progress_stream(session_id, interval, fetch);
    futures_util::pin_mut!(progress);
    while let Some(item) = progress.next().await {
        phase = match item {
            Ok(record) => {
                on_progress(&record);
                phase.next(PollEvent::Progress(record))?
            }
            Err(e) => phase.next(PollEvent::PollFailed(e.to_string()))?,
        };
        if phase.is_terminal() {
            break;
        }
    }
    Ok(phase)
}
