use std::time::Duration;

use futures::{stream, Stream, StreamExt};
use shared::{
    domain::{AnalysisId, AnalysisStatus},
    protocol::Analysis,
};
use tokio::time::{self, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tracing::{error, info};

use crate::{error::Result, BoosterApi};

const MIN_INTERVAL: Duration = Duration::from_secs(1);

pub struct AnalysisPoller {
    id: AnalysisId,
    interval: Duration,
    last_status: Option<AnalysisStatus>,
}

impl AnalysisPoller {
    /// Intervals shorter than one second are raised to one second.
    pub fn new(id: AnalysisId, interval: Duration) -> Self {
        Self {
            id,
            interval: interval.max(MIN_INTERVAL),
            last_status: None,
        }
    }

    pub fn id(&self) -> &AnalysisId {
        &self.id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_status(&self) -> Option<AnalysisStatus> {
        self.last_status
    }

    pub async fn poll_once(&mut self, api: &dyn BoosterApi) -> Result<Analysis> {
        let analysis = api.analysis(&self.id).await.map_err(|err| {
            error!(analysis_id = %self.id, error = %err, "status poll failed");
            err
        })?;
        let status = analysis.status();
        if self.last_status != Some(status) {
            info!(
                analysis_id = %self.id,
                status = %status,
                processed_trees = analysis.nboot,
                "analysis status changed"
            );
            self.last_status = Some(status);
        }
        Ok(analysis)
    }

    /// Polls every interval, first tick immediately. The stream yields one
    /// snapshot per successful poll and ends after the first terminal status.
    /// Failed polls are logged and skipped.
    pub fn watch<'a>(self, api: &'a dyn BoosterApi) -> impl Stream<Item = Analysis> + Send + 'a {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let ticks = IntervalStream::new(interval);

        stream::unfold(
            (self, ticks, false),
            move |(mut poller, mut ticks, finished)| async move {
                if finished {
                    return None;
                }
                loop {
                    ticks.next().await?;
                    if let Ok(analysis) = poller.poll_once(api).await {
                        let finished = analysis.status().is_terminal();
                        return Some((analysis, (poller, ticks, finished)));
                    }
                }
            },
        )
    }
}

#[cfg(test)]
#[path = "tests/poller_tests.rs"]
mod tests;
