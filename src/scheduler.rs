use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime};
use rand::thread_rng;
use teloxide::adaptors::Throttle;
use teloxide::Bot;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::services::broadcast::{broadcast, OutgoingMessage};
use crate::services::submission::pick_daily;
use crate::state::AppState;
use crate::utils::keyboard;

/// Handle to the daily digest task. Dropping it does not stop the task;
/// call [`DigestScheduler::shutdown`] for an orderly stop.
pub struct DigestScheduler {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DigestScheduler {
    pub fn spawn(bot: Throttle<Bot>, state: Arc<AppState>) -> Self {
        let (stop, mut stopped) = watch::channel(false);
        let send_time = state.config.digest.send_time;

        let task = tokio::spawn(async move {
            loop {
                let now = Local::now().naive_local();
                let target = next_occurrence(now, send_time);
                let wait = (target - now)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                info!("Next daily digest at {}", target);

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        run_daily_digest(&bot, &state).await;
                    }
                    _ = stopped.changed() => {
                        if *stopped.borrow() {
                            info!("Digest scheduler stopping");
                            return;
                        }
                    }
                }
            }
        });

        Self { stop, task }
    }

    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            error!("Digest task did not shut down cleanly: {}", e);
        }
    }
}

/// One digest run: draw a random motivation from today's approved pool and
/// fan it out to every active user. Unscheduled approved motivations stay in
/// the pool every day; repeats across days are accepted.
async fn run_daily_digest(bot: &Throttle<Bot>, state: &AppState) {
    let today = Local::now().date_naive();
    let pool = match state.submissions.daily_pool(today).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Digest skipped, could not load pool: {}", e);
            return;
        }
    };

    let picked = {
        let mut rng = thread_rng();
        pick_daily(&pool, &mut rng).cloned()
    };
    let Some(submission) = picked else {
        info!("Digest skipped, no approved motivation for {}", today);
        return;
    };

    let recipients = match state.users.active_user_ids().await {
        Ok(ids) => ids,
        Err(e) => {
            error!("Digest aborted, could not list recipients: {}", e);
            return;
        }
    };

    let report = broadcast(bot, &recipients, |_| {
        OutgoingMessage::with_keyboard(
            submission.text.clone(),
            keyboard::get_reaction_keyboard(submission.id, &submission.text),
        )
    })
    .await;

    info!(
        "Daily digest (motivation {}) delivered: {} sent, {} failed",
        submission.id, report.sent, report.failed
    );
}

/// The next moment `at` occurs, strictly after `now`. If today's slot has
/// already passed (or is exactly now), the slot is tomorrow's.
fn next_occurrence(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today_slot = now.date().and_time(at);
    if today_slot > now {
        today_slot
    } else {
        today_slot + chrono::Duration::days(1)
    }
}
