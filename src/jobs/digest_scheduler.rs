// ==================== WEEKLY DIGEST SCHEDULER ====================
// Job automático que envia o digest semanal (padrão: segunda-feira 00:00 UTC,
// equivalente ao cron `0 0 * * 1`).
//
// Uma única task em background: dorme até o próximo horário, executa o
// dispatcher até o fim e só então calcula o próximo horário. Execuções nunca
// se sobrepõem.

use crate::{config::DigestConfig, services::digest_service::DigestDispatcher};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, TimeZone, Utc, Weekday};
use std::sync::Arc;

/// Inicia o scheduler semanal do digest
pub async fn start_weekly_digest_scheduler(dispatcher: Arc<DigestDispatcher>, config: &DigestConfig) {
    if !config.enabled {
        log::info!("⏸️  Weekly digest scheduler DISABLED (DIGEST_ENABLED=false)");
        return;
    }

    let weekday = config.weekday;
    let hour = config.hour;
    let run_on_startup = config.run_on_startup;

    log::info!(
        "📅 Starting weekly digest scheduler (every {:?} at {:02}:00 UTC)",
        weekday, hour
    );

    tokio::spawn(async move {
        if run_on_startup {
            log::info!("🚀 Running digest on startup (DIGEST_RUN_ON_STARTUP=true)...");
            run_digest(&dispatcher).await;
        }

        loop {
            let now = Utc::now();
            let next = next_run_after(now, weekday, hour);
            let wait = (next - now).to_std().unwrap_or_default();

            log::info!("⏰ Next digest run at {} (in {}h)", next, wait.as_secs() / 3600);
            tokio::time::sleep(wait).await;

            run_digest(&dispatcher).await;
        }
    });

    log::info!("✅ Weekly digest scheduler started successfully");
}

async fn run_digest(dispatcher: &DigestDispatcher) {
    let start = std::time::Instant::now();

    match dispatcher.run().await {
        Ok(summary) => {
            log::info!(
                "✅ Digest run completed: {} users, {} sent ({:.1}s)",
                summary.total,
                summary.sent,
                start.elapsed().as_secs_f64()
            );
        }
        Err(e) => {
            log::error!("❌ Digest run failed: {}", e);
        }
    }
}

/// Next `weekday` at `hour:00` UTC strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>, weekday: Weekday, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or_default();

    let days_ahead = (7 + weekday.num_days_from_monday() as i64
        - now.weekday().num_days_from_monday() as i64)
        % 7;

    let candidate_date = now.date_naive() + ChronoDuration::days(days_ahead);
    let candidate = Utc.from_utc_datetime(&candidate_date.and_time(time));

    if candidate > now {
        candidate
    } else {
        candidate + ChronoDuration::days(7)
    }
}
