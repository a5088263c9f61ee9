//! # Credit Reminder Scanner
//!
//! Periodic scan for khata entries that are due soon or overdue.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Reminder Tick                            │
//! │                                                              │
//! │  interval ──► scan_for_day(today)                            │
//! │                   │                                          │
//! │                   ├─ due_within(today + window)              │
//! │                   ├─ skip settled (amount_left == 0)         │
//! │                   ├─ try_mark_reminded(credit, today)        │
//! │                   │      └─ UNIQUE(credit_id, reminded_on)   │
//! │                   │         loser skips, winner proceeds     │
//! │                   └─ notifier.notify(DueCredit)              │
//! │                          (after the mark commits)            │
//! │                                                              │
//! │  At most one reminder per credit per local day, across       │
//! │  restarts and concurrent scanners sharing the store.         │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use khata_core::{Credit, Money};
use khata_db::Database;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{AgentError, AgentResult};

// =============================================================================
// Due Credit
// =============================================================================

/// One credit picked up by a reminder scan, with everything a notifier
/// needs to render the reminder.
#[derive(Debug, Clone)]
pub struct DueCredit {
    /// Customer display name, when the credit is tied to a known customer.
    pub customer_name: Option<String>,
    /// Amount still owed.
    pub amount_left: Money,
    /// Days past due as of the scan day. Zero for not-yet-due credits.
    pub days_overdue: i64,
    /// The credit itself.
    pub credit: Credit,
}

// =============================================================================
// Notifier Seam
// =============================================================================

/// Delivery side of a reminder. Injected so the scanner never knows
/// whether reminders become log lines, chat messages, or SMS.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, due: &DueCredit) -> AgentResult<()>;
}

/// Default notifier: structured log line per due credit.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, due: &DueCredit) -> AgentResult<()> {
        info!(
            credit_id = %due.credit.id,
            customer = due.customer_name.as_deref().unwrap_or("unknown"),
            amount_left = due.amount_left.cents(),
            days_overdue = due.days_overdue,
            due_on = %due.credit.due_on,
            "Credit due reminder"
        );
        Ok(())
    }
}

// =============================================================================
// Scanner Handle
// =============================================================================

/// Handle for a running [`ReminderScanner`].
#[derive(Clone)]
pub struct ReminderScannerHandle {
    trigger_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl ReminderScannerHandle {
    /// Requests an immediate scan, outside the regular tick.
    pub async fn trigger_now(&self) -> AgentResult<()> {
        self.trigger_tx
            .send(())
            .await
            .map_err(|_| AgentError::ChannelClosed("reminder trigger".into()))
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> AgentResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| AgentError::ChannelClosed("reminder shutdown".into()))
    }
}

// =============================================================================
// Reminder Scanner
// =============================================================================

/// Background task that raises at-most-one reminder per credit per
/// local day.
///
/// The mark commits before the notifier runs, so a failing notifier
/// costs that day's reminder rather than producing duplicates.
pub struct ReminderScanner {
    db: Arc<Database>,
    notifier: Arc<dyn Notifier>,
    /// How many days ahead of the due date reminders start.
    window_days: u32,
    tick: Duration,
    trigger_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl ReminderScanner {
    /// Creates the scanner and its handle.
    pub fn new(
        db: Arc<Database>,
        notifier: Arc<dyn Notifier>,
        window_days: u32,
        tick: Duration,
    ) -> (Self, ReminderScannerHandle) {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let scanner = ReminderScanner {
            db,
            notifier,
            window_days,
            tick,
            trigger_rx,
            shutdown_rx,
        };
        let handle = ReminderScannerHandle {
            trigger_tx,
            shutdown_tx,
        };
        (scanner, handle)
    }

    /// Main scanner loop. The first scan runs at startup; after that one
    /// per tick, plus any manual triggers.
    pub async fn run(mut self) {
        info!(
            window_days = self.window_days,
            tick_secs = self.tick.as_secs(),
            "Reminder scanner started"
        );

        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.scan_once().await;
                }
                Some(_) = self.trigger_rx.recv() => {
                    debug!("Manual reminder scan triggered");
                    self.scan_once().await;
                }
                _ = self.shutdown_rx.recv() => {
                    info!("Reminder scanner shutting down");
                    break;
                }
            }
        }
    }

    async fn scan_once(&self) {
        let today = Local::now().date_naive();
        match self.scan_for_day(today).await {
            Ok(0) => debug!(%today, "Reminder scan found nothing new"),
            Ok(notified) => info!(%today, notified, "Reminder scan complete"),
            Err(e) => error!(%today, ?e, "Reminder scan failed"),
        }
    }

    /// Scans for credits due within the window as of `today` and raises
    /// reminders for the ones not yet reminded that day.
    ///
    /// Returns the number of reminders delivered.
    pub async fn scan_for_day(&self, today: NaiveDate) -> AgentResult<usize> {
        let horizon = today + chrono::Duration::days(i64::from(self.window_days));
        let due = self.db.credits().due_within(horizon).await?;

        let mut notified = 0;
        for credit in due {
            // Settled since the query ran, or zero-amount edge
            if credit.amount_left().is_zero() {
                continue;
            }

            let mut w = self.db.writer().await?;
            let won = self
                .db
                .credits()
                .try_mark_reminded(&mut w, &credit.id, today)
                .await?;
            w.commit().await?;

            if !won {
                continue;
            }

            let customer_name = match credit.customer_id.as_deref() {
                Some(cid) => self.db.customers().get_by_id(cid).await?.map(|c| c.name),
                None => None,
            };

            let due_credit = DueCredit {
                customer_name,
                amount_left: credit.amount_left(),
                days_overdue: credit.days_overdue(today),
                credit,
            };

            if let Err(e) = self.notifier.notify(&due_credit).await {
                warn!(credit_id = %due_credit.credit.id, ?e, "Notifier failed");
            } else {
                notified += 1;
            }
        }

        Ok(notified)
    }
}
