// ===============================
// src/orchestrator.rs
// ===============================
//
// Loop round-robin: tick tiap worker berurutan (satu per satu, tanpa paralel),
// jeda pendek antar worker, render dashboard, lalu tunggu poll interval.
// Error satu instrument hanya jadi note di worker tsb, loop jalan terus.
//
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::mpsc, time::sleep};
use tracing::{debug, info};

use crate::dashboard;
use crate::domain::{Event, InstrumentConfig, TickOutcome, WorkerSnapshot};
use crate::metrics::{CYCLES_REALIZED, PASSES, PNL_REALIZED, TICK_ERRORS};
use crate::venue::VenueClient;
use crate::worker::InstrumentWorker;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub poll_interval: Duration,
    pub tick_delay: Duration,
}

/// Running realized-profit total.
#[derive(Debug, Clone, Default)]
pub struct ProfitLedger {
    total: f64,
    cycles: u64,
}

impl ProfitLedger {
    /// Non-finite amounts are dropped. Returns whether the amount was counted.
    pub fn add(&mut self, amount: f64) -> bool {
        if !amount.is_finite() {
            return false;
        }
        self.total += amount;
        self.cycles += 1;
        true
    }
    pub fn total(&self) -> f64 { self.total }
    pub fn cycles(&self) -> u64 { self.cycles }
}

#[derive(Debug, Clone)]
pub struct PassReport {
    pub pass: u64,
    pub ts_ms: i64,
    pub realized_profit: f64,
    pub rows: Vec<WorkerSnapshot>,
}

pub struct Orchestrator {
    cfg: LoopConfig,
    workers: Vec<InstrumentWorker>,
    ledger: ProfitLedger,
    passes: u64,
    rec_tx: Option<mpsc::Sender<Event>>,
}

impl Orchestrator {
    pub fn new(cfg: LoopConfig, instruments: Vec<InstrumentConfig>, venue: Arc<dyn VenueClient>) -> Self {
        let workers = instruments
            .into_iter()
            .map(|ic| InstrumentWorker::new(ic, venue.clone()))
            .collect();
        Self { cfg, workers, ledger: ProfitLedger::default(), passes: 0, rec_tx: None }
    }

    pub fn with_recorder(mut self, rec_tx: mpsc::Sender<Event>) -> Self {
        self.rec_tx = Some(rec_tx);
        self
    }

    pub fn add_profit(&mut self, amount: f64) {
        if self.ledger.add(amount) {
            PNL_REALIZED.set(self.ledger.total());
            CYCLES_REALIZED.inc();
        } else {
            debug!(amount, "non-finite profit dropped");
        }
    }

    pub fn realized_profit(&self) -> f64 { self.ledger.total() }

    pub fn passes(&self) -> u64 { self.passes }

    pub fn snapshots(&self) -> Vec<WorkerSnapshot> { self.workers.iter().map(|w| w.snapshot()).collect() }

    /// One round-robin pass over all workers.
    pub async fn run_pass(&mut self) -> PassReport {
        for i in 0..self.workers.len() {
            let result = self.workers[i].tick().await;
            let instrument_id = self.workers[i].instrument_id().to_string();
            match result {
                Ok(outcome) => {
                    if let TickOutcome::Closed { profit: Some(p) } = &outcome {
                        self.add_profit(*p);
                    }
                    self.record(Event::Tick { ts_ms: now_ms(), instrument_id, outcome });
                }
                Err(e) => {
                    let settlement_pending = e.is_settlement_pending();
                    let class = if settlement_pending { "settlement" } else { "other" };
                    TICK_ERRORS.with_label_values(&[instrument_id.as_str(), class]).inc();
                    self.workers[i].handle_error(&e);
                    self.record(Event::Error { ts_ms: now_ms(), instrument_id, message: e.to_string(), settlement_pending });
                }
            }
            sleep(self.cfg.tick_delay).await;
        }

        self.passes += 1;
        PASSES.inc();
        let report = PassReport {
            pass: self.passes,
            ts_ms: now_ms(),
            realized_profit: self.ledger.total(),
            rows: self.snapshots(),
        };
        self.record(Event::Pass { ts_ms: report.ts_ms, pass: report.pass, realized_profit: report.realized_profit });
        report
    }

    /// Runs until `max_passes` passes are done (0 = forever).
    pub async fn run(&mut self, max_passes: u64) {
        info!(workers = self.workers.len(), poll_ms = self.cfg.poll_interval.as_millis() as u64, "orchestrator started");
        loop {
            let report = self.run_pass().await;
            println!("{}", dashboard::render(&report));
            if max_passes > 0 && self.passes >= max_passes {
                info!(passes = self.passes, realized = self.ledger.total(), cycles = self.ledger.cycles(), "max passes reached");
                return;
            }
            sleep(self.cfg.poll_interval).await;
        }
    }

    fn record(&self, ev: Event) {
        if let Some(tx) = &self.rec_tx {
            let _ = tx.try_send(ev);
        }
    }
}

fn now_ms() -> i64 { Utc::now().timestamp_millis() }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderStatus, Phase};
    use crate::venue::testkit::{Call, ScriptedVenue};

    fn loop_cfg() -> LoopConfig { LoopConfig { poll_interval: Duration::ZERO, tick_delay: Duration::ZERO } }

    fn instrument(id: &str, size: f64) -> InstrumentConfig {
        InstrumentConfig { instrument_id: id.into(), order_size: size, symbol: None }
    }

    #[test]
    fn ledger_drops_non_finite() {
        let mut l = ProfitLedger::default();
        assert!(!l.add(f64::NAN));
        assert_eq!(l.total(), 0.0);
        assert!(l.add(2.5));
        assert!(l.add(-1.0));
        assert!(!l.add(f64::INFINITY));
        assert_eq!(l.total(), 1.5);
        assert_eq!(l.cycles(), 2);
    }

    #[test]
    fn add_profit_guards_total() {
        let venue: Arc<dyn VenueClient> = Arc::new(ScriptedVenue::new());
        let mut o = Orchestrator::new(loop_cfg(), vec![], venue);
        o.add_profit(f64::NAN);
        assert_eq!(o.realized_profit(), 0.0);
        o.add_profit(2.5);
        o.add_profit(-1.0);
        assert_eq!(o.realized_profit(), 1.5);
    }

    #[tokio::test]
    async fn failing_worker_does_not_stop_siblings() {
        let venue = Arc::new(ScriptedVenue::new());
        venue.set_book("AAA", &["1.00"], &["1.10"]);
        venue.fail_book("BBB");
        venue.set_book("CCC", &["2.00"], &["2.20"]);
        let mut o = Orchestrator::new(
            loop_cfg(),
            vec![instrument("AAA", 1.0), instrument("BBB", 1.0), instrument("CCC", 3.0)],
            venue.clone(),
        );

        let report = o.run_pass().await;
        assert_eq!(report.pass, 1);
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.rows[0].phase, Phase::Buying);
        assert_eq!(report.rows[1].phase, Phase::Idle);
        assert_eq!(report.rows[1].note, "invalid response: book unavailable");
        assert_eq!(report.rows[2].phase, Phase::Buying);
        assert_eq!(
            venue.order_calls(),
            vec![
                Call::Post { side: crate::domain::Side::Buy, price: 1.00, size: 1.0 },
                Call::Post { side: crate::domain::Side::Buy, price: 2.00, size: 3.0 },
            ]
        );
    }

    #[tokio::test]
    async fn workers_tick_in_configured_order() {
        let venue = Arc::new(ScriptedVenue::new());
        for id in ["ZZZ", "AAA", "MMM"] {
            venue.set_book(id, &["1.00"], &["1.10"]);
        }
        let mut o = Orchestrator::new(
            loop_cfg(),
            vec![instrument("ZZZ", 1.0), instrument("AAA", 1.0), instrument("MMM", 1.0)],
            venue.clone(),
        );
        o.run_pass().await;
        let books: Vec<Call> = venue.calls().into_iter().filter(|c| matches!(c, Call::Book(_))).collect();
        assert_eq!(books, vec![Call::Book("ZZZ".into()), Call::Book("AAA".into()), Call::Book("MMM".into())]);
    }

    #[tokio::test]
    async fn full_cycle_aggregates_profit() {
        let venue = Arc::new(ScriptedVenue::new());
        venue.set_book("AAA", &["1.00"], &["1.10"]);
        let mut o = Orchestrator::new(loop_cfg(), vec![instrument("AAA", 5.0)], venue.clone());

        o.run_pass().await;
        let buy = o.snapshots()[0].active_order.clone().unwrap();
        venue.set_fill(&buy, 5.0, OrderStatus::Filled);
        o.run_pass().await;
        let sell = o.snapshots()[0].active_order.clone().unwrap();
        venue.set_fill(&sell, 5.0, OrderStatus::Filled);
        let report = o.run_pass().await;

        assert!((report.realized_profit - 0.5).abs() < 1e-9);
        assert_eq!(report.rows[0].phase, Phase::Idle);
        assert_eq!(o.passes(), 3);
    }

    #[tokio::test]
    async fn run_stops_after_max_passes_and_records() {
        let venue = Arc::new(ScriptedVenue::new());
        venue.set_book("AAA", &["1.00"], &["1.10"]);
        let (tx, mut rx) = mpsc::channel::<Event>(64);
        let mut o = Orchestrator::new(loop_cfg(), vec![instrument("AAA", 1.0)], venue).with_recorder(tx);

        o.run(2).await;
        assert_eq!(o.passes(), 2);

        let mut passes = 0;
        let mut ticks = 0;
        while let Ok(ev) = rx.try_recv() {
            match ev {
                Event::Pass { .. } => passes += 1,
                Event::Tick { .. } => ticks += 1,
                Event::Error { .. } => {}
            }
        }
        assert_eq!((passes, ticks), (2, 2));
    }
}
