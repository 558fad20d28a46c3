//! Station session: workflow, scanner and audit trail wired together

use serde_json::json;
use shared::EventType;

use super::sequencer::{Sequencer, Transition, WorkflowAction, WorkflowContext, WorkflowState};
use crate::audit::EventLog;
use crate::backup::{BackupHandle, BackupReason};
use crate::scan::ScanParser;

/// One operator station.
///
/// Every effective workflow step is recorded in the event log; completing
/// a package or closing a box also requests a snapshot backup. Nothing here
/// blocks on the network.
#[derive(Debug)]
pub struct KioskSession {
    sequencer: Sequencer,
    scanner: ScanParser,
    log: EventLog,
    backup: Option<BackupHandle>,
}

impl KioskSession {
    pub fn new(log: EventLog, scanner: ScanParser) -> Self {
        Self {
            sequencer: Sequencer::new(),
            scanner,
            log,
            backup: None,
        }
    }

    pub fn with_backup(mut self, backup: BackupHandle) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn state(&self) -> WorkflowState {
        self.sequencer.state()
    }

    pub fn context(&self) -> &WorkflowContext {
        self.sequencer.context()
    }

    pub fn scanner_mut(&mut self) -> &mut ScanParser {
        &mut self.scanner
    }

    // ========== Workflow ==========

    pub fn select_product(&mut self, product_id: &str, name: &str, sku: &str) -> WorkflowState {
        self.dispatch(WorkflowAction::SelectProduct {
            product_id: product_id.to_string(),
            name: name.to_string(),
            sku: sku.to_string(),
        })
    }

    pub fn capture_weight(&mut self, weight_lb: f64) -> WorkflowState {
        self.dispatch(WorkflowAction::CaptureWeight { weight_lb })
    }

    pub fn print_label(&mut self, barcode: &str) -> WorkflowState {
        self.dispatch(WorkflowAction::PrintLabel {
            barcode: barcode.to_string(),
        })
    }

    /// Record the printed package and return to idle
    pub fn complete(&mut self) -> WorkflowState {
        self.dispatch(WorkflowAction::Complete)
    }

    pub fn cancel(&mut self) -> WorkflowState {
        self.dispatch(WorkflowAction::Cancel)
    }

    /// Apply an action; record it if it took effect
    pub fn dispatch(&mut self, action: WorkflowAction) -> WorkflowState {
        let is_complete = action == WorkflowAction::Complete;
        let is_cancel = action == WorkflowAction::Cancel;

        if let Some(transition) = self.sequencer.step(action) {
            self.record(&transition, is_complete, is_cancel);
        }
        self.sequencer.state()
    }

    fn record(&self, transition: &Transition, is_complete: bool, is_cancel: bool) {
        let event_type = if is_cancel {
            EventType::WorkflowCancelled
        } else if is_complete {
            EventType::PackageRecorded
        } else {
            match transition.to {
                WorkflowState::ProductSelected => EventType::ProductSelected,
                WorkflowState::WeightCaptured => EventType::WeightCaptured,
                WorkflowState::LabelPrinted => EventType::LabelPrinted,
                WorkflowState::Idle => return,
            }
        };

        let mut payload = transition.context.to_payload();
        if is_cancel {
            payload["cancelledFrom"] = json!(transition.from);
        }
        self.log.log_event(event_type, payload);

        if is_complete && let Some(backup) = &self.backup {
            backup.trigger(BackupReason::PackageRecorded);
        }
    }

    // ========== Boxes ==========

    /// Seal a box of recorded packages. Independent of the label workflow.
    ///
    /// Returns `false` without recording anything for a blank box id.
    pub fn close_box(&self, box_id: &str) -> bool {
        let box_id = box_id.trim();
        if box_id.is_empty() {
            return false;
        }
        self.log.log_event(EventType::BoxClosed, json!({ "boxId": box_id }));
        if let Some(backup) = &self.backup {
            backup.trigger(BackupReason::BoxClosed);
        }
        true
    }

    // ========== Scanner ==========

    pub fn on_key(&mut self, c: char, at_ms: u64) {
        self.scanner.on_char(c, at_ms);
    }

    /// Terminator key. A recognized token is recorded and returned.
    pub fn on_enter(&mut self, at_ms: u64) -> Option<String> {
        let token = self.scanner.on_terminator(at_ms)?;
        self.log.log_event(
            EventType::ScanReceived,
            json!({ "token": token, "state": self.sequencer.state() }),
        );
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::EventLogConfig;
    use crate::backup::{Backupper, SnapshotSource};
    use crate::scan::{ScanConfig, ScanGate};
    use crate::testing::{FakeRemote, memory_store};
    use shared::Snapshot;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn session(remote: Arc<FakeRemote>) -> (KioskSession, EventLog) {
        let log = EventLog::open(memory_store(), remote, EventLogConfig::default());
        let scanner = ScanParser::new(ScanConfig::default(), ScanGate::new());
        (KioskSession::new(log.clone(), scanner), log)
    }

    fn event_types(log: &EventLog) -> Vec<EventType> {
        log.entries().iter().map(|e| e.event_type).collect()
    }

    #[tokio::test]
    async fn test_full_cycle_is_audited() {
        let (mut session, log) = session(FakeRemote::offline());

        session.select_product("p-1", "Ribeye", "RB-001");
        session.capture_weight(2.5);
        session.print_label("0123456789012");
        assert_eq!(session.complete(), WorkflowState::Idle);

        assert_eq!(
            event_types(&log),
            vec![
                EventType::ProductSelected,
                EventType::WeightCaptured,
                EventType::LabelPrinted,
                EventType::PackageRecorded,
            ]
        );
        let recorded = log.entries().pop().unwrap();
        assert_eq!(recorded.payload["weightLb"], 2.5);
        assert_eq!(recorded.payload["barcode"], "0123456789012");
    }

    #[tokio::test]
    async fn test_ignored_actions_not_audited() {
        let (mut session, log) = session(FakeRemote::offline());

        session.capture_weight(1.0);
        session.cancel();

        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_records_origin() {
        let (mut session, log) = session(FakeRemote::offline());

        session.select_product("p-1", "Ribeye", "RB-001");
        session.cancel();

        let cancelled = log.entries().pop().unwrap();
        assert_eq!(cancelled.event_type, EventType::WorkflowCancelled);
        assert_eq!(cancelled.payload["cancelledFrom"], "product_selected");
        assert_eq!(cancelled.payload["productId"], "p-1");
    }

    #[tokio::test]
    async fn test_scan_token_recorded() {
        let (mut session, log) = session(FakeRemote::offline());

        for (i, c) in "01234567890123".chars().enumerate() {
            session.on_key(c, i as u64 * 10);
        }
        let token = session.on_enter(200);

        assert_eq!(token.as_deref(), Some("01234567890123"));
        let scan = log.entries().pop().unwrap();
        assert_eq!(scan.event_type, EventType::ScanReceived);
        assert_eq!(scan.payload["token"], "01234567890123");
        assert_eq!(scan.payload["state"], "idle");
    }

    struct OnePackage;

    impl SnapshotSource for OnePackage {
        fn snapshot(&self) -> Snapshot {
            let mut collections = std::collections::BTreeMap::new();
            collections.insert("packages".to_string(), json!([{ "id": "P-1" }]));
            Snapshot::new(collections)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_triggers_backup() {
        let remote = FakeRemote::online();
        let backupper = Backupper::new(Arc::new(OnePackage), remote.clone());
        let (session, _log) = session(remote.clone());
        let mut session = session.with_backup(backupper.handle());
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(backupper.run(shutdown.clone()));

        session.select_product("p-1", "Ribeye", "RB-001");
        session.capture_weight(2.5);
        session.print_label("B-1");
        session.complete();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(remote.backups.lock().len(), 1);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_box_is_audited_and_backed_up() {
        let remote = FakeRemote::online();
        let backupper = Backupper::new(Arc::new(OnePackage), remote.clone());
        let (session, log) = session(remote.clone());
        let session = session.with_backup(backupper.handle());
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(backupper.run(shutdown.clone()));

        assert!(!session.close_box("   "));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(log.entries().is_empty());
        assert!(remote.backups.lock().is_empty());

        assert!(session.close_box(" BOX-7 "));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let closed = log.entries().pop().unwrap();
        assert_eq!(closed.event_type, EventType::BoxClosed);
        assert_eq!(closed.payload["boxId"], "BOX-7");
        assert_eq!(session.state(), WorkflowState::Idle);
        assert_eq!(remote.backups.lock().len(), 1);

        shutdown.cancel();
        task.await.unwrap();
    }
}
