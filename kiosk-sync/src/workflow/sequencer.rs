//! Packaging workflow state machine
//!
//! `Idle → ProductSelected → WeightCaptured → LabelPrinted → Idle`
//!
//! Each state has exactly one forward edge. An action without an edge from
//! the current state is a no-op. `Cancel` is accepted everywhere and resets
//! to `Idle` with an empty context.

use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Idle,
    ProductSelected,
    WeightCaptured,
    LabelPrinted,
}

/// Data accumulated along one package cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowContext {
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub sku: Option<String>,
    pub weight_lb: Option<f64>,
    pub barcode: Option<String>,
}

impl WorkflowContext {
    /// Audit payload for this context
    pub fn to_payload(&self) -> serde_json::Value {
        json!({
            "productId": self.product_id,
            "productName": self.product_name,
            "sku": self.sku,
            "weightLb": self.weight_lb,
            "barcode": self.barcode,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowAction {
    SelectProduct {
        product_id: String,
        name: String,
        sku: String,
    },
    CaptureWeight {
        weight_lb: f64,
    },
    PrintLabel {
        barcode: String,
    },
    /// Finish the cycle after the label is printed
    Complete,
    Cancel,
}

/// An action that took effect
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: WorkflowState,
    pub to: WorkflowState,
    /// Updated context for forward steps; the discarded context for
    /// `Complete` and `Cancel`
    pub context: WorkflowContext,
}

/// Pure, synchronous workflow sequencer
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    state: WorkflowState,
    context: WorkflowContext,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    /// Apply an action and return the resulting state
    pub fn apply(&mut self, action: WorkflowAction) -> WorkflowState {
        self.step(action);
        self.state
    }

    /// Apply an action, reporting the transition if it took effect.
    ///
    /// Cancelling an idle, empty workflow changes nothing and reports `None`.
    pub fn step(&mut self, action: WorkflowAction) -> Option<Transition> {
        let from = self.state;

        let to = match (from, action) {
            (WorkflowState::Idle, WorkflowAction::SelectProduct { product_id, name, sku }) => {
                self.context.product_id = Some(product_id);
                self.context.product_name = Some(name);
                self.context.sku = Some(sku);
                WorkflowState::ProductSelected
            }
            (WorkflowState::ProductSelected, WorkflowAction::CaptureWeight { weight_lb })
                if weight_lb.is_finite() && weight_lb >= 0.0 =>
            {
                self.context.weight_lb = Some(weight_lb);
                WorkflowState::WeightCaptured
            }
            (WorkflowState::WeightCaptured, WorkflowAction::PrintLabel { barcode }) => {
                self.context.barcode = Some(barcode);
                WorkflowState::LabelPrinted
            }
            (WorkflowState::LabelPrinted, WorkflowAction::Complete) => {
                return Some(self.reset(from));
            }
            (_, WorkflowAction::Cancel) => {
                if from == WorkflowState::Idle && self.context == WorkflowContext::default() {
                    return None;
                }
                return Some(self.reset(from));
            }
            (state, action) => {
                tracing::debug!(?state, ?action, "Action not valid in current state, ignored");
                return None;
            }
        };

        self.state = to;
        Some(Transition {
            from,
            to,
            context: self.context.clone(),
        })
    }

    fn reset(&mut self, from: WorkflowState) -> Transition {
        self.state = WorkflowState::Idle;
        Transition {
            from,
            to: WorkflowState::Idle,
            context: std::mem::take(&mut self.context),
        }
    }
}
