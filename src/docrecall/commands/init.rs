use super::{CmdMessage, CmdResult, Engine};
use crate::model::Features;
use crate::store::TableStore;

/// Create the tables of every enabled feature. Tables that cannot be created
/// are reported and stay unavailable until the next run.
pub fn run<S: TableStore>(engine: &Engine<S>, features: Features) -> CmdResult {
    engine.set_features(features);
    let report = engine.schema.initialize(features);
    let mut result = CmdResult::default();

    if report.ready.is_empty() && report.failed.is_empty() {
        result.add_message(CmdMessage::info("All features are disabled; nothing to create."));
    }
    if !report.ready.is_empty() {
        result.add_message(CmdMessage::success(format!(
            "{} table(s) ready.",
            report.ready.len()
        )));
    }
    for (table, err) in &report.failed {
        result.add_message(CmdMessage::warning(format!("{} unavailable: {}", table, err)));
    }

    result
}
