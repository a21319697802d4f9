use super::{CmdMessage, CmdResult, Engine};
use crate::model::Scope;
use crate::store::TableStore;

/// Drop every table of the scope. If the scope's feature is on, its tables
/// are recreated empty so writes keep working.
pub fn run<S: TableStore>(engine: &Engine<S>, scope: Scope) -> CmdResult {
    let mut result = CmdResult::default();

    let failed = engine.schema.drop_scope(scope);
    if failed.is_empty() {
        tracing::info!(scope = %scope, "Wiped");
        result.add_message(CmdMessage::success(format!("Wiped all {} data.", scope)));
    } else {
        for (table, err) in &failed {
            result.add_message(CmdMessage::error(format!("Could not drop {}: {}", table, err)));
        }
    }

    if engine.enabled(scope) {
        let report = engine.schema.ensure_scope(scope);
        for (table, err) in &report.failed {
            result.add_message(CmdMessage::warning(format!(
                "Could not recreate {}: {}",
                table, err
            )));
        }
    }

    result
}
