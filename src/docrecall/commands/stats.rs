use super::{CmdMessage, CmdResult, Engine};
use crate::error::StoreError;
use crate::model::Table;
use crate::store::TableStore;

pub fn run<S: TableStore>(engine: &Engine<S>) -> CmdResult {
    let mut result = CmdResult::default();
    let mut usage = Vec::new();

    for table in Table::ALL {
        match engine.store.usage(table) {
            Ok(u) => usage.push(u),
            Err(StoreError::MissingTable { .. }) => {
                result.add_message(CmdMessage::info(format!("{} does not exist.", table)));
            }
            Err(err) => {
                result.add_message(CmdMessage::warning(format!("{}: {}", table, err)));
            }
        }
    }

    result.with_usage(usage)
}
