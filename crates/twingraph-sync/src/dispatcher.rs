//! Mapping from change events to sync commands.

use tracing::warn;
use twingraph_types::{ChangeEvent, MessageSource, OperationType};

use crate::command::{SyncCommand, TwinChange};

/// Selects the [`SyncCommand`] for an event's message source and
/// operation type.
///
/// | message source          | operation type         | command   |
/// |-------------------------|------------------------|-----------|
/// | `deviceLifecycleEvents` | `createDeviceIdentity` | `Create`  |
/// | `deviceLifecycleEvents` | `deleteDeviceIdentity` | `Delete`  |
/// | `twinChangeEvents`      | `updateTwin`           | `Update`  |
/// | `twinChangeEvents`      | `replaceTwin`          | `Replace` |
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// The command for `(source, operation)`, or `None` if the pair is not
    /// handled.
    pub fn dispatch(
        source: &MessageSource,
        operation: &OperationType,
        change: TwinChange,
    ) -> Option<SyncCommand> {
        let command = match (source, operation) {
            (MessageSource::DeviceLifecycle, OperationType::CreateDeviceIdentity) => {
                SyncCommand::Create(change)
            }
            (MessageSource::DeviceLifecycle, OperationType::DeleteDeviceIdentity) => {
                SyncCommand::Delete(change)
            }
            (MessageSource::TwinChange, OperationType::UpdateTwin) => SyncCommand::Update(change),
            (MessageSource::TwinChange, OperationType::ReplaceTwin) => SyncCommand::Replace(change),
            _ => return None,
        };
        Some(command)
    }

    /// The command for an event. Unhandled events are logged and yield
    /// `None`.
    pub fn for_event(event: &ChangeEvent) -> Option<SyncCommand> {
        let command = Self::dispatch(
            &event.message_source,
            &event.operation_type,
            TwinChange::from(event),
        );
        if command.is_none() {
            warn!(
                source = %event.message_source,
                operation = %event.operation_type,
                offset = event.sequence_offset,
                "operation not supported, skipping event"
            );
        }
        command
    }
}

impl From<&ChangeEvent> for TwinChange {
    fn from(event: &ChangeEvent) -> Self {
        Self::new(
            event.hub_name.clone(),
            event.device_id.clone(),
            event.payload.clone(),
        )
    }
}
