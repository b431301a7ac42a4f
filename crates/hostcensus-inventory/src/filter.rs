//! Default service and task predicates
//!
//! Windows compares account names and task paths case-insensitively, so
//! every check here does too.

use crate::types::{InventoryRecord, ServiceRecord, TaskRecord};

/// Built-in account every stock service runs as
pub const LOCAL_SYSTEM: &str = "LocalSystem";

/// Prefix of the built-in service accounts
pub const SYSTEM_AUTHORITY_PREFIX: &str = "NT AUTHORITY";

/// Folder holding the vendor's own scheduled tasks
pub const VENDOR_TASK_NAMESPACE: &str = "\\Microsoft\\";

/// Root task folder
pub const ROOT_TASK_PATH: &str = "\\";

/// Service runs as a built-in account (or none at all)
#[must_use]
pub fn is_default_service(service: &ServiceRecord) -> bool {
    let Some(run_as) = service.run_as.as_deref().map(str::trim) else {
        return true;
    };

    run_as.is_empty()
        || run_as.eq_ignore_ascii_case(LOCAL_SYSTEM)
        || starts_with_ignore_case(run_as, SYSTEM_AUTHORITY_PREFIX)
}

/// Task lives in the vendor namespace or the root folder
#[must_use]
pub fn is_default_task(task: &TaskRecord) -> bool {
    task.path == ROOT_TASK_PATH
        || task
            .path
            .to_ascii_lowercase()
            .contains(&VENDOR_TASK_NAMESPACE.to_ascii_lowercase())
}

/// Whether `record` is a default item for its kind
#[must_use]
pub fn is_default(record: &InventoryRecord) -> bool {
    match record {
        InventoryRecord::Service(s) => is_default_service(s),
        InventoryRecord::Task(t) => is_default_task(t),
    }
}

/// Keep everything, or only non-default records when `skip_defaults`
pub fn apply(records: Vec<InventoryRecord>, skip_defaults: bool) -> Vec<InventoryRecord> {
    if skip_defaults {
        records.into_iter().filter(|r| !is_default(r)).collect()
    } else {
        records
    }
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
