//! Query descriptors and their PowerShell rendering
//!
//! A query crosses the transport as data (`InventoryQuery`). The SSH
//! transport renders it into one of a fixed set of pipelines; no caller
//! string ever ends up in a script.

use std::fmt;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::types::CollectionKind;

/// Data-only description of one inventory query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryQuery {
    pub kind: CollectionKind,
    /// Transports may pre-filter default items remotely
    pub skip_defaults: bool,
}

impl InventoryQuery {
    #[must_use]
    pub fn new(kind: CollectionKind, skip_defaults: bool) -> Self {
        Self {
            kind,
            skip_defaults,
        }
    }

    /// Pipeline enumerating this query's items as a JSON array
    #[must_use]
    pub fn pipeline(&self) -> Pipeline {
        match (self.kind, self.skip_defaults) {
            (CollectionKind::Services, false) => pipelines::services(),
            (CollectionKind::Services, true) => pipelines::services()
                .where_clause("$_.StartName")
                .where_clause("$_.StartName -ne 'LocalSystem'")
                .where_clause("$_.StartName -notlike 'NT AUTHORITY*'"),
            (CollectionKind::ScheduledTasks, false) => pipelines::scheduled_tasks(),
            (CollectionKind::ScheduledTasks, true) => pipelines::scheduled_tasks()
                .where_clause("$_.TaskPath -notlike '*\\Microsoft\\*'")
                .where_clause("$_.TaskPath -ne '\\'"),
        }
    }
}

/// PowerShell pipeline builder
///
/// Renders `source | Where-Object {..} | Select-Object ..` wrapped so the
/// output is always a compressed JSON array, even for zero or one item.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Producing cmdlet
    source: String,
    /// Conditions joined with `-and`
    where_clauses: Vec<String>,
    /// Properties or calculated properties
    select: Vec<String>,
}

impl Pipeline {
    /// Start a pipeline from a producing cmdlet
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            where_clauses: Vec::new(),
            select: Vec::new(),
        }
    }

    /// Select plain properties
    #[must_use]
    pub fn select(mut self, properties: &[&str]) -> Self {
        self.select
            .extend(properties.iter().map(|p| (*p).to_string()));
        self
    }

    /// Select a calculated property `@{n='name';e={expr}}`
    #[must_use]
    pub fn select_as(mut self, name: &str, expression: &str) -> Self {
        self.select.push(format!("@{{n='{name}';e={{{expression}}}}}"));
        self
    }

    /// Add a `Where-Object` condition
    #[must_use]
    pub fn where_clause(mut self, condition: &str) -> Self {
        self.where_clauses.push(condition.to_string());
        self
    }

    /// Build the script text
    #[must_use]
    pub fn build(&self) -> String {
        let mut stages = vec![self.source.clone()];

        if !self.where_clauses.is_empty() {
            stages.push(format!(
                "Where-Object {{ {} }}",
                self.where_clauses.join(" -and ")
            ));
        }

        if !self.select.is_empty() {
            stages.push(format!("Select-Object {}", self.select.join(",")));
        }

        format!(
            "$ProgressPreference='SilentlyContinue'; ConvertTo-Json -Compress -Depth 3 -InputObject @({})",
            stages.join(" | ")
        )
    }

    /// Full command line for `shell`, script passed as `-EncodedCommand`
    #[must_use]
    pub fn command_line(&self, shell: &str) -> String {
        format!(
            "{shell} -NoLogo -NoProfile -NonInteractive -EncodedCommand {}",
            encode_command(&self.build())
        )
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.build())
    }
}

/// Base64 of the UTF-16LE script, the form `-EncodedCommand` expects
#[must_use]
pub fn encode_command(script: &str) -> String {
    let bytes: Vec<u8> = script.encode_utf16().flat_map(u16::to_le_bytes).collect();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// The fixed pipelines the SSH transport knows
pub mod pipelines {
    use super::Pipeline;

    /// Host and domain name of the remote system
    #[must_use]
    pub fn identity() -> Pipeline {
        Pipeline::new("Get-CimInstance -ClassName Win32_ComputerSystem")
            .select(&["DNSHostName", "Domain"])
    }

    /// All installed services
    #[must_use]
    pub fn services() -> Pipeline {
        Pipeline::new("Get-CimInstance -ClassName Win32_Service")
            .select(&["Name", "State", "StartName", "Description"])
    }

    /// All scheduled tasks, enum state rendered as text
    #[must_use]
    pub fn scheduled_tasks() -> Pipeline {
        Pipeline::new("Get-ScheduledTask")
            .select(&["TaskName", "TaskPath"])
            .select_as("State", "[string]$_.State")
            .select_as("RunAs", "$_.Principal.UserId")
            .select(&["Description", "Author"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_builder() {
        let script = Pipeline::new("Get-Thing")
            .where_clause("$_.A")
            .where_clause("$_.B -ne 'x'")
            .select(&["A", "B"])
            .build();

        assert!(script.contains("@(Get-Thing | Where-Object { $_.A -and $_.B -ne 'x' } | Select-Object A,B)"));
        assert!(script.starts_with("$ProgressPreference='SilentlyContinue';"));
    }

    #[test]
    fn test_calculated_property() {
        let script = Pipeline::new("Get-Thing").select_as("State", "[string]$_.State").build();
        assert!(script.contains("Select-Object @{n='State';e={[string]$_.State}}"));
    }

    #[test]
    fn test_services_pipeline() {
        let plain = InventoryQuery::new(CollectionKind::Services, false).pipeline().build();
        assert!(plain.contains("Win32_Service"));
        assert!(plain.contains("Select-Object Name,State,StartName,Description"));
        assert!(!plain.contains("Where-Object"));

        let filtered = InventoryQuery::new(CollectionKind::Services, true).pipeline().build();
        assert!(filtered.contains("$_.StartName -notlike 'NT AUTHORITY*'"));
        assert!(filtered.contains("$_.StartName -ne 'LocalSystem'"));
    }

    #[test]
    fn test_tasks_pipeline() {
        let filtered = InventoryQuery::new(CollectionKind::ScheduledTasks, true)
            .pipeline()
            .build();
        assert!(filtered.contains("Get-ScheduledTask"));
        assert!(filtered.contains("$_.TaskPath -notlike '*\\Microsoft\\*'"));
        assert!(filtered.contains("$_.TaskPath -ne '\\'"));
        assert!(filtered.contains("@{n='RunAs';e={$_.Principal.UserId}}"));
    }

    #[test]
    fn test_encode_command_is_utf16le_base64() {
        assert_eq!(encode_command("dir"), "ZABpAHIA");
    }

    #[test]
    fn test_command_line() {
        let line = pipelines::identity().command_line("pwsh");
        assert!(line.starts_with("pwsh -NoLogo -NoProfile -NonInteractive -EncodedCommand "));
        assert!(!line.contains('\''));
    }
}
