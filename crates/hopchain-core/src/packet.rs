// crates/hopchain-core/src/packet.rs
//
// Packets: versioned, reusable bundles of execution logic.
//
// The four semantic fields (name, version, logic, parameter_schema) are the
// signed content. They are private and only change through setters that drop
// any existing signature, so a signed packet can never silently carry a
// signature computed over older content.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HopchainError;

/// System prompt used when a packet's logic does not set one.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Execute the following command and provide a clear response.";

/// Task text used when a packet's template is empty.
pub const DEFAULT_TASK: &str = "Please process this request.";

/// Lifecycle of a packet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PacketStatus {
    #[default]
    Draft,
    Signed,
    Archived,
}

/// Execution logic carried by a packet.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PacketLogic {
    pub system_prompt: String,
    pub template: String,
    pub output_format: String,
}

/// The signed subset of a packet, in the shape that gets canonicalized.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SignableContent<'a> {
    pub name: &'a str,
    pub version: u32,
    pub logic: &'a PacketLogic,
    pub parameter_schema: &'a serde_json::Value,
}

/// A reusable execution packet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Packet {
    pub id: Uuid,
    name: String,
    version: u32,
    logic: PacketLogic,
    #[serde(default)]
    parameter_schema: serde_json::Value,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    signed_by: Option<String>,
    #[serde(default)]
    signed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    status: PacketStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub execution_count: u64,
}

impl Packet {
    /// Create an unsigned draft packet.
    pub fn new(
        name: impl Into<String>,
        version: u32,
        logic: PacketLogic,
        parameter_schema: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            version,
            logic,
            parameter_schema,
            signature: None,
            signed_by: None,
            signed_at: None,
            status: PacketStatus::Draft,
            tags: Vec::new(),
            execution_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn logic(&self) -> &PacketLogic {
        &self.logic
    }

    pub fn parameter_schema(&self) -> &serde_json::Value {
        &self.parameter_schema
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn signed_by(&self) -> Option<&str> {
        self.signed_by.as_deref()
    }

    pub fn signed_at(&self) -> Option<DateTime<Utc>> {
        self.signed_at
    }

    pub fn status(&self) -> PacketStatus {
        self.status
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// The signed subset of this packet's current values.
    pub fn signable_content(&self) -> SignableContent<'_> {
        SignableContent {
            name: &self.name,
            version: self.version,
            logic: &self.logic,
            parameter_schema: &self.parameter_schema,
        }
    }

    /// Whether the semantic fields of `self` and `other` are identical.
    pub fn same_content(&self, other: &Packet) -> bool {
        self.signable_content() == other.signable_content()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.clear_signature();
    }

    pub fn set_version(&mut self, version: u32) {
        self.version = version;
        self.clear_signature();
    }

    pub fn set_logic(&mut self, logic: PacketLogic) {
        self.logic = logic;
        self.clear_signature();
    }

    pub fn set_parameter_schema(&mut self, schema: serde_json::Value) {
        self.parameter_schema = schema;
        self.clear_signature();
    }

    /// Record a freshly computed signature and mark the packet signed.
    pub fn apply_signature(
        &mut self,
        signature: String,
        signed_by: impl Into<String>,
        signed_at: DateTime<Utc>,
    ) {
        self.signature = Some(signature);
        self.signed_by = Some(signed_by.into());
        self.signed_at = Some(signed_at);
        self.status = PacketStatus::Signed;
    }

    /// Drop the signature and return to draft.
    pub fn clear_signature(&mut self) {
        self.signature = None;
        self.signed_by = None;
        self.signed_at = None;
        if self.status == PacketStatus::Signed {
            self.status = PacketStatus::Draft;
        }
    }

    /// Retire the packet. The signature, if any, is kept for audit.
    pub fn archive(&mut self) {
        self.status = PacketStatus::Archived;
    }

    pub fn record_execution(&mut self) {
        self.execution_count += 1;
    }

    /// Build the model prompt for one execution.
    ///
    /// Every `{{key}}` in the template is replaced by its parameter value, and
    /// the parameters are appended as pretty JSON after the system prompt and
    /// task. Archived packets cannot be executed.
    pub fn render_prompt(&self, params: &BTreeMap<String, String>) -> Result<String, HopchainError> {
        if self.status == PacketStatus::Archived {
            return Err(HopchainError::Validation(format!(
                "packet {} is archived",
                self.id
            )));
        }
        let mut task = self.logic.template.clone();
        for (key, value) in params {
            task = task.replace(&format!("{{{{{}}}}}", key), value);
        }
        if task.trim().is_empty() {
            task = DEFAULT_TASK.to_string();
        }
        let system = if self.logic.system_prompt.trim().is_empty() {
            DEFAULT_SYSTEM_PROMPT
        } else {
            self.logic.system_prompt.as_str()
        };
        Ok(format!(
            "{}\n\nTask: {}\n\nParameters provided:\n{}",
            system,
            task,
            serde_json::to_string_pretty(params)?
        ))
    }
}
