use confab_core::MediaKind;
use serde_json::Value;

/// The one producer a participant may publish.
#[derive(Debug, Clone)]
pub struct ProducerSlot {
    pub id: String,
    pub kind: MediaKind,
}

/// Per-participant state held by a room coordinator.
///
/// Capabilities double as the join-phase flag: a participant without them has
/// only been welcomed and may not touch the media plane yet.
#[derive(Debug, Default)]
pub struct Participant {
    pub rtp_capabilities: Option<Value>,
    pub producer: Option<ProducerSlot>,
    pub is_killed: bool,
}

impl Participant {
    /// Both join phases completed; media operations are allowed.
    pub fn is_active(&self) -> bool {
        self.rtp_capabilities.is_some()
    }
}
