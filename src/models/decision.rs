use serde::{Deserialize, Serialize};

/// Reschedule request drafted for the meeting's sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReschedulePayload {
    pub sender: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Decision {
    #[serde(rename = "No Action")]
    NoAction,
    #[serde(rename = "Action")]
    Action(ReschedulePayload),
}

impl Decision {
    pub fn payload(&self) -> Option<&ReschedulePayload> {
        match self {
            Decision::Action(payload) => Some(payload),
            Decision::NoAction => None,
        }
    }

    pub fn is_action(&self) -> bool {
        matches!(self, Decision::Action(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub status_detail: String,
}

impl DeliveryResult {
    pub fn delivered(status_code: u16, detail: impl Into<String>) -> Self {
        Self {
            success: true,
            status_code: Some(status_code),
            status_detail: detail.into(),
        }
    }

    pub fn failed(status_code: Option<u16>, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code,
            status_detail: detail.into(),
        }
    }
}
