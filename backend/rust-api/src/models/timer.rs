use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TimerEvent {
    TimerTick(TimerTick),
    TimeExpired(TimeExpired),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TimerTick {
    pub quiz_id: String,
    pub question_number: u32,
    pub remaining_seconds: u32,
    pub total_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TimeExpired {
    pub quiz_id: String,
    pub question_number: u32,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl TimerEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            TimerEvent::TimerTick(_) => "timer-tick",
            TimerEvent::TimeExpired(_) => "time-expired",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_payload_is_tagged() {
        let event = TimerEvent::TimeExpired(TimeExpired {
            quiz_id: "q1".into(),
            question_number: 2,
            timestamp: Utc::now(),
            message: "Time is up".into(),
        });
        assert_eq!(event.event_name(), "time-expired");
        let data: serde_json::Value = serde_json::from_str(&event.to_sse_data()).unwrap();
        assert_eq!(data["type"], "time-expired");
        assert_eq!(data["question_number"], 2);
    }
}
