//! Scan response payload.

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::scan::pool::BufferPool;
use crate::scan::verdict::{ScanStatus, ScanVerdict};

/// Body returned for a completed inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub filename: String,
    pub status: ScanStatus,
    pub threat: String,
    /// RFC 3339, second precision, UTC.
    pub scan_time: String,
    pub engine: String,
}

impl ScanResult {
    pub fn new(filename: &str, verdict: &ScanVerdict, engine: &str, at: DateTime<Utc>) -> Self {
        Self {
            filename: filename.to_string(),
            status: verdict.status(),
            threat: verdict.threat_name().to_string(),
            scan_time: at.to_rfc3339_opts(SecondsFormat::Secs, true),
            engine: engine.to_string(),
        }
    }

    /// Serialize as JSON, building the body in a pooled scratch buffer.
    pub fn to_json(&self, scratch: &BufferPool) -> Bytes {
        let mut buf = scratch.checkout();
        serde_json::to_writer(&mut *buf, self)
            .expect("ScanResult has only string fields and serializes infallibly");
        Bytes::copy_from_slice(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scratch() -> BufferPool {
        BufferPool::new("test", 64, 4096, 2)
    }

    #[test]
    fn clean_result_shape() {
        let at = Utc.with_ymd_and_hms(2024, 5, 17, 8, 30, 0).unwrap();
        let result = ScanResult::new("a.txt", &ScanVerdict::clean(), "ClamAV", at);
        let json: serde_json::Value = serde_json::from_slice(&result.to_json(&scratch())).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "filename": "a.txt",
                "status": "clean",
                "threat": "",
                "scan_time": "2024-05-17T08:30:00Z",
                "engine": "ClamAV",
            })
        );
    }

    #[test]
    fn infected_result_reports_threat() {
        let result = ScanResult::new(
            "eicar.com",
            &ScanVerdict::infected("EICAR-Test-Signature"),
            "ClamAV",
            Utc::now(),
        );
        let body = result.to_json(&scratch());
        let parsed: ScanResult = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.status, ScanStatus::Infected);
        assert_eq!(parsed.threat, "EICAR-Test-Signature");
        assert!(DateTime::parse_from_rfc3339(&parsed.scan_time).is_ok());
    }

    #[test]
    fn hostile_names_survive_serialization() {
        let filename = "quote\"back\\slash\nnew\tline\u{0}nul<script>ü😀.exe";
        let threat = "Sig\"},{\"status\":\"clean";
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let result = ScanResult::new(filename, &ScanVerdict::infected(threat), "ClamAV", at);

        let pool = scratch();
        let body = result.to_json(&pool);
        let parsed: ScanResult = serde_json::from_slice(&body).unwrap();

        assert_eq!(parsed, result);
        assert_eq!(parsed.filename.as_bytes(), filename.as_bytes());
        assert_eq!(parsed.threat.as_bytes(), threat.as_bytes());
        assert_eq!(parsed.status, ScanStatus::Infected);
    }

    #[test]
    fn scratch_buffer_is_returned_empty() {
        let pool = scratch();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let first = ScanResult::new("long-name.bin", &ScanVerdict::clean(), "ClamAV", at);
        let second = ScanResult::new("b", &ScanVerdict::clean(), "ClamAV", at);

        let _ = first.to_json(&pool);
        let body = second.to_json(&pool);
        let parsed: ScanResult = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.filename, "b");
        assert_eq!(pool.idle_count(), 1);
    }
}
