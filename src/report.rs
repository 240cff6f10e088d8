use duplex_stats_engine::{ReportRow, RunReport};
use serde::Serialize;
use std::io::{self, Write};

pub const TABLE_HEADER: &str = "   tv.sec   tv.nsec avail-w avail-r POLLOUT POLLIN written    read total-w total-r diff fill drain       cycles";

pub fn write_table<W: Write>(out: &mut W, report: &RunReport, header: bool) -> io::Result<()> {
    if header {
        writeln!(out, "{TABLE_HEADER}")?;
    }
    for row in report.rows() {
        write_row(out, &row)?;
    }
    out.flush()
}

fn write_row<W: Write>(out: &mut W, row: &ReportRow) -> io::Result<()> {
    let o = &row.observation;
    writeln!(
        out,
        "{:09}.{:09} {:7} {:7} {:7} {:6} {:7} {:7} {:7} {:7} {:4} {:4} {:5} {:12}",
        o.wakeup.sec,
        o.wakeup.nsec,
        o.playback_available,
        o.capture_available,
        u8::from(o.pollout),
        u8::from(o.pollin),
        o.playback_written,
        o.capture_read,
        row.total_written,
        row.total_read,
        row.diff,
        o.fill,
        o.drain,
        o.cycles
    )
}

#[derive(Serialize)]
struct JsonReport {
    requested: usize,
    collected: usize,
    completed: bool,
    error: Option<String>,
    rows: Vec<ReportRow>,
}

pub fn write_json<W: Write>(out: &mut W, report: &RunReport) -> io::Result<()> {
    let json = JsonReport {
        requested: report.requested,
        collected: report.observations.len(),
        completed: report.is_complete(),
        error: report.error().map(ToString::to_string),
        rows: report.rows().collect(),
    };
    serde_json::to_writer_pretty(&mut *out, &json)?;
    writeln!(out)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use duplex_stats_engine::{DuplexError, Observation, RunOutcome, StreamDirection, Timestamp};

    fn report(outcome: RunOutcome) -> RunReport {
        let observation = Observation {
            wakeup: Timestamp { sec: 12, nsec: 345 },
            playback_available: 1024,
            capture_available: 1024,
            pollout: true,
            pollin: true,
            playback_written: 1024,
            capture_read: 1024,
            fill: 0,
            drain: 0,
            cycles: 7,
            valid: true,
        };
        RunReport {
            requested: 3,
            observations: vec![observation, observation],
            outcome,
        }
    }

    #[test]
    fn table_has_header_and_one_line_per_row() {
        let mut out = Vec::new();
        write_table(&mut out, &report(RunOutcome::Completed), true).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], TABLE_HEADER);
        assert!(lines[1].starts_with("000000012.000000345"));
        let fields: Vec<&str> = lines[2].split_whitespace().collect();
        assert_eq!(
            fields,
            [
                "000000012.000000345",
                "1024",
                "1024",
                "1",
                "1",
                "1024",
                "1024",
                "2048",
                "2048",
                "0",
                "0",
                "0",
                "7"
            ]
        );
    }

    #[test]
    fn header_can_be_suppressed() {
        let mut out = Vec::new();
        write_table(&mut out, &report(RunOutcome::Completed), false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(!text.contains("tv.sec"));
    }

    #[test]
    fn json_carries_outcome_and_totals() {
        let err = DuplexError::Xrun {
            direction: StreamDirection::Capture,
        };
        let mut out = Vec::new();
        write_json(&mut out, &report(RunOutcome::Aborted(err))).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["requested"], 3);
        assert_eq!(value["collected"], 2);
        assert_eq!(value["completed"], false);
        assert_eq!(value["error"], "capture xrun");
        assert_eq!(value["rows"][1]["total_read"], 2048);
        assert_eq!(value["rows"][1]["capture_read"], 1024);
        assert_eq!(value["rows"][0]["wakeup"]["sec"], 12);
    }
}
