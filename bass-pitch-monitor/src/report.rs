//! Text and JSON rendering of the analyzer's running statistics.

use anyhow::Result;
use bass_pitch_core::{Analyzer, PitchDetector, StatisticsSnapshot};
use serde_json::json;

/// One report line for the current state of `analyzer`.
pub fn render(analyzer: &Analyzer, as_json: bool) -> Result<String> {
    let snapshot = analyzer.statistics().snapshot();
    let algorithm = analyzer.detector().name();

    if as_json {
        let line = json!({
            "algorithm": algorithm,
            "detector_confidence": analyzer.detector().confidence(),
            "statistics": snapshot,
        });
        return Ok(serde_json::to_string(&line)?);
    }

    Ok(format_text(algorithm, &snapshot))
}

fn format_text(algorithm: &str, s: &StatisticsSnapshot) -> String {
    format!(
        "[{}] {:>4} {:7.2} Hz | avg {:7.2} Hz ({}) | stability {:.2} | confidence {:.2} | response {:.3} s | {}/{} valid",
        algorithm,
        s.current_note,
        s.current_pitch,
        s.average_pitch,
        s.average_note,
        s.pitch_stability,
        s.detection_confidence,
        s.response_time,
        s.valid_detections,
        s.total_detections,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bass_pitch_core::AnalyzerConfig;

    #[test]
    fn test_empty_text_report() {
        let analyzer = Analyzer::new(AnalyzerConfig::default());
        let line = render(&analyzer, false).unwrap();
        assert!(line.starts_with("[YIN]"));
        assert!(line.contains("---"));
        assert!(line.ends_with("0/0 valid"));
    }

    #[test]
    fn test_json_report() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::default());
        analyzer.statistics_mut().observe(55.0, 0.2);

        let line = render(&analyzer, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["algorithm"], "YIN");
        assert_eq!(value["statistics"]["current_note"], "A1");
        assert_eq!(value["statistics"]["valid_detections"], 1);
    }
}
