//! Score a sample telemetry session and print the report

fn main() {
    let json = r#"{
        "signals": {
            "typing_speed_characters_per_minute": 410,
            "focus_loss_event_count": 14,
            "window_switches_per_minute": 11,
            "active_application_count": 9,
            "warning_dismiss_time_ms": 620,
            "decision_latency_ms": 1100
        },
        "time_of_day": "22:45",
        "session_length": 140,
        "noise": 84,
        "environmental_factor": "OFE"
    }"#;

    match hses_score::score_json(json) {
        Ok(report) => print!("{report}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
