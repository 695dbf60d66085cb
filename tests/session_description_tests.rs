// Integration tests for loading session scripts

use anyhow::Result;
use listening_effort::catalogue::{VideoCatalogue, VideoKind};
use listening_effort::script::{SessionDescription, MASKER_COUNT, SCREEN_COUNT};
use listening_effort::ValidationError;
use std::fs;
use tempfile::TempDir;

fn catalogue() -> VideoCatalogue {
    VideoCatalogue::new()
        .with_video(VideoKind::Masking, "cafe", Some(60.0))
        .with_video(VideoKind::Idle, "idle_left", None)
        .with_video(VideoKind::Idle, "idle_middle", None)
        .with_video(VideoKind::Idle, "idle_right", None)
        .with_video(VideoKind::Speech, "speech_a", Some(2.0))
        .with_video(VideoKind::Speech, "speech_b", Some(2.0))
        .with_video(VideoKind::Speech, "speech_c", Some(2.0))
}

const SCRIPT: &str = r#"
session:
  speaker amplitude: 0.8
  masking video: cafe
  maskers:
    - { rotation: 0.0, amplitude: 0.5 }
    - { rotation: 90.0, amplitude: 0.25 }
    - { rotation: 180.0, amplitude: 0.5 }
    - { rotation: 270.0, amplitude: 1.0 }
  video screens:
    - idle video: idle_left
      azimuth: -30.0
    - idle video: idle_middle
    - idle video: idle_right
      azimuth: 30.0
      scale width: 1.5
  challenges:
    - [speech_a, speech_b, speech_c]
    - [speech_c, speech_a, speech_b]
  delay before playing videos: 1.0
  delay after playing videos: 0.5
  recording duration: 4.0
  user interface texts:
    completed: All done
"#;

#[test]
fn test_valid_script_loads() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("cafe_two_challenges.yaml");
    fs::write(&path, SCRIPT)?;

    let description = SessionDescription::load(&path, &catalogue())?;

    assert_eq!(description.name, "cafe_two_challenges");
    assert_eq!(description.maskers.len(), MASKER_COUNT);
    assert_eq!(description.video_screens.len(), SCREEN_COUNT);
    assert_eq!(description.challenges.len(), 2);
    assert_eq!(description.challenges[1][0], "speech_c");
    assert_eq!(description.masking_video, "cafe");
    assert_eq!(description.recording_duration, 4.0);
    assert!(!description.play_maskers_continuously);
    assert!(description.brightness_calibration.is_none());
    assert!(description.invariant());

    // Omitted transform fields take their defaults
    let right = &description.video_screens[2];
    assert_eq!(right.transform.azimuth, 30.0);
    assert_eq!(right.transform.scale_width, 1.5);
    assert_eq!(right.transform.scale_height, 1.0);
    assert_eq!(description.video_screens[1].transform.azimuth, 0.0);

    assert_eq!(description.ui_text("completed", "Thank you"), "All done");
    assert_eq!(description.ui_text("recording", "Please answer"), "Please answer");

    // The raw text is kept for archiving
    assert_eq!(description.source, SCRIPT);

    Ok(())
}

#[test]
fn test_calibration_needs_both_durations() -> Result<()> {
    let with_both = format!(
        "{}  brightness calibration duration from black to white: 2.0\n  brightness calibration duration to hold on white: 1.0\n",
        SCRIPT
    );
    let description = SessionDescription::parse("calibrated", &with_both, &catalogue())?;
    let calibration = description
        .brightness_calibration
        .expect("calibration enabled");
    assert_eq!(calibration.duration_black_to_white, 2.0);
    assert_eq!(calibration.duration_hold_on_white, 1.0);

    let ramp_only = format!(
        "{}  brightness calibration duration from black to white: 2.0\n",
        SCRIPT
    );
    let description = SessionDescription::parse("ramp_only", &ramp_only, &catalogue())?;
    assert!(description.brightness_calibration.is_none());

    Ok(())
}

#[test]
fn test_empty_name_becomes_untitled() -> Result<()> {
    let description = SessionDescription::parse("", SCRIPT, &catalogue())?;
    assert_eq!(description.name, "(untitled)");
    Ok(())
}

#[test]
fn test_structural_problems_are_aggregated() {
    let broken = SCRIPT
        .replace("speaker amplitude: 0.8", "speaker amplitude: 0.0")
        .replace("amplitude: 1.0 }", "amplitude: 1.5 }")
        .replace("    - [speech_c, speech_a, speech_b]\n", "    - [speech_c, speech_a]\n");

    let err = SessionDescription::parse("broken", &broken, &catalogue()).unwrap_err();
    match err {
        ValidationError::Invalid { problems } => {
            assert_eq!(problems.len(), 3, "{:?}", problems);
            assert!(problems.iter().any(|p| p.contains("speaker amplitude")));
            assert!(problems.iter().any(|p| p.contains("masker 3")));
            assert!(problems.iter().any(|p| p.contains("challenge 2")));
        }
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn test_infinite_values_are_rejected() {
    let infinite = format!(
        "{}  brightness calibration duration to hold on white: .inf\n",
        SCRIPT
            .replace("speaker amplitude: 0.8", "speaker amplitude: .inf")
            .replace("rotation: 90.0", "rotation: -.inf")
            .replace("delay after playing videos: 0.5", "delay after playing videos: .inf")
            .replace("recording duration: 4.0", "recording duration: .inf")
            .replace("azimuth: 30.0", "azimuth: .nan")
    );

    let err = SessionDescription::parse("infinite", &infinite, &catalogue()).unwrap_err();
    match err {
        ValidationError::Invalid { problems } => {
            assert_eq!(problems.len(), 6, "{:?}", problems);
            assert!(problems.iter().any(|p| p.contains("speaker amplitude")));
            assert!(problems.iter().any(|p| p.contains("masker 1 rotation")));
            assert!(problems.iter().any(|p| p.contains("video screen 2")));
            assert!(problems
                .iter()
                .any(|p| p.contains("'delay after playing videos' must be a finite number")));
            assert!(problems
                .iter()
                .any(|p| p.contains("'recording duration' must be a finite number")));
            assert!(problems.iter().any(|p| p.contains("hold on white")));
        }
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn test_wrong_masker_count_is_rejected() {
    let three_maskers = SCRIPT.replace("    - { rotation: 270.0, amplitude: 1.0 }\n", "");
    let err = SessionDescription::parse("three", &three_maskers, &catalogue()).unwrap_err();
    assert!(matches!(err, ValidationError::Invalid { .. }));
    assert!(err.to_string().contains("exactly 4"));
}

#[test]
fn test_unknown_videos_are_listed() {
    let unknown = SCRIPT.replace("[speech_a, speech_b, speech_c]", "[speech_a, nope_1, nope_2]");
    let err = SessionDescription::parse("unknown", &unknown, &catalogue()).unwrap_err();
    match err {
        ValidationError::MissingVideos { names } => {
            assert_eq!(names, vec!["nope_1".to_string(), "nope_2".to_string()]);
        }
        other => panic!("expected MissingVideos, got {other:?}"),
    }
}

#[test]
fn test_malformed_yaml_is_a_parse_error() {
    let err = SessionDescription::parse("bad", "session: [not, a, mapping", &catalogue())
        .unwrap_err();
    assert!(matches!(err, ValidationError::Parse(_)));
}

#[test]
fn test_missing_file_is_an_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = SessionDescription::load(temp_dir.path().join("absent.yaml"), &catalogue())
        .unwrap_err();
    assert!(matches!(err, ValidationError::Io { .. }));
}
