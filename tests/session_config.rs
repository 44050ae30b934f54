use std::io::Write;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use framewatch::{FramewatchConfig, ModelVariant};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "FRAMEWATCH_CONFIG",
        "FRAMEWATCH_MODEL_PATH",
        "FRAMEWATCH_LABEL_PATH",
        "FRAMEWATCH_CAPTURE_SOURCE",
        "FRAMEWATCH_TARGET_FPS",
        "FRAMEWATCH_CONFIDENCE_THRESHOLD",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "model": {
            "input_size": 608,
            "confidence_threshold": 0.4,
            "labels": ["mouse", "other"]
        },
        "decoder": {
            "variant": "pre_suppressed"
        },
        "capture": {
            "source": "stub://bench",
            "target_fps": 4
        }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("FRAMEWATCH_CONFIG", file.path());
    std::env::set_var("FRAMEWATCH_CAPTURE_SOURCE", "stub://override");
    std::env::set_var("FRAMEWATCH_TARGET_FPS", "8");

    let cfg = FramewatchConfig::load().expect("load config");
    clear_env();

    assert_eq!(cfg.model.input_size, 608);
    assert!((cfg.model.confidence_threshold - 0.4).abs() < 1e-6);
    assert_eq!(cfg.model_settings.labels, vec!["mouse", "other"]);
    assert_eq!(cfg.decoder.variant, ModelVariant::PreSuppressed);
    assert_eq!(cfg.capture.source, "stub://override");
    assert_eq!(cfg.capture.target_fps, 8);
}

#[test]
fn defaults_match_the_shipped_model() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = FramewatchConfig::load().expect("load defaults");

    assert_eq!(cfg.model.input_size, 320);
    assert_eq!(cfg.model.mean, [0.485, 0.456, 0.406]);
    assert_eq!(cfg.model.std, [0.229, 0.224, 0.225]);
    assert!((cfg.decoder.pre_nms_score_floor - 0.3).abs() < 1e-6);
    assert!((cfg.decoder.nms_iou_threshold - 0.5).abs() < 1e-6);
    assert_eq!(
        cfg.decoder.variant,
        ModelVariant::RawAnchor {
            num_anchors: 2125,
            num_classes: 2
        }
    );
    assert_eq!(cfg.decoder.boxes_tensor, "boxes");
    assert_eq!(cfg.decoder.scores_tensor, "scores");
}

#[test]
fn rejects_unknown_decoder_variant() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{ "decoder": { "variant": "hybrid" } }"#)
        .expect("write config");
    std::env::set_var("FRAMEWATCH_CONFIG", file.path());

    let result = FramewatchConfig::load();
    clear_env();
    assert!(result.is_err());
}

#[test]
fn rejects_out_of_range_thresholds() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{ "model": { "confidence_threshold": 1.5 } }"#)
        .expect("write config");
    std::env::set_var("FRAMEWATCH_CONFIG", file.path());

    let result = FramewatchConfig::load();
    clear_env();
    assert!(result.is_err());
}

#[test]
fn resolves_first_existing_model_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let model_file = NamedTempFile::new().expect("temp model");
    let mut cfg = FramewatchConfig::default();
    cfg.model_settings.model_paths = vec![
        "/nonexistent/model_a.onnx".to_string(),
        model_file.path().display().to_string(),
    ];

    let resolved = cfg.model_settings.resolve_model_path().expect("resolve");
    assert_eq!(resolved, model_file.path());

    cfg.model_settings.model_paths = vec!["/nonexistent/model_a.onnx".to_string()];
    let err = cfg.model_settings.resolve_model_path().unwrap_err();
    assert!(err.to_string().contains("model_a.onnx"));
}
