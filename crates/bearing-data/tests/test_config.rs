//! Integration tests for [`bearing_data::config::PipelineConfig`].

use bearing_data::config::PipelineConfig;
use bearing_data::error::ConfigError;
use bearing_signal::WindowFunction;
use tempfile::tempdir;

/// The defaults mirror the reference training setup.
#[test]
fn defaults_match_reference_setup() {
    let cfg = PipelineConfig::default();
    cfg.validate().expect("default PipelineConfig must be valid");

    assert_eq!(cfg.adapter, "synthetic");
    assert_eq!(cfg.image_size(), (64, 64));
    assert_eq!((cfg.seg_length, cfg.win_length, cfg.hop_length), (1024, 512, 128));
    assert_eq!(cfg.window, WindowFunction::Rectangular);
    assert_eq!(cfg.fractions, [0.8, 0.1, 0.1]);
    assert_eq!(cfg.batch_size, 32);
    assert_eq!(cfg.num_workers, 8);
    assert_eq!(cfg.seed, 0);
    assert_eq!(cfg.n_sigma, 2.0);
    assert!(!cfg.min_max_scale);
    assert!(!cfg.cache_label_encoder);
}

/// Segment parameters are taken verbatim from the config.
#[test]
fn segment_params_follow_config() {
    let cfg = PipelineConfig {
        seg_length: 2048,
        win_length: 256,
        hop_length: 64,
        window: WindowFunction::Hann,
        ..PipelineConfig::default()
    };
    let params = cfg.segment_params();
    assert_eq!(params.seg_length, 2048);
    assert_eq!(params.win_length, 256);
    assert_eq!(params.hop_length, 64);
    assert_eq!(params.window, WindowFunction::Hann);
    assert_eq!(params.stft_config().n_freq(), 129);
}

/// Each invalid field is rejected and named in the error.
#[test]
fn invalid_fields_are_named() {
    let cases: Vec<(&str, PipelineConfig)> = vec![
        ("image_size", PipelineConfig { image_size: [0, 64], ..Default::default() }),
        ("hop_length", PipelineConfig { hop_length: 0, ..Default::default() }),
        ("win_length", PipelineConfig { win_length: 4096, ..Default::default() }),
        ("fractions", PipelineConfig { fractions: [0.5, 0.5, 0.5], ..Default::default() }),
        ("batch_size", PipelineConfig { batch_size: 0, ..Default::default() }),
        ("n_sigma", PipelineConfig { n_sigma: 0.0, ..Default::default() }),
        ("adapter", PipelineConfig { adapter: " ".into(), ..Default::default() }),
    ];
    for (field, cfg) in cases {
        match cfg.validate() {
            Err(ConfigError::InvalidValue { field: f, .. }) => assert_eq!(f, field),
            other => panic!("expected InvalidValue for {field}, got {other:?}"),
        }
    }
}

/// An invalid file is rejected on load even though it parses.
#[test]
fn from_json_validates() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("bad.json");
    std::fs::write(&path, r#"{ "fractions": [0.6, 0.3, 0.3] }"#).unwrap();
    assert!(matches!(
        PipelineConfig::from_json(&path),
        Err(ConfigError::InvalidValue { field: "fractions", .. })
    ));
}

/// A missing file is a file-access error.
#[test]
fn missing_file_is_access_error() {
    let tmp = tempdir().unwrap();
    assert!(matches!(
        PipelineConfig::from_json(&tmp.path().join("absent.json")),
        Err(ConfigError::FileAccess { .. })
    ));
}
