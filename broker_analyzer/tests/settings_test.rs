use std::io::Write;

use broker_analyzer::{AnalysisSettings, settings::DEFAULT_MIN_POINTS};

#[test]
fn loads_settings_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        bucket = "prices"
        symbol = "EURUSD"
        timeframe = "H1"
        brokers = ["pepperstone", "icm"]
        min_brokers = 3
        "#
    )
    .unwrap();

    let settings = AnalysisSettings::from_toml_path(file.path()).unwrap();
    assert_eq!(settings.brokers, vec!["pepperstone", "icm"]);
    assert_eq!(settings.min_points, DEFAULT_MIN_POINTS);
    assert_eq!(settings.min_brokers, 3);
}

#[test]
fn empty_broker_list_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(
        &path,
        "bucket = \"prices\"\nsymbol = \"EURUSD\"\ntimeframe = \"H1\"\nbrokers = []\n",
    )
    .unwrap();

    let err = AnalysisSettings::from_toml_path(&path).unwrap_err();
    assert_eq!(err.to_string(), "invalid settings");
    assert_eq!(err.root_cause().to_string(), "Please select at least one broker.");
}

#[test]
fn missing_file_names_the_path() {
    let err = AnalysisSettings::from_toml_path("/nonexistent/settings.toml").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/settings.toml"));
}
