//! Focused unit tests covering argument parsing and configuration merging.

use super::helpers::{CatalogFixture, run_cli};
use super::*;
use crate::sync::{
    ENV_SYNC_API_URL, ENV_SYNC_CLIENT_ID, ENV_SYNC_CLIENT_SECRET, SyncSettings,
    settings_from_layers_for_test,
};
use camino::Utf8PathBuf;
use ortho_config::MergeComposer;
use pickup_core::ParameterError;
use rstest::rstest;
use secrecy::ExposeSecret;
use serde_json::json;
use std::time::Duration;

fn complete_args() -> SyncArgs {
    SyncArgs {
        api_url: Some("https://api.example.test/v2".to_owned()),
        client_id: Some("client".to_owned()),
        client_secret: Some("secret".to_owned()),
        ..SyncArgs::default()
    }
}

#[rstest]
#[case::api_url(SyncArgs { api_url: None, ..complete_args() }, ARG_API_URL, ENV_SYNC_API_URL)]
#[case::client_id(SyncArgs { client_id: None, ..complete_args() }, ARG_CLIENT_ID, ENV_SYNC_CLIENT_ID)]
#[case::client_secret(
    SyncArgs { client_secret: None, ..complete_args() },
    ARG_CLIENT_SECRET,
    ENV_SYNC_CLIENT_SECRET
)]
fn converting_without_required_fields_errors(
    #[case] args: SyncArgs,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let err = SyncSettings::try_from(args).expect_err("missing field should error");
    match err {
        CliError::MissingArgument {
            field: missing,
            env,
        } => {
            assert_eq!(missing, field);
            assert_eq!(env, env_var);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn optional_settings_take_defaults() {
    let settings = SyncSettings::try_from(complete_args()).expect("settings");
    assert_eq!(settings.database, Utf8PathBuf::from(DEFAULT_DATABASE));
    assert_eq!(settings.timeout, Duration::from_secs(30));
    assert_eq!(settings.country_code, "RU");
    assert!(!settings.strict);
    assert_eq!(settings.client_secret.expose_secret(), "secret");
}

#[rstest]
fn merge_layers_maps_configuration_errors() {
    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "timeout_secs": "soon" }));

    let err = settings_from_layers_for_test(composer.layers())
        .expect_err("invalid config layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_honour_precedence() {
    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({
            "api_url": "https://from-file.test/v2",
            "client_id": "file-client",
            "timeout_secs": 5,
        }),
        None,
    );
    composer.push_environment(json!({
        "client_id": "env-client",
        "client_secret": "env-secret",
    }));
    composer.push_cli(json!({ "database": "cli.db", "strict": true }));

    let settings =
        settings_from_layers_for_test(composer.layers()).expect("merged settings should build");
    assert_eq!(settings.api_url, "https://from-file.test/v2");
    assert_eq!(settings.client_id, "env-client");
    assert_eq!(settings.client_secret.expose_secret(), "env-secret");
    assert_eq!(settings.timeout, Duration::from_secs(5));
    assert_eq!(settings.database, Utf8PathBuf::from("cli.db"));
    assert!(settings.strict);
}

#[rstest]
fn negative_coordinates_parse_as_values() {
    let cli = Cli::try_parse_from(["pickup", "nearest-city", "--lng", "-0.12", "--lat", "51.5"])
        .expect("negative longitude should parse");
    match cli.command {
        Command::NearestCity(args) => {
            assert!((args.lng + 0.12).abs() < f64::EPSILON);
            assert_eq!(args.catalog.database, Utf8PathBuf::from(DEFAULT_DATABASE));
        }
        other => panic!("expected nearest-city, found {other:?}"),
    }
}

#[rstest]
#[case::longitude(&["--lng", "NaN", "--lat", "55.0"], "lng")]
#[case::latitude(&["--lng", "37.0", "--lat", "inf"], "lat")]
fn non_finite_coordinates_are_rejected(#[case] coords: &[&str], #[case] field: &'static str) {
    let catalog = CatalogFixture::empty();
    let database = catalog.arg();
    let mut argv = vec!["pickup", "nearest-city", database.as_str()];
    argv.extend_from_slice(coords);
    let (result, stdout) = run_cli(argv);
    match result {
        Err(CliError::InvalidParameter(ParameterError::NonFiniteCoordinate { field: found })) => {
            assert_eq!(found, field);
        }
        other => panic!("expected NonFiniteCoordinate, found {other:?}"),
    }
    assert!(stdout.is_empty());
}

#[rstest]
#[case::too_short("AB")]
#[case::too_long("ABCDEFGHIJK")]
fn point_codes_outside_the_accepted_length_are_rejected(#[case] code: &str) {
    let catalog = CatalogFixture::empty();
    let (result, _) = run_cli(["pickup", "point", catalog.arg().as_str(), code]);
    match result {
        Err(CliError::InvalidParameter(ParameterError::CodeLength { .. })) => {}
        other => panic!("expected CodeLength, found {other:?}"),
    }
}

#[rstest]
fn nearest_city_on_an_empty_catalog_is_not_found() {
    let catalog = CatalogFixture::initialised();
    let (result, _) = run_cli([
        "pickup",
        "nearest-city",
        catalog.arg().as_str(),
        "--lng",
        "37.6",
        "--lat",
        "55.7",
    ]);
    match result {
        Err(CliError::Query(pickup_core::QueryError::CityNotFound)) => {}
        other => panic!("expected CityNotFound, found {other:?}"),
    }
}

#[rstest]
#[case::nearest_city(&["nearest-city", "--lng", "37.6", "--lat", "55.7"])]
#[case::suggest_cities(&["suggest-cities", "Mos"])]
#[case::point(&["point", "MSK1"])]
#[case::points_by_city(&["points-by-city", "100"])]
fn lookups_refuse_a_missing_catalog(#[case] command: &[&str]) {
    let catalog = CatalogFixture::empty();
    let database = catalog.database.with_file_name("typo/catalog.db");
    let flag = format!("--{ARG_DATABASE}={database}");
    let (subcommand, rest) = command.split_first().expect("subcommand");
    let mut argv = vec!["pickup", *subcommand, flag.as_str()];
    argv.extend_from_slice(rest);

    let (result, stdout) = run_cli(argv);
    match result {
        Err(CliError::MissingCatalog { field, path }) => {
            assert_eq!(field, ARG_DATABASE);
            assert_eq!(path, database);
        }
        other => panic!("expected MissingCatalog, found {other:?}"),
    }
    assert!(stdout.is_empty());
    assert!(
        !database.parent().expect("parent").as_std_path().exists(),
        "lookups must not create directories"
    );
}

#[rstest]
fn lookups_leave_no_file_behind_for_a_missing_catalog() {
    let catalog = CatalogFixture::empty();
    let (result, _) = run_cli(["pickup", "points-by-city", catalog.arg().as_str(), "100"]);
    assert!(matches!(result, Err(CliError::MissingCatalog { .. })));
    assert!(!catalog.database.as_std_path().exists());
}

#[rstest]
fn lookups_reject_a_directory_as_catalog() {
    let catalog = CatalogFixture::empty();
    let directory = catalog.database.parent().expect("parent").to_owned();
    let flag = format!("--{ARG_DATABASE}={directory}");
    let (result, _) = run_cli(["pickup", "suggest-cities", flag.as_str(), "Mos"]);
    match result {
        Err(CliError::CatalogNotFile { path, .. }) => assert_eq!(path, directory),
        other => panic!("expected CatalogNotFile, found {other:?}"),
    }
}
