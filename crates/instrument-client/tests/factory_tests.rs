//! Tests for the API client factory and token handling
//!
//! Secrets files are written to temporary files; the token endpoint and the
//! REST API are both served by wiremock.

use instrument_client::{
    ApiClientFactory, ApiError, ApiSurface, InstrumentsApi, PropertyDefinitionsApi,
};
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn write_secrets(contents: serde_json::Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

fn password_secrets(server: &MockServer) -> NamedTempFile {
    write_secrets(json!({
        "api": {
            "tokenUrl": format!("{}/oauth2/token", server.uri()),
            "apiUrl": format!("{}/api", server.uri()),
            "username": "svc-user",
            "password": "svc-password",
            "clientId": "client-id",
            "clientSecret": "client-secret",
            "appName": "instrument-master-tests"
        }
    }))
}

fn identifier_types_body() -> serde_json::Value {
    json!({
        "values": [
            { "identifierType": "Figi", "propertyKey": "Instrument/default/Figi", "isUniqueIdentifierType": true }
        ]
    })
}

#[tokio::test]
async fn test_build_instruments_api_from_access_token_file() {
    let server = MockServer::start().await;
    let secrets = write_secrets(json!({
        "api": {
            "apiUrl": format!("{}/api", server.uri()),
            "accessToken": "personal-token",
            "appName": "instrument-master-tests"
        }
    }));

    Mock::given(method("GET"))
        .and(path("/api/instruments/identifierTypes"))
        .and(header("Authorization", "Bearer personal-token"))
        .and(header("X-LUSID-Application", "instrument-master-tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(identifier_types_body()))
        .expect(1)
        .mount(&server)
        .await;

    let factory = ApiClientFactory::from_secrets_file(secrets.path()).unwrap();
    let api: InstrumentsApi = factory.build();

    let result = api.get_instrument_identifier_types().await.unwrap();
    assert!(!result.values.is_empty());
}

#[tokio::test]
async fn test_build_does_not_touch_the_network() {
    let server = MockServer::start().await;
    let secrets = password_secrets(&server);

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "t" })))
        .expect(0)
        .mount(&server)
        .await;

    let factory = ApiClientFactory::from_secrets_file(secrets.path()).unwrap();
    let instruments: InstrumentsApi = factory.build();
    let properties: PropertyDefinitionsApi = factory.build();

    assert_eq!(
        instruments.client().base_url(),
        properties.client().base_url()
    );
}

#[tokio::test]
async fn test_password_grant_token_is_cached_across_surfaces() {
    let server = MockServer::start().await;
    let secrets = password_secrets(&server);

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=svc-user"))
        .and(body_string_contains("client_id=client-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "granted-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/instruments/identifierTypes"))
        .and(header("Authorization", "Bearer granted-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(identifier_types_body()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/propertydefinitions/Instrument/tutorials/CustomSector"))
        .and(header("Authorization", "Bearer granted-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key": "Instrument/tutorials/CustomSector",
            "domain": "Instrument",
            "scope": "tutorials",
            "code": "CustomSector"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let factory = ApiClientFactory::from_secrets_file(secrets.path()).unwrap();
    let instruments: InstrumentsApi = factory.build();
    let properties: PropertyDefinitionsApi = factory.build();

    instruments.get_instrument_identifier_types().await.unwrap();
    let definition = properties
        .get_property_definition("Instrument", "tutorials", "CustomSector")
        .await
        .unwrap();
    assert_eq!(definition.code, "CustomSector");
}

#[tokio::test]
async fn test_unrepresentable_token_expiry_is_treated_as_no_expiry() {
    let server = MockServer::start().await;
    let secrets = password_secrets(&server);

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "long-lived",
            "expires_in": i64::MAX
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/instruments/identifierTypes"))
        .and(header("Authorization", "Bearer long-lived"))
        .respond_with(ResponseTemplate::new(200).set_body_json(identifier_types_body()))
        .expect(2)
        .mount(&server)
        .await;

    let api: InstrumentsApi = ApiClientFactory::from_secrets_file(secrets.path())
        .unwrap()
        .build();

    api.get_instrument_identifier_types().await.unwrap();
    api.get_instrument_identifier_types().await.unwrap();
}

#[tokio::test]
async fn test_rejected_token_is_refreshed_once() {
    let server = MockServer::start().await;
    let secrets = password_secrets(&server);

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "fresh" })))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/instruments/identifierTypes"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/instruments/identifierTypes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(identifier_types_body()))
        .expect(1)
        .mount(&server)
        .await;

    let api: InstrumentsApi = ApiClientFactory::from_secrets_file(secrets.path())
        .unwrap()
        .build();

    let result = api.get_instrument_identifier_types().await.unwrap();
    assert_eq!(result.values.len(), 1);
}

#[tokio::test]
async fn test_token_endpoint_failure_is_authentication_error() {
    let server = MockServer::start().await;
    let secrets = password_secrets(&server);

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "The credentials provided were invalid."
        })))
        .mount(&server)
        .await;

    let api: InstrumentsApi = ApiClientFactory::from_secrets_file(secrets.path())
        .unwrap()
        .build();

    let err = api.list_instruments(Some(5)).await.unwrap_err();
    match err {
        ApiError::Authentication(msg) => assert!(msg.contains("invalid_grant")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_missing_secrets_file_is_configuration_error() {
    let err = ApiClientFactory::from_secrets_file("/definitely/not/here/secrets.json").unwrap_err();
    assert!(matches!(err, ApiError::Configuration(_)));
}

#[test]
fn test_secrets_without_credentials_is_configuration_error() {
    let secrets = write_secrets(json!({ "api": { "apiUrl": "https://tenant.example.com/api" } }));
    // A populated environment could complete the credentials
    if std::env::var("FBN_ACCESS_TOKEN").is_ok() || std::env::var("FBN_TOKEN_URL").is_ok() {
        return;
    }
    let err = ApiClientFactory::from_secrets_file(secrets.path()).unwrap_err();
    assert!(matches!(err, ApiError::Configuration(_)));
}
