mod common;

use common::runtime_with;
use mmg_activator::{error::ActivationError, prelude::*, streaming::PropertiesStreamingSource};
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq, Describe)]
#[describe(namespace = "urn:cfg", default)]
struct Settings {
    name: String,
    retries: u32,
    #[describe(collection)]
    tags: Vec<String>,
    #[describe(skip)]
    cache: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Describe)]
#[describe(namespace = "urn:cfg", default)]
struct Legacy {
    name: String,
    retries: u32,
}

/// `name;retries`, picked up as `Legacy`'s streaming source by its name.
#[derive(Default, Describe)]
#[describe(namespace = "urn:cfg", default, implements(dyn StreamingSource))]
struct LegacySource;

impl StreamingSource for LegacySource {
    fn load(&self, rt: &Runtime, text: &str, ty: TypeKey) -> Result<Value> {
        let (name, retries) = text.trim().split_once(';').unwrap_or((text, "0"));
        rt.create_instance(ty, [("name", name), ("retries", retries)])
    }

    fn save(&self, rt: &Runtime, value: &Value) -> Result<String> {
        let props = rt.properties_of(value)?;
        let retries = props.get("retries").and_then(|v| v.downcast_ref::<u32>()).copied();
        Ok(format!("{};{}", props.get_text("name").unwrap_or(""), retries.unwrap_or(0)))
    }
}

fn config_runtime() -> Runtime {
    runtime_with(vec![Module::builder("cfg")
        .describe::<Settings>()
        .describe::<Legacy>()
        .describe::<LegacySource>()
        .build()])
}

fn settings(v: &Value) -> &Settings {
    v.downcast_ref::<Settings>().expect("settings")
}

#[test]
fn json_text_loads_by_default() {
    let rt = config_runtime();
    let src = StreamSource::Text(r#"{ "name": "svc", "retries": 3, "tags": ["a", "b"], "extra": null }"#.into());
    let v = rt.load(&src, TypeKey::of::<Settings>()).unwrap();
    assert_eq!(
        settings(&v),
        &Settings {
            name: "svc".into(),
            retries: 3,
            tags: vec!["a".into(), "b".into()],
            cache: None,
        }
    );
}

#[test]
fn json_round_trips_through_save() {
    let rt = config_runtime();
    let original = rt
        .create_instance(
            TypeKey::of::<Settings>(),
            Properties::new().with("name", "svc").with("retries", 5u32).with("tags", "x"),
        )
        .unwrap();
    let text = rt.save(&original, None).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["retries"], serde_json::json!(5));
    assert_eq!(json["tags"], serde_json::json!(["x"]));
    assert!(json.get("cache").is_none());

    let back = rt.load_as::<Settings>(&StreamSource::Text(text)).unwrap();
    assert_eq!(&*back, settings(&original));
}

#[test]
fn properties_files_pick_the_source_by_extension() {
    let rt = config_runtime();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("service.properties");
    std::fs::write(&path, "# service\nname = svc\nretries: 2\ntags=x\n").unwrap();

    let v = rt.load(&StreamSource::file(&path), TypeKey::of::<Settings>()).unwrap();
    assert_eq!(settings(&v).retries, 2);
    assert_eq!(settings(&v).tags, vec!["x"]);

    let text = rt.save(&v, Some("properties")).unwrap();
    assert_eq!(text, "name=svc\nretries=2\n");
    assert_eq!(PropertiesStreamingSource::parse(&text).get_text("name"), Some("svc"));
}

#[test]
fn type_specific_sources_are_found_by_convention() {
    let rt = config_runtime();
    let v = rt
        .load(&StreamSource::Text("db;4".into()), TypeKey::of::<Legacy>())
        .unwrap();
    assert_eq!(
        v.downcast_ref::<Legacy>().unwrap(),
        &Legacy {
            name: "db".into(),
            retries: 4
        }
    );
    assert_eq!(rt.save(&v, Some("json")).unwrap(), "db;4");
}

#[test]
fn data_uris_and_unknown_formats() {
    let rt = config_runtime();
    let uri = StreamSource::Uri(r#"data:application/json,{"name":"inline"}"#.into());
    let v = rt.load(&uri, TypeKey::of::<Settings>()).unwrap();
    assert_eq!(settings(&v).name, "inline");

    assert!(matches!(
        rt.load(&StreamSource::Uri("ftp://host/x".into()), TypeKey::of::<Settings>()),
        Err(ActivationError::UnsupportedUri(_))
    ));
    assert!(matches!(
        rt.streaming_source_for(TypeKey::of::<Settings>(), Some("yaml")),
        Err(ActivationError::NoStreamingSource(_))
    ));
}

#[test]
fn streaming_sources_are_providers() {
    let rt = config_runtime();
    let json = rt.get_provider::<dyn StreamingSource>("json").unwrap();
    assert!(json.is_some());
    let by_type = rt
        .get_provider_by_criteria::<dyn StreamingSource>(&Criteria::new().with("content_type", "application/json"))
        .unwrap()
        .unwrap();
    assert!(Arc::ptr_eq(&json.unwrap(), &by_type));
}

#[tokio::test]
async fn files_load_asynchronously() {
    let rt = config_runtime();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("svc.json");
    tokio::fs::write(&path, r#"{ "name": "async", "retries": "7" }"#).await.unwrap();
    let v = rt
        .load_async(&StreamSource::file(&path), TypeKey::of::<Settings>())
        .await
        .unwrap();
    assert_eq!(settings(&v).name, "async");
    assert_eq!(settings(&v).retries, 7);
}
