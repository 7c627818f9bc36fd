mod common;

use common::{init_tracing, runtime_with, Recorder};
use mmg_activator::{
    activation::ActivationProvider,
    error::{ActivationError, CriticalError},
    prelude::*,
    service::ServiceProvider,
};
use std::sync::Arc;

const NS: &str = "urn:net";

#[derive(Debug, Clone, Default)]
struct Endpoint {
    host: String,
    port: u16,
    secure: bool,
    tags: Vec<String>,
}

fn endpoint() -> TypeDescriptor {
    TypeDescriptor::builder::<Endpoint>(QualifiedName::new(NS, "Endpoint"))
        .constructor(Constructor::new(
            vec![
                Param::new::<String>("host"),
                Param::new::<u16>("port").with_default(80u16),
            ],
            |a| {
                Ok(Endpoint {
                    host: a.get(0)?,
                    port: a.get(1)?,
                    ..Endpoint::default()
                })
            },
        ))
        .property(Property::read_write::<Endpoint, bool>("secure", |e| e.secure, |e, v| e.secure = v))
        .property(Property::collection::<Endpoint, String>("tags", |e| &mut e.tags, |e| &e.tags))
        .property(Property::read_only::<Endpoint, String>("scheme", |e| {
            if e.secure { "https" } else { "http" }.to_string()
        }))
        .build()
}

fn net_module() -> Module {
    Module::builder("net").type_descriptor(endpoint()).build()
}

fn ep(v: &Value) -> &Endpoint {
    v.downcast_ref::<Endpoint>().expect("endpoint")
}

#[test]
fn positional_and_named_keys_bind_constructor_params() {
    let rt = runtime_with(vec![net_module()]);
    let v = rt
        .create_instance(
            TypeKey::of::<Endpoint>(),
            [("0", Value::from("db.local")), ("PORT", Value::from("5432"))],
        )
        .unwrap();
    assert_eq!(ep(&v).host, "db.local");
    assert_eq!(ep(&v).port, 5432);
}

#[test]
fn later_keys_for_the_same_param_win() {
    let rt = runtime_with(vec![net_module()]);
    let v = rt
        .create_instance(
            TypeKey::of::<Endpoint>(),
            [
                ("host", Value::from("a")),
                ("0", Value::from("b")),
                ("port", Value::from("5")),
                ("1", Value::from("99")),
            ],
        )
        .unwrap();
    assert_eq!(ep(&v).host, "b");
    assert_eq!(ep(&v).port, 99);
}

#[test]
fn defaults_fill_unbound_params_and_missing_ones_fail() {
    let rt = runtime_with(vec![net_module()]);
    let v = rt.create_instance(TypeKey::of::<Endpoint>(), [("host", "a")]).unwrap();
    assert_eq!(ep(&v).port, 80);

    let err = rt.create_default(TypeKey::of::<Endpoint>()).unwrap_err();
    assert!(matches!(err, ActivationError::MissingArgument { ref param, .. } if param == "host"));
}

#[test]
fn leftovers_initialize_properties() {
    let rt = runtime_with(vec![net_module()]);
    let args = Properties::new()
        .with("host", "api")
        .with("Secure", "true")
        .with("tags", Value::new(vec![Value::from("x"), Value::from("y")]));
    let v = rt.create_instance(TypeKey::of::<Endpoint>(), args).unwrap();
    let e = ep(&v);
    assert!(e.secure);
    assert_eq!(e.tags, vec!["x", "y"]);
}

#[test]
fn repeated_collection_keys_each_add_an_item() {
    let rt = runtime_with(vec![net_module()]);
    let v = rt
        .create_instance(
            TypeKey::of::<Endpoint>(),
            [("host", "a"), ("tags", "x"), ("TAGS", "y")],
        )
        .unwrap();
    assert_eq!(ep(&v).tags, vec!["x", "y"]);
}

#[test]
fn bad_argument_text_is_an_error() {
    let rt = runtime_with(vec![net_module()]);
    let err = rt
        .create_instance(TypeKey::of::<Endpoint>(), [("host", "a"), ("port", "not-a-port")])
        .unwrap_err();
    assert!(matches!(err, ActivationError::Conversion { .. }));
}

#[test]
fn unmatched_properties_go_to_the_handler_without_aborting() {
    let recorder = Arc::new(Recorder::default());
    let rt = RuntimeBuilder::new(common::isolated())
        .module(net_module())
        .exception_handler(recorder.clone())
        .build()
        .unwrap();
    let v = rt
        .create_instance(
            TypeKey::of::<Endpoint>(),
            [("host", "a"), ("colour", "red"), ("scheme", "ftp"), ("secure", "maybe")],
        )
        .unwrap();
    assert_eq!(ep(&v).host, "a");
    assert!(!ep(&v).secure);
    let seen = recorder.messages();
    assert_eq!(seen.len(), 3, "{seen:?}");
    assert!(seen[0].contains("colour"));
    assert!(seen[1].contains("read-only"));
    assert!(seen[2].contains("maybe"));
}

#[test]
fn unmatched_properties_are_ignored_without_a_handler() {
    init_tracing();
    let rt = runtime_with(vec![net_module()]);
    assert!(rt.exception_handler().is_none());
    let v = rt
        .create_instance(TypeKey::of::<Endpoint>(), [("host", "a"), ("colour", "red")])
        .unwrap();
    assert_eq!(ep(&v).host, "a");
}

trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

struct FixedClock(u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

struct Stamp {
    at: u64,
}

fn stamp_module() -> Module {
    Module::builder("stamps")
        .type_descriptor(
            TypeDescriptor::builder::<Stamp>(QualifiedName::new(NS, "Stamp"))
                .constructor(Constructor::new(vec![Param::service::<dyn Clock>("clock")], |a| {
                    Ok(Stamp {
                        at: a.shared::<dyn Clock>(0)?.now(),
                    })
                }))
                .build(),
        )
        .build()
}

#[test]
fn service_params_are_injected_per_call_first() {
    let rt = RuntimeBuilder::new(common::isolated())
        .module(stamp_module())
        .service::<dyn Clock>(Arc::new(FixedClock(42)))
        .build()
        .unwrap();
    let v = rt.create_default(TypeKey::of::<Stamp>()).unwrap();
    assert_eq!(v.downcast_ref::<Stamp>().unwrap().at, 42);

    let local = ServiceContainer::new().with::<dyn Clock>(Arc::new(FixedClock(7)));
    let v = rt
        .create_instance_with(TypeKey::of::<Stamp>(), Properties::new(), Some(&local as &dyn ServiceProvider))
        .unwrap();
    assert_eq!(v.downcast_ref::<Stamp>().unwrap().at, 7);
}

/// Hands out the concrete clock; callers must adapt it to `dyn Clock`.
struct RawClocks;

impl ServiceProvider for RawClocks {
    fn get_service(&self, key: TypeKey) -> Option<Value> {
        (key == TypeKey::of::<dyn Clock>()).then(|| Value::new(FixedClock(9)))
    }
}

fn clocks_module() -> Module {
    Module::builder("clocks")
        .type_descriptor(
            TypeDescriptor::builder::<FixedClock>(QualifiedName::new(NS, "FixedClock"))
                .implements::<dyn Clock>(|c| c as Arc<dyn Clock>)
                .build(),
        )
        .build()
}

#[test]
fn per_call_services_are_adapted_to_the_param_type() {
    let rt = runtime_with(vec![stamp_module(), clocks_module()]);
    let v = rt
        .create_instance_with(TypeKey::of::<Stamp>(), Properties::new(), Some(&RawClocks as &dyn ServiceProvider))
        .unwrap();
    assert_eq!(v.downcast_ref::<Stamp>().unwrap().at, 9);
}

#[test]
fn runtime_services_adapt_when_no_direct_match_exists() {
    let rt = RuntimeBuilder::new(common::isolated())
        .module(stamp_module())
        .module(clocks_module())
        .service::<FixedClock>(Arc::new(FixedClock(3)))
        .build()
        .unwrap();
    let v = rt.create_default(TypeKey::of::<Stamp>()).unwrap();
    assert_eq!(v.downcast_ref::<Stamp>().unwrap().at, 3);
}

#[test]
fn service_params_without_a_service_are_missing() {
    let rt = runtime_with(vec![stamp_module()]);
    let err = rt.create_default(TypeKey::of::<Stamp>()).unwrap_err();
    assert!(matches!(err, ActivationError::MissingArgument { .. }));
}

trait Shape: Send + Sync {
    fn area(&self) -> f64;
}

trait Solid: Send + Sync {}

#[derive(Default)]
struct Circle {
    r: f64,
}

impl Shape for Circle {
    fn area(&self) -> f64 {
        3.0 * self.r * self.r
    }
}

fn shapes_module() -> Module {
    Module::builder("shapes")
        .type_descriptor(
            TypeDescriptor::role::<dyn Shape>(QualifiedName::new(NS, "Shape"))
                .concrete_type::<Circle>()
                .build(),
        )
        .type_descriptor(
            TypeDescriptor::role::<dyn Solid>(QualifiedName::new(NS, "Solid"))
                .concrete_type::<Circle>()
                .build(),
        )
        .type_descriptor(
            TypeDescriptor::builder::<Circle>(QualifiedName::new(NS, "Circle"))
                .default_constructor()
                .property(Property::read_write::<Circle, f64>("r", |c| c.r, |c, v| c.r = v))
                .implements::<dyn Shape>(|c| c as Arc<dyn Shape>)
                .build(),
        )
        .build()
}

#[test]
fn abstract_types_activate_through_their_concrete_class() {
    let rt = runtime_with(vec![shapes_module()]);
    let shape = rt.create::<dyn Shape>([("r", "2")]).unwrap();
    assert_eq!(shape.area(), 12.0);

    let err = rt.create_default(TypeKey::of::<dyn Solid>()).unwrap_err();
    assert!(matches!(err, ActivationError::ConcreteClass { .. }));
}

trait Gadget: Send + Sync {}

#[derive(Default)]
struct Square;

fn loose_module() -> Module {
    Module::builder("loose")
        .type_descriptor(TypeDescriptor::role::<dyn Gadget>(QualifiedName::new(NS, "Gadget")).build())
        .type_descriptor(
            TypeDescriptor::builder::<Square>(QualifiedName::new(NS, "Square"))
                .default_constructor()
                .concrete_type::<Circle>()
                .build(),
        )
        .build()
}

#[test]
fn concrete_class_only_applies_to_abstract_types() {
    let rt = runtime_with(vec![shapes_module(), loose_module()]);
    let err = rt.create_default(TypeKey::of::<dyn Gadget>()).unwrap_err();
    assert!(matches!(err, ActivationError::CannotActivateNoConstructor(_)));

    let v = rt.create_default(TypeKey::of::<Square>()).unwrap();
    assert!(v.is::<Square>());
}

#[test]
fn types_resolve_by_name() {
    let rt = runtime_with(vec![shapes_module()]);
    let v = rt.create_by_name("{urn:net}Circle", [("r", "1")]).unwrap();
    assert!(v.is::<Circle>());
    let v = rt.create_by_name("circle", Properties::new()).unwrap();
    assert!(v.is::<Circle>());
    assert!(matches!(
        rt.create_by_name("Square", Properties::new()),
        Err(ActivationError::UnknownType(_))
    ));
}

#[derive(Default)]
struct Audit;

impl ActivationProvider for Audit {
    fn on_activated(&self, _rt: &Runtime, instance: &mut Instance) -> anyhow::Result<()> {
        if let Some(e) = instance.downcast_mut::<Endpoint>() {
            e.tags.push("audited".into());
        }
        Ok(())
    }
}

#[derive(Default)]
struct Refuse;

impl ActivationProvider for Refuse {
    fn on_activated(&self, _rt: &Runtime, _instance: &mut Instance) -> anyhow::Result<()> {
        anyhow::bail!("refused")
    }
}

#[derive(Default)]
struct Fatal;

impl ActivationProvider for Fatal {
    fn on_activated(&self, _rt: &Runtime, _instance: &mut Instance) -> anyhow::Result<()> {
        Err(CriticalError("out of budget".into()).into())
    }
}

fn hooks<T: ActivationProvider + Default + 'static>(
    name: &'static str,
    register: fn(&mut ProviderRegistrationContext) -> anyhow::Result<()>,
) -> Module {
    Module::builder(name)
        .type_descriptor(
            TypeDescriptor::builder::<T>(QualifiedName::new(NS, name))
                .default_constructor()
                .implements::<dyn ActivationProvider>(|p| p as Arc<dyn ActivationProvider>)
                .build(),
        )
        .register(register)
        .build()
}

fn register_audit(ctx: &mut ProviderRegistrationContext) -> anyhow::Result<()> {
    ctx.define_type_provider::<dyn ActivationProvider, Audit>(QualifiedName::new(NS, "audit"), Metadata::new());
    Ok(())
}

fn register_refuse(ctx: &mut ProviderRegistrationContext) -> anyhow::Result<()> {
    ctx.define_type_provider::<dyn ActivationProvider, Refuse>(QualifiedName::new(NS, "refuse"), Metadata::new());
    Ok(())
}

fn register_fatal(ctx: &mut ProviderRegistrationContext) -> anyhow::Result<()> {
    ctx.define_type_provider::<dyn ActivationProvider, Fatal>(QualifiedName::new(NS, "fatal"), Metadata::new());
    Ok(())
}

#[test]
fn activation_providers_run_after_initialization() {
    let rt = runtime_with(vec![net_module(), hooks::<Audit>("audit", register_audit)]);
    let v = rt
        .create_instance(TypeKey::of::<Endpoint>(), [("host", "a"), ("tags", "first")])
        .unwrap();
    assert_eq!(ep(&v).tags, vec!["first", "audited"]);
}

#[test]
fn activation_provider_failures_propagate_unless_handled() {
    let rt = runtime_with(vec![net_module(), hooks::<Refuse>("refuse", register_refuse)]);
    let err = rt.create_instance(TypeKey::of::<Endpoint>(), [("host", "a")]).unwrap_err();
    assert!(matches!(err, ActivationError::ActivationProvider { .. }));

    let recorder = Arc::new(Recorder::default());
    let rt = RuntimeBuilder::new(common::isolated())
        .module(net_module())
        .module(hooks::<Refuse>("refuse", register_refuse))
        .exception_handler(recorder.clone())
        .build()
        .unwrap();
    assert!(rt.create_instance(TypeKey::of::<Endpoint>(), [("host", "a")]).is_ok());
    assert_eq!(recorder.messages().len(), 1);
}

#[test]
fn critical_failures_always_propagate() {
    let recorder = Arc::new(Recorder::default());
    let rt = RuntimeBuilder::new(common::isolated())
        .module(net_module())
        .module(hooks::<Fatal>("fatal", register_fatal))
        .exception_handler(recorder.clone())
        .build()
        .unwrap();
    let err = rt.create_instance(TypeKey::of::<Endpoint>(), [("host", "a")]).unwrap_err();
    assert!(err.is_critical());
    assert!(recorder.messages().is_empty());
}

struct Report {
    title: String,
    lines: Vec<String>,
    footer: String,
}

#[derive(Default)]
struct ReportBuilder {
    title: String,
    lines: Vec<String>,
}

fn reports_module() -> Module {
    Module::builder("reports")
        .type_descriptor(
            TypeDescriptor::builder::<Report>(QualifiedName::new(NS, "Report"))
                .property(Property::read_write::<Report, String>(
                    "footer",
                    |r| r.footer.clone(),
                    |r, v| r.footer = v,
                ))
                .build(),
        )
        .type_descriptor(
            TypeDescriptor::builder::<ReportBuilder>(QualifiedName::new(NS, "ReportBuilder"))
                .default_constructor()
                .property(Property::read_write::<ReportBuilder, String>(
                    "title",
                    |b| b.title.clone(),
                    |b, v| b.title = v,
                ))
                .property(Property::collection::<ReportBuilder, String>(
                    "lines",
                    |b| &mut b.lines,
                    |b| &b.lines,
                ))
                .builds::<Report>(|b, _| {
                    Ok(Some(Report {
                        title: b.title.clone(),
                        lines: b.lines.clone(),
                        footer: String::new(),
                    }))
                })
                .build(),
        )
        .build()
}

#[test]
fn builder_adapters_construct_types_without_constructors() {
    let rt = runtime_with(vec![reports_module()]);
    let v = rt
        .create_instance(
            TypeKey::of::<Report>(),
            [("title", "Q3"), ("lines", "a"), ("footer", "end")],
        )
        .unwrap();
    let r = v.downcast_ref::<Report>().unwrap();
    assert_eq!(r.title, "Q3");
    assert_eq!(r.lines, vec!["a"]);
    assert_eq!(r.footer, "end");
}

#[test]
fn without_builders_a_constructorless_type_cannot_activate() {
    let rt = RuntimeBuilder::new(RuntimeConfig {
        use_builders: false,
        ..common::isolated()
    })
    .module(reports_module())
    .build()
    .unwrap();
    let err = rt.create_default(TypeKey::of::<Report>()).unwrap_err();
    assert!(matches!(err, ActivationError::CannotActivateNoConstructor(_)));
}
