mod common;

use common::runtime_with;
use mmg_activator::{
    adapter::{self, BUILDER, NULL, STREAMING_SOURCE, TEMPLATE},
    error::ActivationError,
    prelude::*,
    template::PropertiesTemplate,
};
use std::sync::Arc;

const NS: &str = "urn:ui";

trait Renderer: Send + Sync {
    fn render(&self) -> String;
}

#[derive(Default)]
struct Page;
#[derive(Default)]
struct PageRenderer;
impl Renderer for PageRenderer {
    fn render(&self) -> String {
        "page".into()
    }
}

#[derive(Default)]
struct Chart;
#[derive(Default)]
struct ChartView;
impl Renderer for ChartView {
    fn render(&self) -> String {
        "chart".into()
    }
}

#[derive(Default)]
struct Card;
#[derive(Default)]
struct CardPainter;
impl Renderer for CardPainter {
    fn render(&self) -> String {
        "card".into()
    }
}

/// Sibling with the right name but not a `Renderer`.
#[derive(Default)]
struct Label;
#[derive(Default)]
struct LabelRenderer;

/// Routes `Chart` to `ChartView` for the `Renderer` role.
#[derive(Default)]
struct ChartAdapters;

impl AdapterFactory for ChartAdapters {
    fn get_adapter_type(&self, adaptee: TypeKey, role: &str) -> Option<TypeKey> {
        (adaptee == TypeKey::of::<Chart>() && role.eq_ignore_ascii_case("Renderer"))
            .then(TypeKey::of::<ChartView>)
    }
}

fn plain<T: Default + Send + Sync + 'static>(name: &str) -> TypeDescriptor {
    TypeDescriptor::builder::<T>(QualifiedName::new(NS, name))
        .default_constructor()
        .build()
}

fn renderer<T: Renderer + Default + 'static>(name: &str) -> TypeDescriptor {
    TypeDescriptor::builder::<T>(QualifiedName::new(NS, name))
        .default_constructor()
        .implements::<dyn Renderer>(|r| r as Arc<dyn Renderer>)
        .build()
}

fn register_ui(ctx: &mut ProviderRegistrationContext) -> anyhow::Result<()> {
    ctx.define_type_provider::<dyn AdapterFactory, ChartAdapters>(
        QualifiedName::new(NS, "ChartAdapters"),
        Metadata::new(),
    );
    Ok(())
}

fn ui_module() -> Module {
    Module::builder("ui")
        .define_role(AdapterRoleInfo::of::<dyn Renderer>("Renderer"))
        .type_descriptor(TypeDescriptor::role::<dyn Renderer>(QualifiedName::new(NS, "Renderer")).build())
        .type_descriptor(plain::<Page>("Page"))
        .type_descriptor(renderer::<PageRenderer>("PageRenderer"))
        .type_descriptor(plain::<Chart>("Chart"))
        .type_descriptor(renderer::<ChartView>("ChartView"))
        .type_descriptor(plain::<Label>("Label"))
        .type_descriptor(plain::<LabelRenderer>("LabelRenderer"))
        .type_descriptor(
            TypeDescriptor::builder::<ChartAdapters>(QualifiedName::new(NS, "ChartAdaptersImpl"))
                .default_constructor()
                .implements::<dyn AdapterFactory>(|f| f as Arc<dyn AdapterFactory>)
                .build(),
        )
        .register(register_ui)
        .build()
}

fn cards_module() -> Module {
    Module::builder("cards")
        .type_descriptor(plain::<Card>("Card"))
        .type_descriptor(renderer::<CardPainter>("CardPainter"))
        .adapter_factory(Arc::new(AdapterTable::new().map::<Card, CardPainter>("Renderer")))
        .build()
}

#[test]
fn builtin_roles_are_always_defined() {
    let rt = runtime_with(Vec::new());
    let names: Vec<String> = rt.adapter_roles().unwrap().iter().map(|r| r.name().to_string()).collect();
    for role in [BUILDER, STREAMING_SOURCE, "ActivationProvider", TEMPLATE, NULL] {
        assert!(names.iter().any(|n| n == role), "{role} missing from {names:?}");
    }
    let source = rt.adapter_role("streamingsource").unwrap().unwrap();
    assert_eq!(source.suffix(), Some("Source"));
    assert_eq!(rt.adapter_role(NULL).unwrap().unwrap().suffix(), None);
}

#[test]
fn unknown_and_empty_roles_are_errors() {
    let rt = runtime_with(vec![ui_module()]);
    assert!(matches!(
        rt.get_adapter_type(TypeKey::of::<Page>(), "Frobnicator"),
        Err(ActivationError::AdapterRoleNotDefined(ref r)) if r == "Frobnicator"
    ));
    assert!(matches!(
        rt.get_adapter_type(TypeKey::of::<Page>(), ""),
        Err(ActivationError::EmptyArgument(_))
    ));
    assert_eq!(rt.get_adapter_type(TypeKey::of::<Page>(), NULL).unwrap(), None);
}

#[test]
fn module_defined_roles_resolve_by_convention() {
    let rt = runtime_with(vec![ui_module()]);
    assert!(rt.adapter_role("renderer").unwrap().is_some_and(|r| r.module() == Some("ui")));
    let r = rt
        .get_adapter::<dyn Renderer>(TypeKey::of::<Page>(), "Renderer")
        .unwrap()
        .unwrap();
    assert_eq!(r.render(), "page");
}

#[test]
fn convention_matches_must_fit_the_role() {
    let rt = runtime_with(vec![ui_module()]);
    assert_eq!(rt.get_adapter_type(TypeKey::of::<Label>(), "Renderer").unwrap(), None);
}

#[test]
fn adapter_factory_providers_are_consulted() {
    let rt = runtime_with(vec![ui_module()]);
    assert_eq!(
        rt.get_adapter_type(TypeKey::of::<Chart>(), "Renderer").unwrap(),
        Some(TypeKey::of::<ChartView>())
    );
    let r = rt
        .get_adapter::<dyn Renderer>(TypeKey::of::<Chart>(), "renderer")
        .unwrap()
        .unwrap();
    assert_eq!(r.render(), "chart");
}

#[test]
fn the_adaptee_module_factory_comes_first() {
    let rt = runtime_with(vec![ui_module(), cards_module()]);
    let r = rt
        .get_adapter::<dyn Renderer>(TypeKey::of::<Card>(), "Renderer")
        .unwrap()
        .unwrap();
    assert_eq!(r.render(), "card");
}

#[test]
fn declared_adapters_win_over_convention() {
    let module = Module::builder("declared")
        .type_descriptor(
            TypeDescriptor::builder::<Page>(QualifiedName::new("urn:declared", "Page"))
                .default_constructor()
                .adapter("Renderer", TypeKey::of::<CardPainter>())
                .build(),
        )
        .build();
    let rt = runtime_with(vec![module, ui_module(), cards_module()]);
    let r = rt
        .get_adapter::<dyn Renderer>(TypeKey::of::<Page>(), "Renderer")
        .unwrap()
        .unwrap();
    assert_eq!(r.render(), "card");
}

#[test]
fn adapter_tables_and_composites_answer_first_match() {
    let table: Arc<dyn AdapterFactory> = Arc::new(AdapterTable::new().map::<Card, CardPainter>("Renderer"));
    let charts: Arc<dyn AdapterFactory> = Arc::new(ChartAdapters);
    let all = adapter::compose(vec![table.clone(), charts]);
    assert_eq!(
        all.get_adapter_type(TypeKey::of::<Card>(), "renderer"),
        Some(TypeKey::of::<CardPainter>())
    );
    assert_eq!(
        all.get_adapter_type(TypeKey::of::<Chart>(), "Renderer"),
        Some(TypeKey::of::<ChartView>())
    );
    assert_eq!(all.get_adapter_type(TypeKey::of::<Page>(), "Renderer"), None);
    assert_eq!(adapter::null().get_adapter_type(TypeKey::of::<Card>(), "Renderer"), None);
    // 单个元素的组合直接返回该元素
    assert!(Arc::ptr_eq(&adapter::compose(vec![table.clone()]), &table));
    // 空组合即共享的空工厂
    assert!(Arc::ptr_eq(&adapter::compose(vec![]), &adapter::null()));
}

#[derive(Clone, Copy)]
struct Celsius(f64);

#[derive(Clone, Copy)]
struct Fahrenheit(f64);

struct Thermostat {
    target: f64,
}

fn climate_module() -> Module {
    Module::builder("climate")
        .type_descriptor(
            TypeDescriptor::builder::<Celsius>(QualifiedName::new(NS, "Celsius"))
                .adaptable(|v, target| {
                    let c = v.downcast_ref::<Celsius>()?;
                    (target == TypeKey::of::<Fahrenheit>()).then(|| Value::new(Fahrenheit(c.0 * 9.0 / 5.0 + 32.0)))
                })
                .build(),
        )
        .type_descriptor(TypeDescriptor::builder::<Fahrenheit>(QualifiedName::new(NS, "Fahrenheit")).build())
        .type_descriptor(
            TypeDescriptor::builder::<Thermostat>(QualifiedName::new(NS, "Thermostat"))
                .constructor(Constructor::new(vec![Param::new::<Fahrenheit>("target")], |a| {
                    Ok(Thermostat {
                        target: a.get::<Fahrenheit>(0)?.0,
                    })
                }))
                .build(),
        )
        .build()
}

#[test]
fn adaptable_types_convert_values_and_arguments() {
    let rt = runtime_with(vec![climate_module()]);
    let hot = Value::new(Celsius(100.0));
    let f = rt.try_adapt(&hot, TypeKey::of::<Fahrenheit>()).unwrap();
    assert_eq!(f.downcast_ref::<Fahrenheit>().unwrap().0, 212.0);
    assert!(rt.try_adapt(&hot, TypeKey::of::<Thermostat>()).is_none());

    let v = rt
        .create_instance(TypeKey::of::<Thermostat>(), [("target", Value::new(Celsius(20.0)))])
        .unwrap();
    assert_eq!(v.downcast_ref::<Thermostat>().unwrap().target, 68.0);
}

#[derive(Clone, Default)]
struct Greeting {
    text: String,
    punct: String,
}

struct GreetingTemplate;

impl Template for GreetingTemplate {
    fn apply(&self, rt: &Runtime, target: &mut Instance) -> Result<()> {
        rt.initialize(target, [("text", "hello"), ("punct", "!")])
    }
}

fn greeting_module() -> Module {
    Module::builder("greetings")
        .type_descriptor(
            TypeDescriptor::builder::<Greeting>(QualifiedName::new("urn:greet", "Greeting"))
                .default_constructor()
                .property(Property::read_write::<Greeting, String>(
                    "text",
                    |g| g.text.clone(),
                    |g, v| g.text = v,
                ))
                .property(Property::read_write::<Greeting, String>(
                    "punct",
                    |g| g.punct.clone(),
                    |g, v| g.punct = v,
                ))
                .adapter(TEMPLATE, TypeKey::of::<GreetingTemplate>())
                .build(),
        )
        .type_descriptor(
            TypeDescriptor::builder::<GreetingTemplate>(QualifiedName::new("urn:greet", "GreetingTemplate"))
                .constructor(Constructor::new(Vec::new(), |_| Ok(GreetingTemplate)))
                .implements::<dyn Template>(|t| t as Arc<dyn Template>)
                .build(),
        )
        .build()
}

fn greeting(v: &Value) -> (String, String) {
    let g = v.downcast_ref::<Greeting>().unwrap();
    (g.text.clone(), g.punct.clone())
}

#[test]
fn templates_initialize_new_instances() {
    let rt = runtime_with(vec![greeting_module()]);
    let template = rt.template_for(TypeKey::of::<Greeting>()).unwrap().unwrap();
    let v = rt
        .create_from_template(TypeKey::of::<Greeting>(), template.as_ref())
        .unwrap();
    assert_eq!(greeting(&v), ("hello".into(), "!".into()));

    let bag = PropertiesTemplate::new(Properties::new().with("text", "bye"));
    let v = rt.create_from_template(TypeKey::of::<Greeting>(), &bag).unwrap();
    assert_eq!(greeting(&v), ("bye".into(), String::new()));
}

#[test]
fn properties_copy_and_clone() {
    let rt = runtime_with(vec![greeting_module()]);
    let source = rt
        .create_instance(TypeKey::of::<Greeting>(), [("text", "hi"), ("punct", "?")])
        .unwrap();
    let props = rt.properties_of(&source).unwrap();
    assert_eq!(props.get_text("TEXT"), Some("hi"));

    let mut target = Instance::new(Greeting::default());
    assert_eq!(rt.copy_properties(&source, &mut target).unwrap(), 2);
    assert_eq!(target.downcast_ref::<Greeting>().unwrap().punct, "?");

    let copy = rt.clone_value(&source).unwrap();
    assert!(!copy.ptr_eq(&source));
    assert_eq!(greeting(&copy), ("hi".into(), "?".into()));
}
