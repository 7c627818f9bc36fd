//! 组件示例：派生描述、提供者发现、属性初始化以及 JSON/properties 读写。

use mmg_activator::prelude::*;

const NS: &str = "urn:widgets";

trait Widget: Send + Sync {
    fn draw(&self) -> String;
}

#[derive(Clone, Default, Describe)]
#[describe(namespace = "urn:widgets", default, implements(dyn Widget))]
struct Button {
    caption: String,
    #[describe(collection)]
    classes: Vec<String>,
}

impl Widget for Button {
    fn draw(&self) -> String {
        format!("[ {} ]{}", self.caption, self.classes.iter().map(|c| format!(" .{c}")).collect::<String>())
    }
}

#[derive(Clone, Default, Describe)]
#[describe(namespace = "urn:widgets", default, implements(dyn Widget))]
struct Slider {
    min: i32,
    max: i32,
    value: i32,
}

impl Widget for Slider {
    fn draw(&self) -> String {
        format!("{}|{}|{}", self.min, self.value, self.max)
    }
}

fn register(ctx: &mut ProviderRegistrationContext) -> anyhow::Result<()> {
    ctx.define_type_provider::<dyn Widget, Button>(
        QualifiedName::new(NS, "Button"),
        Metadata::new().with("kind", "action"),
    )
    .define_type_provider::<dyn Widget, Slider>(
        QualifiedName::new(NS, "Slider"),
        Metadata::new().with("kind", "input"),
    );
    Ok(())
}

fn widgets() -> Module {
    Module::builder("widgets")
        .type_descriptor(TypeDescriptor::role::<dyn Widget>(QualifiedName::new(NS, "Widget")).build())
        .describe::<Button>()
        .describe::<Slider>()
        .register(register)
        .build()
}

mmg_activator::register_module!(widgets);

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let rt = Runtime::new(RuntimeConfig {
        log_diagnostics: true,
        ..RuntimeConfig::default()
    })?;

    // 提供者：按名称与按条件
    for w in rt.get_providers::<dyn Widget>()? {
        println!("provider: {}", w.draw());
    }
    if let Some(input) = rt.get_provider_by_criteria::<dyn Widget>(&Criteria::new().with("kind", "input"))? {
        println!("input widget: {}", input.draw());
    }

    // 构造 + 属性初始化；未知属性交给诊断处理器
    let ok = rt.create_by_name("Button", [("caption", "OK"), ("classes", "primary"), ("colour", "red")])?;
    let button = rt.cast::<dyn Widget>(&ok).ok_or_else(|| anyhow::anyhow!("not a widget"))?;
    println!("created: {}", button.draw());

    // 流式读写
    let slider = rt
        .load_async(
            &StreamSource::Text(r#"{ "min": 0, "max": 10, "value": 3 }"#.into()),
            TypeKey::of::<Slider>(),
        )
        .await?;
    println!("loaded: {}", rt.cast::<dyn Widget>(&slider).map(|w| w.draw()).unwrap_or_default());
    println!("as properties:\n{}", rt.save(&slider, Some("properties"))?);
    println!("as json:\n{}", rt.save(&ok, None)?);

    let copy = rt.clone_value(&ok)?;
    println!("clone is a new instance: {}", !copy.ptr_eq(&ok));
    Ok(())
}
