use mmg_activator::prelude::*;

trait Shape: Send + Sync {}

#[derive(Clone, Default, Describe)]
#[describe(namespace = "urn:ui", default, implements(dyn Shape))]
struct Square {
    #[describe(rename = "size")]
    side: u32,
    #[describe(collection)]
    notes: Vec<String>,
    #[describe(read_only)]
    id: String,
}

impl Shape for Square {}

#[derive(Describe)]
struct Unit;

fn main() {
    let desc = Square::describe();
    assert_eq!(desc.properties().len(), 3);
    let _ = Unit::describe();
}
