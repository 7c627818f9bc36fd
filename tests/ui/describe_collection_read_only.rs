#![allow(dead_code)]
use mmg_activator::Describe;

#[derive(Describe)]
struct Log {
    #[describe(collection, read_only)]
    lines: Vec<String>,
}

fn main() {}
