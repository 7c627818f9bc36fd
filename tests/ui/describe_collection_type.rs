#![allow(dead_code)]
use mmg_activator::Describe;

#[derive(Describe)]
struct Note {
    #[describe(collection)]
    tags: String,
}

fn main() {}
