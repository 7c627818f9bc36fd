#![allow(dead_code)]
use mmg_activator::Describe;

#[derive(Describe)]
#[describe(colour = "red")]
struct Paint {
    shade: u8,
}

fn main() {}
