#![allow(dead_code)]
use mmg_activator::Describe;

#[derive(Describe)]
struct Wrapper<T> {
    value: T,
}

fn main() {}
